//! Search orchestrator: the adaptive time-window state machine.
//!
//! Drives window selection, calls the upstream client, applies the rarity
//! filter and decides whether to stop, expand or contract. Progress is
//! published as [`state::SessionState`] snapshots.

pub mod decision;
pub mod session;
pub mod state;

pub use session::RareFinder;
pub use state::{SessionFailure, SessionPhase, SessionState};

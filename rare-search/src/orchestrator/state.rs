//! Observable session state.
//!
//! The orchestrator publishes a [`SessionState`] snapshot on a
//! `tokio::sync::watch` channel after every transition. Observers (a UI,
//! the CLI) read it; they never mutate it.

use serde::Serialize;

use crate::error::{FailureKind, SearchError};
use crate::stats::ApiUsageStats;
use crate::types::VideoDetail;
use crate::window::TimeWindow;

/// Message shown for failures that have no more specific explanation.
pub const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong while searching. Please try again.";

/// Lifecycle phase of the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// No session has started, or the last one was cancelled.
    Idle,
    /// A session is scanning windows.
    Stepping,
    /// The session found rare videos.
    Succeeded,
    /// The session ended with an error.
    Failed,
}

/// Why a session failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionFailure {
    /// Failure category.
    pub kind: FailureKind,
    /// User-facing message.
    pub message: String,
    /// Underlying error, for diagnostics.
    pub detail: String,
}

impl SessionFailure {
    /// Describe `err` for observers.
    pub fn from_error(err: &SearchError) -> Self {
        let kind = err.kind();
        let message = match kind {
            FailureKind::QuotaExceeded => {
                "The video API quota is exhausted. Try again later.".to_string()
            }
            FailureKind::Auth => "The video API rejected the configured API key.".to_string(),
            FailureKind::NotFound => {
                "No rare videos were found. Try again for a different period.".to_string()
            }
            FailureKind::UpstreamUnavailable => {
                "The video API keeps failing. Check the connection and try again.".to_string()
            }
            FailureKind::Config
            | FailureKind::Cancelled
            | FailureKind::Unexpected => GENERIC_FAILURE_MESSAGE.to_string(),
        };
        Self {
            kind,
            message,
            detail: err.to_string(),
        }
    }
}

/// Snapshot of the current session, as seen by observers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionState {
    /// Identifies the session this snapshot belongs to.
    pub generation: u64,
    /// Lifecycle phase.
    pub phase: SessionPhase,
    /// `true` while a session is stepping.
    pub is_loading: bool,
    /// Rare videos found. Empty until the session succeeds.
    pub results: Vec<VideoDetail>,
    /// Window being scanned (or the last one scanned).
    pub current_window: Option<TimeWindow>,
    /// 1-based index of the current step.
    pub step: u32,
    /// Progress message; cleared when the session ends.
    pub status_message: Option<String>,
    /// Set when the session failed.
    pub error: Option<SessionFailure>,
    /// Usage counters of the current session.
    pub api_stats: ApiUsageStats,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            generation: 0,
            phase: SessionPhase::Idle,
            is_loading: false,
            results: Vec::new(),
            current_window: None,
            step: 0,
            status_message: None,
            error: None,
            api_stats: ApiUsageStats::default(),
        }
    }
}

impl SessionState {
    /// `true` once the session succeeded or failed.
    pub fn is_terminal(&self) -> bool {
        matches!(self.phase, SessionPhase::Succeeded | SessionPhase::Failed)
    }
}

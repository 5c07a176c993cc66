//! rarefind: find rarely viewed YouTube videos.
//!
//! The search itself lives in the [`rare_search`] crate. This crate adds the
//! application layer around it: TOML configuration with environment
//! overrides, terminal rendering of session progress, and the `rarefind`
//! binary.

pub mod config;
pub mod error;
pub mod report;

pub use config::{ApiConfig, AppConfig};
pub use error::{AppError, Result};

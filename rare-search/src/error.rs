//! Error types for the rare-search crate.
//!
//! All errors use stable string messages suitable for display to users
//! and programmatic handling. The upstream API key never appears in
//! error messages.

use serde::{Deserialize, Serialize};

/// Errors that can occur while searching for rare videos.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SearchError {
    /// An HTTP request to the upstream API failed (network error, 5xx, ...).
    #[error("HTTP error: {0}")]
    Http(String),

    /// The upstream API reported that the quota or rate limit is exhausted.
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// The upstream API rejected the credential.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The upstream response did not have the expected shape.
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid search configuration.
    #[error("config error: {0}")]
    Config(String),

    /// No rare video was found before the step or window ceiling.
    #[error("no rare videos found: {0}")]
    NotFound(String),

    /// Too many consecutive upstream failures.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// A newer session replaced this one before it finished.
    #[error("session superseded by a newer search")]
    Superseded,
}

impl SearchError {
    /// Returns `true` if the upstream client may swallow this error and
    /// degrade to an empty or cached result.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Http(_))
    }

    /// Returns the coarse failure category reported to observers.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::QuotaExceeded(_) => FailureKind::QuotaExceeded,
            Self::Auth(_) => FailureKind::Auth,
            Self::NotFound(_) => FailureKind::NotFound,
            Self::UpstreamUnavailable(_) => FailureKind::UpstreamUnavailable,
            Self::Config(_) => FailureKind::Config,
            Self::Superseded => FailureKind::Cancelled,
            Self::Http(_) | Self::Parse(_) => FailureKind::Unexpected,
        }
    }
}

/// Failure categories surfaced on the observable session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// API quota or rate limit exhausted.
    QuotaExceeded,
    /// Credential rejected.
    Auth,
    /// Step or window ceiling reached without a rare result.
    NotFound,
    /// Repeated transient upstream failures.
    UpstreamUnavailable,
    /// Invalid configuration.
    Config,
    /// Session was cancelled or superseded.
    Cancelled,
    /// Anything else, e.g. a malformed upstream response.
    Unexpected,
}

/// Convenience type alias for rare-search results.
pub type Result<T> = std::result::Result<T, SearchError>;

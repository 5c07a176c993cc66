//! Shared HTTP client for upstream API requests.
//!
//! Provides a configured [`reqwest::Client`] with a request timeout,
//! gzip decompression and an identifying User-Agent.

use std::time::Duration;

use crate::error::SearchError;

/// User-Agent sent when none is configured.
pub const DEFAULT_USER_AGENT: &str = concat!("rare-search/", env!("CARGO_PKG_VERSION"));

/// Build a [`reqwest::Client`] for upstream API calls.
///
/// # Errors
///
/// Returns [`SearchError::Config`] if `timeout_seconds` is zero, or
/// [`SearchError::Http`] if the client cannot be constructed.
pub fn build_client(
    timeout_seconds: u64,
    user_agent: Option<&str>,
) -> Result<reqwest::Client, SearchError> {
    if timeout_seconds == 0 {
        return Err(SearchError::Config(
            "timeout_seconds must be greater than 0".into(),
        ));
    }

    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .user_agent(user_agent.unwrap_or(DEFAULT_USER_AGENT))
        .gzip(true)
        .build()
        .map_err(|e| SearchError::Http(format!("failed to build HTTP client: {e}")))
}

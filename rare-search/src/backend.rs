//! Trait definition for the upstream video API.
//!
//! The orchestrator only needs two calls: list the ids of videos published
//! inside a window, and fetch details for a batch of ids. Implementations
//! perform the raw calls; caching, batching and accounting live in
//! [`crate::client::UpstreamClient`].

use crate::error::SearchError;
use crate::types::{CandidateId, VideoDetail};
use crate::window::TimeWindow;

/// A pluggable upstream video API.
///
/// Implementors handle:
///
/// - request construction, including the credential
/// - mapping HTTP failures onto [`SearchError`] kinds (quota exhaustion and
///   auth failures must not be reported as [`SearchError::Http`])
/// - validating response shapes and reporting mismatches as
///   [`SearchError::Parse`]
///
/// All implementations must be `Send + Sync` so detail batches can be
/// fetched concurrently and sessions can run on spawned tasks.
pub trait VideoApi: Send + Sync {
    /// List ids of videos published inside `window`, at most `max_results`.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError`] if the request fails or the response cannot
    /// be parsed.
    fn search_ids(
        &self,
        window: &TimeWindow,
        max_results: usize,
    ) -> impl std::future::Future<Output = Result<Vec<CandidateId>, SearchError>> + Send;

    /// Fetch details for `ids` (at most one upstream batch).
    ///
    /// Ids unknown upstream (deleted, private) are simply absent from the
    /// returned list.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError`] if the request fails or the response cannot
    /// be parsed.
    fn video_details(
        &self,
        ids: &[CandidateId],
    ) -> impl std::future::Future<Output = Result<Vec<VideoDetail>, SearchError>> + Send;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

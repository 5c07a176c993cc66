//! # rare-search
//!
//! Finds rarely viewed videos by searching a time-filtered video API over
//! an adaptive publish-time window.
//!
//! ## Design
//!
//! - A session starts from a random instant and scans a small window around it
//! - Empty or sparse windows are expanded, busy windows are contracted,
//!   until a video with fewer views than the threshold turns up
//! - Window searches and video details are memoised in an additive-only
//!   in-memory cache shared by all sessions of a finder
//! - Detail lookups are batched and the batches fetched concurrently
//! - Transient upstream failures degrade to empty/cached results; quota
//!   exhaustion, rejected credentials and malformed responses end the session
//! - Upstream calls and cache hits are counted per session
//!
//! ## Security
//!
//! - The API key is sent only as a query parameter to the configured API root
//! - Request URLs are logged only at trace level, without the key
//! - Error messages never contain the key

pub mod backend;
pub mod backends;
pub mod cache;
pub mod circuit_breaker;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod orchestrator;
pub mod rarity;
pub mod stats;
pub mod types;
pub mod window;

pub use backend::VideoApi;
pub use backends::{YouTubeApi, YouTubeConfig};
pub use cache::ResultCache;
pub use client::UpstreamClient;
pub use config::SearchConfig;
pub use error::{FailureKind, Result, SearchError};
pub use orchestrator::{RareFinder, SessionFailure, SessionPhase, SessionState};
pub use stats::ApiUsageStats;
pub use types::{CandidateId, VideoDetail};
pub use window::TimeWindow;

/// Run one search session against `api` and return the rare videos found.
///
/// Convenience wrapper around [`RareFinder`] for callers that do not need
/// to observe progress.
///
/// # Errors
///
/// Returns [`SearchError::Config`] if `config` is invalid, or the error
/// that ended the session.
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> rare_search::Result<()> {
/// let api = rare_search::YouTubeApi::new(rare_search::YouTubeConfig::new("API_KEY"))?;
/// let videos = rare_search::find_rare(api, rare_search::SearchConfig::default()).await?;
/// for video in &videos {
///     println!("{} ({} views): {}", video.title, video.view_count, video.watch_url());
/// }
/// # Ok(())
/// # }
/// ```
pub async fn find_rare<A: VideoApi + 'static>(api: A, config: SearchConfig) -> Result<Vec<VideoDetail>> {
    RareFinder::new(api, config)?.search().await
}

//! Core types for candidate ids and fetched video details.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque upstream video identifier returned by a search call.
pub type CandidateId = String;

/// Details of a single video, as returned by a detail call.
///
/// Immutable once fetched. Identity is [`VideoDetail::id`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoDetail {
    /// Upstream video id.
    pub id: CandidateId,
    /// Video title.
    pub title: String,
    /// Video description (may be empty).
    pub description: String,
    /// Best available thumbnail URL (may be empty).
    pub thumbnail_url: String,
    /// When the video was published.
    pub published_at: DateTime<Utc>,
    /// Number of views at fetch time.
    pub view_count: u64,
    /// Title of the uploading channel.
    pub channel_title: String,
}

impl VideoDetail {
    /// Public watch URL for this video.
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.id)
    }
}

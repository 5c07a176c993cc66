//! YouTube Data API v3 backend.
//!
//! Uses two endpoints:
//!
//! - `GET /search?part=id&type=video&publishedAfter=..&publishedBefore=..`
//!   to list candidate ids inside a window
//! - `GET /videos?part=snippet,statistics,contentDetails&id=a,b,c` to fetch
//!   details for a batch of up to 50 ids
//!
//! Both payloads are deserialized into typed records; anything that does
//! not match is reported as [`SearchError::Parse`]. Quota exhaustion and
//! credential rejection are mapped to their own error kinds so the client
//! boundary does not mistake them for transient failures.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use url::Url;

use crate::backend::VideoApi;
use crate::error::SearchError;
use crate::http;
use crate::types::{CandidateId, VideoDetail};
use crate::window::TimeWindow;

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

/// Error reasons that mean the quota or rate limit is exhausted.
const QUOTA_REASONS: &[&str] = &[
    "quotaExceeded",
    "dailyLimitExceeded",
    "rateLimitExceeded",
    "userRateLimitExceeded",
];

// ── Configuration ─────────────────────────────────────────────

/// Configuration for the YouTube backend.
#[derive(Clone)]
pub struct YouTubeConfig {
    /// API key sent as the `key` query parameter.
    pub api_key: String,
    /// API root, without a trailing slash.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_seconds: u64,
    /// Custom User-Agent. Defaults to [`http::DEFAULT_USER_AGENT`].
    pub user_agent: Option<String>,
}

impl std::fmt::Debug for YouTubeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YouTubeConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl YouTubeConfig {
    /// Create a config for the public API with the given key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_seconds: 10,
            user_agent: None,
        }
    }

    /// Override the API root (mock servers, proxies).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Override the per-request timeout.
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Validates the key and base URL.
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.api_key.trim().is_empty() {
            return Err(SearchError::Config("api_key must not be empty".into()));
        }
        Url::parse(&self.base_url)
            .map_err(|e| SearchError::Config(format!("invalid base_url: {e}")))?;
        Ok(())
    }
}

// ── Wire records ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SearchListResponse {
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    id: String,
    snippet: Snippet,
    #[serde(default)]
    statistics: Option<Statistics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    title: String,
    #[serde(default)]
    description: String,
    published_at: DateTime<Utc>,
    #[serde(default)]
    channel_title: String,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    #[serde(default)]
    high: Option<Thumbnail>,
    #[serde(default)]
    medium: Option<Thumbnail>,
    #[serde(default)]
    default: Option<Thumbnail>,
}

impl Thumbnails {
    fn best_url(&self) -> String {
        [&self.high, &self.medium, &self.default]
            .into_iter()
            .flatten()
            .map(|t| t.url.clone())
            .next()
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Statistics {
    #[serde(default)]
    view_count: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    reason: String,
}

// ── Parsing ───────────────────────────────────────────────────

/// Extract video ids from a `search.list` body. Non-video entries are skipped.
pub(crate) fn parse_search_response(body: &str) -> Result<Vec<CandidateId>, SearchError> {
    let response: SearchListResponse = serde_json::from_str(body)
        .map_err(|e| SearchError::Parse(format!("unexpected search response: {e}")))?;

    Ok(response
        .items
        .into_iter()
        .filter(|item| {
            item.id
                .kind
                .as_deref()
                .is_none_or(|kind| kind == "youtube#video")
        })
        .filter_map(|item| item.id.video_id)
        .collect())
}

/// Convert a `videos.list` body into details. Videos with hidden
/// statistics are skipped.
pub(crate) fn parse_videos_response(body: &str) -> Result<Vec<VideoDetail>, SearchError> {
    let response: VideoListResponse = serde_json::from_str(body)
        .map_err(|e| SearchError::Parse(format!("unexpected videos response: {e}")))?;

    let mut details = Vec::with_capacity(response.items.len());
    for item in response.items {
        let Some(raw_views) = item.statistics.and_then(|s| s.view_count) else {
            tracing::debug!(id = %item.id, "video has no public view count, skipping");
            continue;
        };
        let view_count = raw_views.parse::<u64>().map_err(|e| {
            SearchError::Parse(format!(
                "invalid viewCount {raw_views:?} for video {}: {e}",
                item.id
            ))
        })?;
        details.push(VideoDetail {
            thumbnail_url: item.snippet.thumbnails.best_url(),
            id: item.id,
            title: item.snippet.title,
            description: item.snippet.description,
            published_at: item.snippet.published_at,
            view_count,
            channel_title: item.snippet.channel_title,
        });
    }
    Ok(details)
}

/// Map a non-success HTTP status and body onto an error kind.
pub(crate) fn map_http_error(status: reqwest::StatusCode, body: &str) -> SearchError {
    let (message, reasons) = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => (
            envelope.error.message,
            envelope
                .error
                .errors
                .into_iter()
                .map(|e| e.reason)
                .collect::<Vec<_>>(),
        ),
        Err(_) => (body.to_string(), Vec::new()),
    };
    let code = status.as_u16();

    if code == 429 || reasons.iter().any(|r| QUOTA_REASONS.contains(&r.as_str())) {
        return SearchError::QuotaExceeded(format!("YouTube HTTP {code}: {message}"));
    }
    if code == 401 || code == 403 || reasons.iter().any(|r| r == "keyInvalid") {
        return SearchError::Auth(format!("YouTube HTTP {code}: {message}"));
    }
    SearchError::Http(format!("YouTube HTTP {code}: {message}"))
}

// ── Backend ───────────────────────────────────────────────────

/// YouTube Data API v3 client.
pub struct YouTubeApi {
    config: YouTubeConfig,
    client: reqwest::Client,
}

impl std::fmt::Debug for YouTubeApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YouTubeApi")
            .field("base_url", &self.config.base_url)
            .finish()
    }
}

impl YouTubeApi {
    /// Create a backend from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] if the configuration is invalid, or
    /// [`SearchError::Http`] if the HTTP client cannot be built.
    pub fn new(config: YouTubeConfig) -> Result<Self, SearchError> {
        config.validate()?;
        let client = http::build_client(config.timeout_seconds, config.user_agent.as_deref())?;
        Ok(Self { config, client })
    }

    async fn get(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<String, SearchError> {
        let url = format!("{}/{endpoint}", self.config.base_url);
        tracing::trace!(%url, ?params, "YouTube request");

        let response = self
            .client
            .get(&url)
            .query(params)
            .query(&[("key", self.config.api_key.as_str())])
            .send()
            .await
            .map_err(|e| {
                SearchError::Http(format!("YouTube {endpoint} request failed: {}", e.without_url()))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            SearchError::Http(format!("YouTube {endpoint} response read failed: {}", e.without_url()))
        })?;

        if !status.is_success() {
            return Err(map_http_error(status, &body));
        }
        tracing::trace!(bytes = body.len(), endpoint, "YouTube response received");
        Ok(body)
    }
}

impl VideoApi for YouTubeApi {
    async fn search_ids(
        &self,
        window: &TimeWindow,
        max_results: usize,
    ) -> Result<Vec<CandidateId>, SearchError> {
        let max_results = max_results.to_string();
        let after = window.published_after();
        let before = window.published_before();
        let body = self
            .get(
                "search",
                &[
                    ("part", "id"),
                    ("type", "video"),
                    ("maxResults", max_results.as_str()),
                    ("publishedAfter", after.as_str()),
                    ("publishedBefore", before.as_str()),
                ],
            )
            .await?;
        parse_search_response(&body)
    }

    async fn video_details(&self, ids: &[CandidateId]) -> Result<Vec<VideoDetail>, SearchError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let joined = ids.join(",");
        let body = self
            .get(
                "videos",
                &[("part", "snippet,statistics,contentDetails"), ("id", joined.as_str())],
            )
            .await?;
        parse_videos_response(&body)
    }

    fn name(&self) -> &'static str {
        "youtube"
    }
}

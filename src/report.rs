//! Terminal rendering of session progress and results.

use rare_search::{ApiUsageStats, SessionFailure, SessionPhase, SessionState, TimeWindow, VideoDetail};
use serde::Serialize;

/// Progress line for a stepping session, if there is one to show.
pub fn status_line(state: &SessionState) -> Option<String> {
    if state.phase != SessionPhase::Stepping {
        return None;
    }
    state.status_message.clone()
}

/// One result row: `title — channel — N views — URL`.
pub fn result_row(video: &VideoDetail) -> String {
    let views = if video.view_count == 1 {
        "1 view".to_string()
    } else {
        format!("{} views", video.view_count)
    };
    let channel = if video.channel_title.is_empty() {
        "unknown channel"
    } else {
        video.channel_title.as_str()
    };
    format!(
        "{} — {} — {} — {}",
        video.title.trim(),
        channel,
        views,
        video.watch_url()
    )
}

/// Header printed above the result rows.
pub fn results_header(state: &SessionState) -> String {
    let count = state.results.len();
    let noun = if count == 1 { "video" } else { "videos" };
    match &state.current_window {
        Some(window) => format!(
            "Found {count} rare {noun} after {} step(s) in {window}:",
            state.step
        ),
        None => format!("Found {count} rare {noun}:"),
    }
}

/// Summary of upstream calls and cache hits.
pub fn usage_summary(stats: &ApiUsageStats) -> String {
    format!(
        "API usage: {} call(s) ({} search, {} details), {} cache hit(s) ({} search, {} details), {:.0}% served from cache",
        stats.total_calls,
        stats.search_calls,
        stats.detail_calls,
        stats.total_cache_hits,
        stats.search_cache_hits,
        stats.detail_cache_hits,
        stats.hit_ratio() * 100.0
    )
}

/// User-facing failure line.
pub fn failure_line(failure: &SessionFailure) -> String {
    format!("Search failed: {}", failure.message)
}

#[derive(Serialize)]
struct JsonReport<'a> {
    phase: SessionPhase,
    step: u32,
    window: Option<&'a TimeWindow>,
    results: &'a [VideoDetail],
    error: Option<&'a SessionFailure>,
    api_stats: ApiUsageStats,
}

/// Machine-readable report of a finished session.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn render_json(state: &SessionState) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&JsonReport {
        phase: state.phase,
        step: state.step,
        window: state.current_window.as_ref(),
        results: &state.results,
        error: state.error.as_ref(),
        api_stats: state.api_stats,
    })
}

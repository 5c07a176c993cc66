//! Integration tests for the upstream client and the search orchestrator.
//!
//! A scripted in-memory API stands in for the upstream service, so these
//! tests make no network calls. The YouTube wire format is covered by
//! `youtube_contract.rs`.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use rare_search::{
    CandidateId, FailureKind, RareFinder, ResultCache, SearchConfig, SearchError, SessionPhase,
    TimeWindow, UpstreamClient, VideoApi, VideoDetail,
};
use tokio::sync::Notify;

type SearchScript = Box<dyn Fn(usize, &TimeWindow) -> Result<Vec<CandidateId>, SearchError> + Send + Sync>;
type ViewScript = Box<dyn Fn(&str) -> Option<u64> + Send + Sync>;
type Hook = Box<dyn FnOnce() + Send>;

/// Scripted upstream API that records every call it receives.
struct ScriptedApi {
    search: SearchScript,
    views: ViewScript,
    failing_id: Option<(String, SearchError)>,
    detail_delay: Option<Duration>,
    gate: Option<Gate>,
    first_search_hook: Mutex<Option<Hook>>,
    block_from_call: Option<usize>,
    windows: Mutex<Vec<TimeWindow>>,
    batches: Mutex<Vec<Vec<CandidateId>>>,
    search_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Blocks the first search call until released (or forever).
struct Gate {
    entered: Arc<Notify>,
    release: Arc<Notify>,
    used: AtomicBool,
}

impl ScriptedApi {
    fn new(search: SearchScript, views: ViewScript) -> Self {
        Self {
            search,
            views,
            failing_id: None,
            detail_delay: None,
            gate: None,
            first_search_hook: Mutex::new(None),
            block_from_call: None,
            windows: Mutex::new(Vec::new()),
            batches: Mutex::new(Vec::new()),
            search_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    fn with_failing_id(mut self, id: &str, err: SearchError) -> Self {
        self.failing_id = Some((id.to_string(), err));
        self
    }

    fn with_detail_delay(mut self, delay: Duration) -> Self {
        self.detail_delay = Some(delay);
        self
    }

    fn with_gate(mut self, entered: Arc<Notify>, release: Arc<Notify>) -> Self {
        self.gate = Some(Gate {
            entered,
            release,
            used: AtomicBool::new(false),
        });
        self
    }

    /// Run `hook` inside the first search call, before it returns.
    fn with_first_search_hook(self, hook: Hook) -> Self {
        *self.first_search_hook.lock().expect("lock") = Some(hook);
        self
    }

    /// Search calls from index `call` on never return.
    fn blocking_from_call(mut self, call: usize) -> Self {
        self.block_from_call = Some(call);
        self
    }

    fn windows(&self) -> Vec<TimeWindow> {
        self.windows.lock().expect("lock").clone()
    }

    fn batches(&self) -> Vec<Vec<CandidateId>> {
        self.batches.lock().expect("lock").clone()
    }

    fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }
}

impl VideoApi for ScriptedApi {
    async fn search_ids(
        &self,
        window: &TimeWindow,
        _max_results: usize,
    ) -> Result<Vec<CandidateId>, SearchError> {
        let call = self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.windows.lock().expect("lock").push(window.clone());

        if self.block_from_call.is_some_and(|from| call >= from) {
            std::future::pending::<()>().await;
        }
        let hook = self.first_search_hook.lock().expect("lock").take();
        if let Some(hook) = hook {
            hook();
        }

        if let Some(gate) = &self.gate {
            if !gate.used.swap(true, Ordering::SeqCst) {
                gate.entered.notify_one();
                gate.release.notified().await;
            }
        }

        (self.search)(call, window)
    }

    async fn video_details(&self, ids: &[CandidateId]) -> Result<Vec<VideoDetail>, SearchError> {
        self.batches.lock().expect("lock").push(ids.to_vec());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.detail_delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some((bad, err)) = &self.failing_id {
            if ids.iter().any(|id| id == bad) {
                return Err(err.clone());
            }
        }

        Ok(ids
            .iter()
            .filter_map(|id| (self.views)(id).map(|views| detail(id, views)))
            .collect())
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

fn t0() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2016-08-15T12:00:00Z")
        .expect("valid timestamp")
        .with_timezone(&Utc)
}

fn detail(id: &str, views: u64) -> VideoDetail {
    VideoDetail {
        id: id.to_string(),
        title: format!("Video {id}"),
        description: String::new(),
        thumbnail_url: String::new(),
        published_at: t0(),
        view_count: views,
        channel_title: "Channel".into(),
    }
}

fn ids(prefix: &str, n: usize) -> Vec<CandidateId> {
    (0..n).map(|i| format!("{prefix}{i}")).collect()
}

/// Views: ids starting with `rare` have 3 views, everything else 100.
fn default_views() -> ViewScript {
    Box::new(|id| Some(if id.starts_with("rare") { 3 } else { 100 }))
}

fn test_config() -> SearchConfig {
    SearchConfig {
        rare_view_threshold: 10,
        initial_window_minutes: 1.0,
        min_window_minutes: 1.0,
        aggressive_expansion_factor: 1440.0,
        moderate_expansion_factor: 2.0,
        contraction_factor: 0.5,
        busy_threshold: 45,
        moderate_threshold: 10,
        status_delay_ms: 0,
        ..Default::default()
    }
}

/// Script returning `first` on the first call and a single rare id afterwards.
fn then_rare(first: Vec<CandidateId>) -> SearchScript {
    Box::new(move |call, _| {
        if call == 0 {
            Ok(first.clone())
        } else {
            Ok(vec!["rare-next".to_string()])
        }
    })
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

// ── Upstream client ──────────────────────────────────────────────────

#[tokio::test]
async fn listing_a_window_twice_makes_one_upstream_call() {
    let api = ScriptedApi::new(Box::new(|_, _| Ok(ids("v", 4))), default_views());
    let client = UpstreamClient::new(api, &test_config());
    let window = TimeWindow::new(t0(), 30.0);

    let first = client.list_candidates(&window).await.expect("list");
    let second = client.list_candidates(&window).await.expect("list");

    assert_eq!(first, second);
    assert_eq!(client.api().search_calls(), 1);
    let stats = client.stats();
    assert_eq!(stats.search_calls, 1);
    assert_eq!(stats.search_cache_hits, 1);
    assert_eq!(stats.total_calls, 1);
}

#[tokio::test]
async fn details_are_batched_concurrently_and_returned_in_input_order() {
    let api = ScriptedApi::new(Box::new(|_, _| Ok(vec![])), default_views())
        .with_detail_delay(Duration::from_millis(20));
    let client = UpstreamClient::new(api, &test_config());

    let mut requested = ids("v", 120);
    requested.reverse();
    let details = client.fetch_details(&requested).await.expect("fetch");

    let batches = client.api().batches();
    let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![50, 50, 20]);
    assert_eq!(client.api().max_in_flight.load(Ordering::SeqCst), 3);
    assert_eq!(client.stats().detail_calls, 3);

    let returned: Vec<&str> = details.iter().map(|d| d.id.as_str()).collect();
    let expected: Vec<&str> = requested.iter().map(String::as_str).collect();
    assert_eq!(returned, expected);
}

#[tokio::test]
async fn only_missing_ids_are_fetched() {
    let api = ScriptedApi::new(Box::new(|_, _| Ok(vec![])), default_views());
    let client = UpstreamClient::new(api, &test_config());

    let warm = ids("v", 10);
    client.fetch_details(&warm).await.expect("fetch");

    let all = ids("v", 60);
    let details = client.fetch_details(&all).await.expect("fetch");
    assert_eq!(details.len(), 60);

    let batches = client.api().batches();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[1].len(), 50);
    assert!(batches[1].iter().all(|id| !warm.contains(id)));
    assert_eq!(client.stats().detail_cache_hits, 10);
}

#[tokio::test]
async fn unavailable_videos_are_skipped() {
    let views: ViewScript = Box::new(|id| if id == "deleted" { None } else { Some(1) });
    let api = ScriptedApi::new(Box::new(|_, _| Ok(vec![])), views);
    let client = UpstreamClient::new(api, &test_config());

    let requested: Vec<CandidateId> = vec!["a".into(), "deleted".into(), "b".into()];
    let details = client.fetch_details(&requested).await.expect("fetch");
    let got: Vec<&str> = details.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(got, vec!["a", "b"]);
}

#[tokio::test]
async fn failed_batch_does_not_block_other_batches() {
    let api = ScriptedApi::new(Box::new(|_, _| Ok(vec![])), default_views())
        .with_failing_id("v55", SearchError::Http("connection reset".into()));
    let client = UpstreamClient::new(api, &test_config());

    let requested = ids("v", 60);
    let details = client.fetch_details(&requested).await.expect("degrades gracefully");

    // First batch (v0..v49) succeeded, second (v50..v59) failed.
    assert_eq!(details.len(), 50);
    assert!(details.iter().all(|d| d.id != "v55"));
    assert_eq!(client.stats().detail_calls, 2);

    let lookup = client.cache().lookup_details(&requested).await;
    assert_eq!(lookup.cached.len(), 50);
    assert_eq!(lookup.missing.len(), 10);
}

#[tokio::test]
async fn quota_error_in_a_batch_is_returned() {
    let api = ScriptedApi::new(Box::new(|_, _| Ok(vec![])), default_views())
        .with_failing_id("v0", SearchError::QuotaExceeded("daily limit".into()));
    let client = UpstreamClient::new(api, &test_config());

    let err = client.fetch_details(&ids("v", 3)).await.unwrap_err();
    assert!(matches!(err, SearchError::QuotaExceeded(_)));
}

// ── Orchestrator scenarios ───────────────────────────────────────────

#[tokio::test]
async fn empty_window_expands_aggressively_around_same_center() {
    let api = ScriptedApi::new(then_rare(vec![]), default_views());
    let finder = RareFinder::new(api, test_config()).expect("finder");

    let results = finder.search_at(t0()).await.expect("search");
    assert_eq!(results.len(), 1);

    let windows = finder.client().api().windows();
    assert_eq!(windows.len(), 2);
    assert_close(windows[0].duration_minutes, 1.0);
    assert_close(windows[1].duration_minutes, 1440.0);
    assert_eq!(windows[1].center(), t0());
}

#[tokio::test]
async fn busy_window_without_rare_videos_contracts() {
    let config = SearchConfig {
        initial_window_minutes: 10.0,
        busy_threshold: 50,
        ..test_config()
    };
    let api = ScriptedApi::new(then_rare(ids("common", 60)), default_views());
    let finder = RareFinder::new(api, config).expect("finder");

    finder.search_at(t0()).await.expect("search");

    let windows = finder.client().api().windows();
    assert_close(windows[0].duration_minutes, 10.0);
    assert_close(windows[1].duration_minutes, 5.0);
    assert_eq!(windows[1].center(), windows[0].center());

    let sizes: Vec<usize> = finder.client().api().batches().iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![50, 10, 1]);
}

#[tokio::test]
async fn sparse_window_expands_aggressively() {
    let api = ScriptedApi::new(then_rare(ids("common", 5)), default_views());
    let finder = RareFinder::new(api, test_config()).expect("finder");

    finder.search_at(t0()).await.expect("search");

    let windows = finder.client().api().windows();
    assert_close(windows[1].duration_minutes, 1440.0);
}

#[tokio::test]
async fn moderate_window_expands_moderately() {
    let config = SearchConfig {
        initial_window_minutes: 30.0,
        ..test_config()
    };
    let api = ScriptedApi::new(then_rare(ids("common", 20)), default_views());
    let finder = RareFinder::new(api, config).expect("finder");

    finder.search_at(t0()).await.expect("search");

    let windows = finder.client().api().windows();
    assert_close(windows[1].duration_minutes, 60.0);
}

#[tokio::test]
async fn single_rare_video_ends_session_successfully() {
    let api = ScriptedApi::new(Box::new(|_, _| Ok(vec!["rare-1".into()])), default_views());
    let finder = RareFinder::new(api, test_config()).expect("finder");

    let results = finder.search_at(t0()).await.expect("search");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, "rare-1");
    assert_eq!(results[0].view_count, 3);

    let state = finder.state();
    assert_eq!(state.phase, SessionPhase::Succeeded);
    assert!(!state.is_loading);
    assert!(state.status_message.is_none());
    assert!(state.error.is_none());
    assert_eq!(state.results, results);
    assert_eq!(state.step, 1);
    assert_eq!(state.api_stats.search_calls, 1);
    assert_eq!(state.api_stats.detail_calls, 1);
}

#[tokio::test]
async fn only_rare_videos_are_returned() {
    let candidates = vec!["common-a".to_string(), "rare-b".to_string(), "common-c".to_string()];
    let api = ScriptedApi::new(Box::new(move |_, _| Ok(candidates.clone())), default_views());
    let finder = RareFinder::new(api, test_config()).expect("finder");

    let results = finder.search_at(t0()).await.expect("search");
    let got: Vec<&str> = results.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(got, vec!["rare-b"]);
}

#[tokio::test]
async fn second_session_resets_stats_but_keeps_cache() {
    let api = ScriptedApi::new(Box::new(|_, _| Ok(vec!["rare-1".into()])), default_views());
    let finder = RareFinder::new(api, test_config()).expect("finder");

    finder.search_at(t0()).await.expect("first session");
    let first = finder.stats();
    assert_eq!(first.search_calls, 1);
    assert_eq!(first.detail_calls, 1);

    finder.search_at(t0()).await.expect("second session");
    let second = finder.stats();
    assert_eq!(second.search_calls, 0);
    assert_eq!(second.detail_calls, 0);
    assert_eq!(second.total_calls, 0);
    assert_eq!(second.search_cache_hits, 1);
    assert_eq!(second.detail_cache_hits, 1);
    assert_eq!(finder.client().api().search_calls(), 1);
    assert_eq!(finder.state().api_stats, second);
}

#[tokio::test]
async fn finders_can_share_a_cache() {
    let cache = ResultCache::new();
    let make = || ScriptedApi::new(Box::new(|_, _| Ok(vec!["rare-1".into()])), default_views());

    let a = RareFinder::with_cache(make(), cache.clone(), test_config()).expect("finder");
    let b = RareFinder::with_cache(make(), cache, test_config()).expect("finder");

    a.search_at(t0()).await.expect("search");
    b.search_at(t0()).await.expect("search");

    assert_eq!(b.client().api().search_calls(), 0);
    assert_eq!(b.stats().search_cache_hits, 1);
}

// ── Termination ──────────────────────────────────────────────────────

#[tokio::test]
async fn step_ceiling_ends_session_as_not_found() {
    let config = SearchConfig {
        aggressive_expansion_factor: 2.0,
        max_steps: 3,
        ..test_config()
    };
    let api = ScriptedApi::new(Box::new(|_, _| Ok(vec![])), default_views());
    let finder = RareFinder::new(api, config).expect("finder");

    let err = finder.search_at(t0()).await.unwrap_err();
    assert!(matches!(err, SearchError::NotFound(_)));
    assert_eq!(finder.client().api().search_calls(), 3);

    let state = finder.state();
    assert_eq!(state.phase, SessionPhase::Failed);
    assert!(!state.is_loading);
    assert_eq!(state.error.expect("failure").kind, FailureKind::NotFound);
}

#[tokio::test]
async fn window_ceiling_ends_session_as_not_found() {
    let config = SearchConfig {
        aggressive_expansion_factor: 2.0,
        max_window_minutes: 4.0,
        max_steps: 100,
        ..test_config()
    };
    let api = ScriptedApi::new(Box::new(|_, _| Ok(vec![])), default_views());
    let finder = RareFinder::new(api, config).expect("finder");

    let err = finder.search_at(t0()).await.unwrap_err();
    assert!(matches!(err, SearchError::NotFound(_)));

    let durations: Vec<f64> = finder
        .client()
        .api()
        .windows()
        .iter()
        .map(|w| w.duration_minutes)
        .collect();
    assert_eq!(durations, vec![1.0, 2.0, 4.0]);
}

#[tokio::test]
async fn busy_window_at_floor_ends_session_as_not_found() {
    let api = ScriptedApi::new(Box::new(|_, _| Ok(ids("common", 60))), default_views());
    let finder = RareFinder::new(api, test_config()).expect("finder");

    let err = finder.search_at(t0()).await.unwrap_err();
    assert!(matches!(err, SearchError::NotFound(_)));
    assert_eq!(finder.client().api().search_calls(), 1);

    let state = finder.state();
    assert_eq!(state.phase, SessionPhase::Failed);
    assert_eq!(state.error.expect("failure").kind, FailureKind::NotFound);
}

#[tokio::test]
async fn busy_window_contracts_down_to_floor_then_stops() {
    let config = SearchConfig {
        initial_window_minutes: 3.0,
        max_steps: 100,
        ..test_config()
    };
    let api = ScriptedApi::new(Box::new(|_, _| Ok(ids("common", 60))), default_views());
    let finder = RareFinder::new(api, config).expect("finder");

    let err = finder.search_at(t0()).await.unwrap_err();
    assert!(matches!(err, SearchError::NotFound(_)));

    let durations: Vec<f64> = finder
        .client()
        .api()
        .windows()
        .iter()
        .map(|w| w.duration_minutes)
        .collect();
    assert_eq!(durations, vec![3.0, 1.5, 1.0]);
}

#[tokio::test]
async fn expansion_is_clamped_to_window_ceiling() {
    let config = SearchConfig {
        max_window_minutes: 100.0,
        ..test_config()
    };
    let api = ScriptedApi::new(then_rare(vec![]), default_views());
    let finder = RareFinder::new(api, config).expect("finder");

    finder.search_at(t0()).await.expect("search");
    let windows = finder.client().api().windows();
    assert_close(windows[1].duration_minutes, 100.0);
}

#[tokio::test]
async fn quota_exhaustion_fails_session_distinctly() {
    let api = ScriptedApi::new(
        Box::new(|_, _| Err(SearchError::QuotaExceeded("quotaExceeded".into()))),
        default_views(),
    );
    let finder = RareFinder::new(api, test_config()).expect("finder");

    let err = finder.search_at(t0()).await.unwrap_err();
    assert!(matches!(err, SearchError::QuotaExceeded(_)));
    assert_eq!(finder.client().api().search_calls(), 1);

    let failure = finder.state().error.expect("failure");
    assert_eq!(failure.kind, FailureKind::QuotaExceeded);
}

#[tokio::test]
async fn repeated_transient_failures_trip_the_breaker() {
    let config = SearchConfig {
        circuit_failure_threshold: 3,
        aggressive_expansion_factor: 2.0,
        ..test_config()
    };
    let api = ScriptedApi::new(
        Box::new(|_, _| Err(SearchError::Http("connection refused".into()))),
        default_views(),
    );
    let finder = RareFinder::new(api, config).expect("finder");

    let err = finder.search_at(t0()).await.unwrap_err();
    assert!(matches!(err, SearchError::UpstreamUnavailable(_)));
    assert_eq!(finder.client().api().search_calls(), 3);
    assert_eq!(finder.stats().search_calls, 3);
    assert_eq!(
        finder.state().error.expect("failure").kind,
        FailureKind::UpstreamUnavailable
    );
}

#[tokio::test]
async fn transient_search_failure_drives_normal_expansion() {
    let api = ScriptedApi::new(
        Box::new(|call, _| {
            if call == 0 {
                Err(SearchError::Http("timeout".into()))
            } else {
                Ok(vec!["rare-1".into()])
            }
        }),
        default_views(),
    );
    let finder = RareFinder::new(api, test_config()).expect("finder");

    let results = finder.search_at(t0()).await.expect("search");
    assert_eq!(results.len(), 1);
    let windows = finder.client().api().windows();
    assert_close(windows[1].duration_minutes, 1440.0);
}

#[tokio::test]
async fn malformed_response_fails_with_generic_message() {
    let api = ScriptedApi::new(
        Box::new(|_, _| Err(SearchError::Parse("missing items".into()))),
        default_views(),
    );
    let finder = RareFinder::new(api, test_config()).expect("finder");

    let err = finder.search_at(t0()).await.unwrap_err();
    assert!(matches!(err, SearchError::Parse(_)));

    let state = finder.state();
    assert_eq!(state.phase, SessionPhase::Failed);
    let failure = state.error.expect("failure");
    assert_eq!(failure.kind, FailureKind::Unexpected);
    assert_eq!(
        failure.message,
        rare_search::orchestrator::state::GENERIC_FAILURE_MESSAGE
    );
}

// ── Concurrency and cancellation ─────────────────────────────────────

#[tokio::test]
async fn newer_session_supersedes_stale_one() {
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let api = ScriptedApi::new(Box::new(|_, _| Ok(vec!["rare-1".into()])), default_views())
        .with_gate(Arc::clone(&entered), Arc::clone(&release));
    let finder = RareFinder::new(api, test_config()).expect("finder");

    let stale = finder.start_search_at(t0());
    entered.notified().await;

    let during = finder.state();
    assert_eq!(during.phase, SessionPhase::Stepping);
    assert!(during.is_loading);
    assert!(during
        .status_message
        .as_deref()
        .is_some_and(|m| m.starts_with("Step 1")));

    let newer_center = t0() - TimeDelta::days(400);
    let results = finder.search_at(newer_center).await.expect("newer session");
    assert_eq!(results.len(), 1);

    let stale_outcome = stale.await.expect("task joined");
    assert!(matches!(stale_outcome, Err(SearchError::Superseded)));

    let state = finder.state();
    assert_eq!(state.generation, 2);
    assert_eq!(state.phase, SessionPhase::Succeeded);
    assert_eq!(
        state.current_window.expect("window").center(),
        newer_center
    );
    assert_eq!(state.api_stats.search_calls, 1);
}

#[tokio::test]
async fn stale_call_finishing_after_restart_is_not_counted() {
    let slot: Arc<OnceLock<RareFinder<ScriptedApi>>> = Arc::new(OnceLock::new());
    let hook_slot = Arc::clone(&slot);
    let newer_center = t0() - TimeDelta::days(30);

    let api = ScriptedApi::new(
        Box::new(|_, _| Err(SearchError::Http("connection reset".into()))),
        default_views(),
    )
    .blocking_from_call(1)
    .with_first_search_hook(Box::new(move || {
        if let Some(finder) = hook_slot.get() {
            drop(finder.start_search_at(newer_center));
        }
    }));
    let config = SearchConfig {
        circuit_failure_threshold: 1,
        ..test_config()
    };
    let finder = RareFinder::new(api, config).expect("finder");
    assert!(slot.set(finder.clone()).is_ok());

    let stale = finder.search_at(t0()).await;
    assert!(matches!(stale, Err(SearchError::Superseded)));

    let state = finder.state();
    assert_eq!(state.generation, 2);
    assert_eq!(state.phase, SessionPhase::Stepping);
    assert_eq!(finder.stats(), rare_search::ApiUsageStats::default());
    assert!(finder.client().tripped().is_none());
}

#[tokio::test]
async fn stale_listing_is_not_counted_after_reset() {
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let api = ScriptedApi::new(Box::new(|_, _| Ok(ids("v", 3))), default_views())
        .with_gate(Arc::clone(&entered), Arc::clone(&release));
    let client = Arc::new(UpstreamClient::new(api, &test_config()));

    let pending = {
        let client = Arc::clone(&client);
        tokio::spawn(async move {
            let window = TimeWindow::new(t0(), 5.0);
            client.list_candidates(&window).await
        })
    };
    entered.notified().await;
    client.reset_session();
    release.notify_one();

    let ids = pending.await.expect("task joined").expect("list");
    assert_eq!(ids.len(), 3);
    assert_eq!(client.stats(), rare_search::ApiUsageStats::default());
    assert_eq!(client.api().search_calls(), 1);
}

#[tokio::test]
async fn cancel_returns_to_idle() {
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let api = ScriptedApi::new(Box::new(|_, _| Ok(vec!["rare-1".into()])), default_views())
        .with_gate(Arc::clone(&entered), Arc::clone(&release));
    let finder = RareFinder::new(api, test_config()).expect("finder");
    let mut updates = finder.subscribe();

    let handle = finder.start_search_at(t0());
    entered.notified().await;
    finder.cancel();

    let outcome = handle.await.expect("task joined");
    assert!(matches!(outcome, Err(SearchError::Superseded)));

    let state = updates.borrow_and_update().clone();
    assert_eq!(state.phase, SessionPhase::Idle);
    assert!(!state.is_loading);
    assert!(state.status_message.is_none());
    assert!(state.results.is_empty());
}

#[tokio::test]
async fn spawned_session_publishes_terminal_state() {
    let api = ScriptedApi::new(then_rare(vec![]), default_views());
    let finder = RareFinder::new(api, test_config()).expect("finder");
    let mut updates = finder.subscribe();

    let handle = finder.start_search_at(t0());
    let state = tokio::time::timeout(
        Duration::from_secs(5),
        updates.wait_for(|s| s.is_terminal()),
    )
    .await
    .expect("session finishes")
    .expect("channel open")
    .clone();

    assert_eq!(state.phase, SessionPhase::Succeeded);
    assert_eq!(state.step, 2);
    let results = handle.await.expect("task joined").expect("search");
    assert_eq!(state.results, results);
}

#[tokio::test]
async fn random_start_stays_inside_lookback() {
    let config = SearchConfig {
        lookback_days: 7,
        ..test_config()
    };
    let api = ScriptedApi::new(Box::new(|_, _| Ok(vec!["rare-1".into()])), default_views());
    let finder = RareFinder::new(api, config).expect("finder");

    finder.search().await.expect("search");
    let center = finder.client().api().windows()[0].center();
    let now = Utc::now();
    assert!(center <= now);
    assert!(center >= now - TimeDelta::days(7) - TimeDelta::minutes(1));
}

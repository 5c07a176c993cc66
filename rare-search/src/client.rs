//! Upstream client: cache-checked, batched, accounted calls to a [`VideoApi`].
//!
//! This is the error boundary of the crate. Transient failures are logged
//! and converted into fallbacks (an empty candidate list, or whatever is
//! cached), so the orchestrator never special-cases network errors. Quota
//! exhaustion, credential rejection and malformed responses are not
//! transient and are returned to the caller.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::backend::VideoApi;
use crate::cache::ResultCache;
use crate::circuit_breaker::{CallKind, CircuitBreaker};
use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::stats::ApiUsageStats;
use crate::types::{CandidateId, VideoDetail};
use crate::window::TimeWindow;

/// Per-session counters and upstream health, tagged with the session epoch.
#[derive(Debug)]
struct Ledger {
    epoch: u64,
    stats: ApiUsageStats,
    breaker: CircuitBreaker,
}

/// Cache-checked access to the upstream API with usage accounting.
///
/// Every call captures the current epoch when it starts. Bookkeeping from a
/// call that finishes after [`UpstreamClient::reset_session`] is dropped,
/// so a superseded session never touches the counters or the breaker of
/// the session that replaced it.
pub struct UpstreamClient<A> {
    api: A,
    cache: ResultCache,
    ledger: Mutex<Ledger>,
    max_results_per_search: usize,
    max_ids_per_batch: usize,
}

impl<A: VideoApi> std::fmt::Debug for UpstreamClient<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamClient")
            .field("api", &self.api.name())
            .field("cache", &self.cache)
            .field("stats", &self.stats())
            .finish()
    }
}

impl<A: VideoApi> UpstreamClient<A> {
    /// Create a client with a fresh, private cache.
    pub fn new(api: A, config: &SearchConfig) -> Self {
        Self::with_cache(api, ResultCache::new(), config)
    }

    /// Create a client that shares `cache` with other clients.
    pub fn with_cache(api: A, cache: ResultCache, config: &SearchConfig) -> Self {
        Self {
            api,
            cache,
            ledger: Mutex::new(Ledger {
                epoch: 0,
                stats: ApiUsageStats::default(),
                breaker: CircuitBreaker::new(config.circuit_failure_threshold),
            }),
            max_results_per_search: config.max_results_per_search.max(1),
            max_ids_per_batch: config.max_ids_per_batch.max(1),
        }
    }

    /// The underlying API.
    pub fn api(&self) -> &A {
        &self.api
    }

    /// The cache backing this client.
    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Snapshot of the usage counters.
    pub fn stats(&self) -> ApiUsageStats {
        self.ledger().stats
    }

    /// Start a new accounting epoch: zero the usage counters and close the
    /// circuit breaker. The cache is kept.
    pub fn reset_session(&self) {
        let mut ledger = self.ledger();
        ledger.epoch = ledger.epoch.wrapping_add(1);
        ledger.stats = ApiUsageStats::default();
        ledger.breaker.reset();
    }

    /// The call kind whose consecutive failures reached the threshold, if any.
    pub fn tripped(&self) -> Option<CallKind> {
        self.ledger().breaker.tripped()
    }

    /// Consecutive failures recorded for `kind`.
    pub fn consecutive_failures(&self, kind: CallKind) -> u32 {
        self.ledger().breaker.consecutive_failures(kind)
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn epoch(&self) -> u64 {
        self.ledger().epoch
    }

    /// Apply `f` to the ledger if it still belongs to `epoch`.
    fn record(&self, epoch: u64, f: impl FnOnce(&mut Ledger)) {
        let mut ledger = self.ledger();
        if ledger.epoch != epoch {
            tracing::debug!(epoch, current = ledger.epoch, "dropping bookkeeping of a previous session");
            return;
        }
        f(&mut ledger);
    }

    /// List candidate ids published inside `window`.
    ///
    /// A cached window is answered without an upstream call. On a miss one
    /// search call is made and its result cached. A transient failure is
    /// logged and reported as an empty list (and is not cached).
    ///
    /// # Errors
    ///
    /// Returns non-transient upstream errors (quota, auth, parse).
    pub async fn list_candidates(
        &self,
        window: &TimeWindow,
    ) -> Result<Vec<CandidateId>, SearchError> {
        let epoch = self.epoch();
        if let Some(ids) = self.cache.lookup_search(window).await {
            tracing::debug!(window = %window.cache_key(), count = ids.len(), "search cache hit");
            self.record(epoch, |l| l.stats.record_search_hit());
            return Ok(ids);
        }

        tracing::debug!(window = %window.cache_key(), "search cache miss");
        let outcome = self
            .api
            .search_ids(window, self.max_results_per_search)
            .await;
        self.record(epoch, |l| {
            l.stats.record_search_call();
            match &outcome {
                Ok(_) => l.breaker.record_success(CallKind::Search),
                Err(err) if err.is_transient() => l.breaker.record_failure(CallKind::Search),
                Err(_) => {}
            }
        });

        match outcome {
            Ok(ids) => {
                self.cache.store_search(window, ids.clone()).await;
                Ok(ids)
            }
            Err(err) if err.is_transient() => {
                tracing::warn!(
                    api = self.api.name(),
                    window = %window.cache_key(),
                    error = %err,
                    "search call failed, treating window as empty"
                );
                Ok(Vec::new())
            }
            Err(err) => Err(err),
        }
    }

    /// Fetch details for `ids`, returned in input order.
    ///
    /// Cached ids are answered locally. Missing ids are split into batches
    /// of at most `max_ids_per_batch`, all fetched concurrently. Ids with no
    /// detail (deleted videos, failed batches) are skipped.
    ///
    /// # Errors
    ///
    /// Returns the first non-transient batch error, after caching the
    /// batches that succeeded.
    pub async fn fetch_details(&self, ids: &[CandidateId]) -> Result<Vec<VideoDetail>, SearchError> {
        let epoch = self.epoch();
        let lookup = self.cache.lookup_details(ids).await;
        let hits = lookup.cached.len() as u64;
        if hits > 0 {
            self.record(epoch, |l| l.stats.record_detail_hits(hits));
        }

        if lookup.missing.is_empty() {
            tracing::debug!(count = ids.len(), "all details cached");
            return Ok(in_input_order(ids, &lookup.cached, &HashMap::new()));
        }

        let batches: Vec<&[CandidateId]> = lookup.missing.chunks(self.max_ids_per_batch).collect();
        tracing::debug!(
            cached = hits,
            missing = lookup.missing.len(),
            batches = batches.len(),
            "fetching details"
        );

        let futures = batches.iter().map(|batch| self.api.video_details(batch));
        let outcomes = futures::future::join_all(futures).await;

        let mut fetched: HashMap<CandidateId, VideoDetail> = HashMap::new();
        let mut fatal: Option<SearchError> = None;
        for (batch, outcome) in batches.iter().zip(outcomes) {
            self.record(epoch, |l| {
                l.stats.record_detail_call();
                match &outcome {
                    Ok(_) => l.breaker.record_success(CallKind::Details),
                    Err(err) if err.is_transient() => l.breaker.record_failure(CallKind::Details),
                    Err(_) => {}
                }
            });
            match outcome {
                Ok(details) => {
                    self.cache.store_details(details.iter().cloned()).await;
                    for detail in details {
                        fetched.insert(detail.id.clone(), detail);
                    }
                }
                Err(err) if err.is_transient() => {
                    tracing::warn!(
                        api = self.api.name(),
                        batch_size = batch.len(),
                        error = %err,
                        "detail batch failed, falling back to cached details"
                    );
                }
                Err(err) => {
                    tracing::warn!(batch_size = batch.len(), error = %err, "detail batch failed");
                    fatal.get_or_insert(err);
                }
            }
        }

        if let Some(err) = fatal {
            return Err(err);
        }
        Ok(in_input_order(ids, &lookup.cached, &fetched))
    }
}

/// Collect details for `ids` in order from the two maps, skipping unknown ids.
fn in_input_order(
    ids: &[CandidateId],
    cached: &HashMap<CandidateId, VideoDetail>,
    fetched: &HashMap<CandidateId, VideoDetail>,
) -> Vec<VideoDetail> {
    ids.iter()
        .filter_map(|id| cached.get(id).or_else(|| fetched.get(id)).cloned())
        .collect()
}

//! In-memory memoisation of upstream lookups.
//!
//! Two independent maps backed by [`moka`]:
//!
//! - search cache: window key → candidate ids (in upstream order)
//! - detail cache: candidate id → [`VideoDetail`]
//!
//! Both are unbounded, have no TTL and are additive-only: the first value
//! stored for a key is kept for the lifetime of the cache. Upstream data
//! behind a cached entry is assumed stable while the process runs, so an
//! entry is never refreshed, evicted or overwritten. Clones share storage,
//! which lets several orchestrators benefit from the same cache.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use moka::future::Cache;

use crate::types::{CandidateId, VideoDetail};
use crate::window::TimeWindow;

/// Result of splitting requested ids into cached and missing ones.
#[derive(Debug, Default)]
pub struct DetailLookup {
    /// Details already in the cache, keyed by id.
    pub cached: HashMap<CandidateId, VideoDetail>,
    /// Ids with no cached detail, de-duplicated, in first-seen order.
    pub missing: Vec<CandidateId>,
}

/// Shared search and detail cache.
#[derive(Clone)]
pub struct ResultCache {
    search: Cache<String, Arc<Vec<CandidateId>>>,
    details: Cache<CandidateId, VideoDetail>,
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("search_entries", &self.search.entry_count())
            .field("detail_entries", &self.details.entry_count())
            .finish()
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultCache {
    /// Create an empty, unbounded cache.
    pub fn new() -> Self {
        Self {
            search: Cache::builder().build(),
            details: Cache::builder().build(),
        }
    }

    /// Candidate ids previously stored for `window`, if any.
    pub async fn lookup_search(&self, window: &TimeWindow) -> Option<Vec<CandidateId>> {
        self.search
            .get(&window.cache_key())
            .await
            .map(|ids| ids.as_ref().clone())
    }

    /// Store candidate ids for `window`. An existing entry is kept as is.
    pub async fn store_search(&self, window: &TimeWindow, ids: Vec<CandidateId>) {
        self.search
            .entry(window.cache_key())
            .or_insert(Arc::new(ids))
            .await;
    }

    /// Split `ids` into cached details and ids that still need fetching.
    pub async fn lookup_details(&self, ids: &[CandidateId]) -> DetailLookup {
        let mut lookup = DetailLookup::default();
        let mut seen = HashSet::new();
        for id in ids {
            if !seen.insert(id.as_str()) {
                continue;
            }
            match self.details.get(id).await {
                Some(detail) => {
                    lookup.cached.insert(id.clone(), detail);
                }
                None => lookup.missing.push(id.clone()),
            }
        }
        lookup
    }

    /// Store fetched details. Ids that already have a detail keep it.
    pub async fn store_details(&self, details: impl IntoIterator<Item = VideoDetail>) {
        for detail in details {
            self.details
                .entry(detail.id.clone())
                .or_insert(detail)
                .await;
        }
    }

    /// Number of cached windows.
    pub async fn search_entries(&self) -> u64 {
        self.search.run_pending_tasks().await;
        self.search.entry_count()
    }

    /// Number of cached details.
    pub async fn detail_entries(&self) -> u64 {
        self.details.run_pending_tasks().await;
        self.details.entry_count()
    }
}

//! Upstream API usage accounting.
//!
//! Counts real upstream calls and cache hits for the current session.
//! Reset at the start of every session; the cache itself is not.

use serde::{Deserialize, Serialize};

/// Per-session upstream call and cache-hit counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiUsageStats {
    /// Search calls sent upstream.
    pub search_calls: u64,
    /// Detail calls (one per batch) sent upstream.
    pub detail_calls: u64,
    /// All calls sent upstream.
    pub total_calls: u64,
    /// Search lookups answered from the cache.
    pub search_cache_hits: u64,
    /// Detail lookups answered from the cache, counted per id.
    pub detail_cache_hits: u64,
    /// All cache hits.
    pub total_cache_hits: u64,
}

impl ApiUsageStats {
    /// Record one upstream search call.
    pub fn record_search_call(&mut self) {
        self.search_calls = self.search_calls.saturating_add(1);
        self.total_calls = self.total_calls.saturating_add(1);
    }

    /// Record one upstream detail call.
    pub fn record_detail_call(&mut self) {
        self.detail_calls = self.detail_calls.saturating_add(1);
        self.total_calls = self.total_calls.saturating_add(1);
    }

    /// Record a search answered from the cache.
    pub fn record_search_hit(&mut self) {
        self.search_cache_hits = self.search_cache_hits.saturating_add(1);
        self.total_cache_hits = self.total_cache_hits.saturating_add(1);
    }

    /// Record `count` detail ids answered from the cache.
    pub fn record_detail_hits(&mut self, count: u64) {
        self.detail_cache_hits = self.detail_cache_hits.saturating_add(count);
        self.total_cache_hits = self.total_cache_hits.saturating_add(count);
    }

    /// Share of lookups answered from the cache, in `0.0..=1.0`.
    pub fn hit_ratio(&self) -> f64 {
        let lookups = self.total_calls + self.total_cache_hits;
        if lookups == 0 {
            0.0
        } else {
            self.total_cache_hits as f64 / lookups as f64
        }
    }
}

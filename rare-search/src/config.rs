//! Search configuration with sensible defaults.
//!
//! [`SearchConfig`] holds every tunable constant of the adaptive window
//! search: the rarity threshold, window sizing factors, volume thresholds,
//! pacing, upstream page/batch limits and the termination ceilings.

use serde::{Deserialize, Serialize};

use crate::error::SearchError;

/// Hard per-request limit of the upstream API for both page size and
/// id batches.
pub const UPSTREAM_PAGE_LIMIT: usize = 50;

/// Longest accepted lookback horizon (about a century).
pub const MAX_LOOKBACK_DAYS: u32 = 36_500;

const MINUTES_PER_DAY: f64 = 24.0 * 60.0;

/// Configuration for a rare-video search session.
///
/// Use [`Default::default()`] for sensible defaults, or construct with
/// field overrides for custom behaviour. Deserializes from partial TOML
/// tables; missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// A video is rare when its view count is strictly below this value.
    pub rare_view_threshold: u64,
    /// Duration of the first window of every session, in minutes.
    pub initial_window_minutes: f64,
    /// Contraction never shrinks a window below this duration, in minutes.
    pub min_window_minutes: f64,
    /// Expansions are clamped to this duration, in minutes. Reaching it and
    /// still needing to expand ends the session as not found.
    pub max_window_minutes: f64,
    /// Expansion factor used when a window is empty or sparse.
    pub aggressive_expansion_factor: f64,
    /// Expansion factor used when a window holds a moderate number of videos.
    pub moderate_expansion_factor: f64,
    /// Contraction factor used when a window is saturated.
    pub contraction_factor: f64,
    /// More candidates than this marks a window as busy.
    pub busy_threshold: usize,
    /// More candidates than this (up to `busy_threshold`) marks a window
    /// as moderately populated.
    pub moderate_threshold: usize,
    /// Pause after each intermediate status message so observers can render it.
    pub status_delay_ms: u64,
    /// Page size of a single search call (1..=50).
    pub max_results_per_search: usize,
    /// Maximum number of ids per detail call (1..=50).
    pub max_ids_per_batch: usize,
    /// The initial window center is drawn uniformly from the last
    /// `lookback_days` days.
    pub lookback_days: u32,
    /// Maximum number of steps before a session gives up.
    pub max_steps: u32,
    /// Consecutive transient failures of one call kind before the upstream
    /// is considered unavailable.
    pub circuit_failure_threshold: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        let lookback_days = 3650;
        Self {
            rare_view_threshold: 10,
            initial_window_minutes: 1.0,
            min_window_minutes: 1.0,
            max_window_minutes: f64::from(lookback_days) * MINUTES_PER_DAY,
            aggressive_expansion_factor: 1440.0,
            moderate_expansion_factor: 2.0,
            contraction_factor: 0.5,
            busy_threshold: 45,
            moderate_threshold: 10,
            status_delay_ms: 800,
            max_results_per_search: UPSTREAM_PAGE_LIMIT,
            max_ids_per_batch: UPSTREAM_PAGE_LIMIT,
            lookback_days,
            max_steps: 40,
            circuit_failure_threshold: 5,
        }
    }
}

impl SearchConfig {
    /// Validates this configuration, returning an error if any field is invalid.
    ///
    /// Checks:
    /// - window durations are finite and positive, and
    ///   `min <= initial <= max`
    /// - expansion factors are greater than 1, the contraction factor is in `(0, 1)`
    /// - `moderate_threshold <= busy_threshold`
    /// - page and batch sizes are within `1..=50`
    /// - `lookback_days` is in `1..=MAX_LOOKBACK_DAYS` and `max_window_minutes`
    ///   does not exceed that horizon
    /// - `max_steps` and `circuit_failure_threshold` are non-zero
    pub fn validate(&self) -> Result<(), SearchError> {
        let durations = [
            ("initial_window_minutes", self.initial_window_minutes),
            ("min_window_minutes", self.min_window_minutes),
            ("max_window_minutes", self.max_window_minutes),
        ];
        for (name, value) in durations {
            if !value.is_finite() || value <= 0.0 {
                return Err(SearchError::Config(format!(
                    "{name} must be a positive number of minutes"
                )));
            }
        }
        if self.initial_window_minutes < self.min_window_minutes {
            return Err(SearchError::Config(
                "initial_window_minutes must be >= min_window_minutes".into(),
            ));
        }
        if self.max_window_minutes < self.initial_window_minutes {
            return Err(SearchError::Config(
                "max_window_minutes must be >= initial_window_minutes".into(),
            ));
        }

        for (name, value) in [
            ("aggressive_expansion_factor", self.aggressive_expansion_factor),
            ("moderate_expansion_factor", self.moderate_expansion_factor),
        ] {
            if !value.is_finite() || value <= 1.0 {
                return Err(SearchError::Config(format!(
                    "{name} must be greater than 1"
                )));
            }
        }
        if !self.contraction_factor.is_finite()
            || self.contraction_factor <= 0.0
            || self.contraction_factor >= 1.0
        {
            return Err(SearchError::Config(
                "contraction_factor must be between 0 and 1 (exclusive)".into(),
            ));
        }

        if self.moderate_threshold > self.busy_threshold {
            return Err(SearchError::Config(
                "moderate_threshold must be <= busy_threshold".into(),
            ));
        }
        if self.max_results_per_search == 0 || self.max_results_per_search > UPSTREAM_PAGE_LIMIT {
            return Err(SearchError::Config(format!(
                "max_results_per_search must be between 1 and {UPSTREAM_PAGE_LIMIT}"
            )));
        }
        if self.max_ids_per_batch == 0 || self.max_ids_per_batch > UPSTREAM_PAGE_LIMIT {
            return Err(SearchError::Config(format!(
                "max_ids_per_batch must be between 1 and {UPSTREAM_PAGE_LIMIT}"
            )));
        }
        if self.lookback_days == 0 || self.lookback_days > MAX_LOOKBACK_DAYS {
            return Err(SearchError::Config(format!(
                "lookback_days must be between 1 and {MAX_LOOKBACK_DAYS}"
            )));
        }
        let horizon_minutes = f64::from(MAX_LOOKBACK_DAYS) * MINUTES_PER_DAY;
        if self.max_window_minutes > horizon_minutes {
            return Err(SearchError::Config(format!(
                "max_window_minutes must be <= {horizon_minutes} ({MAX_LOOKBACK_DAYS} days)"
            )));
        }
        if self.max_steps == 0 {
            return Err(SearchError::Config("max_steps must be greater than 0".into()));
        }
        if self.circuit_failure_threshold == 0 {
            return Err(SearchError::Config(
                "circuit_failure_threshold must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

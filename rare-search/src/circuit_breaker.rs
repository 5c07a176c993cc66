//! Per-call-kind circuit breaker for upstream health.
//!
//! Transient upstream failures are swallowed at the client boundary so the
//! orchestrator keeps expanding windows. When the same kind of call keeps
//! failing (for example because the quota is silently exhausted or the
//! network is gone), expanding further can never succeed. The breaker
//! counts consecutive failures per [`CallKind`] and opens once the
//! configured threshold is reached; the orchestrator then ends the session.
//!
//! # State Machine
//!
//! ```text
//! ┌────────┐  N consecutive failures  ┌────────┐
//! │ Closed ├─────────────────────────►│  Open  │
//! └───▲────┘                          └───┬────┘
//!     │            success / reset        │
//!     └───────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The two kinds of upstream call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallKind {
    /// Listing candidate ids inside a window.
    Search,
    /// Fetching details for a batch of ids.
    Details,
}

impl CallKind {
    /// Returns the human-readable name of this call kind.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Details => "details",
        }
    }
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Circuit state for a single call kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitState {
    /// Calls are succeeding, or failures are below the threshold.
    Closed,
    /// Too many consecutive failures.
    Open,
}

/// Consecutive-failure tracker keyed by [`CallKind`].
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    failures: HashMap<CallKind, u32>,
}

impl CircuitBreaker {
    /// Create a breaker that opens after `failure_threshold` consecutive failures.
    pub fn new(failure_threshold: u32) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            failures: HashMap::new(),
        }
    }

    /// Record a successful call; closes the circuit for `kind`.
    pub fn record_success(&mut self, kind: CallKind) {
        self.failures.insert(kind, 0);
    }

    /// Record a failed call for `kind`.
    pub fn record_failure(&mut self, kind: CallKind) {
        let count = self.failures.entry(kind).or_insert(0);
        *count = count.saturating_add(1);
    }

    /// Current state for `kind`.
    pub fn state(&self, kind: CallKind) -> CircuitState {
        if self.consecutive_failures(kind) >= self.failure_threshold {
            CircuitState::Open
        } else {
            CircuitState::Closed
        }
    }

    /// Consecutive failures recorded for `kind` since its last success.
    pub fn consecutive_failures(&self, kind: CallKind) -> u32 {
        self.failures.get(&kind).copied().unwrap_or(0)
    }

    /// The first call kind whose circuit is open, if any.
    pub fn tripped(&self) -> Option<CallKind> {
        [CallKind::Search, CallKind::Details]
            .into_iter()
            .find(|kind| self.state(*kind) == CircuitState::Open)
    }

    /// `(kind, state, consecutive_failures)` for both call kinds.
    pub fn health_report(&self) -> Vec<(CallKind, CircuitState, u32)> {
        [CallKind::Search, CallKind::Details]
            .into_iter()
            .map(|kind| (kind, self.state(kind), self.consecutive_failures(kind)))
            .collect()
    }

    /// Close every circuit.
    pub fn reset(&mut self) {
        self.failures.clear();
    }
}

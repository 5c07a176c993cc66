//! Session driver: the adaptive window search loop.
//!
//! A session starts from a random (or given) instant, scans the initial
//! window and then repeats one step per window until rare videos are found
//! or the session fails:
//!
//! ```text
//! Idle ──start──► Stepping ──rare found──► Succeeded
//!                  │   ▲
//!                  │   └── no rare video: resize window, pause, step + 1
//!                  └──────── error / ceiling ──────────► Failed
//! ```
//!
//! Steps run strictly one after another. Every session gets a generation
//! number and a cancellation token; starting a new session cancels the
//! previous token, and every state update is dropped unless it comes from
//! the newest generation, so a stale step can never overwrite a newer
//! session's state.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use rand::Rng;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::backend::VideoApi;
use crate::cache::ResultCache;
use crate::client::UpstreamClient;
use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::rarity::select_rare;
use crate::stats::ApiUsageStats;
use crate::types::VideoDetail;
use crate::window::{describe_minutes, TimeWindow};

use super::decision::{next_window, resize_message, Density};
use super::state::{SessionFailure, SessionPhase, SessionState};

/// Identifies one session: its generation and its cancellation token.
#[derive(Debug, Clone)]
struct Ticket {
    generation: u64,
    token: CancellationToken,
}

/// Internal state machine position.
enum Transition {
    Stepping { window: TimeWindow, step: u32 },
    Succeeded(Vec<VideoDetail>),
    Failed(SearchError),
}

struct Shared<A> {
    client: UpstreamClient<A>,
    config: SearchConfig,
    state: watch::Sender<SessionState>,
    generation: AtomicU64,
    cancel: Mutex<CancellationToken>,
}

/// Rare-video finder: owns the upstream client and drives search sessions.
///
/// Cheap to clone; clones share the client, cache, state channel and
/// session bookkeeping. At most one session is current at a time.
pub struct RareFinder<A> {
    shared: Arc<Shared<A>>,
}

impl<A> Clone for RareFinder<A> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<A: VideoApi> std::fmt::Debug for RareFinder<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RareFinder")
            .field("client", &self.shared.client)
            .field("generation", &self.shared.generation.load(Ordering::SeqCst))
            .finish()
    }
}

impl<A: VideoApi + 'static> RareFinder<A> {
    /// Create a finder with a private cache.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] if `config` is invalid.
    pub fn new(api: A, config: SearchConfig) -> Result<Self, SearchError> {
        Self::with_cache(api, ResultCache::new(), config)
    }

    /// Create a finder sharing `cache` with other finders.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] if `config` is invalid.
    pub fn with_cache(api: A, cache: ResultCache, config: SearchConfig) -> Result<Self, SearchError> {
        config.validate()?;
        let client = UpstreamClient::with_cache(api, cache, &config);
        let (state, _) = watch::channel(SessionState::default());
        Ok(Self {
            shared: Arc::new(Shared {
                client,
                config,
                state,
                generation: AtomicU64::new(0),
                cancel: Mutex::new(CancellationToken::new()),
            }),
        })
    }

    /// The configuration sessions run with.
    pub fn config(&self) -> &SearchConfig {
        &self.shared.config
    }

    /// The upstream client (cache, counters, circuit state).
    pub fn client(&self) -> &UpstreamClient<A> {
        &self.shared.client
    }

    /// Subscribe to session state updates.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }

    /// Snapshot of the current session state.
    pub fn state(&self) -> SessionState {
        self.shared.state.borrow().clone()
    }

    /// Usage counters of the current session.
    pub fn stats(&self) -> ApiUsageStats {
        self.shared.client.stats()
    }

    /// Start a session from a random instant in the lookback horizon, on a
    /// spawned task.
    ///
    /// Any running session is superseded. Must be called inside a tokio runtime.
    pub fn start_search(&self) -> JoinHandle<Result<Vec<VideoDetail>, SearchError>> {
        self.start_search_at(random_center(self.shared.config.lookback_days))
    }

    /// Start a session centered on `center`, on a spawned task.
    pub fn start_search_at(
        &self,
        center: DateTime<Utc>,
    ) -> JoinHandle<Result<Vec<VideoDetail>, SearchError>> {
        let ticket = self.begin(center);
        let this = self.clone();
        tokio::spawn(async move { this.run(ticket, center).await })
    }

    /// Run a session from a random instant to completion.
    ///
    /// # Errors
    ///
    /// Returns the error that ended the session, or
    /// [`SearchError::Superseded`] if a newer session replaced it.
    pub async fn search(&self) -> Result<Vec<VideoDetail>, SearchError> {
        self.search_at(random_center(self.shared.config.lookback_days))
            .await
    }

    /// Run a session centered on `center` to completion.
    ///
    /// # Errors
    ///
    /// Same as [`RareFinder::search`].
    pub async fn search_at(&self, center: DateTime<Utc>) -> Result<Vec<VideoDetail>, SearchError> {
        let ticket = self.begin(center);
        self.run(ticket, center).await
    }

    /// Abort the current session and return to `Idle`.
    pub fn cancel(&self) {
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.replace_token().cancel();
        self.shared.state.send_modify(|state| {
            state.generation = generation;
            state.phase = SessionPhase::Idle;
            state.is_loading = false;
            state.status_message = None;
        });
        tracing::info!(generation, "search session cancelled");
    }

    /// Register a new session: bump the generation, cancel the previous
    /// token, reset counters and publish the initial state.
    fn begin(&self, center: DateTime<Utc>) -> Ticket {
        let token = CancellationToken::new();
        self.replace_token_with(token.clone()).cancel();
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.client.reset_session();

        let window = TimeWindow::initial(center, &self.shared.config);
        tracing::info!(generation, %center, window = %window, "search session started");
        self.shared.state.send_modify(|state| {
            *state = SessionState {
                generation,
                phase: SessionPhase::Stepping,
                is_loading: true,
                current_window: Some(window),
                step: 1,
                ..SessionState::default()
            };
        });
        Ticket { generation, token }
    }

    fn replace_token(&self) -> CancellationToken {
        self.replace_token_with(CancellationToken::new())
    }

    fn replace_token_with(&self, token: CancellationToken) -> CancellationToken {
        let mut current = self
            .shared
            .cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *current, token)
    }

    fn is_current(&self, ticket: &Ticket) -> bool {
        self.shared.generation.load(Ordering::SeqCst) == ticket.generation
            && !ticket.token.is_cancelled()
    }

    /// Apply `update` to the state if `ticket` is still the newest session.
    /// Counters are refreshed on every accepted update.
    fn publish(&self, ticket: &Ticket, update: impl FnOnce(&mut SessionState)) -> bool {
        let stats = self.shared.client.stats();
        let generation = &self.shared.generation;
        self.shared.state.send_if_modified(|state| {
            if generation.load(Ordering::SeqCst) != ticket.generation {
                return false;
            }
            update(state);
            state.api_stats = stats;
            true
        })
    }

    /// Await `fut` unless the session is cancelled first.
    async fn cancellable<T>(
        &self,
        ticket: &Ticket,
        fut: impl Future<Output = Result<T, SearchError>>,
    ) -> Result<T, SearchError> {
        tokio::select! {
            biased;
            _ = ticket.token.cancelled() => Err(SearchError::Superseded),
            outcome = fut => outcome,
        }
    }

    async fn run(&self, ticket: Ticket, center: DateTime<Utc>) -> Result<Vec<VideoDetail>, SearchError> {
        let mut transition = Transition::Stepping {
            window: TimeWindow::initial(center, &self.shared.config),
            step: 1,
        };

        loop {
            if !self.is_current(&ticket) {
                tracing::debug!(generation = ticket.generation, "stale session stopped");
                return Err(SearchError::Superseded);
            }

            transition = match transition {
                Transition::Stepping { window, step } => self
                    .step(&ticket, window, step)
                    .await
                    .unwrap_or_else(Transition::Failed),
                Transition::Succeeded(results) => {
                    self.finish_success(&ticket, &results);
                    return Ok(results);
                }
                Transition::Failed(err) => {
                    self.finish_failure(&ticket, &err);
                    return Err(err);
                }
            };
        }
    }

    /// One scan of `window`. Returns the next transition.
    async fn step(
        &self,
        ticket: &Ticket,
        window: TimeWindow,
        step: u32,
    ) -> Result<Transition, SearchError> {
        let config = &self.shared.config;
        let client = &self.shared.client;

        if step > config.max_steps {
            return Err(SearchError::NotFound(format!(
                "no video under {} views after {} steps",
                config.rare_view_threshold, config.max_steps
            )));
        }
        if let Some(kind) = client.tripped() {
            return Err(SearchError::UpstreamUnavailable(format!(
                "{kind} calls failed {} times in a row",
                client.consecutive_failures(kind)
            )));
        }

        let scanning = format!(
            "Step {step}: scanning {} around {}",
            describe_minutes(window.duration_minutes),
            window.center().format("%Y-%m-%d %H:%M UTC")
        );
        self.publish(ticket, |state| {
            state.current_window = Some(window.clone());
            state.step = step;
            state.status_message = Some(scanning);
        });

        let ids = self
            .cancellable(ticket, client.list_candidates(&window))
            .await?;

        let density = if ids.is_empty() {
            Density::Empty
        } else {
            let details = self.cancellable(ticket, client.fetch_details(&ids)).await?;
            let rare = select_rare(&details, config.rare_view_threshold);
            tracing::debug!(
                step,
                candidates = ids.len(),
                details = details.len(),
                rare = rare.len(),
                "window scanned"
            );
            if !rare.is_empty() {
                return Ok(Transition::Succeeded(rare));
            }
            Density::classify(ids.len(), config)
        };

        let mut next = next_window(&window, density, config);
        if density.expands() {
            if window.duration_minutes >= config.max_window_minutes {
                return Err(SearchError::NotFound(format!(
                    "window reached the {} ceiling without a video under {} views",
                    describe_minutes(config.max_window_minutes),
                    config.rare_view_threshold
                )));
            }
            next = next.clamp_to(config.max_window_minutes);
        } else if next.duration_minutes >= window.duration_minutes {
            return Err(SearchError::NotFound(format!(
                "window at the {} floor is still busy without a video under {} views",
                describe_minutes(config.min_window_minutes),
                config.rare_view_threshold
            )));
        }

        let message = resize_message(density, ids.len(), &window, &next);
        tracing::debug!(step, ?density, next = %next, "resizing window");
        self.publish(ticket, |state| state.status_message = Some(message));

        if config.status_delay_ms > 0 {
            let delay = Duration::from_millis(config.status_delay_ms);
            self.cancellable(ticket, async {
                tokio::time::sleep(delay).await;
                Ok(())
            })
            .await?;
        }

        Ok(Transition::Stepping {
            window: next,
            step: step + 1,
        })
    }

    fn finish_success(&self, ticket: &Ticket, results: &[VideoDetail]) {
        let stats = self.shared.client.stats();
        tracing::info!(
            generation = ticket.generation,
            found = results.len(),
            calls = stats.total_calls,
            cache_hits = stats.total_cache_hits,
            "rare videos found"
        );
        self.publish(ticket, |state| {
            state.phase = SessionPhase::Succeeded;
            state.is_loading = false;
            state.results = results.to_vec();
            state.status_message = None;
            state.error = None;
        });
    }

    fn finish_failure(&self, ticket: &Ticket, err: &SearchError) {
        if matches!(err, SearchError::Superseded) {
            tracing::debug!(generation = ticket.generation, "session superseded");
            return;
        }
        tracing::warn!(generation = ticket.generation, error = %err, "search session failed");
        let failure = SessionFailure::from_error(err);
        self.publish(ticket, |state| {
            state.phase = SessionPhase::Failed;
            state.is_loading = false;
            state.status_message = None;
            state.error = Some(failure);
        });
    }
}

/// Uniformly random instant within the last `lookback_days` days.
///
/// Saturates at the earliest representable instant instead of overflowing.
pub fn random_center(lookback_days: u32) -> DateTime<Utc> {
    let horizon_secs = i64::from(lookback_days) * 24 * 60 * 60;
    let offset = rand::thread_rng().gen_range(0..=horizon_secs);
    TimeDelta::try_seconds(offset)
        .and_then(|delta| Utc::now().checked_sub_signed(delta))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

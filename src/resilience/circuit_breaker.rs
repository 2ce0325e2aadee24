//! Circuit breaker for resource protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: resource assumed down, requests fail fast
//! - Half-Open: testing if resource recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures > threshold
//! Open → Half-Open: after open timeout
//! Half-Open → Closed: max_requests trial requests succeed
//! Half-Open → Open: any trial request fails
//! ```
//!
//! # Design Decisions
//! - Per-resource circuit breaker (not global), one mutex each
//! - Fail fast in Open state (no waiting for timeout)
//! - Every transition starts a new generation; late results from an
//!   older generation are ignored
//! - Trials that end fatally or are dropped give their slot back

use std::fmt;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::error::ClientError;
use crate::observability::metrics;
use crate::resilience::outcome::Outcome;

/// Breaker phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    HalfOpen,
    Open,
}

impl CircuitState {
    /// Numeric value exported as a gauge.
    pub fn as_gauge(self) -> f64 {
        match self {
            Self::Closed => 0.0,
            Self::HalfOpen => 1.0,
            Self::Open => 2.0,
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::HalfOpen => write!(f, "half_open"),
            Self::Open => write!(f, "open"),
        }
    }
}

/// Immutable breaker parameters shared by every resource of a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerPolicy {
    /// Trial requests admitted while half-open (0 behaves as 1).
    pub max_requests: u32,
    /// The breaker trips once consecutive failures exceed this value.
    pub consecutive_failure_threshold: u32,
    /// Closed-state failures older than this are forgotten. Zero disables decay.
    pub open_interval: Duration,
    /// Time spent open before trial requests are admitted.
    pub open_timeout: Duration,
}

impl CircuitBreakerPolicy {
    fn trial_quota(&self) -> u32 {
        self.max_requests.max(1)
    }
}

impl Default for CircuitBreakerPolicy {
    fn default() -> Self {
        Self {
            max_requests: 1,
            consecutive_failure_threshold: 5,
            open_interval: Duration::ZERO,
            open_timeout: Duration::from_secs(60),
        }
    }
}

/// Snapshot of a breaker's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BreakerCounts {
    pub consecutive_failures: u32,
    pub half_open_admitted: u32,
    pub half_open_succeeded: u32,
    pub half_open_failed: u32,
}

#[derive(Debug, Clone, Copy)]
enum Settlement {
    Success,
    Failure,
    Release,
}

#[derive(Debug)]
struct BreakerState {
    phase: CircuitState,
    generation: u64,
    counts: BreakerCounts,
    last_failure_at: Option<Instant>,
    opened_at: Option<Instant>,
}

/// Admission control and failure accounting for one resource.
#[derive(Debug)]
pub struct CircuitBreaker {
    resource: String,
    policy: CircuitBreakerPolicy,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Create a closed breaker for `resource`.
    pub fn new(resource: impl Into<String>, policy: CircuitBreakerPolicy) -> Self {
        Self {
            resource: resource.into(),
            policy,
            state: Mutex::new(BreakerState {
                phase: CircuitState::Closed,
                generation: 0,
                counts: BreakerCounts::default(),
                last_failure_at: None,
                opened_at: None,
            }),
        }
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn policy(&self) -> &CircuitBreakerPolicy {
        &self.policy
    }

    /// Current phase, after applying any time-based transition.
    pub fn state(&self) -> CircuitState {
        let mut state = self.lock();
        self.refresh(&mut state, Instant::now());
        state.phase
    }

    /// Current counters, after applying any time-based transition.
    pub fn counts(&self) -> BreakerCounts {
        let mut state = self.lock();
        self.refresh(&mut state, Instant::now());
        state.counts
    }

    /// Check admission. The returned permit must be settled with the call's outcome;
    /// dropping it unsettled releases the slot.
    pub fn try_acquire(&self) -> Result<BreakerPermit<'_>, ClientError> {
        let mut state = self.lock();
        self.refresh(&mut state, Instant::now());

        let rejection = match state.phase {
            CircuitState::Closed => None,
            CircuitState::Open => Some(ClientError::CircuitOpen {
                resource: self.resource.clone(),
            }),
            CircuitState::HalfOpen => {
                if state.counts.half_open_admitted >= self.policy.trial_quota() {
                    Some(ClientError::TooManyRequests {
                        resource: self.resource.clone(),
                    })
                } else {
                    state.counts.half_open_admitted += 1;
                    None
                }
            }
        };
        let generation = state.generation;
        drop(state);

        match rejection {
            None => Ok(BreakerPermit {
                breaker: self,
                generation,
                settled: false,
            }),
            Some(err) => {
                tracing::debug!(resource = %self.resource, reason = err.kind(), "Circuit breaker rejected request");
                metrics::record_breaker_rejection(&self.resource, err.kind());
                Err(err)
            }
        }
    }

    /// Admit, run `do_call` exactly once, record its outcome and return it.
    /// A rejected call yields a fatal outcome without invoking `do_call`.
    pub async fn attempt<F, Fut>(&self, do_call: F) -> Outcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Outcome>,
    {
        let permit = match self.try_acquire() {
            Ok(permit) => permit,
            Err(err) => return Outcome::Fatal(err),
        };
        let outcome = do_call().await;
        permit.record(&outcome);
        outcome
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn settle(&self, generation: u64, settlement: Settlement) {
        let mut state = self.lock();
        let now = Instant::now();
        self.refresh(&mut state, now);

        if state.generation != generation {
            return;
        }

        match (state.phase, settlement) {
            (CircuitState::HalfOpen, Settlement::Release) => {
                state.counts.half_open_admitted = state.counts.half_open_admitted.saturating_sub(1);
            }
            (_, Settlement::Release) => {}
            (CircuitState::Closed, Settlement::Success) => {
                state.counts.consecutive_failures = 0;
            }
            (CircuitState::Closed, Settlement::Failure) => {
                state.counts.consecutive_failures += 1;
                state.last_failure_at = Some(now);
                if state.counts.consecutive_failures > self.policy.consecutive_failure_threshold {
                    self.transition(&mut state, CircuitState::Open, now);
                }
            }
            (CircuitState::HalfOpen, Settlement::Success) => {
                state.counts.half_open_succeeded += 1;
                if state.counts.half_open_succeeded >= self.policy.trial_quota() {
                    self.transition(&mut state, CircuitState::Closed, now);
                }
            }
            (CircuitState::HalfOpen, Settlement::Failure) => {
                state.counts.half_open_failed += 1;
                self.transition(&mut state, CircuitState::Open, now);
            }
            (CircuitState::Open, _) => {}
        }
    }

    /// Apply transitions that depend only on the passage of time.
    fn refresh(&self, state: &mut BreakerState, now: Instant) {
        match state.phase {
            CircuitState::Closed => {
                let interval = self.policy.open_interval;
                if !interval.is_zero()
                    && state.counts.consecutive_failures > 0
                    && state
                        .last_failure_at
                        .is_some_and(|at| now.saturating_duration_since(at) >= interval)
                {
                    state.counts.consecutive_failures = 0;
                    state.last_failure_at = None;
                }
            }
            CircuitState::Open => {
                if state
                    .opened_at
                    .is_some_and(|at| now.saturating_duration_since(at) >= self.policy.open_timeout)
                {
                    self.transition(state, CircuitState::HalfOpen, now);
                }
            }
            CircuitState::HalfOpen => {}
        }
    }

    fn transition(&self, state: &mut BreakerState, to: CircuitState, now: Instant) {
        let from = state.phase;
        state.phase = to;
        state.generation += 1;
        state.counts = BreakerCounts::default();
        state.last_failure_at = None;
        state.opened_at = (to == CircuitState::Open).then_some(now);

        tracing::warn!(resource = %self.resource, from = %from, to = %to, "Circuit breaker state change");
        metrics::record_breaker_transition(&self.resource, to);
    }
}

/// Admission granted by [`CircuitBreaker::try_acquire`].
#[must_use = "a permit must be settled with the call outcome"]
#[derive(Debug)]
pub struct BreakerPermit<'a> {
    breaker: &'a CircuitBreaker,
    generation: u64,
    settled: bool,
}

impl BreakerPermit<'_> {
    /// Record the classified outcome of the admitted call.
    pub fn record(mut self, outcome: &Outcome) {
        let settlement = match outcome {
            Outcome::Success(_) => Settlement::Success,
            Outcome::Failure(_) => Settlement::Failure,
            Outcome::Fatal(_) => Settlement::Release,
        };
        self.settled = true;
        self.breaker.settle(self.generation, settlement);
    }
}

impl Drop for BreakerPermit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.settle(self.generation, Settlement::Release);
        }
    }
}

//! Retry logic.
//!
//! # Responsibilities
//! - Re-run failed attempts with linear backoff + jitter
//! - Stop on success, fatal outcome, exhausted budget or overall deadline
//! - Abort the backoff sleep when the caller cancels
//!
//! # Design Decisions
//! - Only `Outcome::Failure` is retried; fatal outcomes end the loop
//! - No sleep after the final permitted attempt
//! - A single-attempt policy returns the raw failure, not `RetriesExhausted`

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::ClientError;
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;
use crate::resilience::outcome::Outcome;
use crate::resilience::timeouts::CallContext;

/// Immutable retry parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retry: u32,
    backoff_unit: Duration,
    max_elapsed: Option<Duration>,
}

impl RetryPolicy {
    /// Retry up to `max_retry` times after the first attempt.
    pub fn new(max_retry: u32, backoff_unit: Duration) -> Self {
        Self {
            max_retry,
            backoff_unit,
            max_elapsed: None,
        }
    }

    /// A single attempt, no retries.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Give up once this much time has passed since the first attempt.
    pub fn with_max_elapsed(mut self, max_elapsed: Duration) -> Self {
        self.max_elapsed = Some(max_elapsed);
        self
    }

    pub fn max_retry(&self) -> u32 {
        self.max_retry
    }

    pub fn backoff_unit(&self) -> Duration {
        self.backoff_unit
    }

    pub fn max_elapsed(&self) -> Option<Duration> {
        self.max_elapsed
    }

    /// Delay between attempt `attempt` and the next one.
    pub fn backoff(&self, attempt: u32) -> Duration {
        calculate_backoff(attempt, self.backoff_unit)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// Invoke `next` until it succeeds, fails fatally, or the policy gives up.
pub async fn send_with_retry<F, Fut>(
    policy: &RetryPolicy,
    ctx: &CallContext,
    resource: &str,
    mut next: F,
) -> Outcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Outcome>,
{
    let started = Instant::now();
    let mut attempt: u32 = 0;

    loop {
        if attempt > 0 {
            if let Some(max_elapsed) = policy.max_elapsed {
                if started.elapsed() > max_elapsed {
                    tracing::warn!(resource = %resource, attempts = attempt, elapsed = ?started.elapsed(), "Retry time budget exhausted");
                    return Outcome::Fatal(ClientError::DeadlineExceeded);
                }
            }
        }

        let err = match next().await {
            Outcome::Failure(err) => err,
            terminal => return terminal,
        };

        if attempt >= policy.max_retry {
            if policy.max_retry == 0 {
                return Outcome::Failure(err);
            }
            tracing::warn!(resource = %resource, attempts = attempt + 1, error = %err, "Retries exhausted");
            return Outcome::Failure(ClientError::RetriesExhausted {
                attempts: attempt + 1,
                last: Box::new(err),
            });
        }

        let delay = policy.backoff(attempt);
        tracing::info!(resource = %resource, attempt = attempt, delay = ?delay, error = %err, "Retrying request");
        metrics::record_retry(resource);

        if let Err(abort) = ctx.sleep(delay).await {
            return Outcome::Fatal(abort.into());
        }
        attempt += 1;
    }
}

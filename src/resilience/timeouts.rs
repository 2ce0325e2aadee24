//! Caller deadlines and cancellation.
//!
//! # Responsibilities
//! - Carry the caller's deadline and cancellation token through a call
//! - Race transport futures and retry sleeps against both
//! - Report aborts as `TransportError::Cancelled` / `DeadlineExceeded`
//!
//! # Design Decisions
//! - Uses Tokio's clock so paused-time tests drive deadlines
//! - Cancellation wins over an already-passed deadline when both hold

use std::future::Future;
use std::time::Duration;

use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::transport::TransportError;

/// Per-call deadline and cancellation signal.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    deadline: Option<Instant>,
    cancel: Option<CancellationToken>,
}

impl CallContext {
    /// A context with neither deadline nor cancellation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Abort the call at `deadline`.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Abort the call `timeout` from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Abort the call when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the abort reason if the call may not proceed.
    pub fn check(&self) -> Result<(), TransportError> {
        if self.cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
            return Err(TransportError::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(TransportError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Run `fut` unless the caller aborts first.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, TransportError>
    where
        F: Future<Output = Result<T, TransportError>>,
    {
        self.check()?;
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(TransportError::Cancelled),
            _ = self.expired() => Err(TransportError::DeadlineExceeded),
            result = fut => result,
        }
    }

    /// Sleep for `delay`, waking early with an error if the caller aborts.
    pub async fn sleep(&self, delay: Duration) -> Result<(), TransportError> {
        self.run(async {
            time::sleep(delay).await;
            Ok(())
        })
        .await
    }

    async fn cancelled(&self) {
        match &self.cancel {
            Some(token) => token.cancelled().await,
            None => std::future::pending().await,
        }
    }

    async fn expired(&self) {
        match self.deadline {
            Some(deadline) => time::sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    }
}

//! Errors surfaced to callers of the resilient client.

use axum::http::StatusCode;
use thiserror::Error;

use crate::transport::TransportError;

/// Error returned by a pipeline call.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The caller cancelled the request.
    #[error("request cancelled")]
    Cancelled,

    /// The caller's deadline, or the retry time budget, ran out.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// The resource's circuit breaker is open; the request was not sent.
    #[error("circuit breaker is open for resource {resource}")]
    CircuitOpen { resource: String },

    /// The breaker is half-open and its trial quota is used up.
    #[error("too many trial requests while circuit is half-open for resource {resource}")]
    TooManyRequests { resource: String },

    /// The server answered with a 5xx status.
    #[error("server responded with status {status}")]
    ServerStatus { status: StatusCode },

    /// Network-level failure.
    #[error(transparent)]
    Transport(TransportError),

    /// Every permitted attempt failed.
    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<ClientError>,
    },
}

impl ClientError {
    /// Fatal errors are never retried and never counted by a breaker.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Cancelled
                | Self::DeadlineExceeded
                | Self::CircuitOpen { .. }
                | Self::TooManyRequests { .. }
        )
    }

    /// True when the request was rejected by a circuit breaker.
    pub fn is_circuit_broken(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. } | Self::TooManyRequests { .. })
    }

    /// True when the (last) failure was a 5xx response.
    pub fn is_server_status(&self) -> bool {
        self.status().is_some()
    }

    /// The 5xx status behind this error, looking through exhausted retries.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::ServerStatus { status } => Some(*status),
            Self::RetriesExhausted { last, .. } => last.status(),
            _ => None,
        }
    }

    /// The error of the final attempt, unwrapping exhausted retries.
    pub fn last_attempt(&self) -> &ClientError {
        match self {
            Self::RetriesExhausted { last, .. } => last.last_attempt(),
            other => other,
        }
    }

    /// Short label used for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Cancelled => "cancelled",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::CircuitOpen { .. } => "circuit_open",
            Self::TooManyRequests { .. } => "too_many_requests",
            Self::ServerStatus { .. } => "server_status",
            Self::Transport(_) => "transport",
            Self::RetriesExhausted { .. } => "retries_exhausted",
        }
    }
}

impl From<TransportError> for ClientError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Cancelled => Self::Cancelled,
            TransportError::DeadlineExceeded => Self::DeadlineExceeded,
            other => Self::Transport(other),
        }
    }
}

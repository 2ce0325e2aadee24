//! Outcome classification.
//!
//! # Responsibilities
//! - Map a transport result to exactly one [`Outcome`]
//! - Drain 5xx bodies so the connection returns to the pool before a retry
//!
//! # Design Decisions
//! - Only connection errors and 5xx count as failures
//! - 4xx are NOT failures (client error, not backend)
//! - Caller aborts and breaker rejections are fatal everywhere

use axum::body::Body;
use axum::http::Response;
use futures_util::StreamExt;

use crate::error::ClientError;
use crate::transport::TransportError;

/// Classified result of one attempt.
#[derive(Debug)]
pub enum Outcome {
    /// A response below 500, delivered to the caller untouched.
    Success(Response<Body>),
    /// Retriable and counted against the resource's breaker.
    Failure(ClientError),
    /// Propagates immediately; neither retried nor counted.
    Fatal(ClientError),
}

impl Outcome {
    /// Classify an error that did not come from a single transport exchange.
    pub fn from_error(err: ClientError) -> Self {
        if err.is_fatal() {
            Self::Fatal(err)
        } else {
            Self::Failure(err)
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    pub fn counts_against_breaker(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// Label used for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::Failure(_) => "failure",
            Self::Fatal(_) => "fatal",
        }
    }

    pub fn into_result(self) -> Result<Response<Body>, ClientError> {
        match self {
            Self::Success(response) => Ok(response),
            Self::Failure(err) | Self::Fatal(err) => Err(err),
        }
    }
}

/// Classify the result of one transport exchange.
pub async fn classify(result: Result<Response<Body>, TransportError>) -> Outcome {
    match result {
        Ok(response) if response.status().is_server_error() => {
            let status = response.status();
            drain(response).await;
            Outcome::Failure(ClientError::ServerStatus { status })
        }
        Ok(response) => Outcome::Success(response),
        Err(err) => Outcome::from_error(ClientError::from(err)),
    }
}

/// Read and discard the body, releasing the connection.
/// Frames are discarded as they arrive; nothing is buffered and there is no size cap.
async fn drain(response: Response<Body>) {
    let mut frames = response.into_body().into_data_stream();
    while let Some(frame) = frames.next().await {
        if let Err(e) = frame {
            tracing::debug!(error = %e, "Failed to drain response body; connection will not be reused");
            return;
        }
    }
}

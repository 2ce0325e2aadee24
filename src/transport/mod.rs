//! Transport subsystem.
//!
//! # Data Flow
//! ```text
//! Pipeline terminal stage
//!     → Transport::send (one literal request/response exchange)
//!     → Ok(Response<Body>) or Err(TransportError)
//!     → resilience::outcome::classify
//! ```
//!
//! # Design Decisions
//! - Requests carry buffered `Bytes` bodies so every attempt can be replayed
//! - The transport never retries and never consults breaker state
//! - Cancellation and caller deadlines are distinct error classes
//! - Per-attempt timeouts are ordinary (retriable) transport failures

pub mod client;

#[cfg(test)]
pub(crate) mod mock;

use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{Request, Response};
use futures_util::future::BoxFuture;
use thiserror::Error;

pub use client::HyperTransport;

/// Boxed error used for opaque lower-level failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors reported by a [`Transport`].
#[derive(Debug, Error)]
pub enum TransportError {
    /// The caller cancelled the request.
    #[error("request cancelled by caller")]
    Cancelled,

    /// The caller's deadline passed before the exchange completed.
    #[error("caller deadline exceeded")]
    DeadlineExceeded,

    /// A single attempt exceeded the transport's own request timeout.
    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),

    /// The connection could not be established.
    #[error("connection failed: {0}")]
    Connect(#[source] BoxError),

    /// Any other I/O or protocol failure.
    #[error("transport failure: {0}")]
    Other(#[source] BoxError),
}

impl TransportError {
    /// True for failures caused by the caller rather than the remote side.
    pub fn is_caller_abort(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }
}

/// Capability that performs exactly one HTTP exchange.
pub trait Transport: Send + Sync + 'static {
    /// Send `request` once and return the raw response.
    fn send<'a>(
        &'a self,
        request: &'a Request<Bytes>,
    ) -> BoxFuture<'a, Result<Response<Body>, TransportError>>;
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn send<'a>(
        &'a self,
        request: &'a Request<Bytes>,
    ) -> BoxFuture<'a, Result<Response<Body>, TransportError>> {
        (**self).send(request)
    }
}

/// Rebuild a sendable request from a buffered one.
pub(crate) fn to_body_request(request: &Request<Bytes>) -> Request<Body> {
    let mut req = Request::new(Body::from(request.body().clone()));
    *req.method_mut() = request.method().clone();
    *req.uri_mut() = request.uri().clone();
    *req.version_mut() = request.version();
    *req.headers_mut() = request.headers().clone();
    req
}

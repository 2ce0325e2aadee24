//! Resilient HTTP client library.
//!
//! Wraps an HTTP transport with per-resource circuit breaking, retries with
//! linear backoff and jitter, and classification of responses into success,
//! retriable failure and fatal outcomes.

pub mod config;
pub mod error;
pub mod observability;
pub mod pipeline;
pub mod resilience;
pub mod transport;

pub use config::ClientConfig;
pub use error::ClientError;
pub use pipeline::{ClientBuilder, ResilientClient};
pub use resilience::{BreakerRegistry, CallContext, CircuitBreakerPolicy, CircuitState, Outcome, RetryPolicy};
pub use transport::{HyperTransport, Transport, TransportError};

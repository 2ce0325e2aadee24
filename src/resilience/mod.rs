//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to resource:
//!     → retries.rs (re-run failures with backoff, bounded by max_elapsed)
//!     → registry.rs (look up the resource's breaker)
//!     → circuit_breaker.rs (admit or fail fast, record the outcome)
//!     → transport (one exchange, bounded by timeouts.rs)
//!     → outcome.rs (Success / Failure / Fatal)
//! ```
//!
//! # Design Decisions
//! - Caller deadlines and cancellation are fatal at every layer
//! - Breaker rejections are fatal so retries never loop against an open circuit
//! - 4xx responses are results, not failures
//! - Each policy is usable on its own; the pipeline composes them

pub mod backoff;
pub mod circuit_breaker;
pub mod outcome;
pub mod registry;
pub mod retries;
pub mod timeouts;

pub use circuit_breaker::{BreakerCounts, BreakerPermit, CircuitBreaker, CircuitBreakerPolicy, CircuitState};
pub use outcome::{classify, Outcome};
pub use registry::BreakerRegistry;
pub use retries::{send_with_retry, RetryPolicy};
pub use timeouts::CallContext;

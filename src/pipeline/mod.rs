//! Request pipeline.
//!
//! # Data Flow
//! ```text
//! ResilientClient::call
//!     → stage.rs: RetryStage (optional, outermost)
//!     → stage.rs: CircuitBreakerStage (optional)
//!     → transport (one exchange)
//!     → classify → Outcome flows back up
//! ```
//!
//! # Design Decisions
//! - Retry wraps the breaker so every attempt is admitted and recorded separately
//! - A pipeline with neither policy is a single classified exchange
//! - `service.rs` exposes the client as a `tower::Service`

pub mod client;
pub mod service;
pub mod stage;

pub use client::{default_resource_name, ClientBuilder, ResilientClient, ResourceNamer};
pub use stage::{Call, CircuitBreakerStage, Next, RetryStage, Stage};

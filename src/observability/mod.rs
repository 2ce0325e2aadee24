//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! pipeline, retry loop, breakers produce:
//!     → logging.rs (structured log events inside the `http_call` span)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout via tracing-subscriber
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Recording functions are no-ops until an exporter is installed
//! - Call ID flows through every log line of a call via the span

pub mod logging;
pub mod metrics;

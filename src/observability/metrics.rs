//! Metrics collection and exposition.
//!
//! # Metrics
//! - `http_client_calls_total` (counter): logical calls by resource, outcome
//! - `http_client_call_duration_seconds` (histogram): end-to-end call latency
//! - `http_client_attempts_total` (counter): transport attempts by resource, outcome
//! - `http_client_retries_total` (counter): scheduled retries by resource
//! - `http_client_circuit_rejections_total` (counter): fail-fast rejections by resource, reason
//! - `http_client_circuit_transitions_total` (counter): breaker transitions by resource, target state
//! - `http_client_circuit_state` (gauge): 0 closed, 1 half-open, 2 open

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use thiserror::Error;

use crate::resilience::CircuitState;

/// Latency buckets from 1ms to 30s.
const LATENCY_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("metrics configuration error: {0}")]
    Configuration(String),
    #[error("metrics installation error: {0}")]
    Installation(String),
}

/// Install the Prometheus exporter with an HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), MetricsError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets(LATENCY_BUCKETS)
        .map_err(|e| MetricsError::Configuration(e.to_string()))?
        .install()
        .map_err(|e| MetricsError::Installation(e.to_string()))?;

    tracing::info!(addr = %addr, "Prometheus metrics exporter started");
    Ok(())
}

/// Record one finished logical call.
pub fn record_call(resource: &str, outcome: &str, elapsed: Duration) {
    counter!(
        "http_client_calls_total",
        "resource" => resource.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!("http_client_call_duration_seconds", "resource" => resource.to_string())
        .record(elapsed.as_secs_f64());
}

/// Record one transport attempt.
pub fn record_attempt(resource: &str, outcome: &str) {
    counter!(
        "http_client_attempts_total",
        "resource" => resource.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

pub fn record_retry(resource: &str) {
    counter!("http_client_retries_total", "resource" => resource.to_string()).increment(1);
}

/// Record a fail-fast rejection (`reason` is "circuit_open" or "too_many_requests").
pub fn record_breaker_rejection(resource: &str, reason: &str) {
    counter!(
        "http_client_circuit_rejections_total",
        "resource" => resource.to_string(),
        "reason" => reason.to_string()
    )
    .increment(1);
}

/// Record a breaker transition and publish the new state.
pub fn record_breaker_transition(resource: &str, to: CircuitState) {
    counter!(
        "http_client_circuit_transitions_total",
        "resource" => resource.to_string(),
        "state" => to.to_string()
    )
    .increment(1);

    gauge!("http_client_circuit_state", "resource" => resource.to_string()).set(to.as_gauge());
}

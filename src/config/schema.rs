//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the client.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::resilience::{CircuitBreakerPolicy, RetryPolicy};

/// Root configuration for the resilient client.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    /// Transport (connection and timeout) settings.
    pub transport: TransportConfig,

    /// Retry policy. Absent means a single attempt per call.
    pub retry: Option<RetryConfig>,

    /// Circuit breaker policy. Absent means no admission control.
    pub circuit_breaker: Option<CircuitBreakerConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Transport configuration for the underlying HTTP client.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Connection establishment timeout in milliseconds.
    pub connect_timeout_ms: u64,

    /// Timeout for a single request/response exchange in milliseconds.
    pub request_timeout_ms: u64,

    /// Idle pooled connections are closed after this many seconds.
    pub pool_idle_timeout_secs: u64,

    /// Maximum idle pooled connections kept per host.
    pub pool_max_idle_per_host: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 1_000,
            request_timeout_ms: 5_000,
            pool_idle_timeout_secs: 90,
            pool_max_idle_per_host: 32,
        }
    }
}

impl TransportConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Number of retries after the first attempt.
    pub max_retry: u32,

    /// Backoff unit in milliseconds; attempt `i` waits `(i+1) * unit` plus jitter.
    pub backoff_ms: u64,

    /// Overall wall-clock budget for all attempts in milliseconds.
    pub max_elapsed_ms: Option<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retry: 3,
            backoff_ms: 100,
            max_elapsed_ms: None,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        let policy = RetryPolicy::new(config.max_retry, Duration::from_millis(config.backoff_ms));
        match config.max_elapsed_ms {
            Some(ms) => policy.with_max_elapsed(Duration::from_millis(ms)),
            None => policy,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Trial requests admitted while half-open.
    pub max_requests: u32,

    /// The breaker opens once consecutive failures exceed this value.
    pub consecutive_failures: u32,

    /// Window in milliseconds after which stale failures are forgotten (0 disables).
    pub interval_ms: u64,

    /// Time in milliseconds the breaker stays open before allowing trials.
    pub timeout_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            max_requests: 1,
            consecutive_failures: 5,
            interval_ms: 0,
            timeout_ms: 60_000,
        }
    }
}

impl From<&CircuitBreakerConfig> for CircuitBreakerPolicy {
    fn from(config: &CircuitBreakerConfig) -> Self {
        CircuitBreakerPolicy {
            max_requests: config.max_requests,
            consecutive_failure_threshold: config.consecutive_failures,
            open_interval: Duration::from_millis(config.interval_ms),
            open_timeout: Duration::from_millis(config.timeout_ms),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, backoff set when retrying)
//! - Validate observability settings (known log level, parseable address)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ClientConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ClientConfig;
use crate::observability::logging::is_valid_level;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("transport.request_timeout_ms must be greater than zero")]
    ZeroRequestTimeout,
    #[error("retry.backoff_ms must be greater than zero when max_retry is {max_retry}")]
    ZeroBackoff { max_retry: u32 },
    #[error("circuit_breaker.timeout_ms must be greater than zero")]
    ZeroBreakerTimeout,
    #[error("unknown log level '{0}'")]
    UnknownLogLevel(String),
    #[error("invalid metrics address '{0}'")]
    InvalidMetricsAddress(String),
}

pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.transport.request_timeout_ms == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }

    if let Some(retry) = &config.retry {
        if retry.max_retry > 0 && retry.backoff_ms == 0 {
            errors.push(ValidationError::ZeroBackoff {
                max_retry: retry.max_retry,
            });
        }
    }

    if let Some(cb) = &config.circuit_breaker {
        if cb.timeout_ms == 0 {
            errors.push(ValidationError::ZeroBreakerTimeout);
        }
    }

    let obs = &config.observability;
    if !is_valid_level(&obs.log_level) {
        errors.push(ValidationError::UnknownLogLevel(obs.log_level.clone()));
    }
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidMetricsAddress(obs.metrics_address.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

//! Structured logging.
//!
//! # Design Decisions
//! - `RUST_LOG` overrides the configured level
//! - Initialization is idempotent; a second call leaves the first subscriber in place

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Level names accepted in configuration.
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Install the global subscriber at `level` unless the environment says otherwise.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(level));

    if tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_err()
    {
        tracing::debug!("Global subscriber already installed");
    }
}

fn default_filter(level: &str) -> EnvFilter {
    EnvFilter::new(format!("resilient_http={level},resilient_probe={level},warn"))
}

/// Whether `level` is one of [`LOG_LEVELS`], case-insensitively.
pub fn is_valid_level(level: &str) -> bool {
    LOG_LEVELS.iter().any(|known| known.eq_ignore_ascii_case(level))
}

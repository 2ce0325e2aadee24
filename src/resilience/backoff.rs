//! Linear backoff with jitter.

use std::time::Duration;
use rand::Rng;

/// Delay before the attempt following `attempt` (0-based).
///
/// `(attempt + 1) * unit` plus a uniform jitter in `[0, unit / 2)`.
pub fn calculate_backoff(attempt: u32, unit: Duration) -> Duration {
    let base = unit.saturating_mul(attempt.saturating_add(1));

    let jitter_range = unit / 2;
    let jitter = if jitter_range.is_zero() {
        Duration::ZERO
    } else {
        rand::thread_rng().gen_range(Duration::ZERO..jitter_range)
    };

    base.saturating_add(jitter)
}

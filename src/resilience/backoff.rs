//! Linear backoff with jitter.

use std::time::Duration;

use rand::Rng;

/// Upper bound on any single backoff sleep.
pub const MAX_BACKOFF: Duration = Duration::from_millis(5_000);

/// Delay to sleep after the `attempt`-th failed attempt (1-based).
///
/// `base * attempt`, plus jitter drawn from `[0, max(1, delay / 4))` ms,
/// capped at [`MAX_BACKOFF`].
pub fn calculate_backoff(attempt: u32, base: Duration) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let base_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
    let delay_ms = base_ms.saturating_mul(u64::from(attempt));

    let jitter = if delay_ms > 0 {
        let jitter_range = (delay_ms / 4).max(1);
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    let capped = delay_ms.saturating_add(jitter).min(MAX_BACKOFF.as_millis() as u64);
    Duration::from_millis(capped)
}

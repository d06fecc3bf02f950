//! Reconnect backoff
//!
//! `delay(attempt) = min(1000 * 2^attempt, 30000)` milliseconds, no jitter.

use std::time::Duration;

/// Delay before the first retry step
pub const BASE_DELAY_MS: u64 = 1_000;

/// Upper bound for any retry delay
pub const MAX_DELAY_MS: u64 = 30_000;

/// Backoff in milliseconds for the given attempt
///
/// Saturates at [`MAX_DELAY_MS`] for every attempt large enough to overflow.
#[must_use]
pub fn backoff_ms(attempt: u32) -> u64 {
    2u64.checked_pow(attempt)
        .and_then(|factor| factor.checked_mul(BASE_DELAY_MS))
        .map_or(MAX_DELAY_MS, |delay| delay.min(MAX_DELAY_MS))
}

/// Backoff as a `Duration`
#[must_use]
pub fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(backoff_ms(attempt))
}

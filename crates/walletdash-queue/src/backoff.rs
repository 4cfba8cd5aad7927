//! Backoff policies
//!
//! 429 responses back off exponentially from the request's current delay;
//! everything else backs off linearly. Both read the same retry counter.

use std::time::Duration;

use crate::config::QueueConfig;
use crate::error::RequestError;

/// Which backoff policy a failed attempt falls under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    RateLimited,
    Transient,
}

impl From<&RequestError> for FailureKind {
    fn from(error: &RequestError) -> Self {
        if error.is_rate_limited() {
            Self::RateLimited
        } else {
            Self::Transient
        }
    }
}

/// Delay before the next attempt.
///
/// `current` is the request's stored delay and `retries` the counter value
/// after it was incremented for this failure.
pub fn next_delay(config: &QueueConfig, kind: FailureKind, current: Duration, retries: u32) -> Duration {
    match kind {
        FailureKind::RateLimited => {
            let factor = 2u32.saturating_pow(retries);
            current.saturating_mul(factor).min(config.max_backoff)
        }
        FailureKind::Transient => config.linear_step.saturating_mul(retries),
    }
}

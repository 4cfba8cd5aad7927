//! Rate-limit bookkeeping for one page's load cycle

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How long the page holds off after a terminal rate-limit failure
pub const RATE_LIMIT_COOLDOWN: Duration = Duration::from_secs(30);

/// Rate limit state shown to the user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitInfo {
    /// Whether the last failure was a rate limit
    pub is_rate_limited: bool,
    /// When requests may resume
    pub next_request_time: Option<DateTime<Utc>>,
    /// Successful requests in this cycle
    pub request_count: u32,
}

impl RateLimitInfo {
    /// Clear everything at the start of a load cycle
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn record_success(&mut self) {
        self.request_count += 1;
    }

    pub fn record_rate_limited(&mut self, now: DateTime<Utc>) {
        self.is_rate_limited = true;
        let cooldown = chrono::Duration::seconds(RATE_LIMIT_COOLDOWN.as_secs() as i64);
        self.next_request_time = Some(now + cooldown);
        tracing::warn!(
            request_count = self.request_count,
            cooldown_seconds = RATE_LIMIT_COOLDOWN.as_secs(),
            "Rate limit active"
        );
    }

    /// Whole seconds until requests may resume, rounded up. Zero when clear.
    pub fn countdown(&self, now: DateTime<Utc>) -> u64 {
        if !self.is_rate_limited {
            return 0;
        }
        match self.next_request_time {
            Some(next) => {
                let millis = (next - now).num_milliseconds();
                if millis <= 0 {
                    0
                } else {
                    (millis as u64).div_ceil(1000)
                }
            }
            None => 0,
        }
    }

    /// Whether the cooldown window is still open at `now`
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.countdown(now) > 0
    }
}

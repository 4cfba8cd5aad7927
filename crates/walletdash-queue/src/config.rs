//! Queue configuration
//!
//! One configuration struct serves every loader; the presets differ only in
//! spacing. Durations serialize in humantime form (`"5s"`).

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Spacing and retry parameters for a [`crate::RequestQueue`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Minimum time between the starts of two consecutive requests
    #[serde(with = "humantime_serde")]
    pub min_delay: Duration,
    /// Retries allowed per request, shared by both backoff policies
    pub max_retries: u32,
    /// Starting backoff delay of a freshly enqueued request
    #[serde(with = "humantime_serde")]
    pub initial_delay: Duration,
    /// Upper bound of the rate-limit (exponential) backoff
    #[serde(with = "humantime_serde")]
    pub max_backoff: Duration,
    /// Step of the linear backoff used for non-429 failures
    #[serde(with = "humantime_serde")]
    pub linear_step: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self::cross_chain()
    }
}

impl QueueConfig {
    /// Preset used by the portfolio dashboard (3s spacing)
    pub fn dashboard() -> Self {
        Self {
            min_delay: Duration::from_secs(3),
            initial_delay: Duration::from_secs(3),
            ..Self::cross_chain()
        }
    }

    /// Preset used by the cross-chain swap wizard (5s spacing)
    pub fn cross_chain() -> Self {
        Self {
            min_delay: Duration::from_secs(5),
            max_retries: 3,
            initial_delay: Duration::from_secs(5),
            max_backoff: Duration::from_secs(30),
            linear_step: Duration::from_secs(3),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let dashboard = QueueConfig::dashboard();
        assert_eq!(dashboard.min_delay, Duration::from_secs(3));
        assert_eq!(dashboard.max_retries, 3);
        assert_eq!(dashboard.max_backoff, Duration::from_secs(30));

        let cross_chain = QueueConfig::default();
        assert_eq!(cross_chain.min_delay, Duration::from_secs(5));
        assert_eq!(cross_chain.linear_step, Duration::from_secs(3));
    }

    #[test]
    fn test_humantime_roundtrip_and_partial_input() {
        let config: QueueConfig =
            serde_json::from_str(r#"{"min_delay":"750ms","max_retries":5}"#).unwrap();
        assert_eq!(config.min_delay, Duration::from_millis(750));
        assert_eq!(config.max_retries, 5);
        // unspecified fields keep the defaults
        assert_eq!(config.max_backoff, Duration::from_secs(30));

        let json = serde_json::to_value(&QueueConfig::dashboard()).unwrap();
        assert_eq!(json["min_delay"], "3s");
    }
}

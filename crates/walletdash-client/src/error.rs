//! Client error types

use thiserror::Error;
use walletdash_queue::{QueueError, RequestError};

/// Result type alias for client operations
pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("{0}")]
    Validation(String),

    /// A 2xx response that reported failure in its body
    #[error("{0}")]
    Upstream(String),

    #[error("Refresh refused: {0}")]
    RefreshBlocked(String),

    #[error("Swap quote rejected: {0}")]
    SwapRejected(String),
}

impl ClientError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream(message.into())
    }

    /// Whether the failure came from upstream rate limiting
    pub fn is_rate_limited(&self) -> bool {
        match self {
            Self::Queue(e) => e.is_rate_limited(),
            Self::Request(e) => e.is_rate_limited(),
            Self::Upstream(message) => message.contains("429") || message.contains("Rate limit"),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_detection() {
        let queued = ClientError::from(QueueError::RateLimitExceeded {
            name: "Loading bridges".into(),
            retries: 3,
        });
        assert!(queued.is_rate_limited());
        assert_eq!(
            queued.to_string(),
            "Rate limit exceeded for Loading bridges after 3 retries"
        );

        assert!(ClientError::upstream("Rate limit reached, slow down").is_rate_limited());
        assert!(!ClientError::upstream("Failed to fetch Loading bridges").is_rate_limited());
        assert!(!ClientError::validation("Please select both tokens").is_rate_limited());
    }
}

//! Queue error types
//!
//! Two layers of failure:
//! - [`RequestError`] is what a single attempt of an operation reports. The
//!   queue uses it to pick a backoff policy.
//! - [`QueueError`] is what a caller of [`crate::RequestQueue::enqueue`] sees
//!   once a request has reached a terminal state.

use thiserror::Error;

/// Result type alias for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

/// Failure of a single attempt of a queued operation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// The endpoint answered HTTP 429
    #[error("HTTP 429: rate limited")]
    RateLimited,

    /// Any other non-success status
    #[error("HTTP {status}: {reason}")]
    Status {
        /// Numeric status code
        status: u16,
        /// Canonical reason phrase, if any
        reason: String,
    },

    /// The request never produced a response
    #[error("Network error: {message}")]
    Network { message: String },

    /// The response body could not be parsed
    #[error("Invalid response body: {message}")]
    Decode { message: String },
}

impl RequestError {
    /// Classify an HTTP status. 429 maps to [`RequestError::RateLimited`].
    pub fn from_status(status: u16, reason: impl Into<String>) -> Self {
        if status == 429 {
            Self::RateLimited
        } else {
            Self::Status {
                status,
                reason: reason.into(),
            }
        }
    }

    pub fn network(message: impl std::fmt::Display) -> Self {
        Self::Network {
            message: message.to_string(),
        }
    }

    pub fn decode(message: impl std::fmt::Display) -> Self {
        Self::Decode {
            message: message.to_string(),
        }
    }

    /// Whether this failure should use the rate-limit backoff
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited)
    }
}

/// Terminal failure of a queued request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The request kept receiving HTTP 429 past the retry budget
    #[error("Rate limit exceeded for {name} after {retries} retries")]
    RateLimitExceeded {
        /// Step name of the request
        name: String,
        /// Retries performed before giving up
        retries: u32,
    },

    /// The request kept failing with a non-429 error past the retry budget
    #[error("{name} failed after {retries} retries: {source}")]
    RetriesExhausted {
        name: String,
        retries: u32,
        #[source]
        source: RequestError,
    },

    /// The result came back but did not have the expected shape
    #[error("Unexpected response for {name}: {message}")]
    InvalidResponse { name: String, message: String },

    /// The operation panicked; the request is not retried
    #[error("{name} panicked: {message}")]
    Panicked { name: String, message: String },

    /// The processing loop went away before answering
    #[error("Request queue stopped before {name} completed")]
    Dropped { name: String },
}

impl QueueError {
    /// Step name of the request that failed
    pub fn step_name(&self) -> &str {
        match self {
            Self::RateLimitExceeded { name, .. }
            | Self::RetriesExhausted { name, .. }
            | Self::InvalidResponse { name, .. }
            | Self::Panicked { name, .. }
            | Self::Dropped { name } => name,
        }
    }

    /// Whether the terminal failure was caused by rate limiting
    pub fn is_rate_limited(&self) -> bool {
        match self {
            Self::RateLimitExceeded { .. } => true,
            Self::RetriesExhausted { source, .. } => source.is_rate_limited(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_classifies_429() {
        assert_eq!(RequestError::from_status(429, "Too Many Requests"), RequestError::RateLimited);
        assert_eq!(
            RequestError::from_status(503, "Service Unavailable"),
            RequestError::Status {
                status: 503,
                reason: "Service Unavailable".to_string()
            }
        );
    }

    #[test]
    fn test_error_messages() {
        let err = QueueError::RateLimitExceeded {
            name: "Loading bridges".to_string(),
            retries: 3,
        };
        assert_eq!(err.to_string(), "Rate limit exceeded for Loading bridges after 3 retries");
        assert!(err.is_rate_limited());
        assert_eq!(err.step_name(), "Loading bridges");

        let err = QueueError::RetriesExhausted {
            name: "Market Data".to_string(),
            retries: 3,
            source: RequestError::from_status(500, "Internal Server Error"),
        };
        assert_eq!(
            err.to_string(),
            "Market Data failed after 3 retries: HTTP 500: Internal Server Error"
        );
        assert!(!err.is_rate_limited());
    }
}

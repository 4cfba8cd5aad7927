//! walletdash queue - Sequential rate-limited request queue
//!
//! Dashboard pages pull from a handful of REST endpoints that rate limit
//! aggressively. This crate turns would-be-concurrent fetches into a strictly
//! serial stream:
//!
//! - **One in flight**: a single processing loop per queue instance
//! - **Spacing**: a floor on the time between two request starts
//! - **Retry**: exponential backoff on HTTP 429, linear backoff otherwise,
//!   sharing one retry budget per request
//! - **Head-of-queue priority**: a retried request runs before newer work
//! - **Progress**: every phase transition is reported to a [`ProgressSink`]
//!
//! # Architecture
//!
//! ```text
//! enqueue(name, op) ──▶ ┌────────────────────────────┐
//!                       │ QueueState                 │
//!                       │  pending: VecDeque         │──▶ wait(min_delay)
//!                       │  last_request_at           │──▶ op().await
//!                       │  is_processing             │      │
//!                       └────────────────────────────┘      │
//!                             ▲   push_front on retry       │
//!                             └─────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use walletdash_queue::{RequestQueue, StepStatus};
//!
//! let queue = RequestQueue::builder()
//!     .min_delay(Duration::from_secs(3))
//!     .max_retries(3)
//!     .progress(|step: &str, status: StepStatus, message: &str| {
//!         println!("{step}: {status} {message}");
//!     })
//!     .build();
//!
//! let body = queue.enqueue("Token Balances", || async { fetch_balances().await }).await?;
//! ```

pub mod backoff;
pub mod config;
pub mod error;
pub mod progress;
pub mod queue;
pub mod rate_limit;

pub use backoff::{next_delay, FailureKind};
pub use config::QueueConfig;
pub use error::{QueueError, QueueResult, RequestError};
pub use progress::{Fanout, LoadingStep, NoProgress, ProgressSink, SharedSteps, StepStatus, StepTracker};
pub use queue::{QueueBuilder, RequestQueue};
pub use rate_limit::{RateLimitInfo, RATE_LIMIT_COOLDOWN};

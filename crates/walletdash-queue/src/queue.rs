//! The request queue and its processing loop

use futures::future::BoxFuture;
use futures::FutureExt;
use std::any::Any;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::backoff::{next_delay, FailureKind};
use crate::config::QueueConfig;
use crate::error::{QueueError, QueueResult, RequestError};
use crate::progress::{NoProgress, ProgressSink, StepStatus};

type Operation = Box<dyn Fn() -> BoxFuture<'static, Result<Value, RequestError>> + Send + Sync>;

/// A unit of work waiting in (or cycling through) the queue
struct QueuedRequest {
    name: String,
    operation: Operation,
    /// Current backoff delay, updated on every retry
    delay: Duration,
    /// Failed attempts so far, across both backoff policies
    retries: u32,
    responder: oneshot::Sender<QueueResult<Value>>,
}

/// Mutable queue state. Only the processing loop pops from `pending` or
/// writes `last_request_at`.
#[derive(Default)]
struct QueueState {
    pending: VecDeque<QueuedRequest>,
    is_processing: bool,
    last_request_at: Option<Instant>,
}

struct Shared {
    config: QueueConfig,
    progress: Arc<dyn ProgressSink>,
    state: Mutex<QueueState>,
}

/// Serializes fetch operations with spacing and retry.
///
/// Cloning is cheap and every clone feeds the same queue. Separate
/// instances do not coordinate.
#[derive(Clone)]
pub struct RequestQueue {
    shared: Arc<Shared>,
}

impl fmt::Debug for RequestQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestQueue")
            .field("config", &self.shared.config)
            .field("pending", &self.pending())
            .field("is_processing", &self.is_processing())
            .finish()
    }
}

/// Builder for [`RequestQueue`]
pub struct QueueBuilder {
    config: QueueConfig,
    progress: Arc<dyn ProgressSink>,
}

impl Default for QueueBuilder {
    fn default() -> Self {
        Self {
            config: QueueConfig::default(),
            progress: Arc::new(NoProgress),
        }
    }
}

impl QueueBuilder {
    /// Replace the whole configuration
    pub fn config(mut self, config: QueueConfig) -> Self {
        self.config = config;
        self
    }

    pub fn min_delay(mut self, min_delay: Duration) -> Self {
        self.config.min_delay = min_delay;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    pub fn initial_delay(mut self, initial_delay: Duration) -> Self {
        self.config.initial_delay = initial_delay;
        self
    }

    pub fn max_backoff(mut self, max_backoff: Duration) -> Self {
        self.config.max_backoff = max_backoff;
        self
    }

    pub fn linear_step(mut self, linear_step: Duration) -> Self {
        self.config.linear_step = linear_step;
        self
    }

    /// Report step transitions to `sink`
    pub fn progress(self, sink: impl ProgressSink + 'static) -> Self {
        self.shared_progress(Arc::new(sink))
    }

    /// Report step transitions to an already shared sink
    pub fn shared_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = sink;
        self
    }

    pub fn build(self) -> RequestQueue {
        RequestQueue {
            shared: Arc::new(Shared {
                config: self.config,
                progress: self.progress,
                state: Mutex::new(QueueState::default()),
            }),
        }
    }
}

impl RequestQueue {
    pub fn builder() -> QueueBuilder {
        QueueBuilder::default()
    }

    /// Queue with the given configuration and no progress reporting
    pub fn new(config: QueueConfig) -> Self {
        Self::builder().config(config).build()
    }

    pub fn config(&self) -> &QueueConfig {
        &self.shared.config
    }

    /// Requests waiting to run, retries included
    pub fn pending(&self) -> usize {
        self.shared.state.lock().pending.len()
    }

    /// Whether a processing loop is currently running
    pub fn is_processing(&self) -> bool {
        self.shared.state.lock().is_processing
    }

    /// Queue `operation` under the configured initial delay
    pub async fn enqueue<F, Fut>(&self, name: impl Into<String>, operation: F) -> QueueResult<Value>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, RequestError>> + Send + 'static,
    {
        let initial_delay = self.shared.config.initial_delay;
        self.enqueue_with_delay(name, initial_delay, operation).await
    }

    /// Queue `operation` and resolve with its JSON result.
    ///
    /// `operation` is invoked once per attempt. The request keeps running
    /// even if the returned future is dropped.
    pub async fn enqueue_with_delay<F, Fut>(
        &self,
        name: impl Into<String>,
        initial_delay: Duration,
        operation: F,
    ) -> QueueResult<Value>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, RequestError>> + Send + 'static,
    {
        let name = name.into();
        let (responder, receiver) = oneshot::channel();

        self.shared
            .progress
            .on_step(&name, StepStatus::Pending, "Waiting in queue...");

        let request = QueuedRequest {
            name: name.clone(),
            operation: Box::new(move || operation().boxed()),
            delay: initial_delay,
            retries: 0,
            responder,
        };

        let start_loop = {
            let mut state = self.shared.state.lock();
            state.pending.push_back(request);
            !std::mem::replace(&mut state.is_processing, true)
        };

        if start_loop {
            tokio::spawn(process(self.shared.clone()));
        }

        receiver
            .await
            .unwrap_or_else(|_| Err(QueueError::Dropped { name }))
    }

    /// Like [`RequestQueue::enqueue`], deserializing the result into `T`
    pub async fn enqueue_json<T, F, Fut>(&self, name: impl Into<String>, operation: F) -> QueueResult<T>
    where
        T: DeserializeOwned,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, RequestError>> + Send + 'static,
    {
        let name = name.into();
        let body = self.enqueue(name.clone(), operation).await?;
        serde_json::from_value(body).map_err(|e| QueueError::InvalidResponse {
            name,
            message: e.to_string(),
        })
    }
}

/// Drain the queue one request at a time.
async fn process(shared: Arc<Shared>) {
    let config = &shared.config;

    loop {
        let (mut request, wait) = {
            let mut state = shared.state.lock();
            let Some(request) = state.pending.pop_front() else {
                state.is_processing = false;
                tracing::debug!("request queue drained");
                return;
            };
            let wait = state
                .last_request_at
                .map(|at| config.min_delay.saturating_sub(at.elapsed()))
                .unwrap_or(Duration::ZERO);
            (request, wait)
        };

        if !wait.is_zero() {
            shared.progress.on_step(
                &request.name,
                StepStatus::Loading,
                &format!("Waiting {}s to prevent rate limiting...", whole_seconds(wait)),
            );
            tracing::debug!(
                step = %request.name,
                wait_ms = wait.as_millis() as u64,
                "spacing requests"
            );
            tokio::time::sleep(wait).await;
        }

        shared.progress.on_step(
            &request.name,
            StepStatus::Loading,
            &format!("Fetching {}...", request.name.to_lowercase()),
        );
        shared.state.lock().last_request_at = Some(Instant::now());
        tracing::info!(
            step = %request.name,
            attempt = request.retries + 1,
            "dispatching request"
        );

        // A panicking operation fails its own request; the loop keeps draining.
        let attempt = AssertUnwindSafe(async { (request.operation)().await })
            .catch_unwind()
            .await;

        let error = match attempt {
            Ok(Ok(body)) => {
                shared.progress.on_step(
                    &request.name,
                    StepStatus::Completed,
                    &format!("{} loaded successfully", request.name),
                );
                let _ = request.responder.send(Ok(body));
                continue;
            }
            Ok(Err(error)) => error,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                shared.progress.on_step(
                    &request.name,
                    StepStatus::Error,
                    &format!("Failed to load {}", request.name.to_lowercase()),
                );
                tracing::error!(step = %request.name, panic = %message, "operation panicked");
                let _ = request.responder.send(Err(QueueError::Panicked {
                    name: request.name,
                    message,
                }));
                continue;
            }
        };

        request.retries += 1;
        let kind = FailureKind::from(&error);

        if request.retries <= config.max_retries {
            let backoff = next_delay(config, kind, request.delay, request.retries);
            request.delay = backoff;

            let message = match kind {
                FailureKind::RateLimited => format!(
                    "Rate limited. Retrying in {}s... ({}/{})",
                    whole_seconds(backoff),
                    request.retries,
                    config.max_retries
                ),
                FailureKind::Transient => format!(
                    "Retry {}/{} for {} in {}s...",
                    request.retries,
                    config.max_retries,
                    request.name.to_lowercase(),
                    whole_seconds(backoff)
                ),
            };
            shared.progress.on_step(&request.name, StepStatus::Error, &message);
            tracing::warn!(
                step = %request.name,
                retries = request.retries,
                backoff_ms = backoff.as_millis() as u64,
                error = %error,
                "request failed, retrying"
            );

            shared.state.lock().pending.push_front(request);
            tokio::time::sleep(backoff).await;
            continue;
        }

        let terminal = match kind {
            FailureKind::RateLimited => QueueError::RateLimitExceeded {
                name: request.name.clone(),
                retries: config.max_retries,
            },
            FailureKind::Transient => QueueError::RetriesExhausted {
                name: request.name.clone(),
                retries: config.max_retries,
                source: error,
            },
        };
        shared.progress.on_step(
            &request.name,
            StepStatus::Error,
            &format!("Failed to load {}", request.name.to_lowercase()),
        );
        tracing::error!(step = %request.name, error = %terminal, "request failed permanently");
        let _ = request.responder.send(Err(terminal));
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "operation panicked".to_string())
}

fn whole_seconds(duration: Duration) -> u64 {
    (duration.as_millis() as u64).div_ceil(1000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[tokio::test(start_paused = true)]
    async fn test_first_request_runs_immediately() {
        let queue = RequestQueue::new(QueueConfig::cross_chain());
        let started = Instant::now();

        let body = queue
            .enqueue("Loading bridges", || async { Ok(json!({"success": true})) })
            .await
            .unwrap();

        assert_eq!(body["success"], true);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_stops_when_drained() {
        let queue = RequestQueue::new(QueueConfig::dashboard());
        queue.enqueue("Current Price", || async { Ok(json!({})) }).await.unwrap();

        tokio::task::yield_now().await;
        assert_eq!(queue.pending(), 0);
        assert!(!queue.is_processing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_enqueue_json() {
        #[derive(Debug, Deserialize)]
        struct Price {
            price: String,
        }

        let queue = RequestQueue::new(QueueConfig::dashboard());
        let price: Price = queue
            .enqueue_json("Current Price", || async { Ok(json!({"price": "142.17"})) })
            .await
            .unwrap();
        assert_eq!(price.price, "142.17");

        let err = queue
            .enqueue_json::<Price, _, _>("Current Price", || async { Ok(json!({"nope": 1})) })
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::InvalidResponse { .. }));
    }

    #[test]
    fn test_whole_seconds_rounds_up() {
        assert_eq!(whole_seconds(Duration::from_millis(2001)), 3);
        assert_eq!(whole_seconds(Duration::from_secs(5)), 5);
        assert_eq!(whole_seconds(Duration::ZERO), 0);
    }

    #[test]
    fn test_builder_overrides() {
        let queue = RequestQueue::builder()
            .config(QueueConfig::dashboard())
            .min_delay(Duration::from_millis(250))
            .max_retries(5)
            .linear_step(Duration::from_secs(1))
            .build();

        assert_eq!(queue.config().min_delay, Duration::from_millis(250));
        assert_eq!(queue.config().max_retries, 5);
        assert_eq!(queue.config().initial_delay, Duration::from_secs(3));
    }
}

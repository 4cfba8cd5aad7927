//! Timing and ordering behaviour of the request queue, on paused tokio time.

use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use walletdash_queue::{QueueConfig, QueueError, RequestError, RequestQueue, StepStatus};

type Outcome = Result<Value, RequestError>;

/// Operation that replays `outcomes` in order (repeating the last one) and
/// records the instant of every attempt.
#[derive(Clone)]
struct Scripted {
    name: &'static str,
    outcomes: Arc<Mutex<VecDeque<Outcome>>>,
    last: Outcome,
    dispatches: Arc<Mutex<Vec<(&'static str, Instant)>>>,
}

impl Scripted {
    fn new(
        name: &'static str,
        outcomes: Vec<Outcome>,
        dispatches: &Arc<Mutex<Vec<(&'static str, Instant)>>>,
    ) -> Self {
        let last = outcomes.last().cloned().unwrap_or_else(|| Ok(json!({})));
        Self {
            name,
            outcomes: Arc::new(Mutex::new(outcomes.into())),
            last,
            dispatches: dispatches.clone(),
        }
    }

    fn operation(&self) -> impl Fn() -> std::future::Ready<Outcome> + Send + Sync + 'static {
        let this = self.clone();
        move || {
            this.dispatches.lock().push((this.name, Instant::now()));
            let next = this.outcomes.lock().pop_front().unwrap_or_else(|| this.last.clone());
            std::future::ready(next)
        }
    }
}

fn dispatch_log() -> Arc<Mutex<Vec<(&'static str, Instant)>>> {
    Arc::new(Mutex::new(Vec::new()))
}

fn gaps(dispatches: &[(&'static str, Instant)]) -> Vec<Duration> {
    dispatches.windows(2).map(|w| w[1].1 - w[0].1).collect()
}

fn server_error() -> Outcome {
    Err(RequestError::from_status(500, "Internal Server Error"))
}

#[tokio::test(start_paused = true)]
async fn test_repeated_429_backs_off_exponentially_then_fails() {
    let log = dispatch_log();
    let op = Scripted::new("Loading bridges", vec![Err(RequestError::RateLimited)], &log);
    let queue = RequestQueue::new(QueueConfig::cross_chain());

    let err = queue.enqueue("Loading bridges", op.operation()).await.unwrap_err();

    assert_eq!(
        err,
        QueueError::RateLimitExceeded {
            name: "Loading bridges".to_string(),
            retries: 3
        }
    );

    let dispatches = log.lock().clone();
    // max_retries + 1 attempts
    assert_eq!(dispatches.len(), 4);

    let delays = gaps(&dispatches);
    assert_eq!(
        delays,
        vec![
            Duration::from_secs(10),
            Duration::from_secs(30),
            Duration::from_secs(30)
        ]
    );
    assert!(delays.windows(2).all(|w| w[0] <= w[1]));
    assert!(delays.iter().all(|d| *d <= Duration::from_secs(30)));
}

#[tokio::test(start_paused = true)]
async fn test_repeated_500_backs_off_linearly_then_fails() {
    let log = dispatch_log();
    let op = Scripted::new("Market Data", vec![server_error()], &log);
    let queue = RequestQueue::builder()
        .config(QueueConfig::dashboard())
        .min_delay(Duration::from_secs(1))
        .build();

    let err = queue.enqueue("Market Data", op.operation()).await.unwrap_err();

    match err {
        QueueError::RetriesExhausted { retries, source, .. } => {
            assert_eq!(retries, 3);
            assert_eq!(source, RequestError::from_status(500, "Internal Server Error"));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let dispatches = log.lock().clone();
    assert_eq!(dispatches.len(), 4);
    assert_eq!(
        gaps(&dispatches),
        vec![
            Duration::from_secs(3),
            Duration::from_secs(6),
            Duration::from_secs(9)
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_always_failing_operation_stops_after_three_retries() {
    let log = dispatch_log();
    let op = Scripted::new(
        "Portfolio Value",
        vec![Err(RequestError::network("connection reset"))],
        &log,
    );
    let queue = RequestQueue::new(QueueConfig::dashboard());

    let result = queue.enqueue("Portfolio Value", op.operation()).await;
    assert!(matches!(result, Err(QueueError::RetriesExhausted { .. })));

    // nothing else is attempted afterwards
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(log.lock().len(), 4);
    assert!(!queue.is_processing());
}

#[tokio::test(start_paused = true)]
async fn test_429_three_times_then_success() {
    let log = dispatch_log();
    let op = Scripted::new(
        "Token Balances",
        vec![
            Err(RequestError::RateLimited),
            Err(RequestError::RateLimited),
            Err(RequestError::RateLimited),
            Ok(json!({"data": [{"tokenAssets": []}]})),
        ],
        &log,
    );

    let reports = Arc::new(Mutex::new(Vec::new()));
    let sink = reports.clone();
    let queue = RequestQueue::builder()
        .config(QueueConfig::dashboard())
        .progress(move |step: &str, status: StepStatus, message: &str| {
            sink.lock().push((step.to_string(), status, message.to_string()));
        })
        .build();

    let body = queue.enqueue("Token Balances", op.operation()).await.unwrap();
    assert_eq!(body, json!({"data": [{"tokenAssets": []}]}));

    let reports = reports.lock().clone();
    let statuses: Vec<StepStatus> = reports.iter().map(|r| r.1).collect();
    assert_eq!(statuses.first(), Some(&StepStatus::Pending));
    assert_eq!(statuses.last(), Some(&StepStatus::Completed));
    assert_eq!(statuses.iter().filter(|s| **s == StepStatus::Error).count(), 3);
    assert_eq!(
        statuses.iter().filter(|s| **s == StepStatus::Completed).count(),
        1
    );
    assert!(reports
        .iter()
        .any(|r| r.2 == "Rate limited. Retrying in 6s... (1/3)"));
}

#[tokio::test(start_paused = true)]
async fn test_two_successes_respect_min_delay() {
    let log = dispatch_log();
    let first = Scripted::new("Loading bridges", vec![Ok(json!({"bridges": []}))], &log);
    let second = Scripted::new("Loading token pairs", vec![Ok(json!({"pairs": []}))], &log);
    let queue = RequestQueue::builder()
        .min_delay(Duration::from_secs(5))
        .build();

    let (a, b) = tokio::join!(
        queue.enqueue("Loading bridges", first.operation()),
        queue.enqueue("Loading token pairs", second.operation()),
    );
    assert!(a.is_ok() && b.is_ok());

    let dispatches = log.lock().clone();
    assert_eq!(dispatches[0].0, "Loading bridges");
    assert_eq!(dispatches[1].0, "Loading token pairs");
    assert!(dispatches[1].1 - dispatches[0].1 >= Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_spacing_holds_across_sequential_callers() {
    let log = dispatch_log();
    let queue = RequestQueue::builder()
        .min_delay(Duration::from_secs(3))
        .build();

    for name in ["Token Balances", "Transaction History", "Portfolio Value"] {
        let op = Scripted::new(name, vec![Ok(json!({}))], &log);
        queue.enqueue(name, op.operation()).await.unwrap();
        // the caller does some work between requests
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    let dispatches = log.lock().clone();
    assert!(gaps(&dispatches)
        .iter()
        .all(|gap| *gap >= Duration::from_secs(3)));
}

#[tokio::test(start_paused = true)]
async fn test_retry_runs_before_later_requests() {
    let log = dispatch_log();
    let flaky = Scripted::new(
        "Loading bridges",
        vec![Err(RequestError::RateLimited), Ok(json!({"bridges": []}))],
        &log,
    );
    let later = Scripted::new("Loading token pairs", vec![Ok(json!({"pairs": []}))], &log);
    let queue = RequestQueue::new(QueueConfig::cross_chain());

    let first = {
        let queue = queue.clone();
        tokio::spawn(async move { queue.enqueue("Loading bridges", flaky.operation()).await })
    };

    // enqueue the second request while the first is backing off
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(queue.pending(), 1);
    let second = queue.enqueue("Loading token pairs", later.operation()).await;

    assert!(first.await.unwrap().is_ok());
    assert!(second.is_ok());

    let order: Vec<&str> = log.lock().iter().map(|(name, _)| *name).collect();
    assert_eq!(
        order,
        vec!["Loading bridges", "Loading bridges", "Loading token pairs"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_mixed_failures_share_one_retry_budget() {
    let log = dispatch_log();
    let op = Scripted::new(
        "Loading Solana tokens",
        vec![
            Err(RequestError::RateLimited),
            server_error(),
            Err(RequestError::RateLimited),
            server_error(),
        ],
        &log,
    );
    let queue = RequestQueue::builder()
        .min_delay(Duration::from_secs(1))
        .build();

    let err = queue
        .enqueue("Loading Solana tokens", op.operation())
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::RetriesExhausted { .. }));

    let dispatches = log.lock().clone();
    assert_eq!(dispatches.len(), 4);
    // 429: 5s * 2^1, then 500: 3s * 2, then 429 from the stored 6s: 6s * 2^3 capped
    assert_eq!(
        gaps(&dispatches),
        vec![
            Duration::from_secs(10),
            Duration::from_secs(6),
            Duration::from_secs(30)
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_dropped_caller_does_not_cancel_request() {
    let log = dispatch_log();
    let op = Scripted::new(
        "Loading bridges",
        vec![Err(RequestError::RateLimited), Ok(json!({}))],
        &log,
    );
    let queue = RequestQueue::new(QueueConfig::cross_chain());

    let caller = {
        let queue = queue.clone();
        tokio::spawn(async move { queue.enqueue("Loading bridges", op.operation()).await })
    };
    tokio::time::sleep(Duration::from_secs(1)).await;
    caller.abort();

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(log.lock().len(), 2);
    assert!(!queue.is_processing());
}

async fn explode() -> Outcome {
    panic!("bridge payload")
}

#[tokio::test(start_paused = true)]
async fn test_panicking_operation_fails_only_its_own_request() {
    let queue = RequestQueue::new(QueueConfig::cross_chain());

    let err = queue.enqueue("Loading bridges", explode).await.unwrap_err();
    assert_eq!(
        err,
        QueueError::Panicked {
            name: "Loading bridges".to_string(),
            message: "bridge payload".to_string()
        }
    );

    let body = tokio::time::timeout(
        Duration::from_secs(600),
        queue.enqueue("Loading token pairs", || async { Ok(json!({"success": true})) }),
    )
    .await
    .expect("queue kept draining after the panic")
    .unwrap();
    assert_eq!(body["success"], true);

    tokio::task::yield_now().await;
    assert!(!queue.is_processing());
    assert_eq!(queue.pending(), 0);
}

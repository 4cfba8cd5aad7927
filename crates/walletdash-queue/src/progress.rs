//! Step progress reporting
//!
//! The queue reports `(step, status, message)` at every phase transition.
//! [`StepTracker`] folds those reports into the per-source loading model a
//! front end displays.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Status of one logical data-fetch phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Loading,
    Completed,
    Error,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Loading => "loading",
            Self::Completed => "completed",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// One named data source and where it is in its load
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadingStep {
    pub name: String,
    pub status: StepStatus,
    pub message: String,
}

impl LoadingStep {
    pub fn pending(name: impl Into<String>) -> Self {
        let name = name.into();
        let message = preparing_message(&name);
        Self {
            name,
            status: StepStatus::Pending,
            message,
        }
    }
}

fn preparing_message(name: &str) -> String {
    format!("Preparing to fetch {}...", name.to_lowercase())
}

/// Receiver of queue progress reports
pub trait ProgressSink: Send + Sync {
    fn on_step(&self, step: &str, status: StepStatus, message: &str);
}

impl<F> ProgressSink for F
where
    F: Fn(&str, StepStatus, &str) + Send + Sync,
{
    fn on_step(&self, step: &str, status: StepStatus, message: &str) {
        self(step, status, message)
    }
}

/// Sink that drops every report
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_step(&self, _step: &str, _status: StepStatus, _message: &str) {}
}

/// Forwards each report to several sinks, in order
#[derive(Clone, Default)]
pub struct Fanout {
    sinks: Vec<Arc<dyn ProgressSink>>,
}

impl Fanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl ProgressSink for Fanout {
    fn on_step(&self, step: &str, status: StepStatus, message: &str) {
        for sink in &self.sinks {
            sink.on_step(step, status, message);
        }
    }
}

/// Ordered loading model for one page's data sources
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepTracker {
    steps: Vec<LoadingStep>,
}

impl StepTracker {
    /// Create a tracker with every step pending
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            steps: names.into_iter().map(LoadingStep::pending).collect(),
        }
    }

    /// Put every step back to pending at the start of a load cycle
    pub fn reset(&mut self) {
        for step in &mut self.steps {
            step.status = StepStatus::Pending;
            step.message = preparing_message(&step.name);
        }
    }

    /// Apply one report. Unknown step names are ignored and return `false`.
    pub fn update(&mut self, name: &str, status: StepStatus, message: &str) -> bool {
        match self.steps.iter_mut().find(|s| s.name == name) {
            Some(step) => {
                step.status = status;
                step.message = message.to_string();
                true
            }
            None => false,
        }
    }

    pub fn get(&self, name: &str) -> Option<&LoadingStep> {
        self.steps.iter().find(|s| s.name == name)
    }

    pub fn steps(&self) -> &[LoadingStep] {
        &self.steps
    }

    /// Share of completed steps, in percent
    pub fn progress(&self) -> f64 {
        if self.steps.is_empty() {
            return 0.0;
        }
        let completed = self
            .steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .count();
        completed as f64 / self.steps.len() as f64 * 100.0
    }

    /// True once no step is pending or loading
    pub fn is_settled(&self) -> bool {
        self.steps
            .iter()
            .all(|s| matches!(s.status, StepStatus::Completed | StepStatus::Error))
    }
}

/// A [`StepTracker`] shared between a queue and whoever renders it
#[derive(Debug, Clone, Default)]
pub struct SharedSteps(Arc<Mutex<StepTracker>>);

impl SharedSteps {
    pub fn new(tracker: StepTracker) -> Self {
        Self(Arc::new(Mutex::new(tracker)))
    }

    pub fn reset(&self) {
        self.0.lock().reset();
    }

    pub fn snapshot(&self) -> Vec<LoadingStep> {
        self.0.lock().steps().to_vec()
    }

    pub fn progress(&self) -> f64 {
        self.0.lock().progress()
    }

    pub fn is_settled(&self) -> bool {
        self.0.lock().is_settled()
    }
}

impl ProgressSink for SharedSteps {
    fn on_step(&self, step: &str, status: StepStatus, message: &str) {
        if !self.0.lock().update(step, status, message) {
            tracing::debug!(step = step, "progress report for untracked step");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> StepTracker {
        StepTracker::new(["Token Balances", "Market Data"])
    }

    #[test]
    fn test_new_steps_are_pending() {
        let tracker = tracker();
        let step = tracker.get("Token Balances").unwrap();
        assert_eq!(step.status, StepStatus::Pending);
        assert_eq!(step.message, "Preparing to fetch token balances...");
        assert_eq!(tracker.progress(), 0.0);
    }

    #[test]
    fn test_progress_counts_completed_only() {
        let mut tracker = tracker();
        tracker.update("Token Balances", StepStatus::Completed, "done");
        tracker.update("Market Data", StepStatus::Error, "Retry 1/3");
        assert_eq!(tracker.progress(), 50.0);
        assert!(tracker.is_settled());
    }

    #[test]
    fn test_reset_and_unknown_step() {
        let mut tracker = tracker();
        tracker.update("Market Data", StepStatus::Completed, "done");
        assert!(!tracker.update("Nope", StepStatus::Loading, "x"));

        tracker.reset();
        assert!(tracker
            .steps()
            .iter()
            .all(|s| s.status == StepStatus::Pending));
        assert!(!tracker.is_settled());
    }

    #[test]
    fn test_shared_steps_as_sink() {
        let shared = SharedSteps::new(tracker());
        let sink: Arc<dyn ProgressSink> = Arc::new(shared.clone());
        sink.on_step("Market Data", StepStatus::Loading, "Fetching market data...");

        let steps = shared.snapshot();
        assert_eq!(steps[1].status, StepStatus::Loading);
        assert_eq!(steps[1].message, "Fetching market data...");
    }

    #[test]
    fn test_fanout_and_closure_sinks() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        let closure = move |step: &str, status: StepStatus, _message: &str| {
            log.lock().push(format!("{step}:{status}"));
        };
        let shared = SharedSteps::new(tracker());
        let fanout = Fanout::new()
            .with(Arc::new(closure))
            .with(Arc::new(shared.clone()));

        fanout.on_step("Token Balances", StepStatus::Completed, "ok");

        assert_eq!(seen.lock().as_slice(), ["Token Balances:completed"]);
        assert_eq!(shared.progress(), 50.0);
    }
}

//! Scripted process runners for testing.

use crate::process::{ProcessRequest, ProcessRunner, RunOutcome};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::Path;
use std::time::Duration;

/// A runner that returns queued outcomes and records every request.
///
/// When the queue is empty the fallback outcome is returned. With
/// [`ScriptedRunner::touching_outputs`] a successful run also creates the
/// file named by the last argument, like a real tool writing its artifact.
#[derive(Debug)]
pub struct ScriptedRunner {
    queue: Mutex<VecDeque<RunOutcome>>,
    fallback: RunOutcome,
    requests: Mutex<Vec<ProcessRequest>>,
    touch_outputs: bool,
    delay: Option<Duration>,
}

impl Default for ScriptedRunner {
    fn default() -> Self {
        Self::succeeding("")
    }
}

impl ScriptedRunner {
    /// A runner whose every run succeeds with `stdout`.
    #[must_use]
    pub fn succeeding(stdout: impl Into<String>) -> Self {
        Self::with_fallback(RunOutcome::success(stdout.into(), 1.0))
    }

    /// A runner whose every run exits with `code` and `stderr`.
    #[must_use]
    pub fn failing(code: i32, stderr: &str) -> Self {
        Self::with_fallback(RunOutcome::non_zero_exit(Some(code), "", stderr, 1.0))
    }

    /// A runner returning `outcome` whenever the queue is empty.
    #[must_use]
    pub fn with_fallback(outcome: RunOutcome) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback: outcome,
            requests: Mutex::new(Vec::new()),
            touch_outputs: false,
            delay: None,
        }
    }

    /// Creates the last argument as a file after each successful run.
    #[must_use]
    pub fn touching_outputs(mut self) -> Self {
        self.touch_outputs = true;
        self
    }

    /// Sleeps before answering each run.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queues an outcome for the next run.
    pub fn push(&self, outcome: RunOutcome) {
        self.queue.lock().push_back(outcome);
    }

    /// Every request received, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<ProcessRequest> {
        self.requests.lock().clone()
    }

    /// Number of runs.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(&self, request: &ProcessRequest) -> RunOutcome {
        self.requests.lock().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let outcome = self
            .queue
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        if outcome.ok && self.touch_outputs {
            if let Some(last) = request.argv.last() {
                let path = Path::new(last);
                if let Some(parent) = path.parent() {
                    let _ = std::fs::create_dir_all(parent);
                }
                let _ = std::fs::write(path, b"artifact");
            }
        }
        outcome
    }
}

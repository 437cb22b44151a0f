use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Outcome of one worker thread.
///
/// Owned by the worker while it runs and handed to the aggregator, read-only, once the worker's
/// loop has exited.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerResult {
    /// Name of the worker, e.g. `worker-3`.
    pub worker_id: String,
    /// Wall-clock time spent in the iteration loop.
    pub elapsed: Duration,
    /// Number of iterations started, including one that failed fatally.
    pub iterations: u64,
    /// Number of iterations that raised a recoverable data error.
    pub recoverable_errors: u64,
    /// The error that stopped this worker early, if any.
    pub fatal_error: Option<String>,
}

impl WorkerResult {
    pub fn new(worker_id: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            elapsed: Duration::ZERO,
            iterations: 0,
            recoverable_errors: 0,
            fatal_error: None,
        }
    }

    /// Result for a worker that never reached its iteration loop.
    pub fn failed_before_start(worker_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            fatal_error: Some(error.into()),
            ..Self::new(worker_id)
        }
    }

    pub fn is_failed(&self) -> bool {
        self.fatal_error.is_some()
    }
}

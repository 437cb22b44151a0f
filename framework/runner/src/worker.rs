use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

use replibench_core::prelude::{is_recoverable, DelegatedShutdownListener, ShutdownSignalError};
use replibench_instruments::{report_operation, OperationRecord, Reporter};
use replibench_summary_model::WorkerResult;

use crate::bound::Bound;
use crate::definition::Scenario;

/// Lifecycle of a [ScenarioRunner].
///
/// `Created -> Prepared -> Running -> Completed | Failed -> CleanedUp`. A worker whose prepare hook
/// failed goes from `Prepared` straight to `Failed` and never runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Created,
    Prepared,
    Running,
    Completed,
    Failed,
    CleanedUp,
}

/// Drives one scenario instance through its per-worker lifecycle on the current thread.
pub struct ScenarioRunner {
    worker_id: String,
    scenario: Box<dyn Scenario>,
    state: WorkerState,
    result: WorkerResult,
    reporter: Option<Reporter>,
    shutdown_listener: Option<DelegatedShutdownListener>,
}

impl ScenarioRunner {
    pub fn new(worker_id: impl Into<String>, scenario: Box<dyn Scenario>) -> Self {
        let worker_id = worker_id.into();
        Self {
            result: WorkerResult::new(worker_id.clone()),
            worker_id,
            scenario,
            state: WorkerState::Created,
            reporter: None,
            shutdown_listener: None,
        }
    }

    /// Report the duration of every iteration as the `iterate` operation.
    pub fn with_reporter(mut self, reporter: Reporter) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Stop iterating once the listener observes a shutdown.
    pub fn with_shutdown_listener(mut self, shutdown_listener: DelegatedShutdownListener) -> Self {
        self.shutdown_listener = Some(shutdown_listener);
        self
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn result(&self) -> &WorkerResult {
        &self.result
    }

    /// Run the scenario's per-worker setup.
    ///
    /// A failure is fatal to this worker. It is recorded in the result and the worker moves to
    /// [WorkerState::Failed] so that [ScenarioRunner::run] does nothing.
    pub fn prepare(&mut self) {
        if self.state != WorkerState::Created {
            log::warn!(
                "Ignoring prepare for {} in state {:?}",
                self.worker_id,
                self.state
            );
            return;
        }

        let outcome = guard_panic("prepare", || self.scenario.prepare());
        self.state = WorkerState::Prepared;
        if let Err(e) = outcome {
            log::error!("Prepare failed for {}: {:?}", self.worker_id, e);
            self.result.fatal_error = Some(format!("prepare failed: {e:#}"));
            self.state = WorkerState::Failed;
        }
    }

    /// Iterate until the bound is reached, a fatal error occurs or a shutdown is requested.
    pub fn run(&mut self, bound: Bound) {
        if self.state != WorkerState::Prepared {
            log::debug!(
                "Not running {} because it is in state {:?}",
                self.worker_id,
                self.state
            );
            return;
        }
        self.state = WorkerState::Running;
        log::debug!("Starting {} with {:?}", self.worker_id, bound);

        let started = Instant::now();
        let mut iteration = 0;
        loop {
            let bound_reached = match bound {
                Bound::Iterations(n) => iteration >= n,
                Bound::Duration(d) => started.elapsed() >= d,
            };
            if bound_reached {
                break;
            }
            if self
                .shutdown_listener
                .as_ref()
                .is_some_and(DelegatedShutdownListener::should_shutdown)
            {
                log::debug!("Stopping {} after {} iterations", self.worker_id, iteration);
                break;
            }

            iteration += 1;
            let operation_record = OperationRecord::new("iterate");
            let outcome = guard_panic("iterate", || self.scenario.iterate(iteration));
            if let Some(reporter) = &self.reporter {
                report_operation(reporter, operation_record, &outcome);
            }

            match outcome {
                Ok(()) => {}
                Err(e) if e.is::<ShutdownSignalError>() => {
                    log::debug!("{} interrupted by shutdown", self.worker_id);
                    break;
                }
                Err(e) if is_recoverable(&*e) => {
                    self.result.recoverable_errors += 1;
                    log::warn!(
                        "{} iteration {} failed with a data error: {:#}",
                        self.worker_id,
                        iteration,
                        e
                    );
                }
                Err(e) => {
                    log::error!(
                        "{} stopped by a fatal error in iteration {}: {:?}",
                        self.worker_id,
                        iteration,
                        e
                    );
                    self.result.fatal_error = Some(format!("{e:#}"));
                    break;
                }
            }
        }

        self.result.elapsed = started.elapsed();
        self.result.iterations = iteration;
        self.state = if self.result.is_failed() {
            WorkerState::Failed
        } else {
            WorkerState::Completed
        };
    }

    /// Run the scenario's per-worker teardown. Errors are logged and never raised.
    pub fn cleanup(&mut self) {
        if !matches!(self.state, WorkerState::Completed | WorkerState::Failed) {
            log::warn!(
                "Ignoring cleanup for {} in state {:?}",
                self.worker_id,
                self.state
            );
            return;
        }
        if let Err(e) = guard_panic("cleanup", || self.scenario.cleanup()) {
            log::error!("Cleanup failed for {}: {:?}", self.worker_id, e);
        }
        self.state = WorkerState::CleanedUp;
    }

    /// Prepare, run and clean up, then hand back the scenario instance and the final result.
    pub fn execute(mut self, bound: Bound) -> (Box<dyn Scenario>, WorkerResult) {
        self.prepare();
        self.run(bound);
        self.cleanup();
        self.into_parts()
    }

    pub fn into_parts(self) -> (Box<dyn Scenario>, WorkerResult) {
        (self.scenario, self.result)
    }
}

/// Run a scenario hook, turning a panic into a fatal error so the worker can still clean up.
fn guard_panic(hook: &str, f: impl FnOnce() -> anyhow::Result<()>) -> anyhow::Result<()> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(outcome) => outcome,
        Err(panic) => Err(anyhow::anyhow!(
            "panicked in {hook}: {}",
            panic_message(panic.as_ref())
        )),
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

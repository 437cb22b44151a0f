use std::fmt::Debug;
use std::sync::Arc;

use anyhow::Context;
use replibench_core::prelude::{Connection, ConnectionProvider, ShutdownHandle};
use replibench_instruments::Reporter;

use crate::config::RunConfiguration;

/// State shared by every worker of one run.
pub struct RunnerContext {
    config: RunConfiguration,
    connections: Arc<dyn ConnectionProvider>,
    reporter: Reporter,
    shutdown_handle: ShutdownHandle,
}

impl RunnerContext {
    pub fn new(
        config: RunConfiguration,
        connections: Arc<dyn ConnectionProvider>,
        reporter: Reporter,
        shutdown_handle: ShutdownHandle,
    ) -> Self {
        Self {
            config,
            connections,
            reporter,
            shutdown_handle,
        }
    }

    pub fn config(&self) -> &RunConfiguration {
        &self.config
    }

    pub fn connections(&self) -> &Arc<dyn ConnectionProvider> {
        &self.connections
    }

    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    pub fn shutdown_handle(&self) -> &ShutdownHandle {
        &self.shutdown_handle
    }

    /// Stop every worker after its current iteration.
    pub fn force_stop_run(&self) {
        self.shutdown_handle.shutdown();
    }
}

impl Debug for RunnerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunnerContext")
            .field("config", &self.config)
            .field("reporter", &self.reporter)
            .finish_non_exhaustive()
    }
}

/// What a scenario instance sees of the run it belongs to.
#[derive(Debug, Clone)]
pub struct WorkerContext {
    worker_index: usize,
    worker_id: String,
    runner_context: Arc<RunnerContext>,
}

impl WorkerContext {
    pub fn new(worker_index: usize, runner_context: Arc<RunnerContext>) -> Self {
        Self {
            worker_index,
            worker_id: format!("worker-{worker_index}"),
            runner_context,
        }
    }

    /// Zero based index of the worker. Worker 0 runs the global hooks.
    pub fn worker_index(&self) -> usize {
        self.worker_index
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    pub fn config(&self) -> &RunConfiguration {
        self.runner_context.config()
    }

    pub fn reporter(&self) -> &Reporter {
        self.runner_context.reporter()
    }

    pub fn runner_context(&self) -> &Arc<RunnerContext> {
        &self.runner_context
    }

    /// Open a connection to the endpoint named by the run configuration.
    pub fn connect(&self) -> anyhow::Result<Box<dyn Connection>> {
        let endpoint = self.config().endpoint()?;
        let connection = self
            .runner_context
            .connections()
            .open(&endpoint)
            .with_context(|| format!("{} failed to connect to {}", self.worker_id, endpoint.url))?;
        Ok(connection)
    }
}

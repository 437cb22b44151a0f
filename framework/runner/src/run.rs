use std::sync::Arc;

use anyhow::Context;
use replibench_core::prelude::{ConnectionProvider, ShutdownHandle};
use replibench_instruments::ReportConfig;
use replibench_summary_model::{RunSummary, WorkerResult};

use crate::bound::Bound;
use crate::config::{RunConfiguration, RunSet};
use crate::context::{RunnerContext, WorkerContext};
use crate::definition::{Scenario, ScenarioRegistry};
use crate::lag::{join_lag_monitor, start_lag_monitor, LagMonitorSettings};
use crate::monitor::start_monitor;
use crate::progress::start_progress;
use crate::report::ReportSink;
use crate::shutdown::start_shutdown_listener;
use crate::types::BenchResult;
use crate::worker::{panic_message, ScenarioRunner};

/// Runs benchmark configurations against scenarios from a registry.
pub struct Benchmark {
    registry: ScenarioRegistry,
    connections: Arc<dyn ConnectionProvider>,
    runtime: tokio::runtime::Runtime,
    shutdown_handle: ShutdownHandle,
    no_progress: bool,
    summary_table: bool,
}

impl Benchmark {
    pub fn new(
        registry: ScenarioRegistry,
        connections: Arc<dyn ConnectionProvider>,
    ) -> BenchResult<Self> {
        let runtime = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
        Ok(Self {
            registry,
            connections,
            runtime,
            shutdown_handle: ShutdownHandle::new(),
            no_progress: false,
            summary_table: false,
        })
    }

    /// Stop the current run, and skip any remaining runs, when Ctrl-C is pressed.
    pub fn with_ctrl_c(self) -> Self {
        start_shutdown_listener(&self.runtime, self.shutdown_handle.clone());
        self
    }

    /// Hide the progress bar shown during duration bound runs.
    pub fn with_no_progress(mut self, no_progress: bool) -> Self {
        self.no_progress = no_progress;
        self
    }

    /// Print a table of iteration timings after each run.
    pub fn with_summary_table(mut self, summary_table: bool) -> Self {
        self.summary_table = summary_table;
        self
    }

    /// Triggering this handle stops the current run after each worker's current iteration and
    /// prevents any further runs.
    pub fn shutdown_handle(&self) -> &ShutdownHandle {
        &self.shutdown_handle
    }

    pub fn registry(&self) -> &ScenarioRegistry {
        &self.registry
    }

    /// Run one configuration.
    ///
    /// Fails only if the configuration is invalid or a scenario's initialize or global prepare hook
    /// fails, in which case no worker is started. Errors in any other hook are recorded in the
    /// worker results of the returned summary.
    pub fn run(&self, config: &RunConfiguration) -> BenchResult<RunSummary> {
        let scenario_name = config.scenario()?.to_string();
        let bound = config.bound()?;
        let threads = config.threads()?;
        let factory = self.registry.get(&scenario_name)?;

        log::info!("Running scenario: {scenario_name} with {threads} workers, {bound:?}");

        let reporter = if self.summary_table {
            ReportConfig::default().enable_summary().init()
        } else {
            ReportConfig::default().init()
        };

        // Each run gets its own handle since the signal is sticky. The benchmark handle forwards to it.
        let run_shutdown = ShutdownHandle::new();

        let lag_monitor = match LagMonitorSettings::apply(config)? {
            Some(settings) => Some(start_lag_monitor(
                settings,
                config,
                self.connections.as_ref(),
                reporter.clone(),
                run_shutdown.new_listener(),
            )?),
            None => None,
        };

        let forward = {
            let mut listener = self.shutdown_handle.new_listener();
            let run_shutdown = run_shutdown.clone();
            self.runtime.spawn(async move {
                listener.wait_for_shutdown().await;
                run_shutdown.shutdown();
            })
        };

        let runner_context = Arc::new(RunnerContext::new(
            config.clone(),
            self.connections.clone(),
            reporter.clone(),
            run_shutdown.clone(),
        ));

        let started_at = chrono::Utc::now().timestamp();
        let outcome = self.run_workers(
            &scenario_name,
            factory.instantiate(threads),
            threads,
            bound,
            runner_context,
        );

        run_shutdown.shutdown();
        forward.abort();
        if let Some(handle) = lag_monitor {
            join_lag_monitor(handle);
        }

        let results = outcome?;
        reporter.finalize();

        let summary = RunSummary::new(
            nanoid::nanoid!(),
            scenario_name,
            started_at,
            config.inputs(),
            results,
            env!("CARGO_PKG_VERSION").to_string(),
        );
        log::info!(
            "Run {} finished: {} iterations in {:.3}s, {:.2} ops/s, {} data errors, {} failed workers",
            summary.run_id,
            summary.totals.total_iterations,
            summary.totals.total_elapsed.as_secs_f64(),
            summary.totals.avg_ops_per_sec,
            summary.totals.recoverable_errors,
            summary.totals.fatal_errors,
        );

        Ok(summary)
    }

    fn run_workers(
        &self,
        scenario_name: &str,
        mut scenarios: Vec<Box<dyn Scenario>>,
        threads: usize,
        bound: Bound,
        runner_context: Arc<RunnerContext>,
    ) -> BenchResult<Vec<WorkerResult>> {
        if scenarios.len() != threads {
            anyhow::bail!(
                "Scenario {scenario_name} created {} instances for {threads} workers",
                scenarios.len()
            );
        }

        for (worker_index, scenario) in scenarios.iter_mut().enumerate() {
            let ctx = WorkerContext::new(worker_index, runner_context.clone());
            scenario
                .initialize(&ctx)
                .with_context(|| format!("Failed to initialize {}", ctx.worker_id()))?;
        }

        // Worker 0 owns the global hooks.
        if let Some(first) = scenarios.first_mut() {
            first.global_prepare().context("Global prepare failed")?;
        }

        let shutdown_handle = runner_context.shutdown_handle();
        if let Some(planned_runtime) = bound.planned_duration() {
            if !self.no_progress {
                start_progress(planned_runtime, shutdown_handle.new_listener());
            }
        }
        // Report high usage by the harness which might lead to a misleading outcome.
        start_monitor(shutdown_handle.new_listener());

        let mut handles = Vec::with_capacity(threads);
        for (worker_index, scenario) in scenarios.into_iter().enumerate() {
            let worker_id = format!("worker-{worker_index}");
            let runner = ScenarioRunner::new(worker_id.clone(), scenario)
                .with_reporter(runner_context.reporter().clone())
                .with_shutdown_listener(shutdown_handle.new_listener());

            handles.push((
                worker_id.clone(),
                std::thread::Builder::new()
                    .name(worker_id)
                    .spawn(move || runner.execute(bound))
                    .expect("Failed to spawn thread for worker"),
            ));
        }

        let mut results = Vec::with_capacity(threads);
        let mut first_scenario = None;
        for (worker_index, (worker_id, handle)) in handles.into_iter().enumerate() {
            match handle.join() {
                Ok((scenario, result)) => {
                    if worker_index == 0 {
                        first_scenario = Some(scenario);
                    }
                    results.push(result);
                }
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    log::error!("Error joining thread for {worker_id}: {message}");
                    results.push(WorkerResult::failed_before_start(
                        worker_id,
                        format!("worker panicked: {message}"),
                    ));
                }
            }
        }

        match first_scenario {
            Some(mut scenario) => {
                // Best effort, the run has already produced its results.
                if let Err(e) = scenario.global_cleanup() {
                    log::error!("Global cleanup failed: {:?}", e);
                }
            }
            None => log::warn!("Skipping global cleanup because worker-0 did not finish cleanly"),
        }

        Ok(results)
    }

    /// Run every configuration of a run set in order.
    ///
    /// Each completed run's output keys are recorded before the configuration is passed to the
    /// sinks. Every sink is cleaned up once at the end, including when a run fails.
    pub fn run_all(
        &self,
        runs: RunSet,
        sinks: &mut [Box<dyn ReportSink>],
    ) -> BenchResult<Vec<RunSummary>> {
        let total = runs.len();
        let mut summaries = Vec::with_capacity(total);
        let outcome = self.run_each(runs, sinks, &mut summaries);

        let mut cleanup_error = None;
        for sink in sinks.iter_mut() {
            if let Err(e) = sink.cleanup() {
                log::error!("Report sink cleanup failed: {:?}", e);
                cleanup_error.get_or_insert(e);
            }
        }

        outcome?;
        if let Some(e) = cleanup_error {
            return Err(e);
        }
        log::info!("Completed {} of {total} runs", summaries.len());
        Ok(summaries)
    }

    fn run_each(
        &self,
        runs: RunSet,
        sinks: &mut [Box<dyn ReportSink>],
        summaries: &mut Vec<RunSummary>,
    ) -> BenchResult<()> {
        let total = runs.len();
        for (index, mut config) in runs.into_iter().enumerate() {
            if self.shutdown_handle.is_shutdown() {
                log::warn!("Shutdown requested, skipping the remaining {} runs", total - index);
                break;
            }
            log::info!("Starting run {} of {total}", index + 1);

            let summary = self
                .run(&config)
                .with_context(|| format!("Run {} of {total} failed", index + 1))?;
            config.record_summary(&summary)?;
            for sink in sinks.iter_mut() {
                sink.result_generated(&config, &summary)?;
            }
            summaries.push(summary);
        }
        Ok(())
    }
}

impl std::fmt::Debug for Benchmark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Benchmark")
            .field("registry", &self.registry)
            .field("no_progress", &self.no_progress)
            .field("summary_table", &self.summary_table)
            .finish_non_exhaustive()
    }
}

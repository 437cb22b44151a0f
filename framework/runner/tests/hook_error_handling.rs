use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use replibench_core::prelude::{Connection, ConnectionProvider, DbError, DbErrorKind, Endpoint};
use replibench_runner::prelude::{
    Benchmark, HookResult, RunConfiguration, RunnerContext, Scenario, ScenarioRegistry,
    WorkerContext,
};

struct NoConnections;

impl ConnectionProvider for NoConnections {
    fn open(&self, endpoint: &Endpoint) -> Result<Box<dyn Connection>, DbError> {
        Err(DbError::connectivity(format!("no database at {}", endpoint.url)))
    }
}

/// Which hook should fail, and how.
#[derive(Clone, Copy, Default, PartialEq)]
enum Failure {
    #[default]
    None,
    Initialize,
    GlobalPrepare,
    Prepare,
    IterateFatal,
    IterateRecoverable,
    Cleanup,
    GlobalCleanup,
    Panic,
    PreparePanic,
}

#[derive(Default)]
struct Calls {
    global_prepare: AtomicUsize,
    prepare: AtomicUsize,
    iterations: AtomicU64,
    cleanup: AtomicUsize,
    global_cleanup: AtomicUsize,
}

struct Recording {
    failure: Failure,
    failing_worker: Option<usize>,
    worker: usize,
    calls: Arc<Calls>,
}

impl Recording {
    fn fails(&self, failure: Failure) -> bool {
        self.failure == failure && self.failing_worker.map_or(true, |w| w == self.worker)
    }
}

impl Scenario for Recording {
    fn initialize(&mut self, ctx: &WorkerContext) -> HookResult {
        self.worker = ctx.worker_index();
        if self.fails(Failure::Initialize) {
            anyhow::bail!("Error in initialize hook");
        }
        Ok(())
    }

    fn global_prepare(&mut self) -> HookResult {
        self.calls.global_prepare.fetch_add(1, Ordering::SeqCst);
        if self.fails(Failure::GlobalPrepare) {
            anyhow::bail!("Error in global prepare hook");
        }
        Ok(())
    }

    fn prepare(&mut self) -> HookResult {
        self.calls.prepare.fetch_add(1, Ordering::SeqCst);
        if self.fails(Failure::Prepare) {
            anyhow::bail!("Error in prepare hook");
        }
        if self.fails(Failure::PreparePanic) {
            panic!("Panic in prepare hook");
        }
        Ok(())
    }

    fn iterate(&mut self, _iteration: u64) -> HookResult {
        self.calls.iterations.fetch_add(1, Ordering::SeqCst);
        if self.fails(Failure::IterateFatal) {
            anyhow::bail!("Error in iterate hook");
        }
        if self.fails(Failure::IterateRecoverable) {
            return Err(DbError::new(DbErrorKind::ConstraintViolation, "duplicate key").into());
        }
        if self.fails(Failure::Panic) {
            panic!("Panic in iterate hook");
        }
        Ok(())
    }

    fn cleanup(&mut self) -> HookResult {
        self.calls.cleanup.fetch_add(1, Ordering::SeqCst);
        if self.fails(Failure::Cleanup) {
            anyhow::bail!("Error in cleanup hook");
        }
        Ok(())
    }

    fn global_cleanup(&mut self) -> HookResult {
        self.calls.global_cleanup.fetch_add(1, Ordering::SeqCst);
        if self.fails(Failure::GlobalCleanup) {
            anyhow::bail!("Error in global cleanup hook");
        }
        Ok(())
    }
}

fn recording_benchmark(failure: Failure, failing_worker: Option<usize>) -> (Benchmark, Arc<Calls>) {
    let calls = Arc::new(Calls::default());
    let shared = calls.clone();
    let registry = ScenarioRegistry::new().with_scenario("recording", move |worker: usize| {
        Box::new(Recording {
            failure,
            failing_worker,
            worker,
            calls: shared.clone(),
        }) as Box<dyn Scenario>
    });
    let benchmark = Benchmark::new(registry, Arc::new(NoConnections))
        .unwrap()
        .with_no_progress(true);
    (benchmark, calls)
}

fn config(iterations: u64, threads: usize) -> RunConfiguration {
    RunConfiguration::from_pairs([
        ("scenario", "recording".to_string()),
        ("bound", "iterations".to_string()),
        ("iterations", iterations.to_string()),
        ("threads", threads.to_string()),
    ])
    .unwrap()
}

#[test]
fn all_workers_complete_their_iterations() {
    let (benchmark, calls) = recording_benchmark(Failure::None, None);

    let summary = benchmark.run(&config(5, 2)).unwrap();

    assert_eq!(10, summary.totals.total_iterations);
    assert_eq!(0, summary.totals.fatal_errors);
    assert_eq!(2, summary.worker_count());
    assert_eq!(1, calls.global_prepare.load(Ordering::SeqCst));
    assert_eq!(2, calls.prepare.load(Ordering::SeqCst));
    assert_eq!(2, calls.cleanup.load(Ordering::SeqCst));
    assert_eq!(1, calls.global_cleanup.load(Ordering::SeqCst));
    assert_eq!(Some(&"recording".to_string()), summary.config.get("scenario"));
}

#[test]
fn propagate_error_in_initialize_hook() {
    let (benchmark, calls) = recording_benchmark(Failure::Initialize, Some(1));

    let result = benchmark.run(&config(5, 2));

    let err = result.unwrap_err();
    assert_eq!("Failed to initialize worker-1", err.to_string());
    assert_eq!("Error in initialize hook", err.root_cause().to_string());
    assert_eq!(0, calls.global_prepare.load(Ordering::SeqCst));
    assert_eq!(0, calls.prepare.load(Ordering::SeqCst));
}

#[test]
fn propagate_error_in_global_prepare_hook() {
    let (benchmark, calls) = recording_benchmark(Failure::GlobalPrepare, None);

    let result = benchmark.run(&config(5, 3));

    assert!(result.is_err());
    assert_eq!(1, calls.global_prepare.load(Ordering::SeqCst));
    assert_eq!(0, calls.prepare.load(Ordering::SeqCst));
    assert_eq!(0, calls.iterations.load(Ordering::SeqCst));
}

#[test]
fn capture_error_in_prepare_hook() {
    let (benchmark, calls) = recording_benchmark(Failure::Prepare, Some(0));

    let summary = benchmark.run(&config(4, 2)).unwrap();

    assert_eq!(1, summary.totals.fatal_errors);
    assert_eq!(4, summary.totals.total_iterations);
    assert_eq!(0, summary.workers[0].iterations);
    assert!(summary.workers[0].is_failed());
    // Cleanup runs for the failed worker too.
    assert_eq!(2, calls.cleanup.load(Ordering::SeqCst));
    assert_eq!(1, calls.global_cleanup.load(Ordering::SeqCst));
}

#[test]
fn fatal_iterate_error_does_not_stop_siblings() {
    let (benchmark, _) = recording_benchmark(Failure::IterateFatal, Some(1));

    let summary = benchmark.run(&config(5, 3)).unwrap();

    assert_eq!(1, summary.totals.fatal_errors);
    assert_eq!(1, summary.workers[1].iterations);
    assert_eq!(
        Some("Error in iterate hook".to_string()),
        summary.workers[1].fatal_error
    );
    assert_eq!(11, summary.totals.total_iterations);
}

#[test]
fn recoverable_errors_are_counted_and_iteration_continues() {
    let (benchmark, _) = recording_benchmark(Failure::IterateRecoverable, None);

    let summary = benchmark.run(&config(6, 2)).unwrap();

    assert_eq!(12, summary.totals.total_iterations);
    assert_eq!(12, summary.totals.recoverable_errors);
    assert_eq!(0, summary.totals.fatal_errors);
}

#[test]
fn capture_error_in_cleanup_hooks() {
    let (benchmark, calls) = recording_benchmark(Failure::Cleanup, None);
    let summary = benchmark.run(&config(2, 2)).unwrap();
    assert_eq!(0, summary.totals.fatal_errors);
    assert_eq!(1, calls.global_cleanup.load(Ordering::SeqCst));

    let (benchmark, _) = recording_benchmark(Failure::GlobalCleanup, None);
    let summary = benchmark.run(&config(2, 2)).unwrap();
    assert_eq!(4, summary.totals.total_iterations);
}

#[test]
fn panicking_worker_is_recorded_as_failed() {
    let (benchmark, calls) = recording_benchmark(Failure::Panic, Some(0));

    let summary = benchmark.run(&config(3, 2)).unwrap();

    assert_eq!(1, summary.totals.fatal_errors);
    assert!(summary.workers[0]
        .fatal_error
        .as_deref()
        .is_some_and(|e| e.contains("Panic in iterate hook")));
    assert_eq!(1, summary.workers[0].iterations);
    assert_eq!(3, summary.workers[1].iterations);
    // The panicking worker still cleans up and hands back its instance for global cleanup.
    assert_eq!(2, calls.cleanup.load(Ordering::SeqCst));
    assert_eq!(1, calls.global_cleanup.load(Ordering::SeqCst));
}

#[test]
fn panic_in_prepare_hook_is_recorded_as_failed() {
    let (benchmark, calls) = recording_benchmark(Failure::PreparePanic, Some(1));

    let summary = benchmark.run(&config(3, 2)).unwrap();

    assert_eq!(1, summary.totals.fatal_errors);
    assert_eq!(0, summary.workers[1].iterations);
    assert!(summary.workers[1]
        .fatal_error
        .as_deref()
        .is_some_and(|e| e.contains("Panic in prepare hook")));
    assert_eq!(3, summary.totals.total_iterations);
    assert_eq!(2, calls.cleanup.load(Ordering::SeqCst));
    assert_eq!(1, calls.global_cleanup.load(Ordering::SeqCst));
}

#[test]
fn unreachable_lag_monitor_replica_fails_the_run() {
    let (benchmark, calls) = recording_benchmark(Failure::None, None);
    let config = RunConfiguration::from_pairs([
        ("scenario", "recording"),
        ("url", "sqlite:primary.db"),
        ("monitorReplicaUrl", "sqlite:replica.db"),
    ])
    .unwrap();

    let err = benchmark.run(&config).unwrap_err();

    assert!(err.to_string().contains("Lag monitor failed to connect"));
    assert_eq!(0, calls.global_prepare.load(Ordering::SeqCst));
    assert_eq!(0, calls.prepare.load(Ordering::SeqCst));
}

#[test]
fn force_stop_ends_the_run_early() {
    struct Stopper(Option<Arc<RunnerContext>>, Arc<AtomicU64>);

    impl Scenario for Stopper {
        fn initialize(&mut self, ctx: &WorkerContext) -> HookResult {
            self.0 = Some(ctx.runner_context().clone());
            Ok(())
        }

        fn prepare(&mut self) -> HookResult {
            Ok(())
        }

        fn iterate(&mut self, iteration: u64) -> HookResult {
            self.1.fetch_add(1, Ordering::SeqCst);
            if iteration == 3 {
                if let Some(runner_context) = &self.0 {
                    runner_context.force_stop_run();
                }
            }
            Ok(())
        }

        fn cleanup(&mut self) -> HookResult {
            Ok(())
        }
    }

    let iterations = Arc::new(AtomicU64::new(0));
    let counted = iterations.clone();
    let registry = ScenarioRegistry::new().with_scenario("stopper", move |_worker: usize| {
        Box::new(Stopper(None, counted.clone())) as Box<dyn Scenario>
    });
    let benchmark = Benchmark::new(registry, Arc::new(NoConnections)).unwrap();
    let config = RunConfiguration::from_pairs([
        ("scenario", "stopper"),
        ("bound", "iterations"),
        ("iterations", "1000"),
    ])
    .unwrap();

    let summary = benchmark.run(&config).unwrap();

    assert_eq!(3, summary.totals.total_iterations);
    assert_eq!(0, summary.totals.fatal_errors);
    assert_eq!(3, iterations.load(Ordering::SeqCst));
    // The stop only affects the run it was requested in.
    assert!(!benchmark.shutdown_handle().is_shutdown());
}

#[test]
fn unknown_scenario() {
    let (benchmark, _) = recording_benchmark(Failure::None, None);
    let config = RunConfiguration::from_pairs([("scenario", "missing")]).unwrap();
    assert!(benchmark.run(&config).is_err());
}

#[test]
fn scenario_can_see_configuration() {
    let seen = Arc::new(Mutex::new(None));
    let captured = seen.clone();

    struct Reader(Arc<Mutex<Option<String>>>);

    impl Scenario for Reader {
        fn initialize(&mut self, ctx: &WorkerContext) -> HookResult {
            *self.0.lock() = ctx.config().get_opt("tables").map(str::to_string);
            // No database behind this run.
            assert!(ctx.connect().is_err());
            Ok(())
        }

        fn prepare(&mut self) -> HookResult {
            Ok(())
        }

        fn iterate(&mut self, _iteration: u64) -> HookResult {
            Ok(())
        }

        fn cleanup(&mut self) -> HookResult {
            Ok(())
        }
    }

    let registry = ScenarioRegistry::new().with_scenario("reader", move |_worker: usize| {
        Box::new(Reader(captured.clone())) as Box<dyn Scenario>
    });
    let benchmark = Benchmark::new(registry, Arc::new(NoConnections)).unwrap();
    let config = RunConfiguration::from_pairs([
        ("scenario", "reader"),
        ("tables", "4"),
        ("url", "sqlite::memory:"),
    ])
    .unwrap();

    benchmark.run(&config).unwrap();

    assert_eq!(Some("4".to_string()), *seen.lock());
}

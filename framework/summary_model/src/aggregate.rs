use crate::WorkerResult;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Run-level metrics folded from every [WorkerResult] of a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RunTotals {
    /// Sum of iterations over all workers.
    pub total_iterations: u64,
    /// Wall-clock time of the run, the elapsed time of the slowest worker.
    ///
    /// Workers run concurrently so the sum of their elapsed times would overstate the run length.
    pub total_elapsed: Duration,
    /// Average time a worker spent on one iteration, in seconds.
    ///
    /// Computed as the sum of worker elapsed times divided by the total iterations, which makes it
    /// the mean latency seen by a single worker rather than the inverse of the throughput.
    pub avg_duration_s: f64,
    /// Iterations per second across the whole run, `total_iterations / total_elapsed`.
    pub avg_ops_per_sec: f64,
    pub recoverable_errors: u64,
    /// Number of workers that stopped because of a fatal error.
    pub fatal_errors: u64,
}

/// Fold worker results into run totals.
///
/// Never divides by zero: no iterations gives an average duration of 0 and no elapsed time gives a
/// throughput of 0.
pub fn aggregate(workers: &[WorkerResult]) -> RunTotals {
    let total_iterations = workers.iter().map(|w| w.iterations).sum::<u64>();
    let total_elapsed = workers
        .iter()
        .map(|w| w.elapsed)
        .max()
        .unwrap_or(Duration::ZERO);
    let summed_elapsed_s = workers
        .iter()
        .map(|w| w.elapsed.as_secs_f64())
        .sum::<f64>();

    let avg_duration_s = if total_iterations == 0 {
        0.0
    } else {
        summed_elapsed_s / total_iterations as f64
    };
    let avg_ops_per_sec = if total_elapsed.is_zero() {
        0.0
    } else {
        total_iterations as f64 / total_elapsed.as_secs_f64()
    };

    RunTotals {
        total_iterations,
        total_elapsed,
        avg_duration_s,
        avg_ops_per_sec,
        recoverable_errors: workers.iter().map(|w| w.recoverable_errors).sum(),
        fatal_errors: workers.iter().filter(|w| w.is_failed()).count() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn worker(iterations: u64, elapsed_ms: u64) -> WorkerResult {
        WorkerResult {
            iterations,
            elapsed: Duration::from_millis(elapsed_ms),
            ..WorkerResult::new("worker")
        }
    }

    #[test]
    fn sums_iterations_and_takes_max_elapsed() {
        let totals = aggregate(&[worker(10, 1000), worker(30, 2000), worker(20, 1500)]);

        assert_eq!(60, totals.total_iterations);
        assert_eq!(Duration::from_secs(2), totals.total_elapsed);
        assert_eq!(30.0, totals.avg_ops_per_sec);
        assert_eq!(4.5 / 60.0, totals.avg_duration_s);
    }

    #[test]
    fn no_iterations_gives_zero_metrics() {
        let totals = aggregate(&[worker(0, 500), worker(0, 700)]);

        assert_eq!(0, totals.total_iterations);
        assert_eq!(0.0, totals.avg_ops_per_sec);
        assert_eq!(0.0, totals.avg_duration_s);
    }

    #[test]
    fn no_elapsed_time_gives_zero_throughput() {
        let totals = aggregate(&[worker(5, 0)]);

        assert_eq!(0.0, totals.avg_ops_per_sec);
        assert!(totals.avg_ops_per_sec.is_finite());
    }

    #[test]
    fn empty_run() {
        assert_eq!(RunTotals::default(), aggregate(&[]));
    }

    #[test]
    fn counts_errors() {
        let mut failed = worker(3, 100);
        failed.fatal_error = Some("boom".to_string());
        failed.recoverable_errors = 2;
        let mut noisy = worker(10, 100);
        noisy.recoverable_errors = 4;

        let totals = aggregate(&[failed, noisy, worker(1, 100)]);

        assert_eq!(6, totals.recoverable_errors);
        assert_eq!(1, totals.fatal_errors);
    }
}

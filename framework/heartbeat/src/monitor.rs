use std::time::{Duration, Instant, SystemTime};

use replibench_core::prelude::DelegatedShutdownListener;
use replibench_instruments::{ReportMetric, Reporter};

use crate::error::HeartbeatError;
use crate::flusher::ReplicationFlusher;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LagMonitorOptions {
    /// Time between two heartbeats.
    pub interval: Duration,
    /// Wait after a heartbeat before reading the replica, so that a replicator that forwards the
    /// update immediately shows no lag.
    pub settle: Duration,
    /// Maximum time to wait for a replica read.
    pub read_timeout: Duration,
    /// Maximum time to wait for the replica to catch up once monitoring stops.
    pub catch_up_timeout: Duration,
}

impl Default for LagMonitorOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            settle: Duration::from_millis(100),
            read_timeout: Duration::from_secs(5),
            catch_up_timeout: Duration::from_secs(60),
        }
    }
}

/// One lag observation.
#[derive(Debug, Clone, PartialEq)]
pub struct LagSample {
    pub observed_at: SystemTime,
    /// Difference between the last heartbeat time written to the primary and the heartbeat time
    /// seen on the replica.
    pub lag: Duration,
}

/// Continuously measures replica lag while a benchmark runs.
///
/// A heartbeat time is written to the primary every interval and read back from the replica. After
/// a shutdown the monitor stops writing and waits for the replica to catch up with the last
/// heartbeat.
pub struct LagMonitor {
    flusher: ReplicationFlusher,
    options: LagMonitorOptions,
    reporter: Option<Reporter>,
}

impl LagMonitor {
    /// The flusher must already be prepared.
    pub fn new(flusher: ReplicationFlusher, options: LagMonitorOptions) -> Self {
        Self {
            flusher,
            options,
            reporter: None,
        }
    }

    pub fn with_reporter(mut self, reporter: Reporter) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Monitor until `shutdown_listener` fires, then wait for the replica to catch up.
    ///
    /// Failing to update the primary is logged and retried on the next heartbeat. A protocol
    /// violation stops the monitor.
    pub fn run(
        &mut self,
        mut shutdown_listener: DelegatedShutdownListener,
    ) -> Result<Vec<LagSample>, HeartbeatError> {
        let mut samples = Vec::new();
        let mut last_written = None;

        while !shutdown_listener.should_shutdown() {
            let cycle_started = Instant::now();
            match self.flusher.write_heartbeat() {
                Ok((_, written)) => last_written = Some(written),
                Err(HeartbeatError::Primary(e)) => {
                    log::warn!("Unable to update primary heartbeat table: {e}");
                }
                Err(e) => return Err(e),
            }

            if self.flusher.pause(self.options.settle, &mut shutdown_listener) {
                break;
            }

            if let Some(written) = last_written {
                self.observe(written, &mut samples);
            }

            let rest = self.options.interval.saturating_sub(cycle_started.elapsed());
            if self.flusher.pause(rest, &mut shutdown_listener) {
                break;
            }
        }
        log::info!("Lag monitor stopped");

        if let Some(written) = last_written {
            self.wait_for_catch_up(written, &mut samples);
        }

        Ok(samples)
    }

    fn observe(&mut self, written: i64, samples: &mut Vec<LagSample>) -> Option<i64> {
        let Some(marker) = self.flusher.read_replica(self.options.read_timeout) else {
            log::warn!("Unable to read replica heartbeat table to compute lag");
            return None;
        };

        let lag = Duration::from_millis(written.saturating_sub(marker.update_time).max(0) as u64);
        log::info!("Current replica lag in seconds: {:.3}", lag.as_secs_f64());
        if let Some(reporter) = &self.reporter {
            reporter.add_custom(ReportMetric::new("replica_lag", lag.as_secs_f64()));
        }
        samples.push(LagSample {
            observed_at: SystemTime::now(),
            lag,
        });
        Some(marker.update_time)
    }

    fn wait_for_catch_up(&mut self, last_written: i64, samples: &mut Vec<LagSample>) {
        log::info!("Waiting for replica to catch up with primary");
        let deadline = Instant::now() + self.options.catch_up_timeout;
        loop {
            if self
                .observe(last_written, samples)
                .is_some_and(|replica_time| replica_time >= last_written)
            {
                log::info!("Replica is caught up with primary");
                return;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                log::warn!(
                    "Replica did not catch up within {:?}",
                    self.options.catch_up_timeout
                );
                return;
            }
            std::thread::sleep(self.options.interval.min(remaining));
        }
    }

    /// Hand back the flusher, e.g. to clean it up.
    pub fn into_flusher(self) -> ReplicationFlusher {
        self.flusher
    }
}

impl std::fmt::Debug for LagMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LagMonitor")
            .field("flusher", &self.flusher)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

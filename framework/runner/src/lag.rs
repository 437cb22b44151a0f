use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::Context;
use replibench_core::prelude::{ConnectionProvider, DelegatedShutdownListener, Endpoint};
use replibench_heartbeat::prelude::{
    HeartbeatOptions, LagMonitor, LagMonitorOptions, LagSample, ReplicationFlusher,
};
use replibench_instruments::Reporter;

use crate::config::{ConfigError, RunConfiguration};
use crate::types::BenchResult;

/// Replica to measure lag against while the run executes. Uses the run's credentials.
pub const KEY_MONITOR_REPLICA_URL: &str = "monitorReplicaUrl";
/// Seconds to wait for the replica to catch up once the workers are done.
pub const KEY_MONITOR_CATCH_UP_TIMEOUT: &str = "monitorCatchUpTimeout";
/// Whether the replication carries `CREATE TABLE` to the replica.
pub const KEY_MONITOR_DDL_REPLICATION: &str = "monitorDdlReplication";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LagMonitorSettings {
    replica: Endpoint,
    catch_up_timeout: Duration,
    ddl_replication: bool,
}

impl LagMonitorSettings {
    /// `None` unless a replica is configured.
    pub(crate) fn apply(config: &RunConfiguration) -> Result<Option<Self>, ConfigError> {
        let Some(url) = config.get_opt(KEY_MONITOR_REPLICA_URL) else {
            return Ok(None);
        };
        let mut replica = config.endpoint()?;
        replica.url = url.to_string();

        Ok(Some(Self {
            replica,
            catch_up_timeout: Duration::from_secs(
                config.parse_or(KEY_MONITOR_CATCH_UP_TIMEOUT, 60)?,
            ),
            ddl_replication: config.flag(KEY_MONITOR_DDL_REPLICATION, true)?,
        }))
    }
}

/// Start measuring replica lag on a background thread until `shutdown_listener` fires.
///
/// Connecting and creating the heartbeat table happen before this returns, so a replica that cannot
/// be reached fails the run before any worker starts.
pub(crate) fn start_lag_monitor(
    settings: LagMonitorSettings,
    config: &RunConfiguration,
    connections: &dyn ConnectionProvider,
    reporter: Reporter,
    shutdown_listener: DelegatedShutdownListener,
) -> BenchResult<JoinHandle<Vec<LagSample>>> {
    let primary_endpoint = config.endpoint()?;
    let primary = connections
        .open(&primary_endpoint)
        .with_context(|| format!("Lag monitor failed to connect to {}", primary_endpoint.url))?;
    let replica = connections
        .open(&settings.replica)
        .with_context(|| format!("Lag monitor failed to connect to {}", settings.replica.url))?;

    let options = HeartbeatOptions {
        ddl_replication: settings.ddl_replication,
        ..Default::default()
    };
    let mut flusher = ReplicationFlusher::new(primary, replica, options)?;
    if let Err(e) = flusher.prepare() {
        flusher.cleanup();
        return Err(e).context("Failed to prepare lag monitor");
    }

    let mut monitor = LagMonitor::new(
        flusher,
        LagMonitorOptions {
            catch_up_timeout: settings.catch_up_timeout,
            ..Default::default()
        },
    )
    .with_reporter(reporter);

    let handle = std::thread::Builder::new()
        .name("lag-monitor".to_string())
        .spawn(move || {
            let samples = match monitor.run(shutdown_listener) {
                Ok(samples) => samples,
                Err(e) => {
                    log::error!("Lag monitor stopped: {e}");
                    Vec::new()
                }
            };
            monitor.into_flusher().cleanup();
            samples
        })
        .expect("Failed to start lag monitor thread");

    Ok(handle)
}

/// Wait for the monitor to finish and log the worst lag it saw.
pub(crate) fn join_lag_monitor(handle: JoinHandle<Vec<LagSample>>) -> Vec<LagSample> {
    match handle.join() {
        Ok(samples) => {
            if let Some(max) = samples.iter().map(|s| s.lag).max() {
                log::info!(
                    "Maximum replica lag over {} samples: {:.3}s",
                    samples.len(),
                    max.as_secs_f64()
                );
            }
            samples
        }
        Err(_) => {
            log::error!("Lag monitor thread panicked");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn no_replica_no_monitor() {
        let config = RunConfiguration::from_pairs([("url", "sqlite::memory:")]).unwrap();
        assert_eq!(None, LagMonitorSettings::apply(&config).unwrap());
    }

    #[test]
    fn replica_uses_run_credentials() {
        let config = RunConfiguration::from_pairs([
            ("url", "sqlite:primary.db"),
            ("user", "bench"),
            ("monitorReplicaUrl", "sqlite:replica.db"),
            ("monitorCatchUpTimeout", "5"),
            ("monitorDdlReplication", "false"),
        ])
        .unwrap();

        let settings = LagMonitorSettings::apply(&config).unwrap().unwrap();
        assert_eq!("sqlite:replica.db", settings.replica.url);
        assert_eq!(Some("bench".to_string()), settings.replica.user);
        assert_eq!(Duration::from_secs(5), settings.catch_up_timeout);
        assert!(!settings.ddl_replication);
    }

    #[test]
    fn replica_requires_primary() {
        let config =
            RunConfiguration::from_pairs([("monitorReplicaUrl", "sqlite:replica.db")]).unwrap();
        assert!(matches!(
            LagMonitorSettings::apply(&config),
            Err(ConfigError::MissingValue(_))
        ));
    }
}

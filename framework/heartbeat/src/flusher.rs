use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use parking_lot::Mutex;
use replibench_core::prelude::{
    Connection, DbError, DbErrorKind, DelegatedShutdownListener, Value,
};
use replibench_instruments::{report_operation, OperationRecord, ReportMetric, Reporter};
use tokio::runtime::Runtime;

use crate::error::HeartbeatError;
use crate::sql::HeartbeatSql;
use crate::state::{epoch_millis, HeartbeatOptions, HeartbeatState};

type SharedConnection = Arc<Mutex<Box<dyn Connection>>>;

/// Outcome of one [ReplicationFlusher::flush_with_report].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushReport {
    /// The sequence number written to the primary.
    pub seqno: u64,
    /// Whether the replica reached `seqno` before the deadline.
    pub flushed: bool,
    /// Time from the primary update to the first poll that observed `seqno`.
    pub lag: Option<Duration>,
    pub polls: u32,
    /// Polls that errored, timed out or found the replica connection still busy.
    pub failed_polls: u32,
}

/// The marker row as read from the replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ReplicaMarker {
    pub seqno: i64,
    pub update_time: i64,
}

/// Verifies that a replica has caught up with a primary by writing an increasing sequence number to
/// a marker table on the primary and polling for it on the replica.
pub struct ReplicationFlusher {
    primary: Box<dyn Connection>,
    replica: SharedConnection,
    options: HeartbeatOptions,
    sql: HeartbeatSql,
    state: HeartbeatState,
    runtime: Runtime,
    reporter: Option<Reporter>,
    shutdown_listener: Option<DelegatedShutdownListener>,
}

impl ReplicationFlusher {
    pub fn new(
        primary: Box<dyn Connection>,
        replica: Box<dyn Connection>,
        options: HeartbeatOptions,
    ) -> Result<Self, HeartbeatError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()?;
        let state = HeartbeatState::new_session();
        log::debug!("Starting heartbeat session with key {}", state.session_key);

        Ok(Self {
            primary,
            replica: Arc::new(Mutex::new(replica)),
            sql: HeartbeatSql::new(&options.table),
            options,
            state,
            runtime,
            reporter: None,
            shutdown_listener: None,
        })
    }

    /// Use a fixed session key rather than a random one.
    pub fn with_session_key(mut self, session_key: i64) -> Self {
        self.state = HeartbeatState::with_session_key(session_key);
        self
    }

    /// Report each flush as the `flush` operation and each observed lag as `replica_lag`.
    pub fn with_reporter(mut self, reporter: Reporter) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Abandon a flush in progress, as not flushed, when a shutdown is requested.
    pub fn with_shutdown_listener(mut self, shutdown_listener: DelegatedShutdownListener) -> Self {
        self.shutdown_listener = Some(shutdown_listener);
        self
    }

    pub fn state(&self) -> &HeartbeatState {
        &self.state
    }

    pub fn options(&self) -> &HeartbeatOptions {
        &self.options
    }

    /// Recreate the marker table and insert this session's row with sequence number 0.
    pub fn prepare(&mut self) -> Result<(), HeartbeatError> {
        log::info!("Creating primary heartbeat table: {}", self.options.table);
        self.primary
            .execute(&self.sql.drop)
            .and_then(|_| self.primary.execute(&self.sql.create))
            .map_err(HeartbeatError::Setup)?;

        if !self.options.ddl_replication {
            log::info!("Creating replica heartbeat table: {}", self.options.table);
            let mut replica = self.replica.lock();
            replica
                .execute(&self.sql.drop)
                .and_then(|_| replica.execute(&self.sql.create))
                .map_err(HeartbeatError::Setup)?;
        }

        let now = SystemTime::now();
        self.primary
            .execute_update(
                &self.sql.insert,
                &[
                    Value::from(self.state.session_key),
                    Value::from(self.state.current_seqno as i64),
                    Value::from(epoch_millis(now)),
                ],
            )
            .map_err(HeartbeatError::Setup)?;
        self.state.last_written = Some(now);
        Ok(())
    }

    /// Write the next sequence number and wait up to `timeout` for the replica to reach it.
    ///
    /// Returns false if the replica did not catch up in time. Fails only if the primary could not
    /// be updated.
    pub fn flush(&mut self, timeout: Duration) -> Result<bool, HeartbeatError> {
        Ok(self.flush_with_report(timeout)?.flushed)
    }

    pub fn flush_with_report(&mut self, timeout: Duration) -> Result<FlushReport, HeartbeatError> {
        let operation_record = OperationRecord::new("flush");
        let outcome = self.flush_inner(timeout);
        if let Some(reporter) = &self.reporter {
            report_operation(reporter, operation_record, &outcome);
            if let Ok(FlushReport { lag: Some(lag), .. }) = &outcome {
                reporter.add_custom(
                    ReportMetric::new("replica_lag", lag.as_secs_f64())
                        .with_tag("session", self.state.session_key),
                );
            }
        }
        outcome
    }

    fn flush_inner(&mut self, timeout: Duration) -> Result<FlushReport, HeartbeatError> {
        let started = Instant::now();
        let deadline = started + timeout;
        let (seqno, _) = self.write_heartbeat()?;

        let mut report = FlushReport {
            seqno,
            flushed: false,
            lag: None,
            polls: 0,
            failed_polls: 0,
        };

        let Self {
            runtime,
            replica,
            sql,
            state,
            options,
            shutdown_listener,
            ..
        } = self;
        runtime.block_on(async {
            loop {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break;
                }

                report.polls += 1;
                match poll_replica(replica, &sql.select, state.session_key, remaining).await {
                    Ok(Some(marker)) if marker.seqno >= seqno as i64 => {
                        report.flushed = true;
                        report.lag = Some(started.elapsed());
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        report.failed_polls += 1;
                        log::debug!("Replica heartbeat poll failed: {e}");
                    }
                }

                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break;
                }
                let pause = tokio::time::sleep(options.poll_interval.min(remaining));
                match shutdown_listener.as_mut() {
                    Some(listener) => {
                        tokio::select! {
                            _ = pause => {}
                            _ = listener.wait_for_shutdown() => {
                                log::warn!("Wait for replica catch-up was interrupted");
                                break;
                            }
                        }
                    }
                    None => pause.await,
                }
            }
        });

        if report.flushed {
            log::debug!(
                "Replica reached seqno {} after {:?} and {} polls",
                seqno,
                report.lag.unwrap_or_default(),
                report.polls
            );
        } else {
            log::warn!(
                "Replica did not reach seqno {} within {:?}, {} of {} polls failed",
                seqno,
                timeout,
                report.failed_polls,
                report.polls
            );
        }
        Ok(report)
    }

    /// Write the next sequence number and the current time to the primary.
    ///
    /// Returns the sequence number and the written time in epoch milliseconds.
    pub(crate) fn write_heartbeat(&mut self) -> Result<(u64, i64), HeartbeatError> {
        let seqno = self.state.next_seqno();
        let now = SystemTime::now();
        let update_time = epoch_millis(now);

        let rows = self
            .primary
            .execute_update(
                &self.sql.update,
                &[
                    Value::from(seqno as i64),
                    Value::from(update_time),
                    Value::from(self.state.session_key),
                ],
            )
            .map_err(HeartbeatError::Primary)?;
        log::debug!(
            "Updated primary heartbeat table: id={} seqno={} update_time={} rows={}",
            self.state.session_key,
            seqno,
            update_time,
            rows
        );
        if rows == 0 {
            return Err(HeartbeatError::ProtocolViolation(format!(
                "heartbeat update for id {} in {} did not affect any rows",
                self.state.session_key, self.options.table
            )));
        }

        self.state.last_written = Some(now);
        Ok((seqno, update_time))
    }

    /// Read this session's marker row from the replica, waiting at most `timeout`.
    pub(crate) fn read_replica(&mut self, timeout: Duration) -> Option<ReplicaMarker> {
        let Self {
            runtime,
            replica,
            sql,
            state,
            ..
        } = self;
        match runtime.block_on(poll_replica(replica, &sql.select, state.session_key, timeout)) {
            Ok(marker) => marker,
            Err(e) => {
                log::debug!("Replica heartbeat read failed: {e}");
                None
            }
        }
    }

    /// Sleep for `duration` unless a shutdown is requested first. Returns true on shutdown.
    pub(crate) fn pause(
        &mut self,
        duration: Duration,
        shutdown_listener: &mut DelegatedShutdownListener,
    ) -> bool {
        self.runtime.block_on(async {
            tokio::select! {
                _ = tokio::time::sleep(duration) => false,
                _ = shutdown_listener.wait_for_shutdown() => true,
            }
        })
    }

    /// Close both connections. Errors are logged.
    ///
    /// Prefer this over dropping the flusher: dropping waits for any abandoned poll to return.
    pub fn cleanup(self) {
        let Self {
            primary,
            replica,
            runtime,
            ..
        } = self;
        if let Err(e) = primary.close() {
            log::warn!("Failed to close primary connection: {e}");
        }
        match Arc::try_unwrap(replica) {
            Ok(replica) => {
                if let Err(e) = replica.into_inner().close() {
                    log::warn!("Failed to close replica connection: {e}");
                }
            }
            Err(_) => {
                log::warn!("Replica connection is still in use by an abandoned poll, dropping it")
            }
        }
        runtime.shutdown_background();
    }
}

impl std::fmt::Debug for ReplicationFlusher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicationFlusher")
            .field("options", &self.options)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Query the marker row on the blocking pool and give up after `timeout`.
///
/// A query that outlives the timeout keeps running in the background holding the replica
/// connection. Later polls find the connection busy and fail fast rather than queueing behind it.
async fn poll_replica(
    replica: &SharedConnection,
    select: &str,
    session_key: i64,
    timeout: Duration,
) -> Result<Option<ReplicaMarker>, DbError> {
    let replica = replica.clone();
    let select = select.to_string();
    let query = tokio::task::spawn_blocking(move || {
        let Some(mut connection) = replica.try_lock() else {
            return Err(DbError::new(
                DbErrorKind::LockTimeout,
                "replica connection is busy with an earlier poll",
            ));
        };
        let rows = connection.query(&select, &[Value::from(session_key)])?;
        Ok(rows.last().and_then(|row| {
            Some(ReplicaMarker {
                seqno: row.first()?.as_i64()?,
                update_time: row.get(1).and_then(Value::as_i64).unwrap_or(-1),
            })
        }))
    });

    match tokio::time::timeout(timeout, query).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => Err(DbError::new(
            DbErrorKind::Other,
            format!("replica poll task failed: {e}"),
        )),
        Err(_) => Err(DbError::new(
            DbErrorKind::LockTimeout,
            format!("replica poll did not return within {timeout:?}"),
        )),
    }
}

use std::time::{Duration, SystemTime};

use rand::Rng;

/// Upper bound, exclusive, of the random session key.
const SESSION_KEY_RANGE: i64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatOptions {
    /// Name of the marker table, created on the primary by [crate::prelude::ReplicationFlusher::prepare].
    pub table: String,
    /// Whether the replication mechanism propagates `CREATE TABLE`. If not, the marker table is
    /// also created on the replica.
    pub ddl_replication: bool,
    /// Time between two polls of the replica.
    pub poll_interval: Duration,
}

impl Default for HeartbeatOptions {
    fn default() -> Self {
        Self {
            table: "monitor_heartbeat".to_string(),
            ddl_replication: true,
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Progress of one verification session.
///
/// The session key picks the marker row so that stale rows left by another session, or replayed by
/// a confused replicator, are never mistaken for this session's heartbeat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatState {
    pub session_key: i64,
    /// Last sequence number written to the primary. Never reused within a session.
    pub current_seqno: u64,
    pub last_written: Option<SystemTime>,
}

impl HeartbeatState {
    pub fn new_session() -> Self {
        Self::with_session_key(rand::thread_rng().gen_range(0..SESSION_KEY_RANGE))
    }

    pub fn with_session_key(session_key: i64) -> Self {
        Self {
            session_key,
            current_seqno: 0,
            last_written: None,
        }
    }

    /// Reserve the next sequence number.
    pub(crate) fn next_seqno(&mut self) -> u64 {
        self.current_seqno += 1;
        self.current_seqno
    }
}

/// Wall clock time in milliseconds since the Unix epoch, as stored in the `update_time` column.
pub(crate) fn epoch_millis(time: SystemTime) -> i64 {
    time.duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

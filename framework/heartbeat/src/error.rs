use replibench_core::prelude::DbError;

#[derive(Debug, thiserror::Error)]
pub enum HeartbeatError {
    /// The marker row was not where the session put it, so replication cannot be verified.
    #[error("Heartbeat protocol violation: {0}")]
    ProtocolViolation(String),
    #[error("Unable to update primary heartbeat table: {0}")]
    Primary(#[source] DbError),
    #[error("Unable to set up heartbeat table: {0}")]
    Setup(#[source] DbError),
    #[error("Failed to start heartbeat runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

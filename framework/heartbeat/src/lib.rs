mod error;
mod flusher;
mod monitor;
mod sql;
mod state;

pub mod prelude {
    pub use crate::error::HeartbeatError;
    pub use crate::flusher::{FlushReport, ReplicationFlusher};
    pub use crate::monitor::{LagMonitor, LagMonitorOptions, LagSample};
    pub use crate::state::{HeartbeatOptions, HeartbeatState};
}

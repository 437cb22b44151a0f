mod connection;
mod error;
mod shutdown;
mod value;

pub mod prelude {
    pub use crate::connection::{Connection, ConnectionProvider, Endpoint};
    pub use crate::error::{is_recoverable, DbError, DbErrorKind};
    pub use crate::shutdown::{DelegatedShutdownListener, ShutdownHandle, ShutdownSignalError};
    pub use crate::value::{Row, Value};
}

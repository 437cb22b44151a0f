mod connection;
mod error;
mod provider;

pub mod prelude {
    pub use crate::connection::SqliteConnection;
    pub use crate::provider::{SqliteProvider, SqliteTarget};
}

use std::path::PathBuf;
use std::time::Duration;

use replibench_core::prelude::{Connection, ConnectionProvider, DbError, Endpoint};

use crate::connection::SqliteConnection;
use crate::error::to_db_error;

/// Where a SQLite endpoint URL points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqliteTarget {
    /// A private in-memory database, one per connection.
    Memory,
    File(PathBuf),
}

impl SqliteTarget {
    /// Parse `sqlite::memory:`, `sqlite:<path>` or `sqlite://<path>`.
    pub fn parse(url: &str) -> Result<Self, DbError> {
        let rest = url
            .strip_prefix("sqlite:")
            .ok_or_else(|| DbError::connectivity(format!("not a sqlite URL: {url}")))?;
        let rest = rest.strip_prefix("//").unwrap_or(rest);
        match rest {
            ":memory:" => Ok(SqliteTarget::Memory),
            "" => Err(DbError::connectivity(format!("no database path in URL: {url}"))),
            path => Ok(SqliteTarget::File(PathBuf::from(path))),
        }
    }
}

/// Opens SQLite databases.
///
/// File databases are switched to WAL journaling so that readers do not block the writer. Lock
/// waits longer than the busy timeout fail with [replibench_core::prelude::DbErrorKind::LockTimeout].
#[derive(Debug, Clone)]
pub struct SqliteProvider {
    busy_timeout: Duration,
    wal: bool,
}

impl Default for SqliteProvider {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_secs(5),
            wal: true,
        }
    }
}

impl SqliteProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    /// Keep the default rollback journal instead of WAL.
    pub fn without_wal(mut self) -> Self {
        self.wal = false;
        self
    }

    pub fn open_sqlite(&self, endpoint: &Endpoint) -> Result<SqliteConnection, DbError> {
        let target = SqliteTarget::parse(&endpoint.url)?;
        if endpoint.user.is_some() || endpoint.schema.is_some() {
            log::debug!("SQLite ignores the user and schema of {}", endpoint.url);
        }

        let conn = match &target {
            SqliteTarget::Memory => rusqlite::Connection::open_in_memory(),
            SqliteTarget::File(path) => rusqlite::Connection::open(path),
        }
        .map_err(|e| DbError::connectivity(format!("cannot open {}: {e}", endpoint.url)))?;

        conn.busy_timeout(self.busy_timeout).map_err(to_db_error)?;
        if self.wal && matches!(target, SqliteTarget::File(_)) {
            conn.execute_batch("PRAGMA journal_mode = WAL;")
                .map_err(to_db_error)?;
        }

        log::trace!("Opened SQLite connection to {}", endpoint.url);
        Ok(SqliteConnection::new(conn))
    }
}

impl ConnectionProvider for SqliteProvider {
    fn open(&self, endpoint: &Endpoint) -> Result<Box<dyn Connection>, DbError> {
        Ok(Box::new(self.open_sqlite(endpoint)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use replibench_core::prelude::DbErrorKind;

    #[test]
    fn url_forms() {
        assert_eq!(
            SqliteTarget::Memory,
            SqliteTarget::parse("sqlite::memory:").unwrap()
        );
        assert_eq!(
            SqliteTarget::File(PathBuf::from("/tmp/bench.db")),
            SqliteTarget::parse("sqlite:/tmp/bench.db").unwrap()
        );
        assert_eq!(
            SqliteTarget::File(PathBuf::from("bench.db")),
            SqliteTarget::parse("sqlite://bench.db").unwrap()
        );
    }

    #[test]
    fn bad_urls() {
        let err = SqliteTarget::parse("mysql://localhost/bench").unwrap_err();
        assert_eq!(DbErrorKind::Connectivity, err.kind());
        assert!(SqliteTarget::parse("sqlite:").is_err());
    }

    #[test]
    fn unopenable_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing").join("bench.db");
        let endpoint = Endpoint::new(format!("sqlite:{}", missing.display()));
        let err = SqliteProvider::new().open_sqlite(&endpoint).unwrap_err();
        assert_eq!(DbErrorKind::Connectivity, err.kind());
    }
}

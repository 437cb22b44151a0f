use crate::error::DbError;
use crate::value::{Row, Value};

/// Describes how to reach a database.
///
/// The URL format is defined by the [ConnectionProvider] that consumes it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Endpoint {
    pub url: String,
    pub user: Option<String>,
    pub password: Option<String>,
    /// Default schema to select after connecting, required by some products.
    pub schema: Option<String>,
}

impl Endpoint {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }
}

/// An open connection to a database.
///
/// A connection is owned by exactly one worker. It is `Send` so that it can be moved onto the
/// worker's thread, but it is deliberately not `Sync`: the type system prevents two threads from
/// issuing statements on the same connection.
pub trait Connection: Send {
    /// Execute a statement that takes no parameters and returns no rows, such as DDL.
    fn execute(&mut self, sql: &str) -> Result<(), DbError>;

    /// Execute a parameterized insert, update or delete and return the number of affected rows.
    fn execute_update(&mut self, sql: &str, params: &[Value]) -> Result<u64, DbError>;

    /// Execute a parameterized query and collect every row.
    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>, DbError>;

    fn begin(&mut self) -> Result<(), DbError>;

    fn commit(&mut self) -> Result<(), DbError>;

    fn rollback(&mut self) -> Result<(), DbError>;

    /// Release the connection. Dropping a connection also releases it but swallows any error.
    fn close(self: Box<Self>) -> Result<(), DbError>;

    /// Run a query and read the first column of the last row returned as an integer.
    ///
    /// Returns `None` if the query returned no rows or the value is not numeric.
    fn query_i64(&mut self, sql: &str, params: &[Value]) -> Result<Option<i64>, DbError> {
        let rows = self.query(sql, params)?;
        Ok(rows
            .last()
            .and_then(|row| row.first())
            .and_then(Value::as_i64))
    }
}

/// Opens connections for an [Endpoint].
pub trait ConnectionProvider: Send + Sync {
    fn open(&self, endpoint: &Endpoint) -> Result<Box<dyn Connection>, DbError>;
}

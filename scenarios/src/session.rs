use anyhow::Context;
use replibench_core::prelude::{Connection, DbError};
use replibench_runner::prelude::{HookResult, WorkerContext};

/// The worker context and connection of one scenario instance.
///
/// The context is bound in `initialize`; the worker's own connection is opened in `prepare` and
/// closed in `cleanup`.
#[derive(Default)]
pub(crate) struct Session {
    ctx: Option<WorkerContext>,
    conn: Option<Box<dyn Connection>>,
}

impl Session {
    pub fn bind(&mut self, ctx: &WorkerContext) {
        self.ctx = Some(ctx.clone());
    }

    pub fn context(&self) -> anyhow::Result<&WorkerContext> {
        self.ctx
            .as_ref()
            .context("Scenario used before it was initialized")
    }

    /// A connection that is not kept by the session, for the global hooks.
    pub fn open(&self) -> anyhow::Result<Box<dyn Connection>> {
        self.context()?.connect()
    }

    /// Open the worker's connection, replacing any previous one.
    pub fn connect(&mut self) -> HookResult {
        let conn = self.open()?;
        self.disconnect();
        self.conn = Some(conn);
        Ok(())
    }

    pub fn conn(&mut self) -> anyhow::Result<&mut dyn Connection> {
        match self.conn.as_deref_mut() {
            Some(conn) => Ok(conn),
            None => anyhow::bail!("Scenario connection is not open"),
        }
    }

    fn disconnect(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err(e) = conn.close() {
                log::warn!("Failed to close connection: {e}");
            }
        }
    }

    /// Close the worker's connection, if it was opened.
    pub fn close(&mut self) -> HookResult {
        if let Some(conn) = self.conn.take() {
            conn.close().context("Failed to close connection")?;
        }
        Ok(())
    }
}

/// Run `work` in a transaction unless `autocommit` is set.
///
/// A failed transaction is rolled back and the original error returned.
pub(crate) fn in_transaction<T>(
    conn: &mut dyn Connection,
    autocommit: bool,
    work: impl FnOnce(&mut dyn Connection) -> Result<T, DbError>,
) -> Result<T, DbError> {
    if autocommit {
        return work(conn);
    }

    conn.begin()?;
    let result = work(&mut *conn).and_then(|value| conn.commit().map(|_| value));
    if result.is_err() {
        if let Err(e) = conn.rollback() {
            log::debug!("Rollback failed: {e}");
        }
    }
    result
}

/// Shorthand for the global hooks: open a connection, run `work`, close the connection.
pub(crate) fn with_connection<T>(
    session: &Session,
    work: impl FnOnce(&mut dyn Connection) -> anyhow::Result<T>,
) -> anyhow::Result<T> {
    let mut conn = session.open()?;
    let result = work(conn.as_mut());
    if let Err(e) = conn.close() {
        log::warn!("Failed to close setup connection: {e}");
    }
    result
}

use std::time::Duration;

use rand::Rng;
use replibench_core::prelude::Value;
use replibench_runner::prelude::{ConfigError, HookResult, RunConfiguration, Scenario, WorkerContext};

use crate::session::{in_transaction, with_connection, Session};
use crate::settings::{at_least_one, TableSettings};
use crate::table::{standard_columns, TableSet};

pub const TABLE_PREFIX: &str = "benchmark_scenario_";

pub const KEY_OPERATIONS: &str = "operations";
pub const KEY_DELAYMILLIS: &str = "delaymillis";
pub const KEY_AUTOCOMMIT: &str = "autocommit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadlockSettings {
    pub tables: TableSettings,
    /// Updates per transaction. Two or more are needed for workers to deadlock.
    pub operations: usize,
    /// Pause before every update after the first.
    pub delay: Duration,
    pub autocommit: bool,
}

impl DeadlockSettings {
    pub fn apply(config: &RunConfiguration) -> Result<Self, ConfigError> {
        Ok(Self {
            tables: TableSettings::apply(config)?,
            operations: at_least_one(KEY_OPERATIONS, config.parse_or(KEY_OPERATIONS, 1)?)?,
            delay: Duration::from_millis(config.parse_or(KEY_DELAYMILLIS, 0)?),
            autocommit: config.flag(KEY_AUTOCOMMIT, false)?,
        })
    }

    fn table_set(&self) -> TableSet {
        TableSet::new(
            TABLE_PREFIX,
            self.tables.tables,
            standard_columns(self.tables.datawidth),
        )
    }
}

/// Updates randomly chosen rows across the tables in one transaction, so that concurrent workers
/// lock rows in conflicting orders.
///
/// A failed transaction is rolled back and the error returned, where it is counted as a
/// recoverable error for the iteration.
#[derive(Default)]
pub struct Deadlock {
    session: Session,
    settings: Option<DeadlockSettings>,
    updates: Vec<String>,
    tag: String,
    exec_count: i64,
}

impl Deadlock {
    pub fn instance(_worker: usize) -> Box<dyn Scenario> {
        Box::<Self>::default()
    }

    fn settings(&self) -> anyhow::Result<&DeadlockSettings> {
        self.settings
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Scenario used before it was initialized"))
    }
}

impl Scenario for Deadlock {
    fn initialize(&mut self, ctx: &WorkerContext) -> HookResult {
        self.settings = Some(DeadlockSettings::apply(ctx.config())?);
        self.tag = ctx.worker_id().to_string();
        self.session.bind(ctx);
        Ok(())
    }

    fn global_prepare(&mut self) -> HookResult {
        let settings = self.settings()?.clone();
        if settings.tables.reusedata {
            log::info!("Reusing existing benchmark tables");
            return Ok(());
        }

        let tables = settings.table_set();
        with_connection(&self.session, |conn| {
            tables.create_all(conn)?;
            tables.populate_all(conn, settings.tables.datarows)?;
            Ok(())
        })
    }

    fn prepare(&mut self) -> HookResult {
        let settings = self.settings()?;
        log::debug!(
            "Tag for this scenario: {}, operations: {}, delay: {:?}, autocommit: {}",
            self.tag,
            settings.operations,
            settings.delay,
            settings.autocommit
        );
        self.updates = settings
            .table_set()
            .names()
            .iter()
            .map(|table| format!("UPDATE {table} SET myint = ?, mythread = ? WHERE mykey = ?"))
            .collect();
        self.session.connect()
    }

    fn iterate(&mut self, _iteration: u64) -> HookResult {
        let settings = self.settings()?.clone();
        let Self {
            session,
            updates,
            tag,
            exec_count,
            ..
        } = self;

        let result = in_transaction(session.conn()?, settings.autocommit, |conn| {
            let mut rng = rand::thread_rng();
            for i in 0..settings.operations {
                let index = rng.gen_range(0..updates.len());
                let key = rng.gen_range(0..settings.tables.datarows) as i64;

                if i > 0 && !settings.delay.is_zero() {
                    std::thread::sleep(settings.delay);
                }

                *exec_count += 1;
                conn.execute_update(
                    &updates[index],
                    &[
                        Value::Integer(*exec_count),
                        Value::from(tag.as_str()),
                        Value::Integer(key),
                    ],
                )?;
                log::trace!("Updated row: table={index} key={key} i={i} tag={tag}");
            }
            Ok(())
        });

        if let Err(e) = &result {
            log::debug!("Operation failed with database error: {e}");
        }
        Ok(result?)
    }

    fn cleanup(&mut self) -> HookResult {
        self.session.close()
    }
}

use rand::Rng;
use replibench_core::prelude::Value;
use replibench_runner::prelude::{ConfigError, HookResult, RunConfiguration, Scenario, WorkerContext};

use crate::generator::{ColumnType, DataGenerator, StringGenerator};
use crate::session::{in_transaction, with_connection, Session};
use crate::settings::{at_least_one, TableSettings};
use crate::table::{Column, TableSet};

pub const READ_TABLE_PREFIX: &str = "benchmark_scenario_read_";
pub const WRITE_TABLE_PREFIX: &str = "benchmark_scenario_write_";

pub const KEY_OPERATIONS: &str = "operations";
pub const KEY_SELECTROWS: &str = "selectrows";
pub const KEY_AUTOCOMMIT: &str = "autocommit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadWriteSettings {
    pub tables: TableSettings,
    /// Read/write pairs per transaction.
    pub operations: usize,
    /// Width of the key range summed by each read.
    pub selectrows: usize,
    pub autocommit: bool,
}

impl ReadWriteSettings {
    pub fn apply(config: &RunConfiguration) -> Result<Self, ConfigError> {
        Ok(Self {
            tables: TableSettings::apply(config)?,
            operations: at_least_one(KEY_OPERATIONS, config.parse_or(KEY_OPERATIONS, 1)?)?,
            selectrows: config.parse_or(KEY_SELECTROWS, 1)?,
            autocommit: config.flag(KEY_AUTOCOMMIT, false)?,
        })
    }

    fn read_tables(&self) -> TableSet {
        TableSet::new(
            READ_TABLE_PREFIX,
            self.tables.tables,
            vec![
                Column::new("mykey", ColumnType::Integer).primary_key(),
                Column::new("myint", ColumnType::Integer),
                Column::new("mypayload", ColumnType::Varchar(self.tables.datawidth)),
            ],
        )
    }

    fn write_tables(&self) -> TableSet {
        TableSet::new(
            WRITE_TABLE_PREFIX,
            self.tables.tables,
            vec![
                Column::new("mykey", ColumnType::Integer)
                    .primary_key()
                    .auto_increment(),
                Column::new("mysum", ColumnType::BigInt),
                Column::new("mypayload", ColumnType::Varchar(self.tables.datawidth)),
            ],
        )
    }
}

/// Sums a random key range of a read table, then inserts the sums into the matching write table.
#[derive(Default)]
pub struct ReadWrite {
    session: Session,
    settings: Option<ReadWriteSettings>,
    reads: Vec<String>,
    writes: Vec<String>,
    payloads: Option<StringGenerator>,
}

impl ReadWrite {
    pub fn instance(_worker: usize) -> Box<dyn Scenario> {
        Box::<Self>::default()
    }

    fn settings(&self) -> anyhow::Result<&ReadWriteSettings> {
        self.settings
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Scenario used before it was initialized"))
    }
}

impl Scenario for ReadWrite {
    fn initialize(&mut self, ctx: &WorkerContext) -> HookResult {
        let settings = ReadWriteSettings::apply(ctx.config())?;
        self.payloads = Some(StringGenerator::new(settings.tables.datawidth, 10));
        self.settings = Some(settings);
        self.session.bind(ctx);
        Ok(())
    }

    fn global_prepare(&mut self) -> HookResult {
        let settings = self.settings()?.clone();
        if settings.tables.reusedata {
            log::info!("Reusing read tables");
            return Ok(());
        }

        with_connection(&self.session, |conn| {
            log::info!("Creating and populating read tables...");
            let read_tables = settings.read_tables();
            read_tables.create_all(conn)?;
            read_tables.populate_all(conn, settings.tables.datarows)?;

            log::info!("Creating write tables...");
            settings.write_tables().create_all(conn)?;
            Ok(())
        })
    }

    fn prepare(&mut self) -> HookResult {
        let settings = self.settings()?;
        let read_tables = settings.read_tables();
        let write_tables = settings.write_tables();
        self.reads = read_tables
            .names()
            .iter()
            .map(|table| format!("SELECT SUM(myint) FROM {table} WHERE mykey >= ? AND mykey <= ?"))
            .collect();
        self.writes = write_tables
            .names()
            .iter()
            .map(|table| write_tables.insert_sql(table))
            .collect();
        self.session.connect()
    }

    fn iterate(&mut self, _iteration: u64) -> HookResult {
        let settings = self.settings()?.clone();
        let (index, key) = {
            let mut rng = rand::thread_rng();
            (
                rng.gen_range(0..self.reads.len()),
                rng.gen_range(0..settings.tables.datarows) as i64,
            )
        };
        let read = &self.reads[index];
        let write = &self.writes[index];
        let payloads = self
            .payloads
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("Scenario used before it was initialized"))?;

        let conn = self.session.conn()?;
        in_transaction(conn, settings.autocommit, |conn| {
            let mut sums = Vec::with_capacity(settings.operations);
            for _ in 0..settings.operations {
                let sum = conn
                    .query_i64(
                        read,
                        &[
                            Value::Integer(key),
                            Value::Integer(key + settings.selectrows as i64),
                        ],
                    )?
                    .unwrap_or(0);
                sums.push(sum);
            }

            for sum in sums {
                conn.execute_update(write, &[Value::Integer(sum), payloads.generate()])?;
            }
            Ok(())
        })?;
        Ok(())
    }

    fn cleanup(&mut self) -> HookResult {
        self.session.close()
    }
}

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use replibench_core::prelude::Value;
use replibench_runner::prelude::{
    ConfigError, HookResult, RunConfiguration, Scenario, ScenarioFactory, WorkerContext,
};

use crate::generator::ColumnType;
use crate::session::{in_transaction, with_connection, Session};
use crate::settings::{at_least_one, KEY_DATAWIDTH};
use crate::table::{Column, TableSet};

pub const TABLE_PREFIX: &str = "benchmark_scenario_";

pub const KEY_WRITES_PER_XACT: &str = "writesPerXact";
pub const KEY_BATCH_TYPE: &str = "batchType";

const PAYLOAD: &str = "123456789*";

/// How the inserts of one transaction are sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchType {
    /// One parameterized insert per row.
    #[default]
    None,
    /// A single multi-row insert statement per transaction.
    Statement,
}

impl std::str::FromStr for BatchType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(BatchType::None),
            "statement" => Ok(BatchType::Statement),
            _ => Err("unrecognized batch type, expected `none` or `statement`".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedWriteSettings {
    pub writes_per_xact: usize,
    pub datawidth: usize,
    pub batch_type: BatchType,
}

impl PreparedWriteSettings {
    pub fn apply(config: &RunConfiguration) -> Result<Self, ConfigError> {
        Ok(Self {
            writes_per_xact: at_least_one(
                KEY_WRITES_PER_XACT,
                config.parse_or(KEY_WRITES_PER_XACT, 1)?,
            )?,
            datawidth: config.parse_or(KEY_DATAWIDTH, 10)?,
            batch_type: config.parse_or(KEY_BATCH_TYPE, BatchType::None)?,
        })
    }

    fn table_set(&self) -> TableSet {
        TableSet::new(
            TABLE_PREFIX,
            1,
            vec![
                Column::new("mykey", ColumnType::BigInt).primary_key(),
                Column::new("mythread", ColumnType::Varchar(50)).indexed(),
                Column::new("mypayload", ColumnType::Varchar(self.datawidth)),
            ],
        )
    }
}

/// Creates the instances of one run, all drawing keys from one counter.
///
/// The counter restarts at zero for every run, matching the freshly created table.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreparedWriteFactory;

impl ScenarioFactory for PreparedWriteFactory {
    fn instantiate(&self, workers: usize) -> Vec<Box<dyn Scenario>> {
        let keys = Arc::new(AtomicI64::new(0));
        (0..workers)
            .map(|_| Box::new(PreparedWrite::new(keys.clone())) as Box<dyn Scenario>)
            .collect()
    }
}

/// Inserts `writesPerXact` rows per transaction with keys unique across every worker.
pub struct PreparedWrite {
    session: Session,
    settings: Option<PreparedWriteSettings>,
    keys: Arc<AtomicI64>,
    insert: String,
    worker_id: String,
}

impl PreparedWrite {
    pub fn new(keys: Arc<AtomicI64>) -> Self {
        Self {
            session: Session::default(),
            settings: None,
            keys,
            insert: String::new(),
            worker_id: String::new(),
        }
    }

    fn settings(&self) -> anyhow::Result<&PreparedWriteSettings> {
        self.settings
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Scenario used before it was initialized"))
    }

    fn next_key(&self) -> i64 {
        self.keys.fetch_add(1, Ordering::Relaxed)
    }
}

impl Scenario for PreparedWrite {
    fn initialize(&mut self, ctx: &WorkerContext) -> HookResult {
        self.settings = Some(PreparedWriteSettings::apply(ctx.config())?);
        self.worker_id = ctx.worker_id().to_string();
        self.session.bind(ctx);
        Ok(())
    }

    fn global_prepare(&mut self) -> HookResult {
        let tables = self.settings()?.table_set();
        with_connection(&self.session, |conn| {
            log::info!("Creating test table...");
            tables.create_all(conn)?;
            Ok(())
        })
    }

    fn prepare(&mut self) -> HookResult {
        let tables = self.settings()?.table_set();
        self.insert = tables.insert_sql(&tables.names()[0]);
        self.session.connect()
    }

    fn iterate(&mut self, iteration: u64) -> HookResult {
        let settings = self.settings()?.clone();
        let thread = format!("pstmt_{}_{iteration}", self.worker_id);
        let rows = (0..settings.writes_per_xact)
            .map(|_| (self.next_key(), thread.clone()))
            .collect::<Vec<_>>();

        let insert = &self.insert;
        in_transaction(self.session.conn()?, false, |conn| {
            match settings.batch_type {
                BatchType::None => {
                    for (key, thread) in rows {
                        conn.execute_update(
                            insert,
                            &[Value::Integer(key), Value::Text(thread), Value::from(PAYLOAD)],
                        )?;
                    }
                }
                BatchType::Statement => {
                    conn.execute_update(&batched_insert(insert, &rows), &[])?;
                }
            }
            Ok(())
        })?;
        Ok(())
    }

    fn cleanup(&mut self) -> HookResult {
        self.session.close()
    }
}

/// Rewrite a single row insert into one statement inserting every row, values inlined.
fn batched_insert(insert: &str, rows: &[(i64, String)]) -> String {
    let head = insert
        .find("VALUES")
        .map_or(insert, |values| &insert[..values]);
    let values = rows
        .iter()
        .map(|(key, thread)| {
            format!(
                "({key}, '{}', '{}')",
                thread.replace('\'', "''"),
                PAYLOAD.replace('\'', "''")
            )
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("{head}VALUES {values}")
}

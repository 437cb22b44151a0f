use rand::Rng;
use replibench_runner::prelude::{ConfigError, HookResult, RunConfiguration, Scenario, WorkerContext};

use crate::session::{with_connection, Session};
use crate::settings::TableSettings;
use crate::table::{standard_columns, TableSet};

pub const TABLE_PREFIX: &str = "benchmark_scenario_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadSimpleSettings {
    pub tables: TableSettings,
}

impl ReadSimpleSettings {
    pub fn apply(config: &RunConfiguration) -> Result<Self, ConfigError> {
        Ok(Self {
            tables: TableSettings::apply(config)?,
        })
    }
}

/// Selects every row of a randomly chosen table.
#[derive(Default)]
pub struct ReadSimple {
    session: Session,
    settings: Option<ReadSimpleSettings>,
    selects: Vec<String>,
}

impl ReadSimple {
    pub fn instance(_worker: usize) -> Box<dyn Scenario> {
        Box::<Self>::default()
    }

    fn table_set(&self) -> anyhow::Result<TableSet> {
        let settings = self.settings()?;
        Ok(TableSet::new(
            TABLE_PREFIX,
            settings.tables.tables,
            standard_columns(settings.tables.datawidth),
        ))
    }

    fn settings(&self) -> anyhow::Result<&ReadSimpleSettings> {
        self.settings
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Scenario used before it was initialized"))
    }
}

impl Scenario for ReadSimple {
    fn initialize(&mut self, ctx: &WorkerContext) -> HookResult {
        self.settings = Some(ReadSimpleSettings::apply(ctx.config())?);
        self.session.bind(ctx);
        Ok(())
    }

    fn global_prepare(&mut self) -> HookResult {
        let settings = self.settings()?.clone();
        if settings.tables.reusedata {
            log::info!("Reusing existing benchmark tables");
            return Ok(());
        }

        let tables = self.table_set()?;
        with_connection(&self.session, |conn| {
            log::info!("Creating and populating {} tables", tables.len());
            tables.create_all(conn)?;
            tables.populate_all(conn, settings.tables.datarows)?;
            Ok(())
        })
    }

    fn prepare(&mut self) -> HookResult {
        let tables = self.table_set()?;
        self.selects = tables
            .names()
            .iter()
            .map(|table| tables.select_all_sql(table))
            .collect();
        self.session.connect()
    }

    fn iterate(&mut self, _iteration: u64) -> HookResult {
        let index = rand::thread_rng().gen_range(0..self.selects.len());
        let select = &self.selects[index];
        let rows = self.session.conn()?.query(select, &[])?;
        log::trace!("Read {} rows", rows.len());
        Ok(())
    }

    fn cleanup(&mut self) -> HookResult {
        self.session.close()
    }
}

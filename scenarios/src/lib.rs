//! Standard benchmark scenarios and the registry the launcher runs them from.

mod deadlock;
mod generator;
mod prepared_write;
mod read_simple;
mod read_write;
mod session;
mod settings;
mod table;
mod tpcb;

use replibench_runner::prelude::ScenarioRegistry;

pub mod prelude {
    pub use crate::deadlock::{Deadlock, DeadlockSettings};
    pub use crate::default_registry;
    pub use crate::generator::{
        generator_for, BlobGenerator, ColumnType, DataGenerator, IntegerGenerator,
        StringGenerator, TimestampGenerator,
    };
    pub use crate::prepared_write::{
        BatchType, PreparedWrite, PreparedWriteFactory, PreparedWriteSettings,
    };
    pub use crate::read_simple::{ReadSimple, ReadSimpleSettings};
    pub use crate::read_write::{ReadWrite, ReadWriteSettings};
    pub use crate::settings::TableSettings;
    pub use crate::table::{standard_columns, Column, TableSet};
    pub use crate::tpcb::{Tpcb, TpcbFactory, TpcbSettings, TpcbStatistics};
}

/// Every standard scenario under the name used by the `scenario` configuration key.
pub fn default_registry() -> ScenarioRegistry {
    ScenarioRegistry::new()
        .with_scenario("readSimple", read_simple::ReadSimple::instance)
        .with_scenario("readWrite", read_write::ReadWrite::instance)
        .with_scenario("deadlock", deadlock::Deadlock::instance)
        .with_scenario("preparedWrite", prepared_write::PreparedWriteFactory)
        .with_scenario("tpcb", tpcb::TpcbFactory::default())
}

mod bound;
mod config;
mod context;
mod definition;
mod lag;
mod monitor;
mod progress;
mod report;
mod run;
mod shutdown;
mod types;
mod worker;

pub mod prelude {
    pub use crate::bound::Bound;
    pub use crate::config::{
        load_properties, parse_properties, ConfigError, ConfigMetadata, Properties, PropertyKind,
        PropertyMetadata, PropertyValue, RunConfiguration, RunSet, KEY_ACTUAL_AVG_DURATION,
        KEY_ACTUAL_AVG_OPS_SEC, KEY_ACTUAL_DURATION, KEY_ACTUAL_ITERATIONS,
        KEY_ACTUAL_OTHER_EXCEPTIONS, KEY_ACTUAL_SQL_EXCEPTIONS, KEY_BOUND, KEY_DURATION,
        KEY_ITERATIONS, KEY_PASSWORD, KEY_SCENARIO, KEY_SCHEMA, KEY_THREADS, KEY_URL, KEY_USER,
    };
    pub use crate::context::{RunnerContext, WorkerContext};
    pub use crate::definition::{HookResult, Scenario, ScenarioFactory, ScenarioRegistry};
    pub use crate::lag::{
        KEY_MONITOR_CATCH_UP_TIMEOUT, KEY_MONITOR_DDL_REPLICATION, KEY_MONITOR_REPLICA_URL,
    };
    pub use crate::report::{ConsoleTableSink, JsonlSummarySink, ReportSink, TextReportSink};
    pub use crate::run::Benchmark;
    pub use crate::types::BenchResult;
    pub use crate::worker::{ScenarioRunner, WorkerState};
}

use replibench_runner::prelude::{ConfigError, RunConfiguration};

pub const KEY_TABLES: &str = "tables";
pub const KEY_DATAROWS: &str = "datarows";
pub const KEY_DATAWIDTH: &str = "datawidth";
pub const KEY_REUSEDATA: &str = "reusedata";

/// Shape of the tables shared by the table based scenarios.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSettings {
    /// Number of benchmark tables.
    pub tables: usize,
    /// Rows per table.
    pub datarows: usize,
    /// Width of the text payload column.
    pub datawidth: usize,
    /// Keep the tables of an earlier run instead of recreating them.
    pub reusedata: bool,
}

impl Default for TableSettings {
    fn default() -> Self {
        Self {
            tables: 1,
            datarows: 10,
            datawidth: 10,
            reusedata: false,
        }
    }
}

impl TableSettings {
    pub fn apply(config: &RunConfiguration) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let settings = Self {
            tables: config.parse_or(KEY_TABLES, defaults.tables)?,
            datarows: config.parse_or(KEY_DATAROWS, defaults.datarows)?,
            datawidth: config.parse_or(KEY_DATAWIDTH, defaults.datawidth)?,
            reusedata: config.flag(KEY_REUSEDATA, defaults.reusedata)?,
        };
        at_least_one(KEY_TABLES, settings.tables)?;
        at_least_one(KEY_DATAROWS, settings.datarows)?;
        Ok(settings)
    }
}

/// Reject a count of zero.
pub(crate) fn at_least_one<T>(key: &str, value: T) -> Result<T, ConfigError>
where
    T: PartialOrd + From<u8> + ToString,
{
    if value < T::from(1) {
        return Err(ConfigError::Invalid {
            key: key.to_string(),
            value: value.to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    Ok(value)
}

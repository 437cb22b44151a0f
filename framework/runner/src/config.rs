use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use itertools::Itertools;
use replibench_core::prelude::Endpoint;
use replibench_summary_model::RunSummary;

use crate::bound::Bound;

pub const KEY_SCENARIO: &str = "scenario";
pub const KEY_BOUND: &str = "bound";
pub const KEY_ITERATIONS: &str = "iterations";
pub const KEY_DURATION: &str = "duration";
pub const KEY_THREADS: &str = "threads";

pub const KEY_URL: &str = "url";
pub const KEY_USER: &str = "user";
pub const KEY_PASSWORD: &str = "password";
pub const KEY_SCHEMA: &str = "schema";

pub const KEY_ACTUAL_DURATION: &str = "actualDuration";
pub const KEY_ACTUAL_ITERATIONS: &str = "actualIterations";
pub const KEY_ACTUAL_AVG_DURATION: &str = "actualAvgDuration";
pub const KEY_ACTUAL_AVG_OPS_SEC: &str = "actualAvgOpsSec";
pub const KEY_ACTUAL_SQL_EXCEPTIONS: &str = "actualSQLExceptions";
pub const KEY_ACTUAL_OTHER_EXCEPTIONS: &str = "actualOtherExceptions";

/// Output keys and their defaults. Values are written by [RunConfiguration::record_summary].
const OUTPUT_KEYS: [(&str, &str); 6] = [
    (KEY_ACTUAL_DURATION, "-1"),
    (KEY_ACTUAL_ITERATIONS, "-1"),
    (KEY_ACTUAL_AVG_DURATION, "0.0"),
    (KEY_ACTUAL_AVG_OPS_SEC, "0.0"),
    (KEY_ACTUAL_SQL_EXCEPTIONS, "0"),
    (KEY_ACTUAL_OTHER_EXCEPTIONS, "0"),
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("No metadata declared for configuration key [{0}]")]
    UndeclaredKey(String),
    #[error("No value for required configuration key [{0}]")]
    MissingValue(String),
    #[error("Invalid value [{value}] for configuration key [{key}]: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
    #[error("Key [{0}] is reserved for run results and cannot be used as an input")]
    ReservedKey(String),
    #[error("Key [{0}] is not an output key and cannot be changed after the configuration is built")]
    NotOutput(String),
    #[error("Unrecognized bound type [{0}], expected `iterations` or `duration`")]
    UnknownBound(String),
    #[error("No scenario registered with name [{0}]")]
    UnknownScenario(String),
    #[error("Scenario [{0}] is already registered")]
    DuplicateScenario(String),
    #[error("Failed to read configuration file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse configuration: {0}")]
    Toml(#[from] toml::de::Error),
}

/// How a configuration key is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    /// An input with a single value across a run set.
    Fixed,
    /// An input that takes several values across a run set.
    Variable,
    /// A result written after the run completes.
    Output,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyMetadata {
    pub name: String,
    pub default_value: Option<String>,
    pub kind: PropertyKind,
}

/// Declared metadata for every key a configuration may contain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigMetadata {
    properties: BTreeMap<String, PropertyMetadata>,
}

impl ConfigMetadata {
    /// Metadata for the standard keys only.
    pub fn standard() -> Self {
        let mut metadata = Self::default();
        metadata.declare_standard();
        metadata
    }

    /// Metadata for a set of user supplied keys plus the standard keys.
    ///
    /// User keys are declared first so that a user key keeps its own kind. A user key that names
    /// an output key is rejected.
    pub fn for_keys<'a>(
        keys: impl IntoIterator<Item = (&'a str, PropertyKind)>,
    ) -> Result<Self, ConfigError> {
        let mut metadata = Self::default();
        for (name, kind) in keys {
            if OUTPUT_KEYS.iter().any(|(output, _)| *output == name) {
                return Err(ConfigError::ReservedKey(name.to_string()));
            }
            metadata.declare(name, None, kind);
        }
        metadata.declare_standard();
        Ok(metadata)
    }

    fn declare_standard(&mut self) {
        self.declare(KEY_SCENARIO, None, PropertyKind::Fixed);
        self.declare(KEY_BOUND, Some("iterations"), PropertyKind::Fixed);
        self.declare(KEY_ITERATIONS, Some("1"), PropertyKind::Fixed);
        self.declare(KEY_DURATION, Some("1"), PropertyKind::Fixed);
        self.declare(KEY_THREADS, Some("1"), PropertyKind::Fixed);
        for (name, default_value) in OUTPUT_KEYS {
            self.declare(name, Some(default_value), PropertyKind::Output);
        }
    }

    /// Declare a key if it has not been declared yet. Returns true if the key was added.
    pub fn declare(&mut self, name: &str, default_value: Option<&str>, kind: PropertyKind) -> bool {
        if self.properties.contains_key(name) {
            return false;
        }
        log::trace!(
            "Declaring configuration key: name={name} default={default_value:?} kind={kind:?}"
        );
        self.properties.insert(
            name.to_string(),
            PropertyMetadata {
                name: name.to_string(),
                default_value: default_value.map(str::to_string),
                kind,
            },
        );
        true
    }

    pub fn get(&self, name: &str) -> Option<&PropertyMetadata> {
        self.properties.get(name)
    }

    /// Declared keys in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PropertyMetadata> {
        self.properties.values()
    }

    pub fn kind(&self, name: &str) -> Option<PropertyKind> {
        self.get(name).map(|p| p.kind)
    }
}

/// The configuration of a single benchmark run.
///
/// Read-only while the run executes. Only output keys can be changed afterwards, through
/// [RunConfiguration::record_summary] or [RunConfiguration::set_output].
#[derive(Debug, Clone)]
pub struct RunConfiguration {
    values: BTreeMap<String, String>,
    metadata: Arc<ConfigMetadata>,
}

impl RunConfiguration {
    /// Build a configuration, filling in declared defaults for missing keys.
    ///
    /// Every supplied key must have metadata.
    pub fn new(
        mut values: BTreeMap<String, String>,
        metadata: Arc<ConfigMetadata>,
    ) -> Result<Self, ConfigError> {
        if let Some(undeclared) = values.keys().find(|k| metadata.get(k).is_none()) {
            return Err(ConfigError::UndeclaredKey(undeclared.clone()));
        }
        for property in metadata.iter() {
            if let Some(default_value) = &property.default_value {
                values
                    .entry(property.name.clone())
                    .or_insert_with(|| default_value.clone());
            }
        }
        Ok(Self { values, metadata })
    }

    /// Build a single configuration from key/value pairs, declaring every key as fixed.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Result<Self, ConfigError>
    where
        K: Into<String>,
        V: Into<String>,
    {
        let values = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect::<BTreeMap<_, _>>();
        let metadata = ConfigMetadata::for_keys(
            values.keys().map(|k| (k.as_str(), PropertyKind::Fixed)),
        )?;
        Self::new(values, Arc::new(metadata))
    }

    pub fn metadata(&self) -> &ConfigMetadata {
        &self.metadata
    }

    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    /// Input values only, which identify the configuration of a run.
    pub fn inputs(&self) -> BTreeMap<String, String> {
        self.values
            .iter()
            .filter(|(k, _)| self.metadata.kind(k) != Some(PropertyKind::Output))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Look up a declared key that must have a value.
    pub fn get(&self, key: &str) -> Result<&str, ConfigError> {
        if self.metadata.get(key).is_none() {
            return Err(ConfigError::UndeclaredKey(key.to_string()));
        }
        self.get_opt(key)
            .ok_or_else(|| ConfigError::MissingValue(key.to_string()))
    }

    /// Look up a key that may be absent. Undeclared keys are simply absent.
    pub fn get_opt(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get_opt(key).unwrap_or(default)
    }

    /// Parse a required value.
    pub fn parse<T>(&self, key: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        let value = self.get(key)?;
        parse_value(key, value)
    }

    /// Parse a value, using `default` when the key is absent.
    pub fn parse_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.get_opt(key) {
            Some(value) => parse_value(key, value),
            None => Ok(default),
        }
    }

    /// Read a boolean flag, using `default` when the key is absent.
    pub fn flag(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        let Some(value) = self.get_opt(key) else {
            return Ok(default);
        };
        match value.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" => Ok(false),
            _ => Err(ConfigError::Invalid {
                key: key.to_string(),
                value: value.to_string(),
                reason: "expected a boolean".to_string(),
            }),
        }
    }

    /// The scenario name to look up in the registry.
    pub fn scenario(&self) -> Result<&str, ConfigError> {
        self.get(KEY_SCENARIO)
    }

    pub fn bound(&self) -> Result<Bound, ConfigError> {
        Bound::from_config(self)
    }

    /// Number of workers, at least one.
    pub fn threads(&self) -> Result<usize, ConfigError> {
        let threads: usize = self.parse(KEY_THREADS)?;
        if threads == 0 {
            return Err(ConfigError::Invalid {
                key: KEY_THREADS.to_string(),
                value: "0".to_string(),
                reason: "at least one thread is required".to_string(),
            });
        }
        Ok(threads)
    }

    /// The database endpoint named by the `url`, `user`, `password` and `schema` keys.
    pub fn endpoint(&self) -> Result<Endpoint, ConfigError> {
        let url = self
            .get_opt(KEY_URL)
            .ok_or_else(|| ConfigError::MissingValue(KEY_URL.to_string()))?;
        Ok(Endpoint {
            url: url.to_string(),
            user: self.get_opt(KEY_USER).map(str::to_string),
            password: self.get_opt(KEY_PASSWORD).map(str::to_string),
            schema: self.get_opt(KEY_SCHEMA).map(str::to_string),
        })
    }

    /// Set an output key. Input keys cannot be changed.
    pub fn set_output(&mut self, key: &str, value: impl ToString) -> Result<(), ConfigError> {
        match self.metadata.kind(key) {
            Some(PropertyKind::Output) => {
                self.values.insert(key.to_string(), value.to_string());
                Ok(())
            }
            Some(_) => Err(ConfigError::NotOutput(key.to_string())),
            None => Err(ConfigError::UndeclaredKey(key.to_string())),
        }
    }

    /// Write the run results into the output keys.
    ///
    /// Durations are recorded in seconds.
    pub fn record_summary(&mut self, summary: &RunSummary) -> Result<(), ConfigError> {
        let totals = &summary.totals;
        self.set_output(KEY_ACTUAL_DURATION, totals.total_elapsed.as_secs_f64())?;
        self.set_output(KEY_ACTUAL_ITERATIONS, totals.total_iterations)?;
        self.set_output(KEY_ACTUAL_AVG_DURATION, totals.avg_duration_s)?;
        self.set_output(KEY_ACTUAL_AVG_OPS_SEC, totals.avg_ops_per_sec)?;
        self.set_output(KEY_ACTUAL_SQL_EXCEPTIONS, totals.recoverable_errors)?;
        self.set_output(KEY_ACTUAL_OTHER_EXCEPTIONS, totals.fatal_errors)?;
        Ok(())
    }
}

fn parse_value<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}

/// A raw property value before it is expanded into runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Single(String),
    /// One run is generated per choice.
    Choices(Vec<String>),
}

impl PropertyValue {
    /// Parse a command line override. `a|b|c` gives three choices.
    pub fn parse_override(value: &str) -> Self {
        if value.contains('|') {
            PropertyValue::Choices(value.split('|').map(|v| v.trim().to_string()).collect())
        } else {
            PropertyValue::Single(value.to_string())
        }
    }

    fn kind(&self) -> PropertyKind {
        match self {
            PropertyValue::Single(_) => PropertyKind::Fixed,
            PropertyValue::Choices(_) => PropertyKind::Variable,
        }
    }

    fn choices(&self) -> Vec<String> {
        match self {
            PropertyValue::Single(v) => vec![v.clone()],
            PropertyValue::Choices(v) => v.clone(),
        }
    }
}

/// Raw properties as loaded from a file, before expansion.
pub type Properties = BTreeMap<String, PropertyValue>;

/// Read a flat TOML table into properties.
///
/// Scalars become single values. Arrays of scalars become choices, which makes the key variable.
/// Nested tables are rejected.
pub fn parse_properties(content: &str) -> Result<Properties, ConfigError> {
    let table: toml::Table = content.parse()?;
    table
        .into_iter()
        .map(|(key, value)| {
            let property = match value {
                toml::Value::Array(items) => {
                    if items.is_empty() {
                        return Err(ConfigError::Invalid {
                            key,
                            value: "[]".to_string(),
                            reason: "a list of values must not be empty".to_string(),
                        });
                    }
                    let choices = items
                        .into_iter()
                        .map(|item| scalar_to_string(&key, item))
                        .collect::<Result<Vec<_>, _>>()?;
                    PropertyValue::Choices(choices)
                }
                other => PropertyValue::Single(scalar_to_string(&key, other)?),
            };
            Ok((key, property))
        })
        .collect()
}

/// Read a TOML properties file.
pub fn load_properties(path: impl AsRef<Path>) -> Result<Properties, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_properties(&content)
}

fn scalar_to_string(key: &str, value: toml::Value) -> Result<String, ConfigError> {
    match value {
        toml::Value::String(s) => Ok(s),
        toml::Value::Integer(i) => Ok(i.to_string()),
        toml::Value::Float(f) => Ok(f.to_string()),
        toml::Value::Boolean(b) => Ok(b.to_string()),
        toml::Value::Datetime(d) => Ok(d.to_string()),
        toml::Value::Array(_) | toml::Value::Table(_) => Err(ConfigError::Invalid {
            key: key.to_string(),
            value: value.to_string(),
            reason: "only flat values or lists of values are supported".to_string(),
        }),
    }
}

/// The configurations of a series of runs, one per combination of variable values.
#[derive(Debug, Clone)]
pub struct RunSet {
    metadata: Arc<ConfigMetadata>,
    runs: Vec<RunConfiguration>,
}

impl RunSet {
    /// Expand properties into runs.
    ///
    /// Runs are generated in key order with the last variable key changing fastest.
    pub fn expand(properties: &Properties) -> Result<Self, ConfigError> {
        let metadata = Arc::new(ConfigMetadata::for_keys(
            properties.iter().map(|(k, v)| (k.as_str(), v.kind())),
        )?);

        let keys = properties.keys().cloned().collect::<Vec<_>>();
        let runs = properties
            .values()
            .map(PropertyValue::choices)
            .multi_cartesian_product()
            .map(|combination| {
                let values = keys.iter().cloned().zip(combination).collect();
                RunConfiguration::new(values, metadata.clone())
            })
            .collect::<Result<Vec<_>, _>>()?;

        // `multi_cartesian_product` yields nothing for zero keys, which is still one run.
        let runs = if properties.is_empty() {
            vec![RunConfiguration::new(BTreeMap::new(), metadata.clone())?]
        } else {
            runs
        };

        Ok(Self { metadata, runs })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::expand(&load_properties(path)?)
    }

    pub fn metadata(&self) -> &ConfigMetadata {
        &self.metadata
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RunConfiguration> {
        self.runs.iter()
    }
}

impl IntoIterator for RunSet {
    type Item = RunConfiguration;
    type IntoIter = std::vec::IntoIter<RunConfiguration>;

    fn into_iter(self) -> Self::IntoIter {
        self.runs.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use replibench_summary_model::WorkerResult;
    use std::time::Duration;

    #[test]
    fn defaults_fill_missing_standard_keys() {
        let config = RunConfiguration::from_pairs([("scenario", "readSimple")]).unwrap();

        assert_eq!("iterations", config.get(KEY_BOUND).unwrap());
        assert_eq!(1, config.parse::<u64>(KEY_ITERATIONS).unwrap());
        assert_eq!(1, config.threads().unwrap());
        assert_eq!("-1", config.get(KEY_ACTUAL_ITERATIONS).unwrap());
    }

    #[test]
    fn undeclared_key_is_an_error() {
        let config = RunConfiguration::from_pairs([("scenario", "readSimple")]).unwrap();
        assert!(matches!(
            config.get("nonexistent"),
            Err(ConfigError::UndeclaredKey(_))
        ));
    }

    #[test]
    fn declared_key_without_value() {
        let config = RunConfiguration::from_pairs([("threads", "2")]).unwrap();
        assert!(matches!(config.scenario(), Err(ConfigError::MissingValue(_))));
    }

    #[test]
    fn output_keys_cannot_be_inputs() {
        let result = RunConfiguration::from_pairs([("actualIterations", "5")]);
        assert!(matches!(result, Err(ConfigError::ReservedKey(_))));
    }

    #[test]
    fn only_output_keys_can_be_set() {
        let mut config = RunConfiguration::from_pairs([("scenario", "readSimple")]).unwrap();
        assert!(matches!(
            config.set_output(KEY_THREADS, 4),
            Err(ConfigError::NotOutput(_))
        ));
        config.set_output(KEY_ACTUAL_ITERATIONS, 12).unwrap();
        assert_eq!("12", config.get(KEY_ACTUAL_ITERATIONS).unwrap());
    }

    #[test]
    fn invalid_number() {
        let config = RunConfiguration::from_pairs([("threads", "many")]).unwrap();
        let err = config.threads().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }), "{err}");
    }

    #[test]
    fn zero_threads_rejected() {
        let config = RunConfiguration::from_pairs([("threads", "0")]).unwrap();
        assert!(config.threads().is_err());
    }

    #[test]
    fn flags() {
        let config =
            RunConfiguration::from_pairs([("autocommit", "TRUE"), ("reusedata", "maybe")])
                .unwrap();
        assert!(config.flag("autocommit", false).unwrap());
        assert!(!config.flag("missing", false).unwrap());
        assert!(config.flag("reusedata", false).is_err());
    }

    #[test]
    fn endpoint_requires_url() {
        let config = RunConfiguration::from_pairs([("user", "bench")]).unwrap();
        assert!(matches!(config.endpoint(), Err(ConfigError::MissingValue(_))));

        let config =
            RunConfiguration::from_pairs([("url", "sqlite::memory:"), ("user", "bench")]).unwrap();
        let endpoint = config.endpoint().unwrap();
        assert_eq!("sqlite::memory:", endpoint.url);
        assert_eq!(Some("bench".to_string()), endpoint.user);
    }

    #[test]
    fn record_summary_writes_outputs() {
        let mut config = RunConfiguration::from_pairs([("scenario", "readSimple")]).unwrap();
        let summary = RunSummary::new(
            "run".to_string(),
            "readSimple".to_string(),
            0,
            config.inputs(),
            vec![
                WorkerResult {
                    iterations: 4,
                    elapsed: Duration::from_secs(2),
                    recoverable_errors: 1,
                    ..WorkerResult::new("worker-0")
                },
                WorkerResult::failed_before_start("worker-1", "boom"),
            ],
            "0.1.0".to_string(),
        );

        config.record_summary(&summary).unwrap();

        assert_eq!("2", config.get(KEY_ACTUAL_DURATION).unwrap());
        assert_eq!("4", config.get(KEY_ACTUAL_ITERATIONS).unwrap());
        assert_eq!("0.5", config.get(KEY_ACTUAL_AVG_DURATION).unwrap());
        assert_eq!("2", config.get(KEY_ACTUAL_AVG_OPS_SEC).unwrap());
        assert_eq!("1", config.get(KEY_ACTUAL_SQL_EXCEPTIONS).unwrap());
        assert_eq!("1", config.get(KEY_ACTUAL_OTHER_EXCEPTIONS).unwrap());
        assert!(!config.inputs().contains_key(KEY_ACTUAL_DURATION));
    }

    #[test]
    fn toml_scalars_and_lists() {
        let properties = parse_properties(
            r#"
            scenario = "readSimple"
            threads = [1, 2]
            autocommit = false
            ratio = 0.5
            "#,
        )
        .unwrap();

        assert_eq!(
            Some(&PropertyValue::Choices(vec!["1".to_string(), "2".to_string()])),
            properties.get("threads")
        );
        assert_eq!(
            Some(&PropertyValue::Single("false".to_string())),
            properties.get("autocommit")
        );
        assert_eq!(
            Some(&PropertyValue::Single("0.5".to_string())),
            properties.get("ratio")
        );
    }

    #[test]
    fn nested_tables_rejected() {
        let result = parse_properties("[db]\nurl = \"x\"\n");
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn empty_list_rejected() {
        assert!(parse_properties("threads = []").is_err());
    }

    #[test]
    fn expansion_is_cartesian_in_key_order() {
        let properties = parse_properties(
            r#"
            scenario = "readSimple"
            threads = [1, 2]
            tables = [1, 4, 8]
            "#,
        )
        .unwrap();

        let runs = RunSet::expand(&properties).unwrap();

        assert_eq!(6, runs.len());
        let combinations = runs
            .iter()
            .map(|r| (r.get("tables").unwrap(), r.get("threads").unwrap()))
            .collect::<Vec<_>>();
        assert_eq!(
            vec![
                ("1", "1"),
                ("1", "2"),
                ("4", "1"),
                ("4", "2"),
                ("8", "1"),
                ("8", "2"),
            ],
            combinations
        );
        assert_eq!(Some(PropertyKind::Variable), runs.metadata().kind("threads"));
        assert_eq!(Some(PropertyKind::Fixed), runs.metadata().kind("scenario"));
    }

    #[test]
    fn empty_properties_give_one_default_run() {
        let runs = RunSet::expand(&Properties::new()).unwrap();
        assert_eq!(1, runs.len());
    }

    #[test]
    fn override_parsing() {
        assert_eq!(
            PropertyValue::Single("4".to_string()),
            PropertyValue::parse_override("4")
        );
        assert_eq!(
            PropertyValue::Choices(vec!["1".to_string(), "2".to_string()]),
            PropertyValue::parse_override("1|2")
        );
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bench.toml");
        std::fs::write(&path, "scenario = \"deadlock\"\nthreads = 3\n").unwrap();

        let runs = RunSet::load(&path).unwrap();
        let run = runs.iter().next().unwrap();
        assert_eq!("deadlock", run.scenario().unwrap());
        assert_eq!(3, run.threads().unwrap());
    }

    #[test]
    fn missing_file() {
        assert!(matches!(
            RunSet::load("/definitely/not/here.toml"),
            Err(ConfigError::Io { .. })
        ));
    }
}

use std::sync::Arc;

use anyhow::Context;
use replibench_runner::prelude::{
    load_properties, Benchmark, ConsoleTableSink, JsonlSummarySink, Properties, PropertyValue,
    ReportSink, RunSet, TextReportSink,
};
use replibench_scenarios::prelude::default_registry;
use replibench_sqlite::prelude::SqliteProvider;
use replibench_summary_model::RunSummary;

use crate::cli::BenchArgs;

/// Load the properties file and apply the command line overrides on top of it.
pub fn properties(args: &BenchArgs) -> anyhow::Result<Properties> {
    let mut properties = load_properties(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    apply_overrides(&mut properties, &args.overrides);
    Ok(properties)
}

fn apply_overrides(properties: &mut Properties, overrides: &[(String, String)]) {
    for (key, value) in overrides {
        log::debug!("Overriding property {key} with {value}");
        properties.insert(key.clone(), PropertyValue::parse_override(value));
    }
}

fn sinks(args: &BenchArgs) -> anyhow::Result<Vec<Box<dyn ReportSink>>> {
    let mut sinks: Vec<Box<dyn ReportSink>> = vec![Box::new(ConsoleTableSink::new())];
    if let Some(path) = &args.jsonl {
        sinks.push(Box::new(JsonlSummarySink::new(path)));
    }
    if let Some(path) = &args.text {
        sinks.push(Box::new(TextReportSink::create(path)?));
    }
    Ok(sinks)
}

pub fn run(args: &BenchArgs) -> anyhow::Result<Vec<RunSummary>> {
    let runs = RunSet::expand(&properties(args)?)?;
    log::info!(
        "Loaded {} runs from {}",
        runs.len(),
        args.config.display()
    );

    let benchmark = Benchmark::new(default_registry(), Arc::new(SqliteProvider::new()))?
        .with_ctrl_c()
        .with_no_progress(args.no_progress)
        .with_summary_table(args.summary_table);

    let mut sinks = sinks(args)?;
    benchmark.run_all(runs, &mut sinks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use replibench_runner::prelude::parse_properties;
    use std::path::PathBuf;

    fn bench_args(dir: &tempfile::TempDir, overrides: &[(&str, &str)]) -> BenchArgs {
        BenchArgs {
            config: dir.path().join("bench.toml"),
            overrides: overrides
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            jsonl: None,
            text: None,
            no_progress: true,
            summary_table: false,
        }
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut properties = parse_properties("threads = 1\nscenario = \"readSimple\"").unwrap();
        apply_overrides(
            &mut properties,
            &[
                ("threads".to_string(), "2|4".to_string()),
                ("datarows".to_string(), "5".to_string()),
            ],
        );

        assert_eq!(
            Some(&PropertyValue::Choices(vec!["2".to_string(), "4".to_string()])),
            properties.get("threads")
        );
        assert_eq!(
            Some(&PropertyValue::Single("5".to_string())),
            properties.get("datarows")
        );
        assert_eq!(2, RunSet::expand(&properties).unwrap().len());
    }

    #[test]
    fn missing_config_file() {
        let args = BenchArgs {
            config: PathBuf::from("/nonexistent/bench.toml"),
            overrides: Vec::new(),
            jsonl: None,
            text: None,
            no_progress: true,
            summary_table: false,
        };
        assert!(properties(&args).is_err());
    }

    #[test]
    fn runs_every_configuration() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("bench.db").display());
        std::fs::write(
            dir.path().join("bench.toml"),
            "scenario = \"readSimple\"\nbound = \"iterations\"\niterations = 5\nthreads = [1, 2]\n",
        )
        .unwrap();

        let mut args = bench_args(&dir, &[("url", &url)]);
        args.jsonl = Some(dir.path().join("runs.jsonl"));
        args.text = Some(dir.path().join("runs.txt"));

        let summaries = run(&args).unwrap();
        assert_eq!(2, summaries.len());
        assert_eq!(5, summaries[0].totals.total_iterations);
        assert_eq!(10, summaries[1].totals.total_iterations);

        let jsonl = std::fs::read_to_string(dir.path().join("runs.jsonl")).unwrap();
        assert_eq!(2, jsonl.lines().count());
        let text = std::fs::read_to_string(dir.path().join("runs.txt")).unwrap();
        assert_eq!(3, text.lines().count());
    }
}

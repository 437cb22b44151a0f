mod aggregate;
mod worker;

pub use aggregate::{aggregate, RunTotals};
pub use worker::WorkerResult;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use sha3::Digest;
use std::collections::BTreeMap;
use std::io::{BufRead, Read, Write};
use std::path::Path;

/// Summary of a single benchmark run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    /// The unique run id
    ///
    /// Chosen by the coordinator. Unique for each run.
    pub run_id: String,
    /// The name of the scenario that was run
    pub scenario_name: String,
    /// The time the run started
    ///
    /// This is a Unix timestamp in seconds.
    pub started_at: i64,
    /// The input configuration of the run, output keys excluded
    pub config: BTreeMap<String, String>,
    /// Metrics folded from [RunSummary::workers]
    pub totals: RunTotals,
    /// One result per worker, in worker order
    ///
    /// A worker whose thread could not be joined still has an entry, with its fatal error set.
    pub workers: Vec<WorkerResult>,
    /// The version of replibench that produced this summary
    pub replibench_version: String,
}

impl RunSummary {
    /// Create a new run summary, aggregating the worker results.
    pub fn new(
        run_id: String,
        scenario_name: String,
        started_at: i64,
        config: BTreeMap<String, String>,
        workers: Vec<WorkerResult>,
        replibench_version: String,
    ) -> Self {
        let totals = aggregate(&workers);
        Self {
            run_id,
            scenario_name,
            started_at,
            config,
            totals,
            workers,
            replibench_version,
        }
    }

    /// Number of workers configured for the run
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Compute a fingerprint for this run summary
    ///
    /// The fingerprint identifies the configuration used to run the scenario so that results of
    /// identical configurations can be compared. It uses the
    ///     - Scenario name
    ///     - Input configuration, in key order
    ///     - replibench version
    ///
    /// The fingerprint is computed using [sha3::Sha3_256].
    pub fn fingerprint(&self) -> String {
        let mut hasher = sha3::Sha3_256::new();
        Digest::update(&mut hasher, self.scenario_name.as_bytes());
        self.config
            .iter()
            .sorted_by_key(|(k, _)| k.to_owned())
            .for_each(|(k, v)| {
                Digest::update(&mut hasher, k.as_bytes());
                Digest::update(&mut hasher, v.as_bytes());
            });
        Digest::update(&mut hasher, self.replibench_version.as_bytes());

        format!("{:x}", hasher.finalize())
    }
}

/// Append the run summary to a file
///
/// The summary will be serialized to JSON and output as a single line followed by a newline. The
/// recommended file extension is `.jsonl`.
pub fn append_run_summary(run_summary: &RunSummary, path: impl AsRef<Path>) -> anyhow::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)?;
    store_run_summary(run_summary, &mut file)?;
    file.write_all(b"\n")?;
    Ok(())
}

/// Serialize the run summary to a writer
pub fn store_run_summary<W: Write>(run_summary: &RunSummary, writer: &mut W) -> anyhow::Result<()> {
    serde_json::to_writer(writer, run_summary)?;
    Ok(())
}

/// Load a run summary from a reader
pub fn load_run_summary<R: Read>(reader: R) -> anyhow::Result<RunSummary> {
    let reader = std::io::BufReader::new(reader);
    let run_summary: RunSummary = serde_json::from_reader(reader)?;
    Ok(run_summary)
}

/// Load run summaries from a file
///
/// The file should contain one JSON object per line. This is the format produced by
/// [append_run_summary]. Blank lines are skipped.
pub fn load_summary_runs(path: impl AsRef<Path>) -> anyhow::Result<Vec<RunSummary>> {
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    let mut runs = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let run: RunSummary = serde_json::from_str(&line)?;
        runs.push(run);
    }
    Ok(runs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn sample(config: &[(&str, &str)]) -> RunSummary {
        let workers = vec![
            WorkerResult {
                iterations: 5,
                elapsed: Duration::from_millis(250),
                ..WorkerResult::new("worker-0")
            },
            WorkerResult {
                iterations: 5,
                elapsed: Duration::from_millis(500),
                ..WorkerResult::new("worker-1")
            },
        ];
        RunSummary::new(
            "run-1".to_string(),
            "readSimple".to_string(),
            1_700_000_000,
            config
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            workers,
            "0.1.0".to_string(),
        )
    }

    #[test]
    fn new_aggregates_workers() {
        let summary = sample(&[]);
        assert_eq!(2, summary.worker_count());
        assert_eq!(10, summary.totals.total_iterations);
        assert_eq!(Duration::from_millis(500), summary.totals.total_elapsed);
        assert_eq!(20.0, summary.totals.avg_ops_per_sec);
    }

    #[test]
    fn fingerprint_ignores_run_identity() {
        let mut a = sample(&[("threads", "2")]);
        let b = sample(&[("threads", "2")]);
        a.run_id = "run-2".to_string();
        a.started_at += 60;
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn fingerprint_changes_with_config() {
        let a = sample(&[("threads", "2")]);
        let b = sample(&[("threads", "4")]);
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn jsonl_append_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summaries.jsonl");

        let first = sample(&[("threads", "1")]);
        let second = sample(&[("threads", "2")]);
        append_run_summary(&first, &path).unwrap();
        append_run_summary(&second, &path).unwrap();

        let loaded = load_summary_runs(&path).unwrap();
        assert_eq!(vec![first, second], loaded);
    }

    #[test]
    fn store_then_load_single() {
        let summary = sample(&[]);
        let mut buf = Vec::new();
        store_run_summary(&summary, &mut buf).unwrap();
        assert_eq!(summary, load_run_summary(buf.as_slice()).unwrap());
    }
}

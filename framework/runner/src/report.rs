use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use replibench_summary_model::{append_run_summary, RunSummary};
use tabled::builder::Builder;
use tabled::settings::Style;

use crate::config::{PropertyKind, RunConfiguration};
use crate::types::BenchResult;

/// Receives the results of a run set.
///
/// [ReportSink::result_generated] is called once per run, after the output keys of `config` have
/// been recorded. [ReportSink::cleanup] is called once after the last run, even if a run failed.
pub trait ReportSink {
    fn result_generated(&mut self, config: &RunConfiguration, summary: &RunSummary)
        -> BenchResult<()>;

    fn cleanup(&mut self) -> BenchResult<()>;
}

/// Prints a table with one row per run when the run set is complete.
///
/// Fixed keys are printed once above the table. Variable and output keys form the columns.
#[derive(Debug, Default)]
pub struct ConsoleTableSink {
    fixed: Vec<(String, String)>,
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl ConsoleTableSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render the collected runs, or `None` if no run was reported.
    pub fn render(&self) -> Option<String> {
        if self.rows.is_empty() {
            return None;
        }

        let mut out = String::new();
        if !self.fixed.is_empty() {
            let mut builder = Builder::default();
            builder.push_record(["key", "value"]);
            for (key, value) in &self.fixed {
                builder.push_record([key.as_str(), value.as_str()]);
            }
            let mut table = builder.build();
            table.with(Style::modern());
            out.push_str(&format!("Configuration\n{table}\n"));
        }

        let mut builder = Builder::default();
        builder.push_record(self.header.iter().map(String::as_str));
        for row in &self.rows {
            builder.push_record(row.iter().map(String::as_str));
        }
        let mut table = builder.build();
        table.with(Style::modern());
        out.push_str(&format!("Results\n{table}"));

        Some(out)
    }
}

impl ReportSink for ConsoleTableSink {
    fn result_generated(
        &mut self,
        config: &RunConfiguration,
        _summary: &RunSummary,
    ) -> BenchResult<()> {
        let metadata = config.metadata();
        if self.rows.is_empty() {
            self.fixed = metadata
                .iter()
                .filter(|p| p.kind == PropertyKind::Fixed)
                .filter_map(|p| config.get_opt(&p.name).map(|v| (p.name.clone(), v.to_string())))
                .collect();
            // Variables first so the inputs that change between runs lead each row.
            self.header = metadata
                .iter()
                .filter(|p| p.kind == PropertyKind::Variable)
                .chain(metadata.iter().filter(|p| p.kind == PropertyKind::Output))
                .map(|p| p.name.clone())
                .collect();
        }

        self.rows.push(
            self.header
                .iter()
                .map(|key| config.get_opt(key).unwrap_or_default().to_string())
                .collect(),
        );
        Ok(())
    }

    fn cleanup(&mut self) -> BenchResult<()> {
        if let Some(rendered) = self.render() {
            println!("\n{rendered}");
        }
        Ok(())
    }
}

/// Writes a tab separated text report, one header line then one line per run.
///
/// Every declared key is a column, in key order. Tabs, newlines and backslashes inside values are
/// escaped so that each run stays on one line.
pub struct TextReportSink {
    path: PathBuf,
    writer: BufWriter<File>,
    header_written: bool,
}

impl TextReportSink {
    pub fn create(path: impl AsRef<Path>) -> BenchResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)
            .with_context(|| format!("Failed to create text report {}", path.display()))?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            header_written: false,
        })
    }
}

impl ReportSink for TextReportSink {
    fn result_generated(
        &mut self,
        config: &RunConfiguration,
        _summary: &RunSummary,
    ) -> BenchResult<()> {
        let names = config.metadata().names().collect::<Vec<_>>();
        if !self.header_written {
            writeln!(self.writer, "{}", join_escaped(names.iter().copied()))?;
            self.header_written = true;
        }
        let values = names
            .iter()
            .map(|name| config.get_opt(name).unwrap_or_default());
        writeln!(self.writer, "{}", join_escaped(values))?;
        Ok(())
    }

    fn cleanup(&mut self) -> BenchResult<()> {
        self.writer
            .flush()
            .with_context(|| format!("Failed to write text report {}", self.path.display()))?;
        log::info!("Text report written to {}", self.path.display());
        Ok(())
    }
}

fn join_escaped<'a>(values: impl Iterator<Item = &'a str>) -> String {
    values.map(escape).collect::<Vec<_>>().join("\t")
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\t' => escaped.push_str("\\t"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Appends every [RunSummary] to a JSON lines file.
#[derive(Debug)]
pub struct JsonlSummarySink {
    path: PathBuf,
    written: usize,
}

impl JsonlSummarySink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            written: 0,
        }
    }
}

impl ReportSink for JsonlSummarySink {
    fn result_generated(
        &mut self,
        _config: &RunConfiguration,
        summary: &RunSummary,
    ) -> BenchResult<()> {
        append_run_summary(summary, &self.path)
            .with_context(|| format!("Failed to append run summary to {}", self.path.display()))?;
        self.written += 1;
        Ok(())
    }

    fn cleanup(&mut self) -> BenchResult<()> {
        log::info!(
            "Wrote {} run summaries to {}",
            self.written,
            self.path.display()
        );
        Ok(())
    }
}

mod operations_table;

use crate::report::{ReportCollector, ReportMetric};
use crate::OperationRecord;
use operations_table::{MetricRow, OperationRow};
use std::collections::BTreeMap;
use std::time::Duration;
use tabled::settings::Style;
use tabled::Table;

/// Running statistics for one operation id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationStats {
    pub total_operations: u64,
    pub failed_operations: u64,
    pub total_duration: Duration,
    /// Fastest successful operation. Failed operations are excluded from min and max because they
    /// often return early and would skew the range.
    pub min_duration: Option<Duration>,
    pub max_duration: Option<Duration>,
}

impl OperationStats {
    fn record(&mut self, duration: Duration, is_error: bool) {
        self.total_operations += 1;
        self.total_duration += duration;
        if is_error {
            self.failed_operations += 1;
            return;
        }
        self.min_duration = Some(self.min_duration.map_or(duration, |d| d.min(duration)));
        self.max_duration = Some(self.max_duration.map_or(duration, |d| d.max(duration)));
    }

    pub fn avg_duration(&self) -> Duration {
        if self.total_operations == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.total_duration.as_secs_f64() / self.total_operations as f64)
    }
}

/// Running statistics for one custom metric name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricStats {
    pub samples: u64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
    pub last: f64,
}

impl MetricStats {
    fn record(&mut self, value: f64) {
        if self.samples == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.samples += 1;
        self.sum += value;
        self.last = value;
    }

    pub fn mean(&self) -> f64 {
        if self.samples == 0 {
            0.0
        } else {
            self.sum / self.samples as f64
        }
    }
}

/// A basic reporter that keeps running statistics in memory and prints a summary of the
/// operations and custom metrics at the end of the run.
///
/// Only aggregates are kept, so memory use does not grow with the length of a duration-bound run.
#[derive(Debug, Default)]
pub struct InMemoryReporter {
    operations: BTreeMap<String, OperationStats>,
    metrics: BTreeMap<String, MetricStats>,
}

impl InMemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn operation_stats(&self, operation_id: &str) -> Option<&OperationStats> {
        self.operations.get(operation_id)
    }

    pub fn metric_stats(&self, name: &str) -> Option<&MetricStats> {
        self.metrics.get(name)
    }

    pub(crate) fn print_summary_of_operations(&self) {
        if !self.operations.is_empty() {
            println!("\nSummary of operations");
            let rows = self
                .operations
                .iter()
                .map(|(operation_id, stats)| OperationRow {
                    operation_id: operation_id.clone(),
                    avg_time_ms: as_ms(stats.avg_duration()),
                    min_time_ms: stats.min_duration.map(as_ms).unwrap_or_default(),
                    max_time_ms: stats.max_duration.map(as_ms).unwrap_or_default(),
                    total_operations: stats.total_operations,
                    failed_operations: stats.failed_operations,
                    total_duration_ms: as_ms(stats.total_duration),
                })
                .collect::<Vec<_>>();

            let mut table = Table::new(rows);
            table.with(Style::modern());
            println!("{table}");
        }

        if !self.metrics.is_empty() {
            println!("\nCustom metrics");
            let rows = self
                .metrics
                .iter()
                .map(|(metric, stats)| MetricRow {
                    metric: metric.clone(),
                    samples: stats.samples,
                    mean: stats.mean(),
                    min: stats.min,
                    max: stats.max,
                    last: stats.last,
                })
                .collect::<Vec<_>>();

            let mut table = Table::new(rows);
            table.with(Style::modern());
            println!("{table}");
        }
    }
}

fn as_ms(duration: Duration) -> f64 {
    duration.as_micros() as f64 / 1000.0
}

impl ReportCollector for InMemoryReporter {
    fn add_operation(&mut self, operation_record: &OperationRecord) {
        let Some(duration) = operation_record.duration() else {
            log::warn!(
                "Ignoring unfinished operation record: {}",
                operation_record.operation_id()
            );
            return;
        };
        self.operations
            .entry(operation_record.operation_id().to_string())
            .or_default()
            .record(duration, operation_record.is_error());
    }

    fn add_custom(&mut self, metric: ReportMetric) {
        self.metrics
            .entry(metric.name)
            .or_default()
            .record(metric.value);
    }

    fn finalize(&self) {
        self.print_summary_of_operations();
    }
}

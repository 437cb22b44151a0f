mod in_memory_reporter;

use crate::OperationRecord;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::SystemTime;

pub use in_memory_reporter::{InMemoryReporter, MetricStats, OperationStats};

/// A named numeric sample that is not an operation timing, e.g. an observed replication lag.
///
/// The reported timestamp for the metric is the time the metric is created.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportMetric {
    pub name: String,
    pub value: f64,
    pub tags: BTreeMap<String, String>,
    pub timestamp: SystemTime,
}

impl ReportMetric {
    pub fn new(name: &str, value: f64) -> Self {
        Self {
            name: format!("rb.custom.{}", name),
            value,
            tags: BTreeMap::new(),
            timestamp: SystemTime::now(),
        }
    }

    pub fn with_tag(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.tags.insert(name.into(), value.to_string());
        self
    }
}

pub trait ReportCollector: Send {
    fn add_operation(&mut self, operation_record: &OperationRecord);

    /// Record a custom metric
    fn add_custom(&mut self, metric: ReportMetric);

    fn finalize(&self);
}

/// Thread-safe handle that fans reports out to every configured collector.
///
/// Cloning the handle is cheap and every clone reports to the same collectors, so one reporter can
/// be shared by all workers of a run.
#[derive(Clone)]
pub struct Reporter {
    collectors: Arc<Mutex<Vec<Box<dyn ReportCollector>>>>,
}

impl Reporter {
    pub fn add_operation(&self, operation_record: &OperationRecord) {
        for collector in self.collectors.lock().iter_mut() {
            collector.add_operation(operation_record);
        }
    }

    pub fn add_custom(&self, metric: ReportMetric) {
        let mut collectors = self.collectors.lock();
        if let Some((last, rest)) = collectors.split_last_mut() {
            for collector in rest {
                collector.add_custom(metric.clone());
            }
            last.add_custom(metric);
        }
    }

    /// Flush every collector. Called once by the coordinator after a run.
    pub fn finalize(&self) {
        for collector in self.collectors.lock().iter() {
            collector.finalize();
        }
    }
}

impl std::fmt::Debug for Reporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reporter")
            .field("collectors", &self.collectors.lock().len())
            .finish()
    }
}

/// Chooses which collectors a [Reporter] reports to.
#[derive(Default)]
pub struct ReportConfig {
    collectors: Vec<Box<dyn ReportCollector>>,
}

impl ReportConfig {
    /// Print a table of operation timings and custom metrics when the run is finalized.
    pub fn enable_summary(self) -> Self {
        self.with_collector(InMemoryReporter::new())
    }

    pub fn with_collector(mut self, collector: impl ReportCollector + 'static) -> Self {
        self.collectors.push(Box::new(collector));
        self
    }

    pub fn init(self) -> Reporter {
        Reporter {
            collectors: Arc::new(Mutex::new(self.collectors)),
        }
    }
}

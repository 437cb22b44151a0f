mod report;

use std::time::{Duration, Instant};

pub use report::{
    InMemoryReporter, MetricStats, OperationStats, ReportCollector, ReportConfig, ReportMetric,
    Reporter,
};

/// Timing of a single operation, such as one scenario iteration or one heartbeat flush.
#[derive(Debug, Clone)]
pub struct OperationRecord {
    operation_id: String,
    started: Instant,
    elapsed: Option<Duration>,
    is_error: bool,
}

impl OperationRecord {
    /// Start timing an operation now.
    pub fn new(operation_id: impl Into<String>) -> Self {
        Self {
            operation_id: operation_id.into(),
            started: Instant::now(),
            elapsed: None,
            is_error: false,
        }
    }

    pub fn operation_id(&self) -> &str {
        &self.operation_id
    }

    /// The measured duration, or `None` if the operation has not been finished yet.
    pub fn duration(&self) -> Option<Duration> {
        self.elapsed
    }

    pub fn is_error(&self) -> bool {
        self.is_error
    }

    fn finish<T, E>(&mut self, response: &Result<T, E>) {
        self.elapsed = Some(self.started.elapsed());
        self.is_error = response.is_err();
    }
}

/// Stop the timer on an operation and hand the record to the reporter.
pub fn report_operation<T, E>(
    reporter: &Reporter,
    mut operation_record: OperationRecord,
    response: &Result<T, E>,
) {
    operation_record.finish(response);
    log::trace!(
        "Operation {} took {}ms, and failed? {:?}",
        operation_record.operation_id,
        operation_record
            .elapsed
            .unwrap_or_default()
            .as_millis(),
        operation_record.is_error,
    );
    reporter.add_operation(&operation_record);
}

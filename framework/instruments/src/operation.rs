use std::time::{Duration, Instant};

use crate::report::Reporter;

/// Timing for one operation against the system under test, such as a single HTTP request.
#[derive(Debug, Clone)]
pub struct OperationRecord {
    pub operation_id: String,
    started: Instant,
    elapsed: Option<Duration>,
    pub is_error: bool,
}

impl OperationRecord {
    pub fn new(operation_id: impl Into<String>) -> Self {
        Self {
            operation_id: operation_id.into(),
            started: Instant::now(),
            elapsed: None,
            is_error: false,
        }
    }

    /// How long the operation took, if it has finished.
    pub fn duration(&self) -> Option<Duration> {
        self.elapsed
    }

    pub(crate) fn finish(&mut self, is_error: bool) {
        self.elapsed = Some(self.started.elapsed());
        self.is_error = is_error;
    }
}

/// Finish timing an operation and hand it to the reporter.
pub fn report_operation<T, E>(
    reporter: &Reporter,
    mut operation_record: OperationRecord,
    response: &Result<T, E>,
) {
    operation_record.finish(response.is_err());
    reporter.add_operation(&operation_record);
}

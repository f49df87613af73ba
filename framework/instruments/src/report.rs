mod in_memory_reporter;

use std::time::Duration;

use parking_lot::Mutex;

use crate::{CheckTally, OperationRecord};

pub use in_memory_reporter::InMemoryReporter;

pub trait ReportCollector {
    fn add_operation(&mut self, operation_record: &OperationRecord);

    /// Called once at the end of the run with the frozen check results and the wall-clock time the
    /// run took.
    fn finalize(&self, checks: &CheckTally, elapsed: Duration);
}

/// Choose which report collectors a run writes to.
///
/// With nothing enabled the resulting [Reporter] discards everything, which is what tests want.
#[derive(Debug, Default, Clone)]
pub struct ReportConfig {
    enable_in_memory: bool,
}

impl ReportConfig {
    pub fn enable_in_memory(mut self) -> Self {
        self.enable_in_memory = true;
        self
    }

    pub fn init(self) -> Reporter {
        let mut collectors: Vec<Mutex<Box<dyn ReportCollector + Send>>> = Vec::new();
        if self.enable_in_memory {
            collectors.push(Mutex::new(Box::new(InMemoryReporter::new())));
        }

        Reporter { collectors }
    }
}

/// Fans operations out to every enabled [ReportCollector]. Shared by all virtual users.
pub struct Reporter {
    collectors: Vec<Mutex<Box<dyn ReportCollector + Send>>>,
}

impl std::fmt::Debug for Reporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reporter")
            .field("collectors", &self.collectors.len())
            .finish()
    }
}

impl Reporter {
    pub fn add_operation(&self, operation_record: &OperationRecord) {
        for collector in &self.collectors {
            collector.lock().add_operation(operation_record);
        }
    }

    pub fn finalize(&self, checks: &CheckTally, elapsed: Duration) {
        for collector in &self.collectors {
            collector.lock().finalize(checks, elapsed);
        }
    }
}

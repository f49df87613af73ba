mod check;
mod operation;
mod report;

pub use check::{CheckAggregator, CheckResult, CheckTally, Checks};
pub use operation::{report_operation, OperationRecord};
pub use report::{InMemoryReporter, ReportCollector, ReportConfig, Reporter};

pub mod prelude {
    pub use crate::{
        report_operation, CheckAggregator, CheckResult, CheckTally, Checks, OperationRecord,
        ReportConfig, Reporter,
    };
    pub use gale_summary_model::CheckCounts;
}

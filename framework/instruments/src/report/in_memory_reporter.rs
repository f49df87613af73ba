mod checks_table;
mod operations_table;

use crate::report::in_memory_reporter::checks_table::CheckRow;
use crate::report::in_memory_reporter::operations_table::OperationRow;
use crate::report::ReportCollector;
use crate::{CheckTally, OperationRecord};
use std::collections::HashMap;
use std::time::Duration;
use tabled::settings::Style;
use tabled::Table;

/// A very basic reporter that is useful while developing scenarios. It keeps all of the operations
/// in memory and prints a summary of the operations and checks at the end of the run.
#[derive(Default)]
pub struct InMemoryReporter {
    operation_records: Vec<OperationRecord>,
}

impl InMemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    fn operation_rows(&self) -> Vec<OperationRow> {
        let mut rows = self
            .operation_records
            .iter()
            .fold(HashMap::<&str, Vec<&OperationRecord>>::new(), |mut acc, record| {
                acc.entry(record.operation_id.as_str())
                    .or_default()
                    .push(record);
                acc
            })
            .into_iter()
            .map(|(operation_id, operations)| {
                let total_operations = operations.len();
                let durations = operations
                    .iter()
                    .filter_map(|record| record.duration())
                    .collect::<Vec<_>>();
                let total_duration = durations.iter().sum::<Duration>();
                let succeeded = operations
                    .iter()
                    .filter(|op| !op.is_error)
                    .filter_map(|op| op.duration());

                OperationRow {
                    operation_id: operation_id.to_string(),
                    total_operations,
                    errors: operations.iter().filter(|op| op.is_error).count(),
                    total_duration_ms: as_ms(total_duration),
                    avg_time_ms: as_ms(total_duration) / durations.len().max(1) as f64,
                    min_time_ms: succeeded.clone().min().map(as_ms),
                    max_time_ms: succeeded.max().map(as_ms),
                }
            })
            .collect::<Vec<_>>();
        rows.sort_by(|a, b| a.operation_id.cmp(&b.operation_id));
        rows
    }

    pub(crate) fn print_summary_of_operations(&self) {
        if self.operation_records.is_empty() {
            return;
        }

        println!("\nSummary of operations");
        let mut table = Table::new(self.operation_rows());
        table.with(Style::modern());

        println!("{table}");
    }

    pub(crate) fn print_summary_of_checks(checks: &CheckTally, elapsed: Duration) {
        println!("\n{}", checks_heading(checks, elapsed));
        let rows = checks
            .checks
            .iter()
            .map(|(name, counts)| CheckRow {
                check: name.clone(),
                passes: counts.passes,
                fails: counts.fails,
                failure_rate: counts.failure_rate(),
            })
            .collect::<Vec<_>>();

        let mut table = Table::new(rows);
        table.with(Style::modern());

        println!("{table}");
    }
}

fn checks_heading(checks: &CheckTally, elapsed: Duration) -> String {
    format!(
        "Summary of checks ({} iterations in {:.2}s)",
        checks.iterations,
        elapsed.as_secs_f64()
    )
}

fn as_ms(duration: Duration) -> f64 {
    duration.as_micros() as f64 / 1000.0
}

impl ReportCollector for InMemoryReporter {
    fn add_operation(&mut self, operation_record: &OperationRecord) {
        self.operation_records.push(operation_record.clone());
    }

    fn finalize(&self, checks: &CheckTally, elapsed: Duration) {
        self.print_summary_of_operations();
        Self::print_summary_of_checks(checks, elapsed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report_operation;
    use crate::ReportConfig;

    #[test]
    fn operation_rows_ignore_errors_for_min_and_max() {
        let mut reporter = InMemoryReporter::new();
        let reporter_handle = ReportConfig::default().init();

        for result in [Ok(()), Err("timeout"), Ok(())] {
            let mut record = OperationRecord::new("http_get");
            record.finish(result.is_err());
            reporter.add_operation(&record);
            report_operation(&reporter_handle, OperationRecord::new("http_get"), &result);
        }

        let rows = reporter.operation_rows();
        assert_eq!(1, rows.len());
        assert_eq!("http_get", rows[0].operation_id);
        assert_eq!(3, rows[0].total_operations);
        assert_eq!(1, rows[0].errors);
        assert!(rows[0].min_time_ms.is_some());
        assert!(rows[0].min_time_ms <= rows[0].max_time_ms);
    }

    #[test]
    fn checks_heading_shows_iterations_and_elapsed_time() {
        let tally = CheckTally {
            iterations: 1200,
            ..Default::default()
        };

        assert_eq!(
            "Summary of checks (1200 iterations in 60.25s)",
            checks_heading(&tally, Duration::from_millis(60_250))
        );
    }

    #[test]
    fn operation_rows_without_successes_have_no_min_or_max() {
        let mut reporter = InMemoryReporter::new();
        let mut record = OperationRecord::new("http_get");
        record.finish(true);
        reporter.add_operation(&record);

        let rows = reporter.operation_rows();
        assert_eq!(None, rows[0].min_time_ms);
        assert_eq!(None, rows[0].max_time_ms);
    }
}

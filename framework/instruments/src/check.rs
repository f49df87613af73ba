use std::collections::BTreeMap;

use gale_summary_model::CheckCounts;
use parking_lot::Mutex;

/// The outcome of evaluating one named check once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    name: String,
    passed: bool,
}

impl CheckResult {
    pub fn new(name: impl Into<String>, passed: bool) -> Self {
        Self {
            name: name.into(),
            passed,
        }
    }

    pub fn passed(name: impl Into<String>) -> Self {
        Self::new(name, true)
    }

    pub fn failed(name: impl Into<String>) -> Self {
        Self::new(name, false)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_pass(&self) -> bool {
        self.passed
    }
}

/// Evaluates named predicates against a value and records one [CheckResult] per predicate.
///
/// Every predicate is evaluated, even after one has failed, so that each check is counted once per
/// iteration.
///
/// ```
/// use gale_instruments::{CheckResult, Checks};
///
/// let mut results = Vec::new();
/// let status = 500;
/// let passed = Checks::new(&status, &mut results)
///     .that("status is 200", |s| *s == 200)
///     .that("status is not 404", |s| *s != 404)
///     .passed();
///
/// assert!(!passed);
/// assert_eq!(
///     vec![
///         CheckResult::failed("status is 200"),
///         CheckResult::passed("status is not 404")
///     ],
///     results
/// );
/// ```
pub struct Checks<'a, T> {
    value: &'a T,
    results: &'a mut Vec<CheckResult>,
    all_passed: bool,
}

impl<'a, T> Checks<'a, T> {
    pub fn new(value: &'a T, results: &'a mut Vec<CheckResult>) -> Self {
        Self {
            value,
            results,
            all_passed: true,
        }
    }

    pub fn that(mut self, name: &str, predicate: impl FnOnce(&T) -> bool) -> Self {
        let passed = predicate(self.value);
        self.all_passed &= passed;
        self.results.push(CheckResult::new(name, passed));
        self
    }

    /// True if every predicate evaluated so far passed.
    pub fn passed(&self) -> bool {
        self.all_passed
    }
}

impl<T, E> Checks<'_, Result<T, E>> {
    /// Check a value that might not exist, such as the response to a request that failed.
    ///
    /// An `Err` fails the check without calling the predicate.
    pub fn that_ok(self, name: &str, predicate: impl FnOnce(&T) -> bool) -> Self {
        self.that(name, |value| value.as_ref().is_ok_and(predicate))
    }
}

/// Final check counts once a run is over.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CheckTally {
    pub checks: BTreeMap<String, CheckCounts>,
    pub iterations: u64,
}

#[derive(Debug, Default)]
struct AggregateState {
    tally: CheckTally,
    frozen: bool,
}

/// Sink that every virtual user reports its iteration results to.
///
/// Results are committed one iteration at a time so that an iteration is either fully counted or
/// not counted at all. Once [CheckAggregator::freeze] has been called, further commits are dropped.
#[derive(Debug, Default)]
pub struct CheckAggregator {
    state: Mutex<AggregateState>,
}

impl CheckAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit the results of one completed iteration.
    ///
    /// Returns false if the aggregator has been frozen and the results were discarded.
    pub fn record_iteration(&self, results: Vec<CheckResult>) -> bool {
        let mut state = self.state.lock();
        if state.frozen {
            return false;
        }

        state.tally.iterations += 1;
        for result in results {
            let counts = state.tally.checks.entry(result.name).or_default();
            if result.passed {
                counts.passes += 1;
            } else {
                counts.fails += 1;
            }
        }

        true
    }

    /// Number of iterations committed so far.
    pub fn iterations(&self) -> u64 {
        self.state.lock().tally.iterations
    }

    pub fn is_frozen(&self) -> bool {
        self.state.lock().frozen
    }

    /// Stop accepting results and return the final tally.
    ///
    /// Calling this more than once returns the same tally each time.
    pub fn freeze(&self) -> CheckTally {
        let mut state = self.state.lock();
        if !state.frozen {
            state.frozen = true;
            log::debug!(
                "Check results frozen after {} iterations",
                state.tally.iterations
            );
        }
        state.tally.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn checks_evaluate_every_predicate() {
        let mut results = Vec::new();
        let mut evaluated = 0;

        let passed = Checks::new(&"hello", &mut results)
            .that("is empty", |s| {
                evaluated += 1;
                s.is_empty()
            })
            .that("starts with h", |s| s.starts_with('h'))
            .passed();

        assert!(!passed);
        assert_eq!(1, evaluated);
        assert_eq!(2, results.len());
    }

    #[test]
    fn missing_value_fails_checks() {
        let mut results = Vec::new();
        let response: Result<u16, &str> = Err("connect");

        let passed = Checks::new(&response, &mut results)
            .that_ok("status is 200", |_| panic!("predicate must not run"))
            .passed();

        assert!(!passed);
        assert_eq!(vec![CheckResult::failed("status is 200")], results);

        let mut results = Vec::new();
        let response: Result<u16, &str> = Ok(200);
        Checks::new(&response, &mut results).that_ok("status is 200", |s| *s == 200);
        assert_eq!(vec![CheckResult::passed("status is 200")], results);
    }

    #[test]
    fn aggregates_passes_and_fails_per_check() {
        let aggregator = CheckAggregator::new();
        aggregator.record_iteration(vec![
            CheckResult::passed("status is 200"),
            CheckResult::failed("body has libros"),
        ]);
        aggregator.record_iteration(vec![CheckResult::passed("status is 200")]);
        aggregator.record_iteration(vec![]);

        let tally = aggregator.freeze();
        assert_eq!(3, tally.iterations);
        assert_eq!(
            CheckCounts {
                passes: 2,
                fails: 0
            },
            tally.checks["status is 200"]
        );
        assert_eq!(
            CheckCounts {
                passes: 0,
                fails: 1
            },
            tally.checks["body has libros"]
        );
    }

    #[test]
    fn results_after_freeze_are_discarded() {
        let aggregator = CheckAggregator::new();
        assert!(aggregator.record_iteration(vec![CheckResult::passed("ok")]));

        let tally = aggregator.freeze();
        assert!(aggregator.is_frozen());
        assert!(!aggregator.record_iteration(vec![CheckResult::passed("ok")]));

        assert_eq!(tally, aggregator.freeze());
        assert_eq!(1, aggregator.iterations());
    }

    #[test]
    fn concurrent_commits_are_not_lost() {
        let aggregator = Arc::new(CheckAggregator::new());

        let handles = (0..8)
            .map(|_| {
                let aggregator = aggregator.clone();
                std::thread::spawn(move || {
                    for i in 0..500 {
                        aggregator.record_iteration(vec![CheckResult::new("even", i % 2 == 0)]);
                    }
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.join().unwrap();
        }

        let tally = aggregator.freeze();
        assert_eq!(4000, tally.iterations);
        assert_eq!(
            CheckCounts {
                passes: 2000,
                fails: 2000
            },
            tally.checks["even"]
        );
    }
}

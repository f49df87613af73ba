use itertools::Itertools;
use serde::{Deserialize, Serialize};
use sha3::Digest;
use std::collections::BTreeMap;
use std::io::{BufRead, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

/// Pass and fail counts for a single named check.
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckCounts {
    pub passes: u64,
    pub fails: u64,
}

impl CheckCounts {
    /// Number of times the check was evaluated.
    pub fn total(&self) -> u64 {
        self.passes + self.fails
    }

    /// Fraction of evaluations that failed, or `None` if the check was never evaluated.
    pub fn failure_rate(&self) -> Option<f64> {
        match self.total() {
            0 => None,
            total => Some(self.fails as f64 / total as f64),
        }
    }
}

/// A pass/fail criterion over the aggregated results of one check.
///
/// The threshold is breached when the failure rate of the check is strictly greater than
/// [Threshold::max_failure_rate].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Threshold {
    pub check: String,
    pub max_failure_rate: f64,
}

impl Threshold {
    pub fn new(check: impl Into<String>, max_failure_rate: f64) -> Self {
        Self {
            check: check.into(),
            max_failure_rate,
        }
    }

    /// Evaluate this threshold against the final check counts of a run.
    pub fn evaluate(&self, checks: &BTreeMap<String, CheckCounts>) -> ThresholdOutcome {
        let failure_rate = checks.get(&self.check).and_then(CheckCounts::failure_rate);

        ThresholdOutcome {
            check: self.check.clone(),
            max_failure_rate: self.max_failure_rate,
            failure_rate,
            breached: failure_rate.is_some_and(|rate| rate > self.max_failure_rate),
        }
    }
}

/// The result of evaluating a [Threshold] at the end of a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThresholdOutcome {
    pub check: String,
    pub max_failure_rate: f64,
    /// The observed failure rate, `None` if the check was never evaluated during the run.
    pub failure_rate: Option<f64>,
    pub breached: bool,
}

/// Summary of a run
///
/// Built once by the runner after every virtual user has stopped or been abandoned. Nothing
/// modifies it after that point.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    /// The unique run id
    ///
    /// Chosen by the runner. Unique for each run unless overridden on the command line.
    pub run_id: String,
    /// The name of the scenario that was run
    pub scenario_name: String,
    /// The time the run started
    ///
    /// This is a Unix timestamp in seconds.
    pub started_at: i64,
    /// The number of virtual users configured
    pub virtual_users: usize,
    /// The duration that the run was configured with, in seconds
    ///
    /// Only set for duration bounded runs.
    pub run_duration: Option<f64>,
    /// The iteration budget that the run was configured with
    ///
    /// Only set for iteration bounded runs.
    pub run_iterations: Option<u64>,
    /// The pacing delay inserted after each iteration, in seconds
    pub pacing: f64,
    /// Wall-clock time from the first virtual user starting to the results being frozen, in seconds
    pub elapsed: f64,
    /// Total number of iterations whose results were recorded
    pub iterations: u64,
    /// Pass and fail counts per check name
    pub checks: BTreeMap<String, CheckCounts>,
    /// The outcome of every configured threshold
    pub thresholds: Vec<ThresholdOutcome>,
    /// The number of virtual users that did not finish within the grace period
    ///
    /// Results from the iteration that these users were running were discarded.
    pub abandoned_users: usize,
    /// The number of virtual users whose setup hook failed, so that they never ran the scenario
    #[serde(default)]
    pub failed_agent_setups: usize,
    /// The version of Gale that was used for this run
    pub gale_version: String,
}

impl RunSummary {
    /// Create a new run summary with no results
    pub fn new(
        run_id: String,
        scenario_name: String,
        started_at: i64,
        virtual_users: usize,
        gale_version: String,
    ) -> Self {
        Self {
            run_id,
            scenario_name,
            started_at,
            virtual_users,
            run_duration: None,
            run_iterations: None,
            pacing: 0.0,
            elapsed: 0.0,
            iterations: 0,
            checks: BTreeMap::new(),
            thresholds: Vec::with_capacity(0),
            abandoned_users: 0,
            failed_agent_setups: 0,
            gale_version,
        }
    }

    /// Evaluate the given thresholds against the recorded checks and store the outcomes
    pub fn apply_thresholds(&mut self, thresholds: &[Threshold]) {
        self.thresholds = thresholds
            .iter()
            .map(|threshold| threshold.evaluate(&self.checks))
            .collect();
    }

    /// The thresholds that were breached
    pub fn breached_thresholds(&self) -> impl Iterator<Item = &ThresholdOutcome> {
        self.thresholds.iter().filter(|outcome| outcome.breached)
    }

    /// True when no configured threshold was breached
    pub fn passed_thresholds(&self) -> bool {
        self.breached_thresholds().next().is_none()
    }

    /// The process exit code for this run.
    pub fn exit_code(&self) -> ExitCode {
        if self.passed_thresholds() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }
    }

    /// Compute a fingerprint for this run summary
    ///
    /// The fingerprint is intended to uniquely identify the configuration used to run the scenario.
    /// It uses the
    ///     - Scenario name
    ///     - Number of virtual users
    ///     - Run duration or iteration budget
    ///     - Pacing
    ///     - Threshold definitions
    ///     - Gale version
    ///
    /// The fingerprint is computed using [sha3::Sha3_256].
    pub fn fingerprint(&self) -> String {
        let mut hasher = sha3::Sha3_256::new();
        Digest::update(&mut hasher, self.scenario_name.as_bytes());
        Digest::update(&mut hasher, (self.virtual_users as u64).to_le_bytes());
        if let Some(run_duration) = self.run_duration {
            Digest::update(&mut hasher, run_duration.to_le_bytes());
        }
        if let Some(run_iterations) = self.run_iterations {
            Digest::update(&mut hasher, run_iterations.to_le_bytes());
        }
        Digest::update(&mut hasher, self.pacing.to_le_bytes());
        self.thresholds
            .iter()
            .sorted_by(|a, b| a.check.cmp(&b.check))
            .for_each(|outcome| {
                Digest::update(&mut hasher, outcome.check.as_bytes());
                Digest::update(&mut hasher, outcome.max_failure_rate.to_le_bytes());
            });
        Digest::update(&mut hasher, self.gale_version.as_bytes());

        format!("{:x}", hasher.finalize())
    }
}

/// Append the run summary to a file
///
/// The summary will be serialized to JSON and output as a single line followed by a newline. The
/// recommended file extension is `.jsonl`.
pub fn append_run_summary(run_summary: &RunSummary, path: PathBuf) -> anyhow::Result<()> {
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
/// [append_run_summary].
pub fn load_summary_runs(path: PathBuf) -> anyhow::Result<Vec<RunSummary>> {
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

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use gale_instruments::ReportConfig;
use gale_summary_model::Threshold;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ReporterOpt {
    /// Discard operation timings and print nothing at the end of the run
    Noop,
    /// Keep operation timings in memory and print summary tables at the end of the run
    #[default]
    InMemory,
}

impl ReporterOpt {
    pub(crate) fn report_config(self) -> ReportConfig {
        match self {
            ReporterOpt::Noop => ReportConfig::default(),
            ReporterOpt::InMemory => ReportConfig::default().enable_in_memory(),
        }
    }
}

#[derive(Debug, Parser)]
#[command(about, long_about = None)]
pub struct GaleScenarioCli {
    /// The base URL, or other connection string, for the service to test
    #[clap(short = 't', long = "target")]
    pub connection_string: Option<String>,

    /// The number of virtual users to run
    #[clap(long)]
    pub users: Option<usize>,

    /// How long to run the scenario for, for example `30s`, `1m` or `1h 30m`
    #[clap(long, value_parser = humantime::parse_duration, conflicts_with = "iterations")]
    pub duration: Option<Duration>,

    /// Run the scenario until this many iterations have been completed, shared across all virtual users
    #[clap(long)]
    pub iterations: Option<u64>,

    /// Delay inserted after each iteration of every virtual user
    #[clap(long, value_parser = humantime::parse_duration)]
    pub pacing: Option<Duration>,

    /// How long to wait for virtual users to finish their current iteration once the run is stopping
    #[clap(long, value_parser = humantime::parse_duration)]
    pub grace_period: Option<Duration>,

    /// Timeout applied to each individual request made by a scenario
    #[clap(long, value_parser = humantime::parse_duration)]
    pub request_timeout: Option<Duration>,

    /// Fail the run if a check fails too often. Specify the check name and the maximum failure rate
    /// in the format `check:rate`. For example `--threshold="status is 200:0.01"`.
    ///
    /// The rate is a fraction between 0 and 1. You can specify multiple thresholds by using the flag
    /// multiple times.
    #[clap(long, value_parser = parse_threshold)]
    pub threshold: Vec<Threshold>,

    /// Where to send operation timings and the end of run summary
    #[clap(long, value_enum, default_value_t = ReporterOpt::InMemory)]
    pub reporter: ReporterOpt,

    /// Append the run summary to this file as a single line of JSON
    #[clap(long)]
    pub summary_file: Option<PathBuf>,

    /// Use this run id instead of generating one
    #[clap(long)]
    pub run_id: Option<String>,

    /// Do not show a progress bar on the CLI.
    ///
    /// This is recommended for CI/CD environments where the progress bar isn't being looked at by anyone and is just adding noise to the logs.
    #[clap(long, default_value = "false")]
    pub no_progress: bool,
}

fn parse_threshold(s: &str) -> anyhow::Result<Threshold> {
    let (check, rate) = s
        .rsplit_once(':')
        .ok_or(anyhow::anyhow!("Threshold must be in the format `check:rate`"))?;

    if check.is_empty() {
        anyhow::bail!("No check name specified for threshold");
    }

    let rate = rate
        .trim()
        .parse::<f64>()
        .map_err(|e| anyhow::anyhow!("Invalid failure rate '{rate}': {e}"))?;

    Ok(Threshold::new(check, rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_load_test_options() {
        let cli = GaleScenarioCli::try_parse_from([
            "libros_status",
            "--target",
            "http://localhost:3000",
            "--users",
            "20",
            "--duration",
            "1m",
            "--pacing",
            "1s",
            "--threshold",
            "status is 200:0.05",
            "--no-progress",
        ])
        .unwrap();

        assert_eq!(Some("http://localhost:3000".to_string()), cli.connection_string);
        assert_eq!(Some(20), cli.users);
        assert_eq!(Some(Duration::from_secs(60)), cli.duration);
        assert_eq!(Some(Duration::from_secs(1)), cli.pacing);
        assert_eq!(vec![Threshold::new("status is 200", 0.05)], cli.threshold);
        assert_eq!(ReporterOpt::InMemory, cli.reporter);
        assert!(cli.no_progress);
    }

    #[test]
    fn duration_conflicts_with_iterations() {
        let result = GaleScenarioCli::try_parse_from([
            "libros_status",
            "--duration",
            "1m",
            "--iterations",
            "100",
        ]);

        assert!(result.is_err());
    }

    #[test]
    fn rejects_unparseable_duration() {
        let result = GaleScenarioCli::try_parse_from(["libros_status", "--duration", "soon"]);

        assert!(result.is_err());
    }

    #[test]
    fn threshold_check_names_may_contain_colons() {
        let threshold = parse_threshold("body: has libros:0.5").unwrap();
        assert_eq!(Threshold::new("body: has libros", 0.5), threshold);
    }

    #[test]
    fn threshold_requires_name_and_rate() {
        assert!(parse_threshold("status is 200").is_err());
        assert!(parse_threshold(":0.1").is_err());
        assert!(parse_threshold("status is 200:lots").is_err());
    }
}

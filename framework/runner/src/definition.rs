use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use gale_core::prelude::{ConfigError, FatalError};
use gale_summary_model::Threshold;

use crate::cli::{GaleScenarioCli, ReporterOpt};
use crate::config::{RunConfig, StopCondition, DEFAULT_GRACE_PERIOD, DEFAULT_REQUEST_TIMEOUT};
use crate::context::{AgentContext, RunnerContext, UserValuesConstraint};

pub type HookResult = anyhow::Result<()>;

pub type GlobalHookMut<RV> = fn(&mut RunnerContext<RV>) -> HookResult;
pub type GlobalHook<RV> = fn(Arc<RunnerContext<RV>>) -> HookResult;
pub type AgentHookMut<RV, V> = fn(&mut AgentContext<RV, V>) -> HookResult;

/// The builder for a scenario definition.
///
/// This must be used at the start of a test to define the scenario that you want to run.
pub struct ScenarioDefinitionBuilder<RV: UserValuesConstraint, V: UserValuesConstraint> {
    /// The name of the scenario, which should be unique within the test suite.
    ///
    /// Recommended value is `env!("CARGO_PKG_NAME")`.
    name: String,
    /// Command line options. Anything set here overrides the defaults chosen by the scenario.
    cli: GaleScenarioCli,
    default_users: Option<usize>,
    default_stop: Option<StopCondition>,
    default_pacing: Option<Duration>,
    default_grace_period: Option<Duration>,
    default_thresholds: Vec<Threshold>,
    /// Global setup hook for this scenario. It will be run once, before any virtual users are started.
    setup_fn: Option<GlobalHookMut<RV>>,
    /// Setup hook for a virtual user, which will be run once for each virtual user as it starts.
    setup_agent_fn: Option<AgentHookMut<RV, V>>,
    /// The scenario function. Every virtual user runs it repeatedly until the run stops.
    agent_behaviour: Option<AgentHookMut<RV, V>>,
    /// Teardown hook for a virtual user, run once it has stopped iterating.
    teardown_agent_fn: Option<AgentHookMut<RV, V>>,
    /// Global teardown hook, run after all virtual users have stopped. This is best effort and
    /// an error from it does not fail the run.
    teardown_fn: Option<GlobalHook<RV>>,
}

pub struct ScenarioDefinition<RV: UserValuesConstraint, V: UserValuesConstraint> {
    pub name: String,
    pub config: RunConfig,
    pub thresholds: Vec<Threshold>,
    pub connection_string: Option<String>,
    pub reporter: ReporterOpt,
    pub summary_file: Option<PathBuf>,
    pub run_id: Option<String>,
    pub no_progress: bool,
    pub setup_fn: Option<GlobalHookMut<RV>>,
    pub setup_agent_fn: Option<AgentHookMut<RV, V>>,
    pub agent_behaviour: AgentHookMut<RV, V>,
    pub teardown_agent_fn: Option<AgentHookMut<RV, V>>,
    pub teardown_fn: Option<GlobalHook<RV>>,
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> ScenarioDefinitionBuilder<RV, V> {
    /// Initialise a new scenario definition from the scenario name and parsed command line arguments.
    /// See the [ScenarioDefinitionBuilder::name] for more information about the name.
    pub fn new(name: &str, cli: GaleScenarioCli) -> Self {
        Self {
            name: name.to_string(),
            cli,
            default_users: None,
            default_stop: None,
            default_pacing: None,
            default_grace_period: None,
            default_thresholds: Vec::new(),
            setup_fn: None,
            setup_agent_fn: None,
            agent_behaviour: None,
            teardown_agent_fn: None,
            teardown_fn: None,
        }
    }

    /// Initialise logging, parse the command line and create a new scenario definition.
    pub fn new_with_init(name: &str) -> Self {
        Self::new(name, crate::init::init())
    }

    /// Number of virtual users to run if `--users` is not given.
    pub fn with_default_users(mut self, users: usize) -> Self {
        self.default_users = Some(users);
        self
    }

    /// Run for this long if neither `--duration` nor `--iterations` is given.
    pub fn with_default_duration(mut self, duration: Duration) -> Self {
        self.default_stop = Some(StopCondition::Duration(duration));
        self
    }

    pub fn with_default_duration_s(self, duration_s: u64) -> Self {
        self.with_default_duration(Duration::from_secs(duration_s))
    }

    /// Run this many iterations if neither `--duration` nor `--iterations` is given.
    pub fn with_default_iterations(mut self, iterations: u64) -> Self {
        self.default_stop = Some(StopCondition::Iterations(iterations));
        self
    }

    /// Delay after each iteration if `--pacing` is not given.
    pub fn with_default_pacing(mut self, pacing: Duration) -> Self {
        self.default_pacing = Some(pacing);
        self
    }

    pub fn with_default_grace_period(mut self, grace_period: Duration) -> Self {
        self.default_grace_period = Some(grace_period);
        self
    }

    /// Add a threshold. A `--threshold` for the same check replaces it.
    pub fn with_threshold(mut self, check: &str, max_failure_rate: f64) -> Self {
        self.default_thresholds
            .push(Threshold::new(check, max_failure_rate));
        self
    }

    /// Set the global setup hook [ScenarioDefinitionBuilder::setup_fn] for this scenario.
    pub fn use_setup(mut self, setup_fn: GlobalHookMut<RV>) -> Self {
        self.setup_fn = Some(setup_fn);
        self
    }

    /// Set the virtual user setup hook [ScenarioDefinitionBuilder::setup_agent_fn] for this scenario.
    pub fn use_agent_setup(mut self, setup_agent_fn: AgentHookMut<RV, V>) -> Self {
        self.setup_agent_fn = Some(setup_agent_fn);
        self
    }

    /// Set the scenario function [ScenarioDefinitionBuilder::agent_behaviour] that every virtual user runs.
    pub fn use_agent_behaviour(mut self, behaviour: AgentHookMut<RV, V>) -> Self {
        self.agent_behaviour = Some(behaviour);
        self
    }

    /// Set the virtual user teardown hook [ScenarioDefinitionBuilder::teardown_agent_fn] for this scenario.
    pub fn use_agent_teardown(mut self, teardown_agent_fn: AgentHookMut<RV, V>) -> Self {
        self.teardown_agent_fn = Some(teardown_agent_fn);
        self
    }

    /// Set the global teardown hook [ScenarioDefinitionBuilder::teardown_fn] for this scenario.
    pub fn use_teardown(mut self, teardown_fn: GlobalHook<RV>) -> Self {
        self.teardown_fn = Some(teardown_fn);
        self
    }

    pub(crate) fn build(self) -> anyhow::Result<ScenarioDefinition<RV, V>> {
        let stop = match (self.cli.duration, self.cli.iterations) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::new(
                    "Only one of --duration or --iterations can be set",
                )
                .into())
            }
            (Some(duration), None) => Some(StopCondition::Duration(duration)),
            (None, Some(iterations)) => Some(StopCondition::Iterations(iterations)),
            (None, None) => self.default_stop,
        }
        .ok_or(ConfigError::new(
            "No stop condition, use --duration or --iterations",
        ))?;

        let config = RunConfig {
            virtual_users: self.cli.users.or(self.default_users).unwrap_or(1),
            stop,
            pacing: self.cli.pacing.or(self.default_pacing).unwrap_or_default(),
            grace_period: self
                .cli
                .grace_period
                .or(self.default_grace_period)
                .unwrap_or(DEFAULT_GRACE_PERIOD),
            request_timeout: self.cli.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
        };
        config.validate()?;

        let thresholds = merge_thresholds(self.default_thresholds, self.cli.threshold)?;

        let agent_behaviour = self.agent_behaviour.ok_or(FatalError::new(format!(
            "No agent behaviour defined for scenario [{}]",
            self.name
        )))?;

        Ok(ScenarioDefinition {
            name: self.name,
            config,
            thresholds,
            connection_string: self.cli.connection_string,
            reporter: self.cli.reporter,
            summary_file: self.cli.summary_file,
            run_id: self.cli.run_id,
            no_progress: self.cli.no_progress,
            setup_fn: self.setup_fn,
            setup_agent_fn: self.setup_agent_fn,
            agent_behaviour,
            teardown_agent_fn: self.teardown_agent_fn,
            teardown_fn: self.teardown_fn,
        })
    }
}

fn merge_thresholds(
    defaults: Vec<Threshold>,
    overrides: Vec<Threshold>,
) -> Result<Vec<Threshold>, ConfigError> {
    let mut thresholds = defaults
        .into_iter()
        .filter(|threshold| !overrides.iter().any(|o| o.check == threshold.check))
        .collect::<Vec<_>>();
    thresholds.extend(overrides);

    if let Some(invalid) = thresholds
        .iter()
        .find(|threshold| !(0.0..=1.0).contains(&threshold.max_failure_rate))
    {
        return Err(ConfigError::new(format!(
            "Threshold for [{}] must be a failure rate between 0 and 1, got {}",
            invalid.check, invalid.max_failure_rate
        )));
    }

    Ok(thresholds)
}

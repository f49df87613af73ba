use std::{fmt::Debug, sync::Arc, time::Duration};

use gale_core::prelude::{DelegatedShutdownListener, ShutdownHandle};
use gale_instruments::{CheckAggregator, CheckResult, Checks, Reporter};

use crate::{config::RunConfig, executor::Executor};

pub trait UserValuesConstraint: Default + Debug + Send + Sync + 'static {}

impl UserValuesConstraint for () {}

/// Context shared by every virtual user in a run.
///
/// It is mutable during the global setup hook and read-only once virtual users start.
#[derive(Debug)]
pub struct RunnerContext<RV: UserValuesConstraint> {
    executor: Arc<Executor>,
    reporter: Arc<Reporter>,
    checks: Arc<CheckAggregator>,
    shutdown_handle: ShutdownHandle,
    connection_string: Option<String>,
    config: RunConfig,
    value: RV,
}

impl<RV: UserValuesConstraint> RunnerContext<RV> {
    pub(crate) fn new(
        executor: Arc<Executor>,
        reporter: Arc<Reporter>,
        checks: Arc<CheckAggregator>,
        shutdown_handle: ShutdownHandle,
        connection_string: Option<String>,
        config: RunConfig,
    ) -> Self {
        Self {
            executor,
            reporter,
            checks,
            shutdown_handle,
            connection_string,
            config,
            value: Default::default(),
        }
    }

    pub fn executor(&self) -> &Arc<Executor> {
        &self.executor
    }

    pub fn reporter(&self) -> Arc<Reporter> {
        self.reporter.clone()
    }

    /// The connection string given with `--target`.
    pub fn get_connection_string(&self) -> anyhow::Result<&str> {
        self.connection_string
            .as_deref()
            .ok_or(anyhow::anyhow!("No target specified, use --target"))
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// The timeout that scenarios should apply to each request they make.
    pub fn request_timeout(&self) -> Duration {
        self.config.request_timeout
    }

    /// Set the stop signal for every virtual user. The run then winds down the same way as it does
    /// when its duration elapses.
    pub fn force_stop_scenario(&self) {
        self.shutdown_handle.shutdown();
    }

    pub fn get_mut(&mut self) -> &mut RV {
        &mut self.value
    }

    pub fn get(&self) -> &RV {
        &self.value
    }

    pub(crate) fn checks(&self) -> &Arc<CheckAggregator> {
        &self.checks
    }
}

/// Context owned by a single virtual user.
pub struct AgentContext<RV: UserValuesConstraint, V: UserValuesConstraint> {
    agent_id: String,
    agent_index: usize,
    iteration: u64,
    runner_context: Arc<RunnerContext<RV>>,
    shutdown_listener: DelegatedShutdownListener,
    check_results: Vec<CheckResult>,
    value: V,
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> AgentContext<RV, V> {
    pub(crate) fn new(
        agent_id: String,
        agent_index: usize,
        runner_context: Arc<RunnerContext<RV>>,
        shutdown_listener: DelegatedShutdownListener,
    ) -> Self {
        Self {
            agent_id,
            agent_index,
            iteration: 0,
            runner_context,
            shutdown_listener,
            check_results: Vec::new(),
            value: Default::default(),
        }
    }

    /// A unique identifier for this virtual user within the run, such as `vu-3`.
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn agent_index(&self) -> usize {
        self.agent_index
    }

    /// The number of iterations this virtual user has started, including the current one.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub fn runner_context(&self) -> &Arc<RunnerContext<RV>> {
        &self.runner_context
    }

    pub fn shutdown_listener(&mut self) -> &mut DelegatedShutdownListener {
        &mut self.shutdown_listener
    }

    /// Start evaluating named checks against a value. Results are recorded for the current
    /// iteration.
    ///
    /// ```ignore
    /// let ok = ctx
    ///     .check(&response)
    ///     .that("status is 200", |r| r.status() == 200)
    ///     .passed();
    /// ```
    pub fn check<'a, T>(&'a mut self, value: &'a T) -> Checks<'a, T> {
        Checks::new(value, &mut self.check_results)
    }

    /// Record the outcome of a check that was evaluated without [AgentContext::check].
    pub fn record_check(&mut self, name: &str, passed: bool) {
        self.check_results.push(CheckResult::new(name, passed));
    }

    pub fn get_mut(&mut self) -> &mut V {
        &mut self.value
    }

    pub fn get(&self) -> &V {
        &self.value
    }

    pub(crate) fn begin_iteration(&mut self) {
        self.iteration += 1;
        self.check_results.clear();
    }

    pub(crate) fn take_check_results(&mut self) -> Vec<CheckResult> {
        std::mem::take(&mut self.check_results)
    }
}

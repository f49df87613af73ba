use std::sync::Arc;
use std::time::{Duration, Instant};

use gale_runner::prelude::{
    run, AgentContext, FatalError, GaleScenarioCli, HookResult, ReporterOpt, RunnerContext,
    ScenarioDefinitionBuilder, ShutdownSignalError, UserValuesConstraint,
};

#[derive(Default, Debug)]
struct RunnerContextValue {}

impl UserValuesConstraint for RunnerContextValue {}

#[derive(Default, Debug)]
struct AgentContextValue {
    value: i32,
}

impl UserValuesConstraint for AgentContextValue {}

fn sample_cli_cfg() -> GaleScenarioCli {
    GaleScenarioCli {
        connection_string: Some("http://localhost:3000".to_string()),
        users: None,
        duration: None,
        iterations: None,
        pacing: Some(Duration::from_millis(10)),
        grace_period: Some(Duration::from_secs(1)),
        request_timeout: None,
        threshold: vec![],
        reporter: ReporterOpt::Noop,
        summary_file: None,
        run_id: None,
        no_progress: true,
    }
}

fn ok_behaviour(_ctx: &mut AgentContext<RunnerContextValue, AgentContextValue>) -> HookResult {
    Ok(())
}

#[test]
fn propagate_error_in_setup_hook() {
    fn setup(_ctx: &mut RunnerContext<RunnerContextValue>) -> HookResult {
        Err(anyhow::anyhow!("Error in setup hook"))
    }

    let scenario = ScenarioDefinitionBuilder::<RunnerContextValue, AgentContextValue>::new(
        "propagate_error_in_setup_hook",
        sample_cli_cfg(),
    )
    .with_default_duration_s(5)
    .use_setup(setup)
    .use_agent_behaviour(ok_behaviour);

    let result = run(scenario);

    assert!(result.is_err());
    assert_eq!(result.unwrap_err().to_string(), "Error in setup hook");
}

#[test]
fn error_in_every_agent_setup_fails_the_run() {
    fn agent_setup(_ctx: &mut AgentContext<RunnerContextValue, AgentContextValue>) -> HookResult {
        Err(anyhow::anyhow!("Error in agent setup hook"))
    }

    let mut cfg = sample_cli_cfg();
    cfg.users = Some(2);
    let scenario = ScenarioDefinitionBuilder::<RunnerContextValue, AgentContextValue>::new(
        "error_in_every_agent_setup_fails_the_run",
        cfg,
    )
    .with_default_duration(Duration::from_millis(500))
    .use_agent_setup(agent_setup)
    .use_agent_behaviour(ok_behaviour);

    let err = run(scenario).unwrap_err();

    assert_eq!(
        "Setup failed for all 2 virtual users, no load was generated",
        err.to_string()
    );
}

#[test]
fn capture_error_in_agent_setup() {
    fn agent_setup(ctx: &mut AgentContext<RunnerContextValue, AgentContextValue>) -> HookResult {
        if ctx.agent_index() == 0 {
            return Err(anyhow::anyhow!("Error in agent setup hook"));
        }

        Ok(())
    }

    let mut cfg = sample_cli_cfg();
    cfg.users = Some(2);
    let scenario = ScenarioDefinitionBuilder::<RunnerContextValue, AgentContextValue>::new(
        "capture_error_in_agent_setup",
        cfg,
    )
    .with_default_duration(Duration::from_millis(500))
    .use_agent_setup(agent_setup)
    .use_agent_behaviour(ok_behaviour);

    let summary = run(scenario).unwrap();

    assert_eq!(1, summary.failed_agent_setups);
    assert!(summary.iterations > 0);
    assert!(summary.elapsed >= 0.5, "elapsed {}", summary.elapsed);
}

#[test]
fn fatal_error_in_agent_setup_stops_the_run() {
    fn agent_setup(ctx: &mut AgentContext<RunnerContextValue, AgentContextValue>) -> HookResult {
        if ctx.agent_index() == 0 {
            return Err(FatalError::new("No target configured").into());
        }

        Ok(())
    }

    let mut cfg = sample_cli_cfg();
    cfg.users = Some(3);
    let scenario = ScenarioDefinitionBuilder::<RunnerContextValue, AgentContextValue>::new(
        "fatal_error_in_agent_setup_stops_the_run",
        cfg,
    )
    .with_default_duration_s(30)
    .use_agent_setup(agent_setup)
    .use_agent_behaviour(ok_behaviour);

    let start = Instant::now();
    let err = run(scenario).unwrap_err();

    assert!(err.is::<FatalError>(), "unexpected error {err:?}");
    assert_eq!("No target configured", err.to_string());
    assert!(start.elapsed() < Duration::from_secs(10));
}

#[test]
fn shutdown_signal_error_without_stop_is_an_ordinary_failure() {
    fn agent_behaviour(
        _ctx: &mut AgentContext<RunnerContextValue, AgentContextValue>,
    ) -> HookResult {
        Err(ShutdownSignalError::default().into())
    }

    let mut cfg = sample_cli_cfg();
    cfg.iterations = Some(5);
    let scenario = ScenarioDefinitionBuilder::<RunnerContextValue, AgentContextValue>::new(
        "shutdown_signal_error_without_stop_is_an_ordinary_failure",
        cfg,
    )
    .use_agent_behaviour(agent_behaviour);

    let summary = run(scenario).unwrap();

    assert_eq!(5, summary.iterations);
    let counts = summary.checks["Execution cancelled by shutdown signal"];
    assert_eq!(5, counts.fails);
}

#[test]
fn capture_error_in_agent_behaviour_and_continue() {
    fn agent_behaviour(
        ctx: &mut AgentContext<RunnerContextValue, AgentContextValue>,
    ) -> HookResult {
        if ctx.get().value < 5 {
            ctx.get_mut().value += 1;
        } else {
            // Save time running this test by shutting down once this has run a few times.
            ctx.runner_context().force_stop_scenario();
        }

        Err(anyhow::anyhow!("Error in agent behaviour hook"))
    }

    let scenario = ScenarioDefinitionBuilder::<RunnerContextValue, AgentContextValue>::new(
        "capture_error_in_agent_behaviour_and_continue",
        sample_cli_cfg(),
    )
    .with_default_duration_s(5)
    .use_agent_behaviour(agent_behaviour);

    let summary = run(scenario).unwrap();

    assert_eq!(6, summary.iterations);
    let counts = summary.checks["Error in agent behaviour hook"];
    assert_eq!(0, counts.passes);
    assert_eq!(6, counts.fails);
}

#[test]
fn fatal_error_stops_the_run() {
    fn agent_behaviour(
        ctx: &mut AgentContext<RunnerContextValue, AgentContextValue>,
    ) -> HookResult {
        if ctx.agent_index() == 0 {
            return Err(FatalError::new("Scenario has no client").into());
        }

        Ok(())
    }

    let mut cfg = sample_cli_cfg();
    cfg.users = Some(3);
    let scenario = ScenarioDefinitionBuilder::<RunnerContextValue, AgentContextValue>::new(
        "fatal_error_stops_the_run",
        cfg,
    )
    .with_default_duration_s(30)
    .use_agent_behaviour(agent_behaviour);

    let started = Instant::now();
    let result = run(scenario);

    assert!(started.elapsed() < Duration::from_secs(10));
    let err = result.unwrap_err();
    assert!(err.is::<FatalError>());
    assert_eq!("Scenario has no client", err.to_string());
}

#[test]
fn panic_in_behaviour_is_fatal() {
    fn agent_behaviour(
        _ctx: &mut AgentContext<RunnerContextValue, AgentContextValue>,
    ) -> HookResult {
        panic!("not invocable");
    }

    let scenario = ScenarioDefinitionBuilder::<RunnerContextValue, AgentContextValue>::new(
        "panic_in_behaviour_is_fatal",
        sample_cli_cfg(),
    )
    .with_default_duration_s(30)
    .use_agent_behaviour(agent_behaviour);

    let err = run(scenario).unwrap_err();

    assert!(err.is::<FatalError>());
    assert!(err.to_string().contains("not invocable"));
}

#[test]
fn capture_error_in_agent_teardown() {
    fn agent_teardown(
        _ctx: &mut AgentContext<RunnerContextValue, AgentContextValue>,
    ) -> HookResult {
        Err(anyhow::anyhow!("Error in agent teardown hook"))
    }

    let scenario = ScenarioDefinitionBuilder::<RunnerContextValue, AgentContextValue>::new(
        "capture_error_in_agent_teardown",
        sample_cli_cfg(),
    )
    .with_default_iterations(3)
    .use_agent_behaviour(ok_behaviour)
    .use_agent_teardown(agent_teardown);

    let result = run(scenario);

    assert!(result.is_ok());
}

#[test]
fn capture_error_in_teardown() {
    fn teardown(_ctx: Arc<RunnerContext<RunnerContextValue>>) -> HookResult {
        Err(anyhow::anyhow!("Error in teardown hook"))
    }

    let scenario = ScenarioDefinitionBuilder::<RunnerContextValue, AgentContextValue>::new(
        "capture_error_in_teardown",
        sample_cli_cfg(),
    )
    .with_default_iterations(3)
    .use_agent_behaviour(ok_behaviour)
    .use_teardown(teardown);

    let result = run(scenario);

    assert!(result.is_ok());
}

#[test]
fn invalid_config_fails_before_setup() {
    fn setup(_ctx: &mut RunnerContext<RunnerContextValue>) -> HookResult {
        panic!("setup must not run for an invalid config");
    }

    let mut cfg = sample_cli_cfg();
    cfg.users = Some(0);
    let scenario = ScenarioDefinitionBuilder::<RunnerContextValue, AgentContextValue>::new(
        "invalid_config_fails_before_setup",
        cfg,
    )
    .with_default_iterations(3)
    .use_setup(setup)
    .use_agent_behaviour(ok_behaviour);

    let err = run(scenario).unwrap_err();

    assert!(err.is::<gale_runner::prelude::ConfigError>());
}

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use gale_http_runner::prelude::*;

const STATUS_CHECK: &str = "status is 200";

fn agent_behaviour(ctx: &mut AgentContext<HttpRunnerContext, HttpAgentContext>) -> HookResult {
    let response = http_get(ctx, "/libros");
    ctx.check(&response).that_ok(STATUS_CHECK, |r| r.status() == 200);
    response?;

    Ok(())
}

fn teardown(ctx: Arc<RunnerContext<HttpRunnerContext>>) -> HookResult {
    if let Some(target) = ctx.get().target() {
        log::info!("Finished loading {target}");
    }

    Ok(())
}

fn main() -> GaleResult<ExitCode> {
    let builder = ScenarioDefinitionBuilder::<HttpRunnerContext, HttpAgentContext>::new_with_init(
        env!("CARGO_PKG_NAME"),
    )
    .with_default_users(20)
    .with_default_duration_s(60)
    .with_default_pacing(Duration::from_secs(1))
    .with_threshold(STATUS_CHECK, 0.01)
    .use_setup(configure_target)
    .use_agent_setup(connect_http_client)
    .use_agent_behaviour(agent_behaviour)
    .use_teardown(teardown);

    let summary = run(builder)?;

    Ok(summary.exit_code())
}

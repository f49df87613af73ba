use anyhow::Context;
use gale_http_client::prelude::{HttpClient, HttpResponse};
use gale_runner::prelude::{
    AgentContext, FatalError, HookResult, RunnerContext, UserValuesConstraint,
};
use url::Url;

use crate::context::HttpAgentContext;
use crate::runner_context::HttpRunnerContext;

/// Reads the target from `--target` and stores it in the [HttpRunnerContext].
///
/// Use this as the global setup hook, or call it from yours:
/// ```rust
/// use gale_http_runner::prelude::*;
///
/// fn setup(ctx: &mut RunnerContext<HttpRunnerContext>) -> HookResult {
///     configure_target(ctx)?;
///     Ok(())
/// }
/// ```
pub fn configure_target(ctx: &mut RunnerContext<HttpRunnerContext>) -> HookResult {
    let connection_string = ctx.get_connection_string()?;
    let target = Url::parse(connection_string)
        .with_context(|| format!("Target is not a valid URL: {connection_string}"))?;
    if !matches!(target.scheme(), "http" | "https") {
        anyhow::bail!("Target must be an http or https URL, got: {target}");
    }

    log::info!("Targeting {target}");
    ctx.get_mut().set_target(target);

    Ok(())
}

/// Creates the HTTP client for a virtual user.
///
/// Use this as the agent setup hook. The client reports every request to the run's reporter and
/// applies the run's request timeout.
pub fn connect_http_client<SV: UserValuesConstraint>(
    ctx: &mut AgentContext<HttpRunnerContext, HttpAgentContext<SV>>,
) -> HookResult {
    let runner_context = ctx.runner_context();
    let target = runner_context.get().target().ok_or_else(|| {
        FatalError::new("No target configured, use configure_target in the setup hook")
    })?;

    let client = HttpClient::new(
        target.as_str(),
        runner_context.request_timeout(),
        runner_context.reporter(),
    )?;
    log::debug!("Created HTTP client for agent {}", ctx.agent_id());
    ctx.get_mut().client = Some(client);

    Ok(())
}

/// Sends a GET request for `path` with this virtual user's client and waits for the response.
///
/// A request that gets no response fails with a [gale_http_client::prelude::RequestError]. Check
/// the result with `that_ok` before propagating the error, so that the checks for this iteration
/// fail instead of going unevaluated:
/// ```rust
/// use gale_http_runner::prelude::*;
///
/// fn behaviour(ctx: &mut AgentContext<HttpRunnerContext, HttpAgentContext>) -> HookResult {
///     let response = http_get(ctx, "/libros");
///     ctx.check(&response).that_ok("status is 200", |r| r.status() == 200);
///     response?;
///
///     Ok(())
/// }
/// ```
///
/// Calling this without [connect_http_client] having run is a [FatalError].
pub fn http_get<SV: UserValuesConstraint>(
    ctx: &mut AgentContext<HttpRunnerContext, HttpAgentContext<SV>>,
    path: &str,
) -> anyhow::Result<HttpResponse> {
    let client = ctx
        .get()
        .client()
        .cloned()
        .ok_or_else(|| FatalError::new("HTTP client not connected, use connect_http_client"))?;
    let path = path.to_string();

    ctx.runner_context()
        .executor()
        .execute_in_place(async move { Ok(client.get(&path).await?) })
}

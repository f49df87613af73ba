use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use gale_core::prelude::{DelegatedShutdownListener, FatalError, ShutdownSignalError};
use gale_instruments::CheckResult;
use parking_lot::Mutex;

use crate::config::IterationBudget;
use crate::context::{AgentContext, UserValuesConstraint};
use crate::definition::AgentHookMut;

/// Holds the first fatal error raised by any virtual user.
pub(crate) type FatalSlot = Mutex<Option<anyhow::Error>>;

/// Drive one virtual user: run the behaviour, record its checks and pace, until the run stops.
///
/// The stop signal is only checked between iterations, so an iteration that has started is always
/// allowed to finish. Errors returned by the behaviour are recorded as failed checks and the loop
/// carries on. A [ShutdownSignalError] is only treated as a cancelled iteration while the run is
/// stopping, otherwise it is an ordinary error. A [FatalError] or a panic stops the whole run.
pub(crate) fn run_scenario_loop<RV: UserValuesConstraint, V: UserValuesConstraint>(
    context: &mut AgentContext<RV, V>,
    behaviour: AgentHookMut<RV, V>,
    pacing: Duration,
    budget: Option<&IterationBudget>,
    mut cycle_shutdown_listener: DelegatedShutdownListener,
    fatal: &FatalSlot,
) {
    let runner_context = context.runner_context().clone();

    loop {
        if cycle_shutdown_listener.should_shutdown() {
            log::debug!("Stopping agent {}", context.agent_id());
            break;
        }

        if let Some(budget) = budget {
            if !budget.try_claim() {
                log::debug!(
                    "Iteration budget used up, stopping agent {}",
                    context.agent_id()
                );
                runner_context.force_stop_scenario();
                break;
            }
        }

        context.begin_iteration();
        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| behaviour(context)));
        let mut results = context.take_check_results();
        let stopping = cycle_shutdown_listener.should_shutdown();

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) if stopping && e.is::<ShutdownSignalError>() => {
                // The behaviour gave up because the run is stopping, so the iteration has no result
                log::debug!("Agent {} cancelled its iteration", context.agent_id());
                break;
            }
            Ok(Err(e)) if e.is::<FatalError>() => {
                log::error!("Fatal error in agent {}: {:?}", context.agent_id(), e);
                set_fatal(fatal, e);
                runner_context.force_stop_scenario();
                break;
            }
            Ok(Err(e)) => {
                log::debug!("Agent behaviour failed for agent {}: {:?}", context.agent_id(), e);
                results.push(CheckResult::failed(e.to_string()));
            }
            Err(panic) => {
                let msg = panic_message(panic.as_ref());
                log::error!("Agent behaviour panicked for agent {}: {}", context.agent_id(), msg);
                set_fatal(
                    fatal,
                    FatalError::new(format!(
                        "Scenario panicked in agent {}: {msg}",
                        context.agent_id()
                    ))
                    .into(),
                );
                runner_context.force_stop_scenario();
                break;
            }
        }

        if !runner_context.checks().record_iteration(results) {
            log::debug!(
                "Results already frozen, discarded iteration from agent {}",
                context.agent_id()
            );
            break;
        }

        if !runner_context.executor().pace(pacing) {
            log::debug!("Stopping agent {} during pacing", context.agent_id());
            break;
        }
    }
}

pub(crate) fn set_fatal(fatal: &FatalSlot, error: anyhow::Error) {
    let mut slot = fatal.lock();
    if slot.is_none() {
        *slot = Some(error);
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

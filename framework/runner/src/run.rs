use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use gale_core::prelude::{DelegatedShutdownListener, FatalError};
use gale_instruments::CheckAggregator;
use gale_summary_model::{append_run_summary, RunSummary};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::agent::{run_scenario_loop, set_fatal, FatalSlot};
use crate::config::{IterationBudget, StopCondition};
use crate::monitor::start_monitor;
use crate::progress::start_progress;
use crate::{
    context::{AgentContext, RunnerContext, UserValuesConstraint},
    definition::ScenarioDefinitionBuilder,
    executor::Executor,
    shutdown::start_shutdown_listener,
};

/// Run a scenario and return its frozen summary.
///
/// Fails before generating any load if the configuration is invalid, if the scenario has no
/// behaviour, or if the global setup hook fails. Fails after stopping every virtual user if the
/// scenario raised a [gale_core::prelude::FatalError] or panicked.
pub fn run<RV: UserValuesConstraint, V: UserValuesConstraint>(
    definition: ScenarioDefinitionBuilder<RV, V>,
) -> anyhow::Result<RunSummary> {
    let definition = definition.build()?;
    let config = definition.config.clone();

    log::info!(
        "Running scenario: {} with {} virtual users {}",
        definition.name,
        config.virtual_users,
        config.stop
    );

    let runtime = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    let shutdown_handle = start_shutdown_listener(&runtime)?;
    let executor = Arc::new(Executor::new(runtime, shutdown_handle.clone()));
    let reporter = Arc::new(definition.reporter.report_config().init());
    let checks = Arc::new(CheckAggregator::new());
    let mut runner_context = RunnerContext::new(
        executor,
        reporter,
        checks.clone(),
        shutdown_handle.clone(),
        definition.connection_string.clone(),
        config.clone(),
    );

    if let Some(setup_fn) = &definition.setup_fn {
        setup_fn(&mut runner_context)?;
    }

    let run_id = definition
        .run_id
        .clone()
        .unwrap_or_else(|| nanoid::nanoid!());
    let started_at = chrono::Utc::now().timestamp();
    let started = Instant::now();

    let budget = match config.stop {
        StopCondition::Duration(duration) => {
            // Set a timer to shut down the test after the duration has elapsed
            let shutdown_handle = shutdown_handle.clone();
            runner_context.executor().spawn(async move {
                tokio::time::sleep(duration).await;
                log::info!("Run duration elapsed, stopping virtual users");
                shutdown_handle.shutdown();
            });
            None
        }
        StopCondition::Iterations(total) => Some(Arc::new(IterationBudget::new(total))),
    };

    if !definition.no_progress {
        start_progress(config.stop, checks.clone(), shutdown_handle.new_listener())?;
    }

    // Ready to start spawning virtual users so start the resource monitor to report high usage
    // which might lead to a misleading outcome.
    start_monitor(shutdown_handle.new_listener())?;

    let runner_context = Arc::new(runner_context);
    let fatal = Arc::new(FatalSlot::default());
    let failed_agent_setups = Arc::new(AtomicUsize::new(0));
    let (done_sender, done_receiver) = unbounded_channel();

    for agent_index in 0..config.virtual_users {
        // Read access to the runner context for each virtual user
        let runner_context = runner_context.clone();

        let setup_agent_fn = definition.setup_agent_fn;
        let agent_behaviour_fn = definition.agent_behaviour;
        let teardown_agent_fn = definition.teardown_agent_fn;
        let budget = budget.clone();
        let fatal = fatal.clone();
        let failed_agent_setups = failed_agent_setups.clone();
        let pacing = config.pacing;

        // For us to check if the virtual user should stop between iterations
        let cycle_shutdown_listener = shutdown_handle.new_listener();
        // For the behaviour implementation to listen for shutdown and respond appropriately
        let delegated_shutdown_listener = shutdown_handle.new_listener();

        let agent_id = format!("vu-{}", agent_index);
        let done = DoneGuard {
            agent_id: agent_id.clone(),
            sender: done_sender.clone(),
        };

        let spawned = std::thread::Builder::new()
            .name(agent_id.clone())
            .spawn(move || {
                let _done = done;

                let mut context = AgentContext::new(
                    agent_id.clone(),
                    agent_index,
                    runner_context,
                    delegated_shutdown_listener,
                );
                if let Some(setup_agent_fn) = setup_agent_fn {
                    if let Err(e) = setup_agent_fn(&mut context) {
                        if e.is::<FatalError>() {
                            log::error!("Fatal error in setup for agent {}: {:?}", agent_id, e);
                            set_fatal(&fatal, e);
                            context.runner_context().force_stop_scenario();
                        } else {
                            log::error!("Agent setup failed for agent {}: {:?}", agent_id, e);
                            failed_agent_setups.fetch_add(1, Ordering::AcqRel);
                        }
                        return;
                    }
                }

                run_scenario_loop(
                    &mut context,
                    agent_behaviour_fn,
                    pacing,
                    budget.as_deref(),
                    cycle_shutdown_listener,
                    &fatal,
                );

                if let Some(teardown_agent_fn) = teardown_agent_fn {
                    if let Err(e) = teardown_agent_fn(&mut context) {
                        log::error!("Agent teardown failed for agent {}: {:?}", agent_id, e);
                    }
                }
            });

        if let Err(e) = spawned {
            shutdown_handle.shutdown();
            return Err(e).context("Failed to spawn thread for virtual user");
        }
    }
    drop(done_sender);

    let finished = runner_context.executor().block_on(await_agents(
        done_receiver,
        config.virtual_users,
        config.grace_period,
        shutdown_handle.new_listener(),
    ));
    let tally = checks.freeze();
    let elapsed = started.elapsed();
    shutdown_handle.shutdown();

    let abandoned_users = config.virtual_users - finished;
    if abandoned_users > 0 {
        log::warn!(
            "{} virtual users did not stop within the grace period of {}, results from their current iteration were discarded",
            abandoned_users,
            humantime::format_duration(config.grace_period)
        );
    }

    if let Some(teardown_fn) = definition.teardown_fn {
        // Don't crash the runner if the teardown fails. We still want the reporting and runner
        // shutdown to happen cleanly. The hook is documented as 'best effort'
        if let Err(e) = teardown_fn(runner_context.clone()) {
            log::error!("Teardown failed: {:?}", e);
        }
    }

    if let Some(e) = fatal.lock().take() {
        return Err(e);
    }

    let failed_agent_setups = failed_agent_setups.load(Ordering::Acquire);
    if failed_agent_setups == config.virtual_users {
        anyhow::bail!(
            "Setup failed for all {} virtual users, no load was generated",
            failed_agent_setups
        );
    }
    if failed_agent_setups > 0 {
        log::warn!(
            "Setup failed for {} of {} virtual users, they did not run any iterations",
            failed_agent_setups,
            config.virtual_users
        );
    }

    let mut summary = RunSummary::new(
        run_id,
        definition.name.clone(),
        started_at,
        config.virtual_users,
        env!("CARGO_PKG_VERSION").to_string(),
    );
    match config.stop {
        StopCondition::Duration(duration) => summary.run_duration = Some(duration.as_secs_f64()),
        StopCondition::Iterations(total) => summary.run_iterations = Some(total),
    }
    summary.pacing = config.pacing.as_secs_f64();
    summary.elapsed = elapsed.as_secs_f64();
    summary.iterations = tally.iterations;
    summary.checks = tally.checks.clone();
    summary.abandoned_users = abandoned_users;
    summary.failed_agent_setups = failed_agent_setups;
    summary.apply_thresholds(&definition.thresholds);

    runner_context.reporter().finalize(&tally, elapsed);
    report_thresholds(&summary);

    if let Some(path) = definition.summary_file {
        append_run_summary(&summary, path.clone())
            .with_context(|| format!("Failed to write run summary to {}", path.display()))?;
    }

    log::info!(
        "Finished scenario: {} after {} iterations in {:.2}s",
        summary.scenario_name,
        summary.iterations,
        summary.elapsed
    );

    Ok(summary)
}

/// Tells the runner that a virtual user thread has exited, including by panicking.
struct DoneGuard {
    agent_id: String,
    sender: UnboundedSender<String>,
}

impl Drop for DoneGuard {
    fn drop(&mut self) {
        // The receiver is gone once the runner has stopped waiting, which is fine.
        let _ = self.sender.send(std::mem::take(&mut self.agent_id));
    }
}

/// Wait for virtual users to exit and return how many did.
///
/// Waits without limit until the stop signal is set, then gives the remaining virtual users up to
/// `grace_period` to finish the iteration they are running.
async fn await_agents(
    mut done_receiver: UnboundedReceiver<String>,
    agent_count: usize,
    grace_period: Duration,
    mut shutdown_listener: DelegatedShutdownListener,
) -> usize {
    let mut finished = 0;

    while finished < agent_count {
        tokio::select! {
            _ = shutdown_listener.wait_for_shutdown() => break,
            done = done_receiver.recv() => match done {
                Some(agent_id) => {
                    log::debug!("Agent {} finished", agent_id);
                    finished += 1;
                }
                None => return finished,
            },
        }
    }

    let grace = tokio::time::sleep(grace_period);
    tokio::pin!(grace);

    while finished < agent_count {
        tokio::select! {
            _ = &mut grace => break,
            done = done_receiver.recv() => match done {
                Some(agent_id) => {
                    log::debug!("Agent {} finished after stop signal", agent_id);
                    finished += 1;
                }
                None => break,
            },
        }
    }

    finished
}

fn report_thresholds(summary: &RunSummary) {
    for outcome in &summary.thresholds {
        match outcome.failure_rate {
            Some(rate) if outcome.breached => log::error!(
                "Threshold breached for check [{}]: failure rate {:.2}% is above {:.2}%",
                outcome.check,
                rate * 100.0,
                outcome.max_failure_rate * 100.0
            ),
            Some(rate) => log::info!(
                "Threshold passed for check [{}]: failure rate {:.2}% is within {:.2}%",
                outcome.check,
                rate * 100.0,
                outcome.max_failure_rate * 100.0
            ),
            None => log::warn!(
                "Threshold for check [{}] was not evaluated because the check never ran",
                outcome.check
            ),
        }
    }
}

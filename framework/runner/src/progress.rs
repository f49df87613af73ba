use std::cmp::min;
use std::fmt::Write;
use std::sync::Arc;
use std::time::Duration;

use gale_core::prelude::DelegatedShutdownListener;
use gale_instruments::CheckAggregator;
use indicatif::{ProgressBar, ProgressState, ProgressStyle};
use tokio::time::Instant;

use crate::config::StopCondition;

/// Displays a progress bar while the test is running to show the user how much is left.
///
/// Duration bounded runs show elapsed time against the planned run time. Iteration bounded runs show
/// completed iterations against the budget.
pub(crate) fn start_progress(
    stop: StopCondition,
    checks: Arc<CheckAggregator>,
    mut shutdown_listener: DelegatedShutdownListener,
) -> anyhow::Result<()> {
    let (pb, refresh) = match stop {
        StopCondition::Duration(planned_runtime) => {
            let pb = ProgressBar::new(planned_runtime.as_secs());
            pb.set_style(
                ProgressStyle::with_template(
                    "{spinner:.green} [{wide_bar:.cyan/blue}] [{elapsed_precise} / {planned_runtime}]",
                )?
                .with_key("planned_runtime", {
                    let hours = planned_runtime.as_secs() / 3600;
                    let minutes = (planned_runtime.as_secs() % 3600) / 60;
                    let seconds = planned_runtime.as_secs() % 60;
                    move |_state: &ProgressState, w: &mut dyn Write| {
                        let _ = write!(w, "{:02}:{:02}:{:02}", hours, minutes, seconds);
                    }
                })
                .progress_chars("#>-"),
            );
            (pb, Duration::from_secs(1))
        }
        StopCondition::Iterations(total) => {
            let pb = ProgressBar::new(total);
            pb.set_style(
                ProgressStyle::with_template(
                    "{spinner:.green} [{wide_bar:.cyan/blue}] {pos}/{len} iterations [{elapsed_precise}]",
                )?
                .progress_chars("#>-"),
            );
            (pb, Duration::from_millis(250))
        }
    };

    std::thread::Builder::new()
        .name("progress".to_string())
        .spawn(move || {
            let start_time = Instant::now();

            loop {
                if shutdown_listener.should_shutdown() {
                    log::trace!("Progress thread shutting down");
                    pb.finish_and_clear();
                    break;
                }

                let position = match stop {
                    StopCondition::Duration(planned_runtime) => {
                        min(start_time.elapsed().as_secs(), planned_runtime.as_secs())
                    }
                    StopCondition::Iterations(total) => min(checks.iterations(), total),
                };
                pb.set_position(position);
                std::thread::sleep(refresh);
            }
        })?;

    Ok(())
}

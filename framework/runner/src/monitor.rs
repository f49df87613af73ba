use std::time::{Duration, Instant};

use gale_core::prelude::DelegatedShutdownListener;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// CPU usage, as a percentage of all cores, above which the load generator is considered busy.
const HIGH_CPU_USAGE_PERCENT: f32 = 10.0;

/// Minimum time between two high usage warnings.
const WARNING_INTERVAL: Duration = Duration::from_secs(10);

/// Monitor the resource usage of the runner process and report high usage.
///
/// Note that this won't stop the test proceeding, it will just log a warning to let the user know
/// that their results might be skewed because the load generator itself is saturated.
///
/// The CPU usage for the process is collected every [sysinfo::MINIMUM_CPU_UPDATE_INTERVAL] and checked.
/// If it is above [HIGH_CPU_USAGE_PERCENT] with respect to the number of cores then a warning is logged.
pub(crate) fn start_monitor(
    mut shutdown_listener: DelegatedShutdownListener,
) -> anyhow::Result<()> {
    std::thread::Builder::new()
        .name("monitor".to_string())
        .spawn(move || {
            let this_process_pid = Pid::from_u32(std::process::id());
            let mut sys = System::new();

            sys.refresh_cpu_all();
            let cpu_count = sys.cpus().len().max(1);
            let mut last_warning: Option<Instant> = None;

            loop {
                if shutdown_listener.should_shutdown() {
                    break;
                }

                sys.refresh_processes_specifics(
                    ProcessesToUpdate::Some(&[this_process_pid]),
                    true,
                    ProcessRefreshKind::nothing().with_cpu(),
                );

                let Some(process) = sys.process(this_process_pid) else {
                    log::debug!("Failed to get process info, stopping resource monitor");
                    break;
                };

                let usage = (process.cpu_usage() / (cpu_count * 100) as f32) * 100.0;
                if usage > HIGH_CPU_USAGE_PERCENT
                    && last_warning.map_or(true, |at| at.elapsed() >= WARNING_INTERVAL)
                {
                    log::warn!(
                        "High CPU usage detected. Gale is using {:.2}% of the CPU, with {} available cores",
                        usage,
                        cpu_count
                    );
                    last_warning = Some(Instant::now());
                }

                std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
            }
        })?;

    Ok(())
}

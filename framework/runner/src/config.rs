use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use gale_core::prelude::ConfigError;

/// Default time allowed for virtual users to finish their in-flight iteration after the stop signal.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(30);

/// Default timeout for a single request made by a scenario.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// When a run ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCondition {
    /// Stop once this much wall-clock time has elapsed.
    Duration(Duration),
    /// Stop once this many iterations have been run, counted across all virtual users.
    Iterations(u64),
}

impl Display for StopCondition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StopCondition::Duration(duration) => {
                write!(f, "for {}", humantime::format_duration(*duration))
            }
            StopCondition::Iterations(iterations) => write!(f, "for {iterations} iterations"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub virtual_users: usize,
    pub stop: StopCondition,
    pub pacing: Duration,
    pub grace_period: Duration,
    pub request_timeout: Duration,
}

impl RunConfig {
    /// Create a validated config. Exactly one of `duration` and `iterations` must be set.
    pub fn new(
        virtual_users: usize,
        duration: Option<Duration>,
        iterations: Option<u64>,
    ) -> Result<Self, ConfigError> {
        let stop = match (duration, iterations) {
            (Some(duration), None) => StopCondition::Duration(duration),
            (None, Some(iterations)) => StopCondition::Iterations(iterations),
            (Some(_), Some(_)) => {
                return Err(ConfigError::new(
                    "Only one of a duration or an iteration count can be set",
                ))
            }
            (None, None) => {
                return Err(ConfigError::new(
                    "Either a duration or an iteration count is required",
                ))
            }
        };

        let config = Self {
            virtual_users,
            stop,
            pacing: Duration::ZERO,
            grace_period: DEFAULT_GRACE_PERIOD,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        };
        config.validate()?;

        Ok(config)
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.virtual_users == 0 {
            return Err(ConfigError::new("At least one virtual user is required"));
        }

        match self.stop {
            StopCondition::Duration(duration) if duration.is_zero() => {
                Err(ConfigError::new("The run duration must be greater than zero"))
            }
            StopCondition::Iterations(0) => Err(ConfigError::new(
                "The iteration count must be greater than zero",
            )),
            _ => Ok(()),
        }?;

        if self.request_timeout.is_zero() {
            return Err(ConfigError::new(
                "The request timeout must be greater than zero",
            ));
        }

        Ok(())
    }
}

/// Iterations left to run in an iteration bounded run.
///
/// Each virtual user claims an iteration before running it, so the number of iterations started
/// never exceeds the budget.
#[derive(Debug)]
pub(crate) struct IterationBudget {
    remaining: AtomicU64,
}

impl IterationBudget {
    pub(crate) fn new(total: u64) -> Self {
        Self {
            remaining: AtomicU64::new(total),
        }
    }

    pub(crate) fn try_claim(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |remaining| {
                remaining.checked_sub(1)
            })
            .is_ok()
    }
}

mod agent;
mod cli;
mod config;
mod context;
mod definition;
mod executor;
mod init;
mod monitor;
mod progress;
mod run;
mod shutdown;
mod types;

pub mod prelude {
    pub use crate::cli::{GaleScenarioCli, ReporterOpt};
    pub use crate::config::{
        RunConfig, StopCondition, DEFAULT_GRACE_PERIOD, DEFAULT_REQUEST_TIMEOUT,
    };
    pub use crate::context::UserValuesConstraint;
    pub use crate::context::{AgentContext, RunnerContext};
    pub use crate::definition::{HookResult, ScenarioDefinitionBuilder};
    pub use crate::executor::Executor;
    pub use crate::init::init;
    pub use crate::run::run;
    pub use crate::types::GaleResult;

    pub use gale_core::prelude::{
        ConfigError, DelegatedShutdownListener, FatalError, ShutdownSignalError,
    };
    pub use gale_instruments::{report_operation, CheckResult, OperationRecord, Reporter};
    pub use gale_summary_model::{CheckCounts, RunSummary, Threshold, ThresholdOutcome};
}

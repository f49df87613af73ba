mod error;
mod shutdown;

pub mod prelude {
    pub use crate::error::{ConfigError, FatalError};
    pub use crate::shutdown::{DelegatedShutdownListener, ShutdownHandle, ShutdownSignalError};
}

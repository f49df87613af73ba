/// The run configuration is invalid or contradictory.
///
/// Raised before any virtual user is started, so no load is generated for a run that fails with
/// this error.
#[derive(derive_more::Error, derive_more::Display, Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    msg: String,
}

impl ConfigError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}

/// Return this error from a scenario function to abort the whole run.
///
/// Any other error returned from a scenario is recorded as a failed check and the virtual user
/// carries on with its next iteration. This one stops every virtual user and is returned from the
/// runner, so it should be reserved for a scenario that cannot work at all, for example because a
/// required piece of setup is missing.
#[derive(derive_more::Error, derive_more::Display, Debug)]
pub struct FatalError {
    msg: String,
}

impl FatalError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}

impl Default for FatalError {
    fn default() -> Self {
        Self {
            msg: "Scenario is malformed".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_display_their_message() {
        assert_eq!(
            "users must be at least 1",
            ConfigError::new("users must be at least 1").to_string()
        );
        assert_eq!("Scenario is malformed", FatalError::default().to_string());
    }

    #[test]
    fn fatal_error_is_detectable_through_anyhow() {
        let err: anyhow::Error = FatalError::new("no client").into();
        assert!(err.is::<FatalError>());
        assert!(!err.is::<ConfigError>());
    }
}

use gale_runner::prelude::UserValuesConstraint;
use url::Url;

#[derive(Default, Debug)]
pub struct HttpRunnerContext {
    target: Option<Url>,
}

impl HttpRunnerContext {
    /// The base URL of the system under test, set by [crate::prelude::configure_target].
    pub fn target(&self) -> Option<&Url> {
        self.target.as_ref()
    }

    pub(crate) fn set_target(&mut self, target: Url) {
        self.target = Some(target);
    }
}

impl UserValuesConstraint for HttpRunnerContext {}

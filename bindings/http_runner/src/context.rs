use gale_http_client::prelude::HttpClient;
use gale_runner::prelude::UserValuesConstraint;

/// Per virtual user state for HTTP scenarios.
///
/// Each virtual user gets its own client, and so its own connection pool. Scenario specific state
/// goes in `scenario_values`.
#[derive(Default, Debug)]
pub struct HttpAgentContext<SV: UserValuesConstraint = ()> {
    pub(crate) client: Option<HttpClient>,
    pub scenario_values: SV,
}

impl<SV: UserValuesConstraint> HttpAgentContext<SV> {
    pub fn client(&self) -> Option<&HttpClient> {
        self.client.as_ref()
    }
}

impl<SV: UserValuesConstraint> UserValuesConstraint for HttpAgentContext<SV> {}

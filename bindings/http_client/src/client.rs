use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use gale_instruments::{report_operation, OperationRecord, Reporter};
use url::Url;

use crate::error::{RequestError, RequestErrorKind};
use crate::response::HttpResponse;

/// HTTP client bound to one target. Every request is timed and reported, and carries a timeout so
/// that a hung request cannot hold a virtual user past the end of the run.
#[derive(Debug, Clone)]
pub struct HttpClientInstrumented {
    client: reqwest::Client,
    base_url: Url,
    reporter: Arc<Reporter>,
}

impl HttpClientInstrumented {
    pub fn new(base_url: &str, timeout: Duration, reporter: Arc<Reporter>) -> anyhow::Result<Self> {
        let base_url =
            Url::parse(base_url).with_context(|| format!("Invalid target URL: {base_url}"))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Target URL cannot be used as a base: {base_url}");
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url,
            reporter,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Send a GET request for `path`, resolved against the base URL, and read the whole body.
    pub async fn get(&self, path: &str) -> Result<HttpResponse, RequestError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|_| RequestError::new("GET", path, RequestErrorKind::InvalidUrl))?;

        let operation_record = OperationRecord::new("http_get");
        let result = self.send("GET", self.client.get(url.clone()), &url).await;
        report_operation(&self.reporter, operation_record, &result);

        result
    }

    async fn send(
        &self,
        method: &'static str,
        request: reqwest::RequestBuilder,
        url: &Url,
    ) -> Result<HttpResponse, RequestError> {
        let response = request
            .send()
            .await
            .map_err(|e| RequestError::from_reqwest(method, url, &e))?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| RequestError::from_reqwest(method, url, &e))?;

        Ok(HttpResponse::new(status, headers, body))
    }
}

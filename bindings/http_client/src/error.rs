/// Broad cause of a failed request.
///
/// Kept coarse on purpose: the display string of a [RequestError] is used as a check name, so it
/// must not vary with details such as OS error codes.
#[derive(derive_more::Display, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestErrorKind {
    #[display("timeout")]
    Timeout,
    #[display("connect")]
    Connect,
    #[display("body")]
    Body,
    #[display("invalid url")]
    InvalidUrl,
    #[display("other")]
    Other,
}

/// A request that did not produce a response, for example because it timed out or the target was
/// unreachable. An error status code is a response, not a [RequestError].
#[derive(derive_more::Error, derive_more::Display, Debug)]
#[display("{method} {url} failed: {kind}")]
pub struct RequestError {
    method: &'static str,
    url: String,
    kind: RequestErrorKind,
}

impl RequestError {
    pub fn new(method: &'static str, url: impl Into<String>, kind: RequestErrorKind) -> Self {
        Self {
            method,
            url: url.into(),
            kind,
        }
    }

    pub(crate) fn from_reqwest(method: &'static str, url: &url::Url, err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            RequestErrorKind::Timeout
        } else if err.is_connect() {
            RequestErrorKind::Connect
        } else if err.is_body() || err.is_decode() {
            RequestErrorKind::Body
        } else {
            RequestErrorKind::Other
        };
        log::debug!("{method} {url} failed: {err:?}");

        Self::new(method, url.as_str(), kind)
    }

    pub fn kind(&self) -> RequestErrorKind {
        self.kind
    }
}

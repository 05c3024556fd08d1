use std::time::Duration;

use archive_core::api_error;
use futures_util::StreamExt;
use reqwest::header::{CONTENT_TYPE, COOKIE};
use reqwest::StatusCode;

use crate::{ArchiveEvent, FailureKind, FetchError, FetchMetadata, FetchOutcome, FetchOutput};

/// Browser user agent sent with every request.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/129.0.0.0 Safari/537.36";

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    pub user_agent: String,
    /// Sent as the `Cookie` header when present.
    pub credential: Option<String>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            redirect_limit: 5,
            max_bytes: 20 * 1024 * 1024,
            user_agent: BROWSER_USER_AGENT.to_string(),
            credential: None,
        }
    }
}

impl FetchSettings {
    pub(crate) fn build_client(&self) -> Result<reqwest::Client, FetchError> {
        reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.request_timeout)
            .redirect(reqwest::redirect::Policy::limited(self.redirect_limit))
            .user_agent(self.user_agent.clone())
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))
    }
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ArchiveEvent);
}

/// Sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn emit(&self, _event: ArchiveEvent) {}
}

#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// Issue exactly one GET for `url` and classify the response.
    async fn fetch(&self, url: &str) -> FetchOutcome;
}

#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    settings: FetchSettings,
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new(settings: FetchSettings) -> Result<Self, FetchError> {
        let client = settings.build_client()?;
        Ok(Self { settings, client })
    }
}

#[async_trait::async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> FetchOutcome {
        let parsed = match reqwest::Url::parse(url) {
            Ok(parsed) => parsed,
            Err(err) => {
                return FetchOutcome::Fatal(FetchError::new(FailureKind::InvalidUrl, err.to_string()))
            }
        };

        let mut request = self.client.get(parsed);
        if let Some(cookie) = self.settings.credential.as_deref() {
            request = request.header(COOKIE, cookie);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => return FetchOutcome::Fatal(map_reqwest_error(err)),
        };

        let status = response.status();
        match status {
            StatusCode::NOT_FOUND => return FetchOutcome::NotFound,
            StatusCode::FORBIDDEN => {
                return FetchOutcome::Fatal(FetchError::new(
                    FailureKind::AccessDenied,
                    format!("{url} answered {status}"),
                ))
            }
            _ if !status.is_success() => {
                return FetchOutcome::Fatal(FetchError::new(
                    FailureKind::HttpStatus(status.as_u16()),
                    status.to_string(),
                ))
            }
            _ => {}
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let bytes = match read_body(response, self.settings.max_bytes).await {
            Ok(bytes) => bytes,
            Err(err) => return FetchOutcome::Fatal(err),
        };

        let payload: serde_json::Value = match serde_json::from_slice(&bytes) {
            Ok(payload) => payload,
            Err(err) => {
                return FetchOutcome::Fatal(FetchError::new(
                    FailureKind::MalformedPayload,
                    err.to_string(),
                ))
            }
        };
        if let Some(error) = api_error(&payload) {
            return FetchOutcome::Fatal(FetchError::new(
                FailureKind::ErrorEnvelope { code: error.code },
                error.message,
            ));
        }

        let metadata = FetchMetadata {
            url: url.to_string(),
            status: status.as_u16(),
            content_type,
            byte_len: bytes.len() as u64,
        };
        FetchOutcome::Payload(FetchOutput { bytes, metadata })
    }
}

/// Body bytes, failing with `TooLarge` once `max_bytes` is exceeded.
pub(crate) async fn read_body(
    response: reqwest::Response,
    max_bytes: u64,
) -> Result<Vec<u8>, FetchError> {
    if let Some(content_len) = response.content_length() {
        if content_len > max_bytes {
            return Err(FetchError::new(
                FailureKind::TooLarge {
                    max_bytes,
                    actual: Some(content_len),
                },
                "response too large",
            ));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(map_reqwest_error)?;
        let next_len = bytes.len() as u64 + chunk.len() as u64;
        if next_len > max_bytes {
            return Err(FetchError::new(
                FailureKind::TooLarge {
                    max_bytes,
                    actual: Some(next_len),
                },
                "response too large",
            ));
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

pub(crate) fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_redirect() {
        return FetchError::new(FailureKind::RedirectLimitExceeded, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}

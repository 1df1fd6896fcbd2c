use std::time::Duration;

use reqwest::{Client, StatusCode, header};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::FetchConfig;

const DEFAULT_USER_AGENT: &str = concat!("dns-inventory/", env!("CARGO_PKG_VERSION"));

/// How much of an upstream error body is kept in error messages.
const BODY_PREFIX_LEN: usize = 200;

/// Classified upstream failure, as seen by collectors.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The provider's quota marker was found in the body. Never retried;
    /// collectors stop enumerating and keep what they have.
    #[error("upstream quota exceeded")]
    QuotaExceeded,
    /// HTTP 429 or a `TOO_MANY_REQUESTS` body. The retry loop absorbs these
    /// by sleeping; callers only see this from single-shot classification.
    #[error("upstream rate limit hit")]
    RateLimited,
    #[error("not found")]
    NotFound,
    #[error("client error (HTTP {status}): {body}")]
    ClientError { status: u16, body: String },
    #[error("server error (HTTP {status}): {body}")]
    ServerError { status: u16, body: String },
    #[error("request cancelled")]
    Cancelled,
    #[error("transport error: {0}")]
    TransportError(#[from] reqwest::Error),
}

impl FetchError {
    /// 5xx and transport failures are transient; everything else is final.
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ServerError { .. } | Self::TransportError(_)
        )
    }
}

/// HTTP GET with retry, backoff and rate-limit handling for upstream
/// provider APIs.
#[derive(Clone)]
pub struct FetchClient {
    client: Client,
    config: FetchConfig,
}

impl FetchClient {
    pub fn new(config: FetchConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self { client, config })
    }

    /// Fetch `url` and return the response body.
    ///
    /// Transient failures are retried up to `max_retries` times with
    /// exponential backoff; rate-limit responses sleep `sleep_on_429` and
    /// retry without consuming the retry budget. Cancellation aborts the
    /// loop, including mid-sleep.
    pub async fn get(
        &self,
        url: &str,
        headers: &[(&str, String)],
        cancel: &CancellationToken,
    ) -> Result<String, FetchError> {
        let mut retries_used: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }

            match self.attempt_get(url, headers).await {
                Ok(body) => return Ok(body),
                Err(FetchError::RateLimited) => {
                    warn!(
                        "Rate limited by {url}, sleeping {:?} before retrying",
                        self.config.sleep_on_429
                    );
                    self.sleep(self.config.sleep_on_429, cancel).await?;
                }
                Err(e) if e.is_retryable() => {
                    if retries_used >= self.config.max_retries {
                        return Err(e);
                    }
                    retries_used += 1;
                    let delay = backoff_delay(self.config.backoff_factor, retries_used);
                    debug!(
                        "Transient error from {url} ({e}), retry {retries_used}/{} in {delay:?}",
                        self.config.max_retries
                    );
                    self.sleep(delay, cancel).await?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Fetch and decode a JSON body. Decode failures are permanent
    /// (`ClientError`), not retried.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        headers: &[(&str, String)],
        cancel: &CancellationToken,
    ) -> Result<T, FetchError> {
        let body = self.get(url, headers, cancel).await?;
        serde_json::from_str(&body).map_err(|e| FetchError::ClientError {
            status: 200,
            body: format!("invalid JSON: {e}"),
        })
    }

    async fn attempt_get(
        &self,
        url: &str,
        headers: &[(&str, String)],
    ) -> Result<String, FetchError> {
        let mut request = self.client.get(url);
        let mut has_user_agent = false;
        let mut has_accept = false;

        for (name, value) in headers {
            has_user_agent |= name.eq_ignore_ascii_case("user-agent");
            has_accept |= name.eq_ignore_ascii_case("accept");
            request = request.header(*name, value.as_str());
        }
        if !has_user_agent {
            request = request.header(header::USER_AGENT, DEFAULT_USER_AGENT);
        }
        if !has_accept {
            request = request.header(header::ACCEPT, "application/json");
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        classify(status, body)
    }

    async fn sleep(&self, delay: Duration, cancel: &CancellationToken) -> Result<(), FetchError> {
        tokio::select! {
            _ = tokio::time::sleep(delay) => Ok(()),
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
        }
    }
}

/// Delay before retry `n` (1-based): `factor^n` seconds.
fn backoff_delay(factor: f64, n: u32) -> Duration {
    Duration::from_secs_f64(factor.max(0.0).powi(n as i32))
}

/// Map a single response to the error taxonomy. Body markers take
/// precedence over status codes: some providers return quota errors
/// with otherwise unremarkable statuses.
fn classify(status: StatusCode, body: String) -> Result<String, FetchError> {
    if body.contains("QUOTA_EXCEEDED") {
        return Err(FetchError::QuotaExceeded);
    }
    if status == StatusCode::TOO_MANY_REQUESTS || body.contains("TOO_MANY_REQUESTS") {
        return Err(FetchError::RateLimited);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(FetchError::NotFound);
    }
    if status.is_success() {
        return Ok(body);
    }

    let prefix = body_prefix(&body);
    if status.is_client_error() {
        Err(FetchError::ClientError {
            status: status.as_u16(),
            body: prefix,
        })
    } else {
        Err(FetchError::ServerError {
            status: status.as_u16(),
            body: prefix,
        })
    }
}

fn body_prefix(body: &str) -> String {
    body.chars().take(BODY_PREFIX_LEN).collect()
}

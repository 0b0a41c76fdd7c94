//! Authenticated JSON transport for the Jira REST API.
//!
//! Every call goes through [`JiraTransport::execute_raw`], which classifies non-2xx
//! responses into [`TrackerError`] kinds and retries rate-limit and server errors with
//! exponential backoff. Failures below HTTP are returned as-is without retrying.

use std::collections::BTreeMap;
use std::time::Duration;

use base64::prelude::{BASE64_STANDARD, Engine as _};
use reqwest::{
    Client, Method, StatusCode,
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, RETRY_AFTER},
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, instrument, warn};

use crate::error::{TrackerError, TrackerResult};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

const BACKOFF_MULTIPLIER: u32 = 2;

/// Connection settings shared read-only by every request.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub email: String,
    pub token: String,
    /// Applies to each attempt, not to the whole retry sequence.
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
}

impl ClientConfig {
    pub fn new(
        base_url: impl Into<String>,
        email: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            email: email.into(),
            token: token.into(),
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
        }
    }
}

/// Delay before retry number `attempt + 1`: 1s, 2s, 4s, ... for a one second base.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(BACKOFF_MULTIPLIER.saturating_pow(attempt))
}

pub struct JiraTransport {
    http: Client,
    config: ClientConfig,
}

impl JiraTransport {
    pub fn new(config: ClientConfig) -> TrackerResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| {
                TrackerError::transport(None, format!("failed to build HTTP client: {err}"))
            })?;
        Ok(Self { http, config })
    }

    fn auth_header(email: &str, token: &str) -> String {
        let credentials = format!("{email}:{token}");
        let encoded = BASE64_STANDARD.encode(credentials);
        format!("Basic {encoded}")
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Sends the request and decodes the response body into `T`.
    ///
    /// An empty body decodes as JSON `null`, so `Value` and `Option<_>` targets accept
    /// it while struct targets fail with a parse error.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> TrackerResult<T> {
        let (status, bytes) = self.execute_raw(method, path, body).await?;
        let payload: &[u8] = if bytes.is_empty() { b"null" } else { &bytes };
        serde_json::from_slice(payload).map_err(|err| {
            TrackerError::transport(Some(status), format!("failed to parse response: {err}"))
        })
    }

    /// Sends the request and ignores whatever the response body holds.
    pub async fn request_unit(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> TrackerResult<()> {
        self.execute_raw(method, path, body).await.map(|_| ())
    }

    /// Performs one logical exchange, retrying rate-limit and server errors.
    #[instrument(skip(self, body), fields(attempt, max_retries = self.config.max_retries))]
    pub async fn execute_raw(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> TrackerResult<(u16, Vec<u8>)> {
        let max_retries = self.config.max_retries;
        let mut last_error = None;

        for attempt in 0..=max_retries {
            tracing::Span::current().record("attempt", attempt);
            debug!("Attempt {} of {}", attempt + 1, max_retries + 1);

            match self.send_once(method.clone(), path, body).await {
                Ok(response) => return Ok(response),
                Err(err) if err.is_retryable() => {
                    if attempt < max_retries {
                        let delay = backoff_delay(self.config.retry_base_delay, attempt);
                        warn!(
                            "{} {} failed ({}); retrying in {:?}",
                            method,
                            path,
                            err,
                            delay
                        );
                        sleep(delay).await;
                    }
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        let last = last_error
            .unwrap_or_else(|| TrackerError::transport(None, "request was never attempted"));
        Err(TrackerError::ExhaustedRetries {
            attempts: max_retries + 1,
            last: Box::new(last),
        })
    }

    async fn send_once(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> TrackerResult<(u16, Vec<u8>)> {
        let mut request = self
            .http
            .request(method, self.endpoint(path))
            .header(
                AUTHORIZATION,
                Self::auth_header(&self.config.email, &self.config.token),
            )
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|err| {
            let reason = if err.is_timeout() {
                "request timed out"
            } else {
                "request failed"
            };
            TrackerError::transport(None, format!("{reason}: {err}"))
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.bytes().await.map_err(|err| {
            TrackerError::transport(
                Some(status.as_u16()),
                format!("failed to read response body: {err}"),
            )
        })?;
        debug!("Jira responded with {}", status);

        if status.is_success() {
            return Ok((status.as_u16(), bytes.to_vec()));
        }
        Err(classify_response(status, &headers, &bytes))
    }
}

/// Serializes a request payload for [`JiraTransport::request`].
pub fn encode_body<B: Serialize>(body: &B) -> TrackerResult<Value> {
    serde_json::to_value(body).map_err(|err| {
        TrackerError::transport(None, format!("failed to encode request body: {err}"))
    })
}

#[derive(Default, Deserialize)]
struct JiraErrorBody {
    #[serde(rename = "errorMessages", default)]
    error_messages: Vec<String>,
    #[serde(default)]
    errors: BTreeMap<String, Value>,
}

fn error_messages(body: &[u8]) -> Vec<String> {
    let parsed: JiraErrorBody = serde_json::from_slice(body).unwrap_or_default();
    let mut messages = parsed.error_messages;
    for (field, value) in parsed.errors {
        match value {
            Value::String(message) => messages.push(format!("{field}: {message}")),
            other => messages.push(format!("{field}: {other}")),
        }
    }
    messages
}

/// Maps a non-2xx response onto the error taxonomy.
pub fn classify_response(status: StatusCode, headers: &HeaderMap, body: &[u8]) -> TrackerError {
    let messages = error_messages(body);
    let summary = match messages.first() {
        Some(first) => format!("Jira error (HTTP {}): {first}", status.as_u16()),
        None => format!("Jira error (HTTP {})", status.as_u16()),
    };

    match status.as_u16() {
        401 | 403 => TrackerError::Authentication { message: summary },
        404 => TrackerError::NotFound {
            resource: "Jira resource".to_string(),
            key: None,
        },
        429 => {
            let retry_after = headers
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse::<u64>().ok())
                .unwrap_or(0);
            TrackerError::RateLimited {
                retry_after,
                message: summary,
            }
        }
        500 | 502 | 503 | 504 => TrackerError::Server {
            status: status.as_u16(),
        },
        code => TrackerError::Transport {
            status: Some(code),
            messages,
        },
    }
}

//! Retrying HTTP transport for the Kalshi REST API.
//!
//! The transport is split in two layers:
//!
//! - [`HttpSend`] performs exactly one HTTP exchange. [`ReqwestSender`] is the
//!   production implementation; tests substitute scripted senders.
//! - [`RetryingTransport`] wraps a sender with the retry budget described by a
//!   [`RetryPolicy`] and turns the final outcome into an [`ApiError`].
//!
//! Statuses 429, 500, 502, 503 and 504 are retried. Every other non-success
//! status is surfaced immediately.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::Method;
use serde_json::{Map, Value};

use crate::config::RetryConfig;
use crate::error::ApiError;

/// HTTP statuses that are worth another attempt.
pub const RETRIABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// A fully prepared outgoing request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP verb.
    pub method: Method,
    /// Absolute request URL, including any query string.
    pub url: String,
    /// Header name/value pairs.
    pub headers: Vec<(String, String)>,
    /// Optional request body (already serialised).
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Creates a request with an `Accept: application/json` header.
    #[must_use]
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: vec![("Accept".to_string(), "application/json".to_string())],
            body: None,
        }
    }

    /// Adds a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Attaches a JSON body and the matching content type.
    #[must_use]
    pub fn json_body(mut self, body: Vec<u8>) -> Self {
        self.headers
            .push(("Content-Type".to_string(), "application/json".to_string()));
        self.body = Some(body);
        self
    }
}

/// The raw outcome of one HTTP exchange.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body bytes.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Returns `true` for 2xx statuses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Reads `Retry-After` as (possibly fractional) seconds.
    ///
    /// HTTP-date values and garbage are ignored.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        let raw = self.headers.get(RETRY_AFTER)?.to_str().ok()?;
        let seconds: f64 = raw.trim().parse().ok()?;
        Duration::try_from_secs_f64(seconds).ok()
    }
}

/// A connection-level failure: no HTTP response was received.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{reason}")]
pub struct SendError {
    /// Human-readable failure reason.
    pub reason: String,
}

impl SendError {
    /// Creates a new send error.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Performs a single HTTP exchange.
#[async_trait]
pub trait HttpSend: Send + Sync {
    /// Sends `request` once, without retrying.
    ///
    /// # Errors
    ///
    /// Returns a [`SendError`] if no HTTP response could be obtained.
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, SendError>;
}

/// [`HttpSend`] implementation backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestSender {
    client: reqwest::Client,
}

impl ReqwestSender {
    /// Creates a sender with the given per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn new(timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("kalshi-mcp/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpSend for ReqwestSender {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, SendError> {
        let mut builder = self.client.request(request.method.clone(), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| SendError::new(e.without_url().to_string()))?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| SendError::new(e.without_url().to_string()))?;

        Ok(HttpResponse {
            status,
            headers,
            body: body.to_vec(),
        })
    }
}

/// Backoff parameters for one HTTP call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Backoff before the second attempt; doubled for each further one.
    pub base_delay: Duration,
    /// Upper bound (exclusive) of the uniform jitter added to each backoff.
    pub jitter: Duration,
    /// Cap applied after retriable HTTP statuses.
    pub http_cap: Duration,
    /// Cap applied after connection-level failures.
    pub network_cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            jitter: Duration::from_millis(config.jitter_ms),
            http_cap: Duration::from_millis(config.http_cap_ms),
            network_cap: Duration::from_millis(config.network_cap_ms),
        }
    }
}

impl RetryPolicy {
    /// A policy that never sleeps, for tests.
    #[must_use]
    pub const fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            jitter: Duration::ZERO,
            http_cap: Duration::ZERO,
            network_cap: Duration::ZERO,
        }
    }

    /// Exponential backoff plus jitter for the given 1-based attempt number.
    fn exponential(&self, attempt: u32) -> Duration {
        let factor = 1_u32 << attempt.saturating_sub(1).min(20);
        let mut delay = self.base_delay.saturating_mul(factor);
        if !self.jitter.is_zero() {
            let jitter_nanos = u64::try_from(self.jitter.as_nanos()).unwrap_or(u64::MAX);
            delay += Duration::from_nanos(rand::rng().random_range(0..jitter_nanos));
        }
        delay
    }

    /// Wait before retrying after a retriable HTTP status.
    ///
    /// A server-supplied `Retry-After` raises the wait; the HTTP cap bounds it.
    #[must_use]
    pub fn http_backoff(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let computed = self.exponential(attempt);
        let wait = retry_after.map_or(computed, |hint| computed.max(hint));
        wait.min(self.http_cap)
    }

    /// Wait before retrying after a connection-level failure.
    #[must_use]
    pub fn network_backoff(&self, attempt: u32) -> Duration {
        self.exponential(attempt).min(self.network_cap)
    }
}

/// Returns `true` if `status` should be retried.
#[must_use]
pub fn is_retriable(status: u16) -> bool {
    RETRIABLE_STATUSES.contains(&status)
}

/// A sender wrapped with a retry budget.
pub struct RetryingTransport {
    sender: Box<dyn HttpSend>,
    policy: RetryPolicy,
}

impl std::fmt::Debug for RetryingTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingTransport")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl RetryingTransport {
    /// Creates a transport from a sender and a policy.
    #[must_use]
    pub const fn new(sender: Box<dyn HttpSend>, policy: RetryPolicy) -> Self {
        Self { sender, policy }
    }

    /// Sends `request`, retrying transient failures, and returns the success body.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Http`] for a terminal or exhausted HTTP status and
    /// [`ApiError::Network`] when no response could be obtained.
    pub async fn execute(&self, request: &HttpRequest) -> Result<Vec<u8>, ApiError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.sender.send(request).await {
                Ok(response) if response.is_success() => return Ok(response.body),
                Ok(response) => {
                    let status = response.status;
                    if !is_retriable(status) || attempt >= max_attempts {
                        return Err(ApiError::Http {
                            url: request.url.clone(),
                            status,
                        });
                    }
                    let delay = self.policy.http_backoff(attempt, response.retry_after());
                    tracing::warn!(
                        status,
                        url = %request.url,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis(),
                        "Kalshi API HTTP error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    if attempt >= max_attempts {
                        return Err(ApiError::Network {
                            url: request.url.clone(),
                            reason: err.reason,
                        });
                    }
                    let delay = self.policy.network_backoff(attempt);
                    tracing::warn!(
                        url = %request.url,
                        reason = %err.reason,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis(),
                        "Kalshi API request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Like [`execute`](Self::execute), but decodes the body as a JSON object.
    ///
    /// # Errors
    ///
    /// In addition to the errors of `execute`, returns
    /// [`ApiError::InvalidJson`] or [`ApiError::NonObject`] for unusable bodies.
    pub async fn execute_json(&self, request: &HttpRequest) -> Result<Map<String, Value>, ApiError> {
        let body = self.execute(request).await?;
        decode_object(&request.url, &body)
    }
}

/// Decodes a response body that must be a JSON object.
///
/// # Errors
///
/// Returns an error if the body is not valid JSON or not an object.
pub fn decode_object(url: &str, body: &[u8]) -> Result<Map<String, Value>, ApiError> {
    let value: Value = serde_json::from_slice(body).map_err(|_| ApiError::InvalidJson {
        url: url.to_string(),
    })?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ApiError::NonObject {
            url: url.to_string(),
        }),
    }
}

#[async_trait]
impl<T: HttpSend + ?Sized> HttpSend for std::sync::Arc<T> {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, SendError> {
        (**self).send(request).await
    }
}

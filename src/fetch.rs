//! Single logical HTTP request with bounded retries, a per-attempt deadline
//! and exponential backoff.
//!
//! Only transport failures, timeouts and 5xx responses are retried. Any other
//! non-success status is handed back to the caller on the first attempt.
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode, Url};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config;
use crate::error::TransientError;

const MIN_ATTEMPTS: u32 = 1;
const MIN_BACKOFF: Duration = Duration::from_millis(100);
const MIN_TIMEOUT: Duration = Duration::from_millis(1000);

/// Retry budget for one logical request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: u32,
    backoff: Duration,
    timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(800), Duration::from_millis(15_000))
    }
}

impl RetryPolicy {
    /// Build a policy, raising each value to its floor.
    pub fn new(attempts: u32, backoff: Duration, timeout: Duration) -> Self {
        Self {
            attempts: attempts.max(MIN_ATTEMPTS),
            backoff: backoff.max(MIN_BACKOFF),
            timeout: timeout.max(MIN_TIMEOUT),
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Sleep taken after attempt `attempt` (0-indexed) fails.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl From<&config::Fetch> for RetryPolicy {
    fn from(cfg: &config::Fetch) -> Self {
        RetryPolicy::new(
            cfg.attempts,
            Duration::from_millis(cfg.backoff_ms),
            Duration::from_millis(cfg.timeout_ms),
        )
    }
}

/// Everything needed to issue (and re-issue) one request.
#[derive(Clone)]
pub struct RequestSpec {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(&'static str, String)>,
    pub body: Option<Value>,
}

impl RequestSpec {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

impl fmt::Debug for RequestSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers: Vec<(&str, &str)> = self
            .headers
            .iter()
            .map(|(name, value)| {
                if name.eq_ignore_ascii_case("authorization") {
                    (*name, "Bearer [REDACTED]")
                } else {
                    (*name, value.as_str())
                }
            })
            .collect();
        f.debug_struct("RequestSpec")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("headers", &headers)
            .field("body", &self.body)
            .finish()
    }
}

/// Status and fully read body of one attempt.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: StatusCode,
    pub body: String,
}

impl FetchResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Sends a single attempt. Implementations must not retry on their own.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &RequestSpec) -> Result<FetchResponse, TransientError>;
}

/// Production transport backed by `reqwest`.
#[derive(Clone)]
pub struct HttpTransport {
    http: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .user_agent(concat!("notion-showcase/", env!("CARGO_PKG_VERSION")))
            .no_proxy()
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &RequestSpec) -> Result<FetchResponse, TransientError> {
        let mut builder = self.http.request(request.method.clone(), request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(*name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        let res = builder.send().await?;
        let status = res.status();
        let body = res.text().await?;
        Ok(FetchResponse { status, body })
    }
}

/// Retrying client over any `Transport`.
#[derive(Clone)]
pub struct FetchClient {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
}

impl fmt::Debug for FetchClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchClient")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl FetchClient {
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Issue `request` until it succeeds, returns a non-retryable status, or
    /// the attempt budget runs out. On exhaustion the last transient failure
    /// is returned.
    pub async fn execute(&self, request: &RequestSpec) -> Result<FetchResponse, TransientError> {
        let attempts = self.policy.attempts;
        let mut last_err = None;

        for attempt in 0..attempts {
            debug!(?request, attempt, "sending upstream request");
            let outcome = tokio::time::timeout(self.policy.timeout, self.transport.send(request))
                .await
                .unwrap_or(Err(TransientError::Timeout(self.policy.timeout)));

            match outcome {
                Ok(res) if res.status.is_success() => return Ok(res),
                Ok(res) if res.status.is_server_error() => {
                    last_err = Some(TransientError::Status {
                        status: res.status,
                        body: res.body,
                    });
                }
                // 4xx and other non-success codes are the caller's problem.
                Ok(res) => return Ok(res),
                Err(err) => last_err = Some(err),
            }

            if attempt + 1 < attempts {
                let delay = self.policy.delay_after(attempt);
                warn!(
                    url = %request.url,
                    attempt = attempt + 1,
                    attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = ?last_err,
                    "upstream attempt failed; backing off"
                );
                tokio::time::sleep(delay).await;
            }
        }

        let err = last_err.unwrap_or(TransientError::Transport("no attempt made".into()));
        warn!(url = %request.url, attempts, error = %err, "upstream retries exhausted");
        Err(err)
    }
}

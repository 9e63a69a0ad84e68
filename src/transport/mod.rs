//! Request execution against the Paprika cloud API.
//!
//! Every outbound call attaches a bearer token (unless the call is the
//! login itself), attaches the optional User-Agent, applies the configured
//! timeout, and retries a bounded number of transient failures before
//! surfacing an error. Retry behavior lives in [`RetryPolicy`] so it can be
//! tuned and tested without touching the network path.

use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde_json::Value;

use crate::error::{PaprikaError, Result};

/// Bounded retry for transient failures.
///
/// Only statuses in `retryable_statuses` are retried, and only for methods
/// in `retryable_methods`: the vendor API treats its sync GETs and POSTs as
/// safe to replay. Connection and timeout errors follow the same method
/// restriction and budget.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    /// Base delay; attempt `n` waits `base * 2^(n-1)`.
    pub backoff_base: Duration,
    /// Transient statuses worth replaying.
    pub retryable_statuses: Vec<StatusCode>,
    /// Methods the remote tolerates replaying.
    pub retryable_methods: Vec<Method>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: Duration::from_secs(1),
            retryable_statuses: vec![
                StatusCode::TOO_MANY_REQUESTS,
                StatusCode::INTERNAL_SERVER_ERROR,
                StatusCode::BAD_GATEWAY,
                StatusCode::SERVICE_UNAVAILABLE,
                StatusCode::GATEWAY_TIMEOUT,
            ],
            retryable_methods: vec![Method::GET, Method::POST],
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Whether a response with this status should be replayed after
    /// `attempt` completed attempts.
    pub fn should_retry(&self, method: &Method, status: StatusCode, attempt: u32) -> bool {
        attempt <= self.max_retries
            && self.retryable_methods.contains(method)
            && self.retryable_statuses.contains(&status)
    }

    /// Whether a connect/timeout failure should be replayed after
    /// `attempt` completed attempts.
    pub fn allows_network_retry(&self, method: &Method, attempt: u32) -> bool {
        attempt <= self.max_retries && self.retryable_methods.contains(method)
    }

    /// Delay before the next attempt. Exponential, capped to avoid
    /// overflowing on absurd attempt counts.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.backoff_base * (1u32 << exp)
    }
}

/// Request body variants the API uses.
pub enum Payload {
    /// No body.
    Empty,
    /// URL-encoded form fields (the login endpoint).
    Form(Vec<(&'static str, String)>),
    /// Multipart upload with a single named part (the recipe endpoint).
    Multipart {
        /// Part name.
        field: &'static str,
        /// Encoded payload bytes.
        bytes: Vec<u8>,
    },
}

/// HTTP execution layer: owns the connection pool, base URL, and retry
/// policy. Does not know about tokens beyond attaching one when given.
pub struct Transport {
    client: reqwest::Client,
    base_url: String,
    user_agent: Option<String>,
    retry: RetryPolicy,
}

impl Transport {
    /// Create a transport for the given API host.
    ///
    /// A bare host gets `https://` prepended; a full `http(s)://` URL is
    /// used as-is, which is how tests point the client at a local server.
    pub fn new(domain: &str, user_agent: Option<String>, timeout: Duration) -> Result<Self> {
        let base_url = if domain.starts_with("http://") || domain.starts_with("https://") {
            domain.trim_end_matches('/').to_string()
        } else {
            format!("https://{domain}")
        };

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url,
            user_agent,
            retry: RetryPolicy::default(),
        })
    }

    /// Replace the retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Execute a request and decode the response body as JSON.
    ///
    /// `token` is attached as `Authorization: Bearer <token>` when present;
    /// the login call passes `None`. Transient failures are replayed per
    /// the retry policy, rebuilding the request each attempt. Non-2xx after
    /// the budget surfaces as [`PaprikaError::Http`].
    pub async fn execute(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        payload: Payload,
    ) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let request = self.build_request(&method, &url, token, &payload);

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if self.retry.should_retry(&method, status, attempt) {
                        tracing::warn!(%status, attempt, path, "transient status, retrying");
                        tokio::time::sleep(self.retry.delay_for(attempt)).await;
                        continue;
                    }

                    let response = response.error_for_status()?;
                    let body = response.bytes().await?;
                    return serde_json::from_slice(&body).map_err(|err| {
                        PaprikaError::UnexpectedResponse {
                            path: path.to_string(),
                            detail: format!("response was not JSON: {err}"),
                        }
                    });
                }
                Err(err)
                    if (err.is_connect() || err.is_timeout())
                        && self.retry.allows_network_retry(&method, attempt) =>
                {
                    tracing::warn!(error = %err, attempt, path, "network error, retrying");
                    tokio::time::sleep(self.retry.delay_for(attempt)).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn build_request(
        &self,
        method: &Method,
        url: &str,
        token: Option<&str>,
        payload: &Payload,
    ) -> reqwest::RequestBuilder {
        let mut request = self.client.request(method.clone(), url);

        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(agent) = &self.user_agent {
            request = request.header(reqwest::header::USER_AGENT, agent);
        }

        match payload {
            Payload::Empty => request,
            Payload::Form(fields) => request.form(fields),
            Payload::Multipart { field, bytes } => {
                let part = reqwest::multipart::Part::bytes(bytes.clone()).file_name(*field);
                request.multipart(reqwest::multipart::Form::new().part(*field, part))
            }
        }
    }
}

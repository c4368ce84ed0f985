//! Session-authenticated HTTP client
//!
//! Wraps a shared [`reqwest::Client`] with:
//! - the `_inaturalist_session` cookie on every request
//! - a mandatory pass through the shared [`RateLimiter`] before each attempt
//! - bounded retry with exponential backoff on 429/5xx and transport errors
//! - immediate, non-retried failure on authentication rejection

use reqwest::header::COOKIE;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::client::config::{
    calculate_backoff, MAX_RETRIES, REQUEST_INTERVAL, SESSION_COOKIE_NAME, USER_AGENT,
};
use crate::client::rate_limit::RateLimiter;
use crate::client::{ClientError, ClientResult};

/// How a response status should be handled by the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatusDisposition {
    /// 2xx, proceed to the body
    Success,
    /// 429 or 5xx, retry with backoff
    Retry,
    /// 401/403, fail the run immediately
    AuthFailed,
    /// Other 4xx, fail this request without retrying
    Reject,
}

fn classify_status(status: StatusCode) -> StatusDisposition {
    match status.as_u16() {
        401 | 403 => StatusDisposition::AuthFailed,
        429 => StatusDisposition::Retry,
        s if status.is_server_error() => {
            debug!("Server error status {s}");
            StatusDisposition::Retry
        }
        _ if status.is_client_error() => StatusDisposition::Reject,
        _ => StatusDisposition::Success,
    }
}

/// Authenticated HTTP client shared by every network-bound component.
pub struct SessionClient {
    http: reqwest::Client,
    rate_limiter: RateLimiter,
    cookie_header: String,
    max_retries: u32,
}

impl SessionClient {
    /// Create a client authenticated with the given session cookie value.
    pub fn new(cookie: &str) -> ClientResult<Self> {
        Self::with_rate_limiter(cookie, RateLimiter::new(REQUEST_INTERVAL))
    }

    /// Create a client sharing an externally constructed rate limiter.
    pub fn with_rate_limiter(cookie: &str, rate_limiter: RateLimiter) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ClientError::NetworkError(format!("failed to build client: {e}")))?;

        Ok(Self {
            http,
            rate_limiter,
            cookie_header: format!("{SESSION_COOKIE_NAME}={}", cookie.trim()),
            max_retries: MAX_RETRIES,
        })
    }

    /// Override the retry ceiling.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// The shared rate limiter gating this client's requests.
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    /// Execute a GET request, returning the raw response.
    ///
    /// Waits on the rate limiter before every attempt. Retries 429/5xx and
    /// transport errors up to the configured ceiling with exponential
    /// backoff; 401/403 and login-page redirects fail immediately with
    /// [`ClientError::AuthenticationFailed`].
    pub async fn get(&self, url: &str, params: &[(&str, String)]) -> ClientResult<Response> {
        let mut last_status: Option<u16> = None;
        let mut last_network_error: Option<String> = None;

        for attempt in 0..=self.max_retries {
            self.rate_limiter.wait().await;

            debug!("GET {} (attempt {}/{})", url, attempt + 1, self.max_retries + 1);

            let response = match self
                .http
                .get(url)
                .query(params)
                .header(COOKIE, &self.cookie_header)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    warn!(
                        "Network error on attempt {}/{}: {}",
                        attempt + 1,
                        self.max_retries + 1,
                        e
                    );
                    last_network_error = Some(e.to_string());
                    if attempt < self.max_retries {
                        let backoff = calculate_backoff(attempt);
                        debug!("Retrying after {:?}", backoff);
                        tokio::time::sleep(backoff).await;
                        continue;
                    }
                    break;
                }
            };

            // An expired cookie makes www pages redirect to the login form
            // with a 200, so the final URL must be checked as well.
            if response.url().path().starts_with("/login") {
                return Err(ClientError::AuthenticationFailed(
                    "redirected to login page".to_string(),
                ));
            }

            let status = response.status();
            match classify_status(status) {
                StatusDisposition::Success => return Ok(response),
                StatusDisposition::AuthFailed => {
                    return Err(ClientError::AuthenticationFailed(format!(
                        "server returned {status}"
                    )));
                }
                StatusDisposition::Reject => {
                    return Err(ClientError::HttpStatus(status.as_u16()));
                }
                StatusDisposition::Retry => {
                    warn!(
                        "Retryable status {} on attempt {}/{}",
                        status,
                        attempt + 1,
                        self.max_retries + 1
                    );
                    last_status = Some(status.as_u16());
                    if attempt < self.max_retries {
                        let backoff = calculate_backoff(attempt);
                        debug!("Retrying after {:?}", backoff);
                        tokio::time::sleep(backoff).await;
                        continue;
                    }
                }
            }
        }

        // Retry budget exhausted
        match last_status {
            Some(status) => Err(ClientError::RemoteUnavailable {
                status,
                attempts: self.max_retries + 1,
            }),
            None => Err(ClientError::NetworkError(
                last_network_error.unwrap_or_else(|| "all retries exhausted".to_string()),
            )),
        }
    }

    /// GET a URL and deserialize the JSON body.
    pub async fn get_json<T>(&self, url: &str, params: &[(&str, String)]) -> ClientResult<T>
    where
        T: DeserializeOwned,
    {
        let response = self.get(url, params).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ClientError::InvalidResponse(format!("failed to deserialize: {e}")))
    }

    /// GET a URL and return the body as text (HTML pages).
    pub async fn get_text(&self, url: &str) -> ClientResult<String> {
        let response = self.get(url, &[]).await?;
        response
            .text()
            .await
            .map_err(|e| ClientError::InvalidResponse(format!("failed to read body: {e}")))
    }
}

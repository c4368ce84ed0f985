//! Authenticated, rate-limited HTTP access
//!
//! Every outbound request in the program goes through [`SessionClient`],
//! which attaches the session cookie, waits on the shared [`RateLimiter`],
//! and retries transient failures with exponential backoff. Errors are typed
//! so callers can distinguish "abort the whole run" (an invalid or expired
//! cookie) from "skip this item and continue" (transient network trouble).

pub mod config;
pub mod rate_limit;
pub mod session;

pub use rate_limit::RateLimiter;
pub use session::SessionClient;

/// Client errors
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The session cookie was rejected (401/403 or a redirect to the login
    /// page). Retrying cannot help; the operator needs a fresh cookie.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The remote kept throttling (429) or erroring (5xx) through the whole
    /// retry budget.
    #[error("remote unavailable after {attempts} attempts (last status {status})")]
    RemoteUnavailable {
        /// Last HTTP status observed
        status: u16,
        /// Attempts made before giving up
        attempts: u32,
    },

    /// Transport-level failure (DNS, refused connection, timeout) that
    /// persisted through the retry budget.
    #[error("network error: {0}")]
    NetworkError(String),

    /// Non-retryable HTTP status (4xx other than 401/403/429).
    #[error("unexpected HTTP status {0}")]
    HttpStatus(u16),

    /// Response body could not be read or deserialized.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ClientError {
    /// Whether this error must abort the entire run. Only an invalid or
    /// expired session is fatal; everything else degrades to a per-item skip.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ClientError::AuthenticationFailed(_))
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

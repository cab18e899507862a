//! Fetch error taxonomy
//!
//! The fetcher never retries. It reports what kind of failure happened and
//! the caller's retry policy decides what to do with it.

use std::time::Duration;

/// Errors while talking to the hosting API
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Path or revision does not exist; terminal for that path
    #[error("not found: {path}")]
    NotFound { path: String },

    /// Hosting API throttled us
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    /// Server error, timeout or dropped connection
    #[error("transient error: {0}")]
    Transient(String),

    /// Anything else, including undecodable responses
    #[error("fetch failed: {0}")]
    Unknown(String),
}

impl FetchError {
    /// Create not-found error for path
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Whether a retry with backoff may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Transient(_))
    }

    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Server-suggested delay before the next attempt
    #[inline]
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_body() {
            Self::Transient(err.to_string())
        } else {
            Self::Unknown(err.to_string())
        }
    }
}

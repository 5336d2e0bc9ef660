// Error types for the dashboard cache service.
// Splits upstream, store, fallback, and credential failures so each tier can degrade on its own.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::github::RateLimit;

/// Failure talking to the GitHub API.
///
/// Cloneable so that every caller joined onto one refresh receives the same error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UpstreamError {
    #[error("GitHub API request failed: {0}")]
    Request(String),

    #[error("GitHub API request timed out")]
    Timeout,

    #[error("Authentication failed: invalid or expired token")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limit exceeded, resets at {}", .rate_limit.reset_display())]
    RateLimited { status: u16, rate_limit: RateLimit },

    #[error("HTTP {status}: {message}")]
    Http {
        status: u16,
        message: String,
        rate_limit: Option<RateLimit>,
    },

    #[error("Unexpected response from GitHub API: {0}")]
    Decode(String),

    #[error("Refresh task ended without producing a result")]
    Aborted,
}

impl UpstreamError {
    /// HTTP status of the failing response, when there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            UpstreamError::Unauthorized => Some(401),
            UpstreamError::NotFound(_) => Some(404),
            UpstreamError::RateLimited { status, .. } | UpstreamError::Http { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    /// Rate limit headers seen on the failing response.
    pub fn rate_limit(&self) -> Option<&RateLimit> {
        match self {
            UpstreamError::RateLimited { rate_limit, .. } => Some(rate_limit),
            UpstreamError::Http { rate_limit, .. } => rate_limit.as_ref(),
            _ => None,
        }
    }

    /// What an operator can do about it.
    pub fn remediation(&self) -> &'static str {
        match self {
            UpstreamError::Unauthorized => {
                "Check that GITHUB_TOKEN is a valid, unexpired token."
            }
            UpstreamError::RateLimited { .. } => {
                "Configure GITHUB_TOKEN to raise the GitHub rate limit, or wait for the limit to reset."
            }
            UpstreamError::NotFound(_) => {
                "Check that DASHBOARD_IDENTITY names an existing GitHub user."
            }
            _ => {
                "Check network access to the GitHub API, or provision the local fallback snapshot file."
            }
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            UpstreamError::Timeout
        } else if err.is_decode() {
            UpstreamError::Decode(err.to_string())
        } else {
            UpstreamError::Request(err.to_string())
        }
    }
}

impl From<serde_json::Error> for UpstreamError {
    fn from(err: serde_json::Error) -> Self {
        UpstreamError::Decode(err.to_string())
    }
}

/// Failure of the cache backend. Never reaches a client; the coordinator treats it as a miss.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Cache backend unavailable: {0}")]
    Backend(String),

    #[error("Cache backend timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The local fallback snapshot could not be used.
#[derive(Error, Debug)]
pub enum FallbackError {
    #[error("no fallback snapshot at {}", .0.display())]
    Missing(PathBuf),

    #[error("failed to read fallback snapshot {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("fallback snapshot {} is malformed: {source}", .path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("fallback snapshot {} is empty", .0.display())]
    Empty(PathBuf),
}

/// Failures a caller of the service can see.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid or missing refresh credential")]
    Unauthorized,

    #[error("Dashboard data unavailable: {cause} (fallback: {fallback})")]
    Unavailable {
        cause: UpstreamError,
        fallback: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Operator-facing hint attached to failure responses.
    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            Error::Unavailable { cause, .. } => Some(cause.remediation()),
            Error::Unauthorized => {
                Some("Send the configured refresh secret as a Bearer token or x-refresh-token header.")
            }
            Error::Config(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

pub type UpstreamResult<T> = std::result::Result<T, UpstreamError>;

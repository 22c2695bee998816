use std::io;

use thiserror::Error;

/// Failure of a single page request or page parse.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network failure for {url}: {reason}")]
    Network { url: String, reason: String },
    #[error("request to {url} timed out")]
    Timeout { url: String },
    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("{url} is rate limiting us")]
    RateLimited { url: String },
    #[error("unexpected page structure at {url}: {reason}")]
    Parse { url: String, reason: String },
}

impl FetchError {
    /// Network trouble, timeouts, throttling and server errors are worth
    /// another attempt. Parse failures are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network { .. } | Self::Timeout { .. } | Self::RateLimited { .. } => true,
            Self::Status { status, .. } => *status >= 500,
            Self::Parse { .. } => false,
        }
    }
}

/// Problems found before any work starts. Always fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read { path: String, source: io::Error },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
    #[error("keyword '{keyword}' appears in both the {first} and {second} lists")]
    OverlappingKeywords {
        keyword: String,
        first: &'static str,
        second: &'static str,
    },
    #[error("invalid experience pattern '{pattern}': {source}")]
    Pattern { pattern: String, source: regex::Error },
    #[error("source '{source_name}' has an invalid selector '{selector}': {reason}")]
    Selector {
        source_name: String,
        selector: String,
        reason: String,
    },
    #[error("{notifier} notifications are enabled but '{field}' is not set")]
    MissingCredential {
        notifier: &'static str,
        field: &'static str,
    },
    #[error("{0}")]
    Invalid(String),
}

/// Output and persistence failures.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// A notifier could not deliver its digest.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid address '{0}'")]
    Address(String),
    #[error("failed to build message: {0}")]
    Message(String),
    #[error("smtp delivery failed: {0}")]
    Smtp(String),
    #[error("http delivery failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{service} answered with HTTP {status}")]
    Rejected { service: &'static str, status: u16 },
}

pub type Result<T> = std::result::Result<T, Error>;

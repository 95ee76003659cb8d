//! Error types for media-fetch
//!
//! This module provides the error taxonomy for one invocation of the pipeline:
//! - Stage errors (resolution, network, download, delivery) that fail the invocation
//! - Best-effort errors (cleanup) that are logged but never change the reported outcome
//! - A stable machine-readable [`Error::kind`] label used in structured logs

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for media-fetch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for media-fetch
///
/// Every variant except [`Error::Validation`] is collapsed to a single user-facing failure
/// message by the orchestrator; the variant itself only ever reaches the logs.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "resolver.endpoint")
        key: Option<String>,
    },

    /// The query was empty after trimming
    #[error("validation error: {0}")]
    Validation(String),

    /// Stage-1 or stage-2 response had the wrong shape
    #[error("resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    /// Transport failure, timeout or non-success status on any network call
    #[error("network error: {0}")]
    Network(#[from] NetworkError),

    /// Media stream broke off after the connection was established
    #[error("download error: {0}")]
    Download(#[from] DownloadError),

    /// The messaging host rejected a message
    #[error("delivery error: {0}")]
    Delivery(String),

    /// Removing a transient file failed (logged only)
    #[error("cleanup failed for {path}: {source}")]
    Cleanup {
        /// The transient file that could not be removed
        path: PathBuf,
        /// Underlying filesystem error
        source: std::io::Error,
    },

    /// The invocation was cancelled by its caller
    #[error("invocation cancelled")]
    Cancelled,

    /// The overall invocation deadline elapsed
    #[error("invocation deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Response-shape violations from the resolver endpoint
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// The result list was absent or empty
    #[error("no results for query {query:?}")]
    NotFound {
        /// The lookup term that produced no results
        query: String,
    },

    /// A required field was missing, empty, or of the wrong type
    #[error("required field {field:?} missing or invalid")]
    Malformed {
        /// Name of the offending field
        field: String,
    },

    /// Stage-2 response carried no stream location
    #[error("no stream location in response")]
    NoStream,
}

/// Network-level failures
#[derive(Debug, Error)]
pub enum NetworkError {
    /// Connection could not be established or the request failed in transit
    #[error("request to {url} failed: {reason}")]
    Transport {
        /// Target URL
        url: String,
        /// Underlying client error
        reason: String,
    },

    /// The call did not finish within its bound
    #[error("request to {url} timed out after {after:?}")]
    Timeout {
        /// Target URL
        url: String,
        /// The bound that was exceeded
        after: Duration,
    },

    /// Upstream answered with a non-success status
    #[error("{url} returned HTTP {status}")]
    Status {
        /// Target URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// The response body could not be read or parsed
    #[error("unreadable response body from {url}: {reason}")]
    Body {
        /// Target URL
        url: String,
        /// Parse or read failure
        reason: String,
    },
}

impl NetworkError {
    /// Classify a reqwest error raised while talking to `url`
    pub(crate) fn from_reqwest(url: &str, timeout: Duration, e: reqwest::Error) -> Self {
        if e.is_timeout() {
            NetworkError::Timeout {
                url: url.to_string(),
                after: timeout,
            }
        } else if e.is_decode() || e.is_body() {
            NetworkError::Body {
                url: url.to_string(),
                reason: e.to_string(),
            }
        } else if let Some(status) = e.status() {
            NetworkError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
        } else {
            NetworkError::Transport {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

/// Failures of an established media stream
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The stream broke off mid-transfer
    #[error("stream interrupted after {bytes_written} bytes: {reason}")]
    Interrupted {
        /// Bytes already written to the transient file (0 = nothing written)
        bytes_written: u64,
        /// Underlying stream error
        reason: String,
    },
}

impl Error {
    /// Stable snake_case label for structured logging
    ///
    /// ```
    /// use media_fetch::error::{Error, ResolutionError};
    ///
    /// let e = Error::from(ResolutionError::NoStream);
    /// assert_eq!(e.kind(), "resolution_no_stream");
    /// ```
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config",
            Error::Validation(_) => "validation",
            Error::Resolution(ResolutionError::NotFound { .. }) => "resolution_not_found",
            Error::Resolution(ResolutionError::Malformed { .. }) => "resolution_malformed",
            Error::Resolution(ResolutionError::NoStream) => "resolution_no_stream",
            Error::Network(NetworkError::Timeout { .. }) => "network_timeout",
            Error::Network(_) => "network",
            Error::Download(_) => "download",
            Error::Delivery(_) => "delivery",
            Error::Cleanup { .. } => "cleanup",
            Error::Cancelled => "cancelled",
            Error::DeadlineExceeded(_) => "deadline_exceeded",
            Error::Io(_) => "io",
        }
    }

    /// Whether this error came from a network call (timeouts included)
    pub fn is_network(&self) -> bool {
        matches!(self, Error::Network(_))
    }
}

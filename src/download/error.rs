//! Error types for page downloads.
//!
//! A [`TaskError`] is local to one page: it is logged and recorded against the
//! page offset, and never aborts sibling pages.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while downloading a single page.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Network-level error (DNS resolution, connection refused, TLS, reset mid-body).
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The redacted page URL.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The redacted page URL.
        url: String,
    },

    /// Status outside the service's 200-399 success range.
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The redacted page URL.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// File system error while creating or writing the page file.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The page file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The run was interrupted before the page finished.
    #[error("download of {url} cancelled")]
    Cancelled {
        /// The redacted page URL.
        url: String,
    },
}

impl TaskError {
    /// Creates a network error, classifying reqwest timeouts as [`TaskError::Timeout`].
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout { url: url.into() }
        } else {
            Self::Network {
                url: url.into(),
                source,
            }
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a cancellation error.
    pub fn cancelled(url: impl Into<String>) -> Self {
        Self::Cancelled { url: url.into() }
    }

    /// Returns true when the page stopped because the run was interrupted.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

// No `From<reqwest::Error>` / `From<std::io::Error>`: every variant needs the
// url or path the source error lacks.

//! Types for snapshot downloads.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, ETAG, LAST_MODIFIED};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default timeout for connecting and for each read of the body.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(120);

/// Errors that can occur while downloading a snapshot.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("download timed out after {0:?}")]
    Timeout(Duration),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    pub(crate) fn from_reqwest(e: reqwest::Error, timeout: Duration) -> Self {
        if e.is_timeout() {
            FetchError::Timeout(timeout)
        } else if e.is_connect() {
            FetchError::ConnectionFailed(e.to_string())
        } else {
            FetchError::Request(e.to_string())
        }
    }
}

/// Request options for a single fetch.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Extra request headers, typically the conditional preconditions.
    pub headers: HeaderMap,
    /// Bound on waiting for the response and for every body chunk.
    pub timeout: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            headers: HeaderMap::new(),
            timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

impl FetchOptions {
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Cache validators returned by the upstream server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheValidators {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
}

impl CacheValidators {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            etag: header_string(headers, ETAG),
            last_modified: header_string(headers, LAST_MODIFIED),
        }
    }
}

fn header_string(headers: &HeaderMap, name: HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Result of a fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    /// False when the server answered "not modified".
    pub downloaded: bool,
    /// HTTP status of the response.
    pub status: u16,
    /// Bytes written to the destination.
    pub size_bytes: Option<u64>,
    pub validators: CacheValidators,
}

impl FetchOutcome {
    pub fn not_modified(validators: CacheValidators) -> Self {
        Self {
            downloaded: false,
            status: 304,
            size_bytes: None,
            validators,
        }
    }
}

//! Mock snapshot fetcher for testing.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::fetcher::{CacheValidators, FetchError, FetchOptions, FetchOutcome, SnapshotFetcher};

/// A scripted answer to one fetch.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Serve `body` with the given validators.
    Snapshot {
        body: Vec<u8>,
        validators: CacheValidators,
    },
    /// Answer 304.
    NotModified,
    /// Answer with a non-success status.
    Status(u16),
    /// Fail to connect.
    Unreachable(String),
}

impl MockResponse {
    pub fn snapshot(body: Vec<u8>) -> Self {
        MockResponse::Snapshot {
            body,
            validators: CacheValidators::default(),
        }
    }

    pub fn snapshot_with_etag(body: Vec<u8>, etag: &str) -> Self {
        MockResponse::Snapshot {
            body,
            validators: CacheValidators {
                etag: Some(etag.to_string()),
                last_modified: None,
            },
        }
    }
}

/// A recorded fetch for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedFetch {
    pub url: String,
    pub destination: PathBuf,
    pub headers: HeaderMap,
}

/// Mock implementation of the SnapshotFetcher trait.
///
/// Responses are served in the order they were pushed; the last one keeps
/// being served once the queue is down to a single entry.
#[derive(Debug, Default, Clone)]
pub struct MockFetcher {
    responses: Arc<RwLock<VecDeque<MockResponse>>>,
    fetches: Arc<RwLock<Vec<RecordedFetch>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(response: MockResponse) -> Self {
        Self {
            responses: Arc::new(RwLock::new(VecDeque::from([response]))),
            fetches: Arc::default(),
        }
    }

    pub async fn push(&self, response: MockResponse) {
        self.responses.write().await.push_back(response);
    }

    pub async fn recorded_fetches(&self) -> Vec<RecordedFetch> {
        self.fetches.read().await.clone()
    }

    async fn next_response(&self) -> Option<MockResponse> {
        let mut responses = self.responses.write().await;
        if responses.len() > 1 {
            responses.pop_front()
        } else {
            responses.front().cloned()
        }
    }
}

#[async_trait]
impl SnapshotFetcher for MockFetcher {
    async fn fetch(
        &self,
        url: &str,
        destination: &Path,
        options: &FetchOptions,
    ) -> Result<FetchOutcome, FetchError> {
        self.fetches.write().await.push(RecordedFetch {
            url: url.to_string(),
            destination: destination.to_path_buf(),
            headers: options.headers.clone(),
        });

        match self.next_response().await {
            Some(MockResponse::Snapshot { body, validators }) => {
                if let Some(parent) = destination.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::write(destination, &body).await?;
                Ok(FetchOutcome {
                    downloaded: true,
                    status: 200,
                    size_bytes: Some(body.len() as u64),
                    validators,
                })
            }
            Some(MockResponse::NotModified) => {
                Ok(FetchOutcome::not_modified(CacheValidators::default()))
            }
            Some(MockResponse::Status(code)) => Err(FetchError::Status(code)),
            Some(MockResponse::Unreachable(reason)) => Err(FetchError::ConnectionFailed(reason)),
            None => Err(FetchError::ConnectionFailed(
                "no mock response configured".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_serves_responses_in_order_then_repeats_last() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("tmp").join("snap.bz2");
        let fetcher = MockFetcher::new();
        fetcher.push(MockResponse::snapshot_with_etag(b"abc".to_vec(), "\"v1\"")).await;
        fetcher.push(MockResponse::NotModified).await;

        let first = fetcher.fetch("http://x", &dest, &FetchOptions::default()).await.unwrap();
        assert!(first.downloaded);
        assert_eq!(first.validators.etag.as_deref(), Some("\"v1\""));
        assert_eq!(std::fs::read(&dest).unwrap(), b"abc");

        for _ in 0..2 {
            let next = fetcher.fetch("http://x", &dest, &FetchOptions::default()).await.unwrap();
            assert!(!next.downloaded);
        }
        assert_eq!(fetcher.recorded_fetches().await.len(), 3);
    }

    #[tokio::test]
    async fn test_errors() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("snap");

        let fetcher = MockFetcher::new();
        assert!(matches!(
            fetcher.fetch("http://x", &dest, &FetchOptions::default()).await,
            Err(FetchError::ConnectionFailed(_))
        ));

        fetcher.push(MockResponse::Status(503)).await;
        assert!(matches!(
            fetcher.fetch("http://x", &dest, &FetchOptions::default()).await,
            Err(FetchError::Status(503))
        ));
        assert!(!dest.exists());
    }
}

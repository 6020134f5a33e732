//! HTTP snapshot fetcher.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Response, StatusCode};
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::{CacheValidators, FetchError, FetchOptions, FetchOutcome, SnapshotFetcher};

/// Downloads snapshots over HTTP(S) with conditional GET support.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a fetcher with the given user agent.
    pub fn new(user_agent: &str) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| FetchError::Request(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Stream the response body into `destination`, returning bytes written.
    async fn stream_to_file(
        response: Response,
        destination: &Path,
        idle_timeout: Duration,
    ) -> Result<u64, FetchError> {
        let mut file = tokio::fs::File::create(destination).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        loop {
            let next = timeout(idle_timeout, stream.next())
                .await
                .map_err(|_| FetchError::Timeout(idle_timeout))?;

            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk.map_err(|e| FetchError::from_reqwest(e, idle_timeout))?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }

        file.flush().await?;
        file.sync_all().await?;
        Ok(written)
    }
}

#[async_trait]
impl SnapshotFetcher for HttpFetcher {
    async fn fetch(
        &self,
        url: &str,
        destination: &Path,
        options: &FetchOptions,
    ) -> Result<FetchOutcome, FetchError> {
        info!(url, destination = %destination.display(), "Download started");

        let request = self.client.get(url).headers(options.headers.clone());
        let response = timeout(options.timeout, request.send())
            .await
            .map_err(|_| FetchError::Timeout(options.timeout))?
            .map_err(|e| FetchError::from_reqwest(e, options.timeout))?;

        let status = response.status();
        let validators = CacheValidators::from_headers(response.headers());

        if status == StatusCode::NOT_MODIFIED {
            info!(url, "Snapshot not modified (304)");
            return Ok(FetchOutcome::not_modified(validators));
        }

        if !status.is_success() {
            warn!(url, status = status.as_u16(), "Download rejected by upstream");
            return Err(FetchError::Status(status.as_u16()));
        }

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let size = match Self::stream_to_file(response, destination, options.timeout).await {
            Ok(size) => size,
            Err(e) => {
                if let Err(rm) = tokio::fs::remove_file(destination).await {
                    debug!(error = %rm, "No partial download to remove");
                }
                return Err(e);
            }
        };

        info!(url, size_bytes = size, "Download finished");

        Ok(FetchOutcome {
            downloaded: true,
            status: status.as_u16(),
            size_bytes: Some(size),
            validators,
        })
    }
}

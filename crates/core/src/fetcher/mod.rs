//! Upstream snapshot retrieval.
//!
//! [`SnapshotFetcher`] downloads the compressed snapshot with a conditional
//! GET into the staging area; [`decompress`] expands it to a plain SQLite
//! file without holding it in memory.

mod decompress;
mod http;
mod types;

pub use decompress::{decompress, Compression, DecompressError, DecompressStats};
pub use http::HttpFetcher;
pub use types::*;

use std::path::Path;

use async_trait::async_trait;

/// Retrieves a snapshot from an upstream location.
#[async_trait]
pub trait SnapshotFetcher: Send + Sync {
    /// Fetch `url` into `destination`.
    ///
    /// A "not modified" answer returns `downloaded = false` and leaves the
    /// filesystem untouched. On error no partial file remains at
    /// `destination`.
    async fn fetch(
        &self,
        url: &str,
        destination: &Path,
        options: &FetchOptions,
    ) -> Result<FetchOutcome, FetchError>;
}

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::catalog::ConflictPolicy;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub updater: UpdaterSettings,
    #[serde(default)]
    pub import: ImportConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
}

/// Health/metrics listener configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    7005
}

/// Upstream snapshot source
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    /// URL of the compressed snapshot.
    #[serde(default = "default_source_url")]
    pub url: String,
    /// Connect and idle-read timeout for the download (default: 120).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: default_source_url(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_source_url() -> String {
    "https://liste.mediathekview.de/filmliste-v2.db.bz2".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_user_agent() -> String {
    format!("mediathek-sync/{}", env!("CARGO_PKG_VERSION"))
}

/// On-disk locations
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Defaults to `<data_dir>/meta/state.json`.
    #[serde(default)]
    pub state_file: Option<PathBuf>,
    /// Defaults to `<data_dir>/app/app.db`.
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,
    /// File name of the production snapshot. Derived from the source URL when unset.
    #[serde(default)]
    pub snapshot_name: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            state_file: None,
            catalog_path: None,
            snapshot_name: None,
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

impl StorageConfig {
    pub fn state_file(&self) -> PathBuf {
        self.state_file
            .clone()
            .unwrap_or_else(|| self.data_dir.join("meta").join("state.json"))
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.catalog_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("app").join("app.db"))
    }

    /// Directory holding the production snapshot.
    pub fn source_dir(&self) -> PathBuf {
        self.data_dir.join("source")
    }

    /// Staging directory. Lives below `source_dir` so the final rename never
    /// crosses a filesystem boundary.
    pub fn staging_dir(&self) -> PathBuf {
        self.source_dir().join("tmp")
    }

    /// Snapshot file name, e.g. `filmliste-v2.db` for `.../filmliste-v2.db.bz2`.
    pub fn snapshot_name(&self, source_url: &str) -> String {
        if let Some(name) = &self.snapshot_name {
            return name.clone();
        }

        let last = source_url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .rsplit('/')
            .next()
            .unwrap_or_default();

        let stripped = [".bz2", ".gz"]
            .iter()
            .find_map(|ext| last.strip_suffix(ext))
            .unwrap_or(last);

        if stripped.is_empty() {
            "snapshot.db".to_string()
        } else {
            stripped.to_string()
        }
    }
}

/// Update cycle scheduling and validation
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpdaterSettings {
    /// Run the background scheduler.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Check for a refresh immediately on startup.
    #[serde(default = "default_true")]
    pub run_on_startup: bool,
    /// Minimum age of the last successful cycle before another one runs.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    /// How often the scheduler wakes up to check staleness.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Reject snapshots whose newest entry is older than `max_age_days`.
    #[serde(default)]
    pub check_freshness: bool,
    #[serde(default = "default_max_age_days")]
    pub max_age_days: u32,
}

impl Default for UpdaterSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            run_on_startup: true,
            refresh_interval_secs: default_refresh_interval(),
            poll_interval_secs: default_poll_interval(),
            check_freshness: false,
            max_age_days: default_max_age_days(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_refresh_interval() -> u64 {
    6 * 60 * 60
}

fn default_poll_interval() -> u64 {
    5 * 60
}

fn default_max_age_days() -> u32 {
    90
}

/// Row import settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImportConfig {
    /// Category rule document (JSON).
    #[serde(default = "default_categories_file")]
    pub categories_file: PathBuf,
    /// Rows accumulated before handing a batch to the catalog.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Rows per catalog transaction.
    #[serde(default = "default_store_batch_size")]
    pub store_batch_size: usize,
    /// Items older than this are pruned after every import.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    /// Number of channels reported in catalog stats.
    #[serde(default = "default_top_channels")]
    pub top_channels: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            categories_file: default_categories_file(),
            batch_size: default_batch_size(),
            store_batch_size: default_store_batch_size(),
            retention_days: default_retention_days(),
            top_channels: default_top_channels(),
        }
    }
}

fn default_categories_file() -> PathBuf {
    PathBuf::from("config/categories.json")
}

fn default_batch_size() -> usize {
    5000
}

fn default_store_batch_size() -> usize {
    1000
}

fn default_retention_days() -> u32 {
    90
}

fn default_top_channels() -> usize {
    10
}

/// Catalog store behavior
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CatalogConfig {
    #[serde(default)]
    pub on_conflict: ConflictPolicy,
}

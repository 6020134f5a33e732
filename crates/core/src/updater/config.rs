//! Updater configuration derived from the service config.

use std::path::PathBuf;
use std::time::Duration;

use crate::config::Config;
use crate::validator::ValidateOptions;

/// Paths and settings for update cycles.
#[derive(Debug, Clone)]
pub struct UpdaterConfig {
    pub source_url: String,
    pub fetch_timeout: Duration,
    /// Holds the download and the expanded snapshot before promotion.
    /// Must be on the same filesystem as `production_path`.
    pub staging_dir: PathBuf,
    pub production_path: PathBuf,
    pub validate: ValidateOptions,
    /// Minimum age of the last success before the scheduler runs a cycle.
    pub refresh_interval: Duration,
    pub poll_interval: Duration,
    pub run_on_startup: bool,
}

impl UpdaterConfig {
    pub fn from_config(config: &Config) -> Self {
        let storage = &config.storage;
        let snapshot_name = storage.snapshot_name(&config.source.url);

        Self {
            source_url: config.source.url.clone(),
            fetch_timeout: Duration::from_secs(config.source.timeout_secs),
            staging_dir: storage.staging_dir(),
            production_path: storage.source_dir().join(snapshot_name),
            validate: ValidateOptions::from(&config.updater),
            refresh_interval: Duration::from_secs(config.updater.refresh_interval_secs),
            poll_interval: Duration::from_secs(config.updater.poll_interval_secs),
            run_on_startup: config.updater.run_on_startup,
        }
    }

    /// Name of the production snapshot file.
    pub fn snapshot_name(&self) -> String {
        self.production_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "snapshot.db".to_string())
    }

    /// Where the compressed download is written.
    pub fn staged_download(&self) -> PathBuf {
        let name = self
            .source_url
            .split(['?', '#'])
            .next()
            .and_then(|u| u.rsplit('/').next())
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}.download", self.snapshot_name()));

        // Never collide with the expanded file.
        if name == self.snapshot_name() {
            self.staging_dir.join(format!("{}.download", name))
        } else {
            self.staging_dir.join(name)
        }
    }

    /// Where the expanded snapshot is written before validation.
    pub fn staged_snapshot(&self) -> PathBuf {
        self.staging_dir.join(self.snapshot_name())
    }
}

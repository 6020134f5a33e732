use std::sync::Arc;
use std::time::Instant;

use prometheus::Registry;

use mediathek_core::{CatalogStore, Config, Updater};

/// Application context, built once in `main` and shared with every handler.
pub struct AppState {
    config: Config,
    catalog: Arc<dyn CatalogStore>,
    updater: Arc<Updater>,
    registry: Registry,
    started_at: Instant,
}

impl AppState {
    pub fn new(
        config: Config,
        catalog: Arc<dyn CatalogStore>,
        updater: Arc<Updater>,
        registry: Registry,
    ) -> Self {
        Self {
            config,
            catalog,
            updater,
            registry,
            started_at: Instant::now(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<dyn CatalogStore> {
        &self.catalog
    }

    pub fn updater(&self) -> &Arc<Updater> {
        &self.updater
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

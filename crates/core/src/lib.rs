pub mod catalog;
pub mod classifier;
pub mod config;
pub mod fetcher;
pub mod identity;
pub mod importer;
pub mod inspector;
pub mod metrics;
pub mod state;
pub mod testing;
pub mod updater;
pub mod validator;

pub use catalog::{
    CatalogError, CatalogItem, CatalogStats, CatalogStore, ConflictPolicy, SqliteCatalog,
    UpsertReport,
};
pub use classifier::{Classifier, ClassifierError, UNCATEGORIZED};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError,
};
pub use fetcher::{decompress, DecompressError, FetchError, HttpFetcher, SnapshotFetcher};
pub use identity::{compute_item_id, is_valid_item_id};
pub use importer::{ImportError, ImportReport, Importer};
pub use inspector::{inspect, SchemaError, SnapshotSchema};
pub use state::{CycleState, StateError, StateStore};
pub use updater::{CycleOutcome, CyclePhase, UpdateScheduler, Updater, UpdaterConfig};
pub use validator::{validate, ValidateOptions, ValidationReport};

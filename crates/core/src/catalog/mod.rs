//! Local content catalog: indexed item storage with full-text search.
//!
//! Bulk writes are split into independent transactions. A reader running
//! while an import is in flight can see some batches of the new snapshot
//! alongside rows from the previous one; there is no atomicity across
//! batches.

mod sqlite;
mod types;

pub use sqlite::SqliteCatalog;
pub use types::*;

use chrono::Utc;

/// Trait for catalog storage.
pub trait CatalogStore: Send + Sync {
    /// Insert or merge a single item.
    fn upsert_one(&self, item: &CatalogItem) -> Result<UpsertReport, CatalogError>;

    /// Insert or merge items, committing every `batch_size` items as one
    /// transaction. A failing batch is rolled back; earlier batches stay.
    fn upsert_bulk(
        &self,
        items: &[CatalogItem],
        batch_size: usize,
    ) -> Result<UpsertReport, CatalogError>;

    /// Delete items whose timestamp is before `cutoff` (epoch seconds).
    /// Items without a timestamp are kept.
    fn prune_before(&self, cutoff: i64) -> Result<u64, CatalogError>;

    /// Delete items older than `max_age_days` relative to now.
    fn prune_older_than(&self, max_age_days: u32) -> Result<u64, CatalogError> {
        let cutoff = Utc::now().timestamp() - i64::from(max_age_days) * 86_400;
        self.prune_before(cutoff)
    }

    /// Aggregate statistics, with the `top_channels` largest channels.
    fn stats(&self, top_channels: usize) -> Result<CatalogStats, CatalogError>;

    /// Look up an item by identity.
    fn get(&self, id: &str) -> Result<CatalogItem, CatalogError>;

    /// Full-text search over title, channel, topic and description.
    fn search(&self, text: &str, limit: usize) -> Result<Vec<CatalogItem>, CatalogError>;

    fn count(&self) -> Result<u64, CatalogError>;
}

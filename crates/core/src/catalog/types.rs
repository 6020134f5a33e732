//! Types for the local content catalog.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind assigned to every imported item.
pub const DEFAULT_ITEM_KIND: &str = "movie";

/// One piece of content in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    /// Content-addressed identity (see [`crate::identity`]).
    pub id: String,
    pub kind: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Originating timestamp, seconds since epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_ts: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_sec: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url_video: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url_website: Option<String>,
    pub is_hd: bool,
    pub has_subtitles: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
    /// Set by the store; ignored on write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    /// Set by the store; ignored on write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

/// What an upsert does when the identity already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Refresh only `updated_at`; stored content is kept.
    #[default]
    Touch,
    /// Replace every content field with the incoming values.
    Overwrite,
}

/// Rows written by an upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpsertReport {
    pub inserted: u64,
    pub updated: u64,
}

impl UpsertReport {
    pub fn total(&self) -> u64 {
        self.inserted + self.updated
    }

    pub fn merge(&mut self, other: UpsertReport) {
        self.inserted += other.inserted;
        self.updated += other.updated;
    }
}

/// A label with its item count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelCount {
    pub name: String,
    pub count: u64,
}

/// Aggregate catalog statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CatalogStats {
    pub total: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest_timestamp: Option<i64>,
    /// Items per category, largest first. Uncategorized items are not listed.
    pub by_category: Vec<LabelCount>,
    /// Top channels by item count.
    pub by_channel: Vec<LabelCount>,
}

/// Errors from catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("database error: {0}")]
    Database(String),

    #[error("item not found: {0}")]
    NotFound(String),
}

impl From<rusqlite::Error> for CatalogError {
    fn from(e: rusqlite::Error) -> Self {
        CatalogError::Database(e.to_string())
    }
}

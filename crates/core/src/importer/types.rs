//! Importer errors and reports.

use serde::Serialize;
use thiserror::Error;

use super::LogicalField;
use crate::catalog::{CatalogError, CatalogStats};
use crate::classifier::ClassifierError;
use crate::inspector::SchemaError;

/// A single row that could not be turned into an item. Never fatal.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("cannot read column {field}: {reason}")]
    Read { field: LogicalField, reason: String },

    #[error("column {field} holds binary data")]
    Binary { field: LogicalField },
}

/// Errors that abort an import.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("category rules: {0}")]
    Classifier(#[from] ClassifierError),

    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("snapshot read failed: {0}")]
    Source(String),
}

impl From<rusqlite::Error> for ImportError {
    fn from(e: rusqlite::Error) -> Self {
        ImportError::Source(e.to_string())
    }
}

/// Summary of one import run.
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub table: String,
    pub rows_read: u64,
    pub inserted: u64,
    pub updated: u64,
    /// Rows without a title or any locator.
    pub rejected: u64,
    /// Rows that failed to transform.
    pub failed: u64,
    /// Imported items whose timestamp was missing or implausible.
    pub undated: u64,
    pub pruned: u64,
    pub duration_ms: u64,
    pub stats: CatalogStats,
}

impl ImportReport {
    pub fn imported(&self) -> u64 {
        self.inserted + self.updated
    }
}

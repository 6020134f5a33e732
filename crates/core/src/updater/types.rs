//! Types for update cycles.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::fetcher::{DecompressError, FetchError};
use crate::importer::{ImportError, ImportReport};
use crate::state::StateError;

/// Step a cycle is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    #[default]
    Idle,
    Fetching,
    Decompressing,
    Validating,
    Swapping,
    Importing,
}

impl std::fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CyclePhase::Idle => "idle",
            CyclePhase::Fetching => "fetching",
            CyclePhase::Decompressing => "decompressing",
            CyclePhase::Validating => "validating",
            CyclePhase::Swapping => "swapping",
            CyclePhase::Importing => "importing",
        };
        f.write_str(name)
    }
}

/// Errors that end a cycle early.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("decompression failed: {0}")]
    Decompress(#[from] DecompressError),

    #[error("import failed: {0}")]
    Import(#[from] ImportError),

    #[error("state error: {0}")]
    State(#[from] StateError),

    #[error("snapshot swap failed: {0}")]
    Swap(#[source] std::io::Error),

    #[error("cycle already in progress")]
    Busy,

    #[error("background task failed: {0}")]
    Task(String),
}

/// Result of one cycle, tagged by `result`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CycleOutcome {
    Updated {
        bytes_downloaded: u64,
        row_count: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        max_timestamp: Option<i64>,
        import: ImportReport,
    },
    NotModified,
    ValidationFailed {
        row_count: u64,
        errors: Vec<String>,
    },
    Error {
        phase: CyclePhase,
        error: String,
    },
}

impl CycleOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            CycleOutcome::Updated { .. } => "updated",
            CycleOutcome::NotModified => "not_modified",
            CycleOutcome::ValidationFailed { .. } => "validation_failed",
            CycleOutcome::Error { .. } => "error",
        }
    }

    /// `updated` and `not_modified` count as success.
    pub fn is_success(&self) -> bool {
        matches!(self, CycleOutcome::Updated { .. } | CycleOutcome::NotModified)
    }
}

/// Live view of the updater for health reporting.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdaterStatus {
    pub running: bool,
    pub phase: CyclePhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_outcome: Option<CycleOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_finished_at: Option<DateTime<Utc>>,
}

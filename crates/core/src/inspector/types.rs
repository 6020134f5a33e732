//! Types describing an inspected snapshot.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

/// Errors from inspecting a snapshot or resolving its columns.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("snapshot database error: {0}")]
    Database(String),

    #[error("snapshot contains no tables")]
    NoTables,

    #[error("snapshot has no non-empty table")]
    NoPrimaryTable,

    #[error("missing columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
}

impl From<rusqlite::Error> for SchemaError {
    fn from(e: rusqlite::Error) -> Self {
        SchemaError::Database(e.to_string())
    }
}

/// One column of a snapshot table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    /// Declared type as written in the table definition (may be empty).
    pub declared_type: String,
    pub not_null: bool,
    pub primary_key: bool,
}

/// Structure of one snapshot table.
#[derive(Debug, Clone, Serialize)]
pub struct TableInfo {
    pub columns: Vec<ColumnInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_sql: Option<String>,
}

impl TableInfo {
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Case-insensitive column lookup.
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name.eq_ignore_ascii_case(name))
    }
}

/// A few rows of the primary table, for logging and diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct TableSample {
    pub table: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

/// Result of inspecting a snapshot.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SnapshotSchema {
    pub tables: BTreeMap<String, TableInfo>,
    pub row_counts: BTreeMap<String, u64>,
    /// Table with the most rows, if any table has rows.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_table: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample: Option<TableSample>,
}

impl SnapshotSchema {
    pub fn primary(&self) -> Option<(&str, &TableInfo)> {
        let name = self.primary_table.as_deref()?;
        self.tables.get(name).map(|info| (name, info))
    }

    pub fn primary_row_count(&self) -> u64 {
        self.primary_table
            .as_ref()
            .and_then(|t| self.row_counts.get(t))
            .copied()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str) -> ColumnInfo {
        ColumnInfo {
            name: name.to_string(),
            declared_type: "TEXT".to_string(),
            not_null: false,
            primary_key: false,
        }
    }

    #[test]
    fn test_has_column_case_insensitive() {
        let table = TableInfo {
            columns: vec![column("Titel"), column("url")],
            create_sql: None,
        };
        assert!(table.has_column("titel"));
        assert!(table.has_column("URL"));
        assert!(!table.has_column("title"));
    }

    #[test]
    fn test_missing_columns_display() {
        let err = SchemaError::MissingColumns(vec!["title".to_string(), "url".to_string()]);
        assert_eq!(err.to_string(), "missing columns: title, url");
    }
}

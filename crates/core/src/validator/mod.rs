//! Pre-swap checks on a staged snapshot.

use std::path::Path;

use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::Connection;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::UpdaterSettings;
use crate::importer::normalize::parse_timestamp;
use crate::inspector::{open_snapshot, quote_identifier, SchemaError, SnapshotSchema};

/// Columns probed for the newest entry, in order.
pub const FRESHNESS_COLUMNS: &[&str] = &["timestamp", "datum", "date", "time"];

const MAX_INTEGRITY_MESSAGES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidateOptions {
    pub check_freshness: bool,
    pub max_age_days: u32,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self {
            check_freshness: false,
            max_age_days: 90,
        }
    }
}

impl From<&UpdaterSettings> for ValidateOptions {
    fn from(settings: &UpdaterSettings) -> Self {
        Self {
            check_freshness: settings.check_freshness,
            max_age_days: settings.max_age_days,
        }
    }
}

/// Verdict on a staged snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    /// Rows in the primary table.
    pub row_count: u64,
    /// Newest timestamp found in a date-like column of the primary table.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_table: Option<String>,
    pub errors: Vec<String>,
}

impl ValidationReport {
    fn failed(message: String) -> Self {
        Self {
            valid: false,
            errors: vec![message],
            ..Self::default()
        }
    }
}

/// Validate the snapshot at `path`. Never fails: database errors are
/// reported as an invalid result carrying the error message.
pub fn validate(path: &Path, options: &ValidateOptions) -> ValidationReport {
    let report = match open_snapshot(path) {
        Ok(conn) => match run_checks(&conn, options, Utc::now().timestamp()) {
            Ok(report) => report,
            Err(e) => ValidationReport::failed(e.to_string()),
        },
        Err(e) => ValidationReport::failed(e.to_string()),
    };

    if report.valid {
        info!(
            path = %path.display(),
            table = report.primary_table.as_deref().unwrap_or("-"),
            rows = report.row_count,
            max_timestamp = ?report.max_timestamp,
            "Snapshot validation passed"
        );
    } else {
        warn!(path = %path.display(), errors = ?report.errors, "Snapshot validation failed");
    }

    report
}

fn run_checks(
    conn: &Connection,
    options: &ValidateOptions,
    now: i64,
) -> Result<ValidationReport, SchemaError> {
    let mut report = ValidationReport::default();

    // A damaged file can fail any later query, so stop here.
    match integrity_check(conn) {
        Ok(messages) if messages.len() == 1 && messages[0] == "ok" => {}
        Ok(messages) => {
            report
                .errors
                .push(format!("integrity check failed: {}", messages.join("; ")));
            return Ok(report);
        }
        Err(e) => {
            report.errors.push(format!("integrity check failed: {}", e));
            return Ok(report);
        }
    }

    let schema = crate::inspector::sqlite_schema(conn)?;
    if schema.tables.is_empty() {
        report.errors.push("snapshot contains no tables".to_string());
    }

    report.primary_table = schema.primary_table.clone();
    report.row_count = schema.primary_row_count();
    if report.row_count == 0 {
        report.errors.push("primary table is empty".to_string());
    }

    let maxima = column_maxima(conn, &schema)?;
    report.max_timestamp = maxima.first().copied();

    if options.check_freshness && report.primary_table.is_some() {
        let max_age = i64::from(options.max_age_days) * 86_400;
        match maxima.iter().find(|&&ts| now - ts <= max_age) {
            Some(&fresh) => report.max_timestamp = Some(fresh),
            None => report.errors.push(format!(
                "no entries newer than {} days",
                options.max_age_days
            )),
        }
    }

    report.valid = report.errors.is_empty();
    Ok(report)
}

fn integrity_check(conn: &Connection) -> Result<Vec<String>, SchemaError> {
    let mut stmt = conn.prepare("PRAGMA integrity_check")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

    let mut messages = Vec::new();
    for row in rows.take(MAX_INTEGRITY_MESSAGES) {
        messages.push(row?);
    }
    Ok(messages)
}

/// Parsed MAX of every freshness column present in the primary table, in
/// [`FRESHNESS_COLUMNS`] order. Columns without a parseable maximum are left out.
fn column_maxima(conn: &Connection, schema: &SnapshotSchema) -> Result<Vec<i64>, SchemaError> {
    let Some((table, info)) = schema.primary() else {
        return Ok(Vec::new());
    };

    let mut maxima = Vec::new();
    for candidate in FRESHNESS_COLUMNS {
        let Some(column) = info
            .columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(candidate))
        else {
            continue;
        };

        if let Some(ts) = column_max(conn, table, &column.name)? {
            maxima.push(ts);
        }
    }

    Ok(maxima)
}

/// SQLite orders TEXT above numbers in `MAX`, so a single stray string can
/// hide the numeric maximum. Retry over numeric values only in that case.
fn column_max(conn: &Connection, table: &str, column: &str) -> Result<Option<i64>, SchemaError> {
    let (column, table) = (quote_identifier(column), quote_identifier(table));

    let max: Value = conn.query_row(
        &format!("SELECT MAX({}) FROM {}", column, table),
        [],
        |row| row.get(0),
    )?;
    if let Some(ts) = parse_timestamp(&max) {
        return Ok(Some(ts));
    }

    let numeric: Value = conn.query_row(
        &format!(
            "SELECT MAX({0}) FROM {1} WHERE typeof({0}) IN ('integer', 'real')",
            column, table
        ),
        [],
        |row| row.get(0),
    )?;
    Ok(parse_timestamp(&numeric))
}

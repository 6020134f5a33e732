//! SQLite snapshot inspection.

use std::collections::BTreeMap;
use std::path::Path;

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use tracing::info;

use super::{ColumnInfo, SchemaError, SnapshotSchema, TableInfo, TableSample};

const SAMPLE_ROWS: usize = 3;

/// Open a snapshot without any possibility of writing to it.
pub fn open_snapshot(path: &Path) -> rusqlite::Result<Connection> {
    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
}

/// Quote an identifier for interpolation into SQL.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Inspect tables, columns and row counts of the snapshot at `path`.
pub fn inspect(path: &Path) -> Result<SnapshotSchema, SchemaError> {
    let conn = open_snapshot(path)?;
    let schema = sqlite_schema(&conn)?;

    info!(
        path = %path.display(),
        tables = schema.tables.len(),
        primary_table = schema.primary_table.as_deref().unwrap_or("-"),
        rows = schema.primary_row_count(),
        "Snapshot schema inspected"
    );

    Ok(schema)
}

pub(crate) fn sqlite_schema(conn: &Connection) -> Result<SnapshotSchema, SchemaError> {
    let tables = list_tables(conn)?;
    let mut schema = SnapshotSchema::default();

    for (name, create_sql) in tables {
        let columns = table_columns(conn, &name)?;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote_identifier(&name)),
            [],
            |row| row.get(0),
        )?;

        schema.row_counts.insert(name.clone(), count.max(0) as u64);
        schema.tables.insert(name, TableInfo { columns, create_sql });
    }

    schema.primary_table = guess_primary_table(&schema.row_counts);
    if let Some(table) = schema.primary_table.clone() {
        schema.sample = Some(sample_rows(conn, &table)?);
    }

    Ok(schema)
}

/// User tables with their `CREATE` statement, internal tables excluded.
fn list_tables(conn: &Connection) -> Result<Vec<(String, Option<String>)>, SchemaError> {
    let mut stmt = conn.prepare(
        "SELECT name, sql FROM sqlite_master
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
         ORDER BY name",
    )?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;

    let mut tables = Vec::new();
    for row in rows {
        tables.push(row?);
    }
    Ok(tables)
}

fn table_columns(conn: &Connection, table: &str) -> Result<Vec<ColumnInfo>, SchemaError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_identifier(table)))?;
    let rows = stmt.query_map([], |row| {
        let declared_type: Option<String> = row.get(2)?;
        let not_null: i64 = row.get(3)?;
        let pk: i64 = row.get(5)?;
        Ok(ColumnInfo {
            name: row.get(1)?,
            declared_type: declared_type.unwrap_or_default(),
            not_null: not_null != 0,
            primary_key: pk != 0,
        })
    })?;

    let mut columns = Vec::new();
    for row in rows {
        columns.push(row?);
    }
    Ok(columns)
}

fn sample_rows(conn: &Connection, table: &str) -> Result<TableSample, SchemaError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT * FROM {} LIMIT {}",
        quote_identifier(table),
        SAMPLE_ROWS
    ))?;
    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
    let width = columns.len();

    let mut rows = Vec::new();
    let mut cursor = stmt.query([])?;
    while let Some(row) = cursor.next()? {
        let mut values = Vec::with_capacity(width);
        for idx in 0..width {
            values.push(value_to_json(row.get_ref(idx)?));
        }
        rows.push(values);
    }

    Ok(TableSample {
        table: table.to_string(),
        columns,
        rows,
    })
}

fn value_to_json(value: ValueRef<'_>) -> serde_json::Value {
    match value {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Integer(i) => i.into(),
        ValueRef::Real(f) => f.into(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned().into(),
        ValueRef::Blob(b) => format!("<blob {} bytes>", b.len()).into(),
    }
}

/// Pick the table with the most rows. Empty tables never qualify; ties go to
/// the alphabetically first table.
pub fn guess_primary_table(row_counts: &BTreeMap<String, u64>) -> Option<String> {
    let mut best: Option<(&String, u64)> = None;
    for (name, &count) in row_counts {
        if count > best.map(|(_, c)| c).unwrap_or(0) {
            best = Some((name, count));
        }
    }
    best.map(|(name, _)| name.clone())
}

/// Check that the primary table carries every `required` column
/// (case-insensitive). Returns the primary table name.
pub fn validate_required_columns<'a>(
    schema: &'a SnapshotSchema,
    required: &[&str],
) -> Result<&'a str, SchemaError> {
    if schema.tables.is_empty() {
        return Err(SchemaError::NoTables);
    }
    let (name, table) = schema.primary().ok_or(SchemaError::NoPrimaryTable)?;

    let missing: Vec<String> = required
        .iter()
        .filter(|col| !table.has_column(col))
        .map(|col| col.to_string())
        .collect();

    if missing.is_empty() {
        Ok(name)
    } else {
        Err(SchemaError::MissingColumns(missing))
    }
}

//! Snapshot import driver.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::Row;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::mapping::{build_projection, detect_column_mapping, ColumnMapping, LogicalField};
use super::transform::{RowTransformer, SourceRow};
use super::{ImportError, ImportReport, TransformError};
use crate::catalog::{CatalogItem, CatalogStore, UpsertReport};
use crate::classifier::Classifier;
use crate::config::ImportConfig;
use crate::inspector::{self, open_snapshot, SchemaError};
use crate::metrics;

/// What an import will read, resolved before any row is touched.
#[derive(Debug, Clone, Serialize)]
pub struct ImportPlan {
    pub table: String,
    pub row_count: u64,
    pub mapping: ColumnMapping,
}

/// Imports a snapshot into the catalog.
pub struct Importer {
    config: ImportConfig,
    classifier: Classifier,
    catalog: Arc<dyn CatalogStore>,
}

impl Importer {
    /// Build an importer, loading category rules from
    /// `config.categories_file`. A missing or malformed rule file fails here.
    pub fn new(config: ImportConfig, catalog: Arc<dyn CatalogStore>) -> Result<Self, ImportError> {
        let classifier = Classifier::from_file(&config.categories_file)?;
        Ok(Self::with_classifier(config, classifier, catalog))
    }

    pub fn with_classifier(
        config: ImportConfig,
        classifier: Classifier,
        catalog: Arc<dyn CatalogStore>,
    ) -> Self {
        Self {
            config,
            classifier,
            catalog,
        }
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Inspect the snapshot and resolve the column mapping.
    pub fn plan(&self, snapshot: &Path) -> Result<ImportPlan, ImportError> {
        let schema = inspector::inspect(snapshot)?;
        let (table, info) = match schema.primary() {
            Some(primary) => primary,
            None if schema.tables.is_empty() => return Err(SchemaError::NoTables.into()),
            None => return Err(SchemaError::NoPrimaryTable.into()),
        };

        let mapping = detect_column_mapping(&info.columns);
        info!(
            table,
            rows = schema.primary_row_count(),
            columns = info.columns.len(),
            mapping = %mapping,
            "Column mapping detected"
        );
        mapping.validate()?;

        Ok(ImportPlan {
            table: table.to_string(),
            row_count: schema.primary_row_count(),
            mapping,
        })
    }

    /// Import every row of the snapshot, prune expired items and collect
    /// catalog stats. Bad rows are skipped.
    pub fn run(&self, snapshot: &Path) -> Result<ImportReport, ImportError> {
        let started = Instant::now();
        let plan = self.plan(snapshot)?;
        let fields = plan.mapping.fields();
        let batch_size = self.config.batch_size.max(1);

        let conn = open_snapshot(snapshot)?;
        let mut stmt = conn.prepare(&build_projection(&plan.table, &plan.mapping))?;
        let mut rows = stmt.query([])?;

        let transformer = RowTransformer::new(&self.classifier, Utc::now().timestamp());
        let mut batch: Vec<CatalogItem> = Vec::with_capacity(batch_size);
        let mut written = UpsertReport::default();
        let (mut rows_read, mut rejected, mut failed, mut undated) = (0u64, 0u64, 0u64, 0u64);

        info!(table = %plan.table, rows = plan.row_count, "Import started");

        while let Some(row) = rows.next()? {
            rows_read += 1;

            let source = match read_row(row, &fields) {
                Ok(source) => source,
                Err(e) => {
                    failed += 1;
                    warn!(row_number = rows_read, error = %e, "Skipping unreadable row");
                    continue;
                }
            };

            match transformer.transform(&source) {
                Ok(Some(item)) => {
                    if item.date_ts.is_none() {
                        undated += 1;
                    }
                    batch.push(item);
                }
                Ok(None) => rejected += 1,
                Err(e) => {
                    failed += 1;
                    warn!(row_number = rows_read, error = %e, row = ?source, "Skipping row");
                }
            }

            if batch.len() >= batch_size {
                written.merge(self.flush(&mut batch)?);
            }
        }
        if !batch.is_empty() {
            written.merge(self.flush(&mut batch)?);
        }

        let pruned = self.catalog.prune_older_than(self.config.retention_days)?;
        let stats = self.catalog.stats(self.config.top_channels)?;

        metrics::ROWS_PROCESSED
            .with_label_values(&["imported"])
            .inc_by(written.total());
        metrics::ROWS_PROCESSED.with_label_values(&["rejected"]).inc_by(rejected);
        metrics::ROWS_PROCESSED.with_label_values(&["failed"]).inc_by(failed);
        metrics::ITEMS_PRUNED.inc_by(pruned);
        metrics::CATALOG_ITEMS.set(stats.total as i64);

        let report = ImportReport {
            table: plan.table,
            rows_read,
            inserted: written.inserted,
            updated: written.updated,
            rejected,
            failed,
            undated,
            pruned,
            duration_ms: started.elapsed().as_millis() as u64,
            stats,
        };

        info!(
            rows_read,
            inserted = report.inserted,
            updated = report.updated,
            rejected,
            failed,
            pruned,
            total = report.stats.total,
            duration_ms = report.duration_ms,
            "Import complete"
        );

        Ok(report)
    }

    fn flush(&self, batch: &mut Vec<CatalogItem>) -> Result<UpsertReport, ImportError> {
        let report = self
            .catalog
            .upsert_bulk(batch, self.config.store_batch_size)?;
        debug!(items = batch.len(), "Batch written");
        batch.clear();
        Ok(report)
    }
}

/// Read a projected row. Column `i` holds `fields[i]`.
fn read_row(row: &Row<'_>, fields: &[LogicalField]) -> Result<SourceRow, TransformError> {
    let mut source = SourceRow::new();
    for (idx, field) in fields.iter().enumerate() {
        let value: Value = row.get(idx).map_err(|e| TransformError::Read {
            field: *field,
            reason: e.to_string(),
        })?;
        source.set(*field, value);
    }
    Ok(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ConflictPolicy, SqliteCatalog};
    use crate::testing::fixtures::{write_snapshot, SnapshotTable};
    use rusqlite::types::Value;
    use tempfile::TempDir;

    const RULES: &str = r#"{
        "senders": ["ARD", "ZDF"],
        "categories": {
            "news": {"priority": 10, "rules": [{"field": "title", "match": ["tagesschau"]}]}
        }
    }"#;

    fn importer(catalog: Arc<SqliteCatalog>, batch_size: usize) -> Importer {
        let config = ImportConfig {
            batch_size,
            store_batch_size: 2,
            ..ImportConfig::default()
        };
        Importer::with_classifier(config, Classifier::from_json(RULES).unwrap(), catalog)
    }

    fn now() -> i64 {
        Utc::now().timestamp()
    }

    #[test]
    fn test_run_imports_and_classifies() {
        let dir = TempDir::new().unwrap();
        let recent = now() - 3_600;
        let path = write_snapshot(
            dir.path(),
            &SnapshotTable::new("filme", &["id", "channelid", "titel", "datum", "url"])
                .row(vec![1.into(), 1.into(), "Tagesschau".to_string().into(), recent.into(), "https://a".to_string().into()])
                .row(vec![2.into(), 2.into(), "Tatort".to_string().into(), recent.into(), "https://b".to_string().into()])
                .row(vec![3.into(), 2.into(), Value::Null, recent.into(), "https://c".to_string().into()]),
        );

        let catalog = Arc::new(SqliteCatalog::in_memory(ConflictPolicy::Touch).unwrap());
        let report = importer(catalog.clone(), 5000).run(&path).unwrap();

        assert_eq!(report.table, "filme");
        assert_eq!(report.rows_read, 3);
        assert_eq!(report.inserted, 2);
        assert_eq!(report.rejected, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(report.stats.total, 2);
        assert_eq!(report.stats.by_category[0].name, "news");

        let hits = catalog.search("tagesschau", 5).unwrap();
        assert_eq!(hits[0].channel.as_deref(), Some("ARD"));
        assert_eq!(hits[0].category.as_deref(), Some("news"));
    }

    #[test]
    fn test_rerun_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let recent = now() - 60;
        let mut table = SnapshotTable::new("filme", &["title", "sender", "timestamp", "url_website"]);
        for i in 0..7 {
            table = table.row(vec![
                format!("Folge {}", i).into(),
                "ZDF".to_string().into(),
                (recent - i).into(),
                format!("https://zdf.example/{}", i).into(),
            ]);
        }
        let path = write_snapshot(dir.path(), &table);

        let catalog = Arc::new(SqliteCatalog::in_memory(ConflictPolicy::Touch).unwrap());
        let first = importer(catalog.clone(), 3).run(&path).unwrap();
        let second = importer(catalog.clone(), 3).run(&path).unwrap();

        assert_eq!(first.inserted, 7);
        assert_eq!(second.inserted, 0);
        assert_eq!(second.updated, 7);
        assert_eq!(catalog.count().unwrap(), 7);
    }

    #[test]
    fn test_failed_rows_are_skipped() {
        let dir = TempDir::new().unwrap();
        let path = write_snapshot(
            dir.path(),
            &SnapshotTable::new("filme", &["title", "url"])
                .row(vec![Value::Blob(vec![0xff, 0xfe]), "https://a".to_string().into()])
                .row(vec!["Gut".to_string().into(), "https://b".to_string().into()]),
        );

        let catalog = Arc::new(SqliteCatalog::in_memory(ConflictPolicy::Touch).unwrap());
        let report = importer(catalog.clone(), 5000).run(&path).unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.inserted, 1);
        assert_eq!(report.undated, 1);
    }

    #[test]
    fn test_overflowing_duration_does_not_abort_import() {
        let dir = TempDir::new().unwrap();
        let path = write_snapshot(
            dir.path(),
            &SnapshotTable::new("filme", &["titel", "dauer", "url"])
                .row(vec![
                    "Endlos".to_string().into(),
                    "999999999999999999:00:00".to_string().into(),
                    "https://a".to_string().into(),
                ])
                .row(vec![
                    "Kurz".to_string().into(),
                    "00:15:00".to_string().into(),
                    "https://b".to_string().into(),
                ]),
        );

        let catalog = Arc::new(SqliteCatalog::in_memory(ConflictPolicy::Touch).unwrap());
        let report = importer(catalog.clone(), 5000).run(&path).unwrap();

        assert_eq!(report.inserted, 2);
        assert_eq!(report.failed, 0);
        let endless = catalog.search("endlos", 5).unwrap();
        assert_eq!(endless[0].duration_sec, None);
        let short = catalog.search("kurz", 5).unwrap();
        assert_eq!(short[0].duration_sec, Some(900));
    }

    #[test]
    fn test_missing_title_column() {
        let dir = TempDir::new().unwrap();
        let path = write_snapshot(
            dir.path(),
            &SnapshotTable::new("filme", &["name", "url"])
                .row(vec!["x".to_string().into(), "https://a".to_string().into()]),
        );

        let catalog = Arc::new(SqliteCatalog::in_memory(ConflictPolicy::Touch).unwrap());
        match importer(catalog, 5000).plan(&path) {
            Err(ImportError::Schema(SchemaError::MissingColumns(missing))) => {
                assert!(missing.contains(&"title".to_string()));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_empty_snapshot_has_no_primary_table() {
        let dir = TempDir::new().unwrap();
        let path = write_snapshot(dir.path(), &SnapshotTable::new("filme", &["title", "url"]));

        let catalog = Arc::new(SqliteCatalog::in_memory(ConflictPolicy::Touch).unwrap());
        assert!(matches!(
            importer(catalog, 5000).run(&path),
            Err(ImportError::Schema(SchemaError::NoPrimaryTable))
        ));
    }

    #[test]
    fn test_new_requires_rule_file() {
        let catalog = Arc::new(SqliteCatalog::in_memory(ConflictPolicy::Touch).unwrap());
        let config = ImportConfig {
            categories_file: "/no/such/categories.json".into(),
            ..ImportConfig::default()
        };
        assert!(matches!(
            Importer::new(config, catalog),
            Err(ImportError::Classifier(_))
        ));
    }
}

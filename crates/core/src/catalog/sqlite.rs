//! SQLite-backed catalog implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use tracing::{debug, info};

use super::{
    CatalogError, CatalogItem, CatalogStats, CatalogStore, ConflictPolicy, LabelCount,
    UpsertReport,
};

const PROGRESS_EVERY: usize = 10_000;

const ITEM_COLUMNS: &str = "items.id, items.type, items.title, items.channel, items.topic, \
     items.description, items.date_ts, items.duration_sec, items.url_video, items.url_website, \
     items.is_hd, items.has_subtitles, items.category, items.poster, items.created_at, \
     items.updated_at";

const INSERT_ITEM: &str = "INSERT INTO items (
        id, type, title, channel, topic, description, date_ts, duration_sec,
        url_video, url_website, is_hd, has_subtitles, category, poster
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)";

const ON_CONFLICT_TOUCH: &str = " ON CONFLICT(id) DO UPDATE SET updated_at = unixepoch()";

const ON_CONFLICT_OVERWRITE: &str = " ON CONFLICT(id) DO UPDATE SET
        type = excluded.type,
        title = excluded.title,
        channel = excluded.channel,
        topic = excluded.topic,
        description = excluded.description,
        date_ts = excluded.date_ts,
        duration_sec = excluded.duration_sec,
        url_video = excluded.url_video,
        url_website = excluded.url_website,
        is_hd = excluded.is_hd,
        has_subtitles = excluded.has_subtitles,
        category = excluded.category,
        poster = excluded.poster,
        updated_at = unixepoch()";

/// SQLite-backed catalog.
pub struct SqliteCatalog {
    conn: Mutex<Connection>,
    upsert_sql: String,
}

impl SqliteCatalog {
    /// Open (or create) the catalog database at `path`.
    pub fn new(path: &Path, on_conflict: ConflictPolicy) -> Result<Self, CatalogError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                CatalogError::Database(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        // Readers keep working while import batches commit.
        let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
        debug!(path = %path.display(), journal_mode = %mode, "Opened catalog database");

        Self::with_connection(conn, on_conflict)
    }

    /// Create an in-memory catalog (useful for testing).
    pub fn in_memory(on_conflict: ConflictPolicy) -> Result<Self, CatalogError> {
        Self::with_connection(Connection::open_in_memory()?, on_conflict)
    }

    fn with_connection(conn: Connection, on_conflict: ConflictPolicy) -> Result<Self, CatalogError> {
        Self::initialize_schema(&conn)?;
        let conflict_clause = match on_conflict {
            ConflictPolicy::Touch => ON_CONFLICT_TOUCH,
            ConflictPolicy::Overwrite => ON_CONFLICT_OVERWRITE,
        };
        Ok(Self {
            conn: Mutex::new(conn),
            upsert_sql: format!("{}{}", INSERT_ITEM, conflict_clause),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), CatalogError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS items (
                id TEXT PRIMARY KEY CHECK (length(id) > 0),
                type TEXT NOT NULL DEFAULT 'movie',
                title TEXT NOT NULL,
                channel TEXT,
                topic TEXT,
                description TEXT,
                date_ts INTEGER,
                duration_sec INTEGER,
                url_video TEXT,
                url_website TEXT,
                is_hd INTEGER NOT NULL DEFAULT 0,
                has_subtitles INTEGER NOT NULL DEFAULT 0,
                category TEXT,
                poster TEXT,
                created_at INTEGER NOT NULL DEFAULT (unixepoch()),
                updated_at INTEGER NOT NULL DEFAULT (unixepoch())
            );

            CREATE INDEX IF NOT EXISTS idx_items_date ON items(date_ts DESC);
            CREATE INDEX IF NOT EXISTS idx_items_channel ON items(channel);
            CREATE INDEX IF NOT EXISTS idx_items_category ON items(category);
            CREATE INDEX IF NOT EXISTS idx_items_channel_date ON items(channel, date_ts DESC);

            CREATE VIRTUAL TABLE IF NOT EXISTS items_fts USING fts5(
                title, channel, topic, description,
                content = 'items',
                content_rowid = 'rowid'
            );

            CREATE TRIGGER IF NOT EXISTS items_ai AFTER INSERT ON items BEGIN
                INSERT INTO items_fts(rowid, title, channel, topic, description)
                VALUES (new.rowid, new.title, new.channel, new.topic, new.description);
            END;

            CREATE TRIGGER IF NOT EXISTS items_ad AFTER DELETE ON items BEGIN
                INSERT INTO items_fts(items_fts, rowid, title, channel, topic, description)
                VALUES ('delete', old.rowid, old.title, old.channel, old.topic, old.description);
            END;

            CREATE TRIGGER IF NOT EXISTS items_au
            AFTER UPDATE OF title, channel, topic, description ON items BEGIN
                INSERT INTO items_fts(items_fts, rowid, title, channel, topic, description)
                VALUES ('delete', old.rowid, old.title, old.channel, old.topic, old.description);
                INSERT INTO items_fts(rowid, title, channel, topic, description)
                VALUES (new.rowid, new.title, new.channel, new.topic, new.description);
            END;
            "#,
        )?;

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, CatalogError> {
        self.conn
            .lock()
            .map_err(|_| CatalogError::Database("catalog connection lock poisoned".to_string()))
    }

    /// Write one batch inside an open transaction.
    fn write_batch(&self, tx: &Transaction<'_>, items: &[CatalogItem]) -> Result<UpsertReport, CatalogError> {
        let mut exists = tx.prepare_cached("SELECT 1 FROM items WHERE id = ?1")?;
        let mut upsert = tx.prepare_cached(&self.upsert_sql)?;
        let mut report = UpsertReport::default();

        for item in items {
            let existed = exists
                .query_row(params![item.id], |_| Ok(()))
                .optional()?
                .is_some();

            upsert.execute(params![
                item.id,
                item.kind,
                item.title,
                item.channel,
                item.topic,
                item.description,
                item.date_ts,
                item.duration_sec,
                item.url_video,
                item.url_website,
                item.is_hd,
                item.has_subtitles,
                item.category,
                item.poster,
            ])?;

            if existed {
                report.updated += 1;
            } else {
                report.inserted += 1;
            }
        }

        Ok(report)
    }

    fn row_to_item(row: &Row<'_>) -> rusqlite::Result<CatalogItem> {
        Ok(CatalogItem {
            id: row.get(0)?,
            kind: row.get(1)?,
            title: row.get(2)?,
            channel: row.get(3)?,
            topic: row.get(4)?,
            description: row.get(5)?,
            date_ts: row.get(6)?,
            duration_sec: row.get(7)?,
            url_video: row.get(8)?,
            url_website: row.get(9)?,
            is_hd: row.get(10)?,
            has_subtitles: row.get(11)?,
            category: row.get(12)?,
            poster: row.get(13)?,
            created_at: row.get(14)?,
            updated_at: row.get(15)?,
        })
    }

    fn label_counts(
        conn: &Connection,
        sql: &str,
        limit: Option<usize>,
    ) -> Result<Vec<LabelCount>, CatalogError> {
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params![limit], |row| {
            let count: i64 = row.get(1)?;
            Ok(LabelCount {
                name: row.get(0)?,
                count: count as u64,
            })
        })?;

        let mut counts = Vec::new();
        for row in rows {
            counts.push(row?);
        }
        Ok(counts)
    }
}

/// Turn free text into an FTS5 query of quoted terms, all of which must match.
fn fts_query(text: &str) -> Option<String> {
    let terms: Vec<String> = text
        .split_whitespace()
        .map(|t| t.replace('"', ""))
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{}\"", t))
        .collect();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" "))
    }
}

impl CatalogStore for SqliteCatalog {
    fn upsert_one(&self, item: &CatalogItem) -> Result<UpsertReport, CatalogError> {
        self.upsert_bulk(std::slice::from_ref(item), 1)
    }

    fn upsert_bulk(
        &self,
        items: &[CatalogItem],
        batch_size: usize,
    ) -> Result<UpsertReport, CatalogError> {
        let batch_size = batch_size.max(1);
        let mut conn = self.lock()?;
        let mut report = UpsertReport::default();
        let mut written = 0usize;
        let mut next_progress = PROGRESS_EVERY;

        for batch in items.chunks(batch_size) {
            let tx = conn.transaction()?;
            let batch_report = self.write_batch(&tx, batch)?;
            tx.commit()?;

            report.merge(batch_report);
            written += batch.len();
            if written >= next_progress {
                info!(written, total = items.len(), "Catalog upsert progress");
                next_progress += PROGRESS_EVERY;
            }
        }

        debug!(
            inserted = report.inserted,
            updated = report.updated,
            "Catalog upsert complete"
        );
        Ok(report)
    }

    fn prune_before(&self, cutoff: i64) -> Result<u64, CatalogError> {
        let conn = self.lock()?;
        let removed = conn.execute("DELETE FROM items WHERE date_ts < ?1", params![cutoff])?;
        Ok(removed as u64)
    }

    fn stats(&self, top_channels: usize) -> Result<CatalogStats, CatalogError> {
        let conn = self.lock()?;

        let (total, newest_timestamp): (i64, Option<i64>) = conn.query_row(
            "SELECT COUNT(*), MAX(date_ts) FROM items",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let by_category = Self::label_counts(
            &conn,
            "SELECT category, COUNT(*) AS c FROM items
             WHERE category IS NOT NULL
             GROUP BY category ORDER BY c DESC, category LIMIT ?1",
            None,
        )?;

        let by_channel = Self::label_counts(
            &conn,
            "SELECT channel, COUNT(*) AS c FROM items
             WHERE channel IS NOT NULL
             GROUP BY channel ORDER BY c DESC, channel LIMIT ?1",
            Some(top_channels),
        )?;

        Ok(CatalogStats {
            total: total as u64,
            newest_timestamp,
            by_category,
            by_channel,
        })
    }

    fn get(&self, id: &str) -> Result<CatalogItem, CatalogError> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {} FROM items WHERE id = ?1", ITEM_COLUMNS),
            params![id],
            Self::row_to_item,
        )
        .optional()?
        .ok_or_else(|| CatalogError::NotFound(id.to_string()))
    }

    fn search(&self, text: &str, limit: usize) -> Result<Vec<CatalogItem>, CatalogError> {
        let Some(query) = fts_query(text) else {
            return Ok(Vec::new());
        };

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM items_fts
             JOIN items ON items.rowid = items_fts.rowid
             WHERE items_fts MATCH ?1
             ORDER BY bm25(items_fts), items.date_ts DESC
             LIMIT ?2",
            ITEM_COLUMNS
        ))?;
        let rows = stmt.query_map(params![query, limit as i64], Self::row_to_item)?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }

    fn count(&self) -> Result<u64, CatalogError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::compute_item_id;
    use crate::catalog::DEFAULT_ITEM_KIND;
    use tempfile::TempDir;

    fn create_test_catalog() -> SqliteCatalog {
        SqliteCatalog::in_memory(ConflictPolicy::Touch).unwrap()
    }

    fn create_test_item(title: &str, channel: &str, date_ts: Option<i64>) -> CatalogItem {
        let url = format!("https://example.org/{}", title.replace(' ', "-"));
        CatalogItem {
            id: compute_item_id(channel, Some(&url), None, title, date_ts),
            kind: DEFAULT_ITEM_KIND.to_string(),
            title: title.to_string(),
            channel: Some(channel.to_string()),
            topic: None,
            description: None,
            date_ts,
            duration_sec: Some(1800),
            url_video: Some(format!("{}.mp4", url)),
            url_website: Some(url),
            is_hd: true,
            has_subtitles: false,
            category: None,
            poster: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn fts_rows(catalog: &SqliteCatalog, text: &str) -> i64 {
        let conn = catalog.lock().unwrap();
        conn.query_row(
            "SELECT COUNT(*) FROM items_fts WHERE items_fts MATCH ?1",
            params![fts_query(text).unwrap()],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn test_upsert_and_get() {
        let catalog = create_test_catalog();
        let item = create_test_item("Tagesschau", "ARD", Some(1_700_000_000));

        let report = catalog.upsert_one(&item).unwrap();
        assert_eq!(report.inserted, 1);
        assert_eq!(report.updated, 0);

        let stored = catalog.get(&item.id).unwrap();
        assert_eq!(stored.title, "Tagesschau");
        assert_eq!(stored.kind, "movie");
        assert!(stored.is_hd);
        assert!(stored.created_at.is_some());
        assert!(stored.updated_at.is_some());
    }

    #[test]
    fn test_get_missing() {
        let catalog = create_test_catalog();
        assert!(matches!(
            catalog.get("de-mvw:nope"),
            Err(CatalogError::NotFound(_))
        ));
    }

    #[test]
    fn test_touch_conflict_keeps_content() {
        let catalog = create_test_catalog();
        let item = create_test_item("Tatort", "ARD", Some(1_700_000_000));
        catalog.upsert_one(&item).unwrap();

        let mut changed = item.clone();
        changed.title = "Tatort (neu)".to_string();
        changed.category = Some("Krimi".to_string());
        let report = catalog.upsert_one(&changed).unwrap();
        assert_eq!(report.updated, 1);
        assert_eq!(report.inserted, 0);

        let stored = catalog.get(&item.id).unwrap();
        assert_eq!(stored.title, "Tatort");
        assert_eq!(stored.category, None);
        assert_eq!(catalog.count().unwrap(), 1);
    }

    #[test]
    fn test_overwrite_conflict_replaces_content_and_index() {
        let catalog = SqliteCatalog::in_memory(ConflictPolicy::Overwrite).unwrap();
        let item = create_test_item("Tatort", "ARD", Some(1_700_000_000));
        catalog.upsert_one(&item).unwrap();

        let mut changed = item.clone();
        changed.title = "Polizeiruf".to_string();
        changed.category = Some("Krimi".to_string());
        catalog.upsert_one(&changed).unwrap();

        let stored = catalog.get(&item.id).unwrap();
        assert_eq!(stored.title, "Polizeiruf");
        assert_eq!(stored.category.as_deref(), Some("Krimi"));

        assert_eq!(fts_rows(&catalog, "Tatort"), 0);
        assert_eq!(fts_rows(&catalog, "Polizeiruf"), 1);
    }

    #[test]
    fn test_bulk_upsert_in_batches() {
        let catalog = create_test_catalog();
        let items: Vec<_> = (0..25)
            .map(|i| create_test_item(&format!("Folge {}", i), "ZDF", Some(1_700_000_000 + i)))
            .collect();

        let report = catalog.upsert_bulk(&items, 10).unwrap();
        assert_eq!(report.inserted, 25);
        assert_eq!(catalog.count().unwrap(), 25);

        let again = catalog.upsert_bulk(&items, 7).unwrap();
        assert_eq!(again.inserted, 0);
        assert_eq!(again.updated, 25);
        assert_eq!(catalog.count().unwrap(), 25);
    }

    #[test]
    fn test_failed_batch_rolls_back_only_itself() {
        let catalog = create_test_catalog();
        let mut items: Vec<_> = (0..4)
            .map(|i| create_test_item(&format!("Folge {}", i), "ZDF", Some(1_700_000_000 + i)))
            .collect();
        items[3].id = String::new();

        let result = catalog.upsert_bulk(&items, 2);
        assert!(matches!(result, Err(CatalogError::Database(_))));

        // First batch committed, second batch (items 2 and 3) rolled back.
        assert_eq!(catalog.count().unwrap(), 2);
        assert!(catalog.get(&items[0].id).is_ok());
        assert!(catalog.get(&items[2].id).is_err());
        assert_eq!(fts_rows(&catalog, "Folge"), 2);
    }

    #[test]
    fn test_prune_before_keeps_undated_items() {
        let catalog = create_test_catalog();
        let items = vec![
            create_test_item("Alt", "ARD", Some(1_000)),
            create_test_item("Auch alt", "ARD", Some(2_000)),
            create_test_item("Neu", "ARD", Some(5_000)),
            create_test_item("Ohne Datum", "ARD", None),
        ];
        catalog.upsert_bulk(&items, 100).unwrap();

        assert_eq!(catalog.prune_before(3_000).unwrap(), 2);
        assert_eq!(catalog.count().unwrap(), 2);
        assert_eq!(fts_rows(&catalog, "alt"), 0);
        assert!(catalog.get(&items[3].id).is_ok());
    }

    #[test]
    fn test_prune_older_than_days() {
        let catalog = create_test_catalog();
        let now = chrono::Utc::now().timestamp();
        let items = vec![
            create_test_item("Frisch", "ARD", Some(now - 86_400)),
            create_test_item("Abgelaufen", "ARD", Some(now - 91 * 86_400)),
        ];
        catalog.upsert_bulk(&items, 100).unwrap();

        assert_eq!(catalog.prune_older_than(90).unwrap(), 1);
        assert!(catalog.get(&items[0].id).is_ok());
    }

    #[test]
    fn test_stats() {
        let catalog = create_test_catalog();
        let mut items = vec![
            create_test_item("A", "ARD", Some(100)),
            create_test_item("B", "ARD", Some(300)),
            create_test_item("C", "ZDF", Some(200)),
            create_test_item("D", "arte", None),
        ];
        items[0].category = Some("news".to_string());
        items[1].category = Some("news".to_string());
        items[2].category = Some("kids".to_string());
        catalog.upsert_bulk(&items, 100).unwrap();

        let stats = catalog.stats(2).unwrap();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.newest_timestamp, Some(300));
        assert_eq!(
            stats.by_category,
            vec![
                LabelCount { name: "news".to_string(), count: 2 },
                LabelCount { name: "kids".to_string(), count: 1 },
            ]
        );
        assert_eq!(stats.by_channel.len(), 2);
        assert_eq!(stats.by_channel[0].name, "ARD");
        assert_eq!(stats.by_channel[0].count, 2);
        assert_eq!(stats.by_channel[1].name, "ZDF");
    }

    #[test]
    fn test_stats_empty() {
        let stats = create_test_catalog().stats(10).unwrap();
        assert_eq!(stats, CatalogStats::default());
    }

    #[test]
    fn test_search_ranks_and_sanitizes() {
        let catalog = create_test_catalog();
        let mut items = vec![
            create_test_item("Wetter am Morgen", "ARD", Some(100)),
            create_test_item("Wetter am Abend", "ARD", Some(200)),
            create_test_item("Sport", "ZDF", Some(300)),
        ];
        items[2].description = Some("Danach das Wetter".to_string());
        catalog.upsert_bulk(&items, 100).unwrap();

        let hits = catalog.search("wetter", 10).unwrap();
        assert_eq!(hits.len(), 3);

        let hits = catalog.search("wetter abend", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Wetter am Abend");

        assert_eq!(catalog.search("\"wetter\" OR", 10).unwrap().len(), 0);
        assert!(catalog.search("   ", 10).unwrap().is_empty());
        assert_eq!(catalog.search("wetter", 1).unwrap().len(), 1);
    }

    #[test]
    fn test_file_catalog_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app").join("app.db");
        let item = create_test_item("Persistiert", "3sat", Some(42));

        {
            let catalog = SqliteCatalog::new(&path, ConflictPolicy::Touch).unwrap();
            catalog.upsert_one(&item).unwrap();
        }

        let reopened = SqliteCatalog::new(&path, ConflictPolicy::Touch).unwrap();
        assert_eq!(reopened.get(&item.id).unwrap().title, "Persistiert");
        assert_eq!(reopened.search("persistiert", 5).unwrap().len(), 1);
    }

    #[test]
    fn test_fts_query() {
        assert_eq!(fts_query("a b").as_deref(), Some("\"a\" \"b\""));
        assert_eq!(fts_query("say \"hi\"").as_deref(), Some("\"say\" \"hi\""));
        assert_eq!(fts_query(" \" "), None);
    }
}

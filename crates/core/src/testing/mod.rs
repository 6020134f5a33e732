//! Testing utilities: snapshot fixtures and a scripted fetcher.
//!
//! # Example
//!
//! ```rust,ignore
//! use mediathek_core::testing::{fixtures, MockFetcher, MockResponse};
//!
//! let table = fixtures::SnapshotTable::new("filme", &["titel", "url"])
//!     .row(vec!["Tatort".to_string().into(), "https://x".to_string().into()]);
//! let plain = fixtures::write_snapshot(dir.path(), &table);
//!
//! let fetcher = MockFetcher::new();
//! fetcher.push(MockResponse::snapshot(fixtures::bzip2_bytes(&std::fs::read(plain)?))).await;
//! ```

mod mock_fetcher;

pub use mock_fetcher::{MockFetcher, MockResponse, RecordedFetch};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::io::Write;
    use std::path::{Path, PathBuf};

    use rusqlite::types::Value;
    use rusqlite::{params_from_iter, Connection};

    use crate::catalog::{CatalogItem, DEFAULT_ITEM_KIND};
    use crate::identity::compute_item_id;
    use crate::inspector::quote_identifier;

    /// An upstream table with an arbitrary layout. Every column is
    /// declared without a type so any value can be stored.
    #[derive(Debug, Clone)]
    pub struct SnapshotTable {
        pub name: String,
        pub columns: Vec<String>,
        pub rows: Vec<Vec<Value>>,
    }

    impl SnapshotTable {
        pub fn new(name: &str, columns: &[&str]) -> Self {
            Self {
                name: name.to_string(),
                columns: columns.iter().map(|c| c.to_string()).collect(),
                rows: Vec::new(),
            }
        }

        pub fn row(mut self, values: Vec<Value>) -> Self {
            assert_eq!(values.len(), self.columns.len(), "row width mismatch");
            self.rows.push(values);
            self
        }
    }

    /// Write `tables` into a fresh SQLite file at `path`.
    pub fn write_snapshot_tables(path: &Path, tables: &[SnapshotTable]) -> PathBuf {
        if path.exists() {
            std::fs::remove_file(path).expect("remove old snapshot");
        }
        let mut conn = Connection::open(path).expect("create snapshot");
        conn.execute_batch("PRAGMA user_version = 1;").expect("write header");
        let tx = conn.transaction().expect("begin");

        for table in tables {
            let columns: Vec<String> = table.columns.iter().map(|c| quote_identifier(c)).collect();
            tx.execute_batch(&format!(
                "CREATE TABLE {} ({});",
                quote_identifier(&table.name),
                columns.join(", ")
            ))
            .expect("create table");

            let placeholders = vec!["?"; columns.len()].join(", ");
            let sql = format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote_identifier(&table.name),
                columns.join(", "),
                placeholders
            );
            for row in &table.rows {
                tx.execute(&sql, params_from_iter(row.iter())).expect("insert row");
            }
        }

        tx.commit().expect("commit");
        path.to_path_buf()
    }

    /// Write a single-table snapshot named `snapshot.db` into `dir`.
    pub fn write_snapshot(dir: &Path, table: &SnapshotTable) -> PathBuf {
        write_snapshot_tables(&dir.join("snapshot.db"), std::slice::from_ref(table))
    }

    /// MediathekView-like table with `rows` entries dated `date_ts`.
    pub fn film_table(rows: usize, date_ts: i64) -> SnapshotTable {
        let mut table = SnapshotTable::new(
            "filme",
            &["id", "channelid", "thema", "titel", "datum", "dauer", "url", "website"],
        );
        for i in 0..rows {
            table = table.row(vec![
                Value::Integer(i as i64 + 1),
                Value::Integer((i % 3) as i64 + 1),
                Value::Text(format!("Thema {}", i)),
                Value::Text(format!("Sendung {}", i)),
                Value::Integer(date_ts - i as i64),
                Value::Text("00:30:00".to_string()),
                Value::Text(format!("https://media.example/{}.mp4", i)),
                Value::Text(format!("https://www.example/{}", i)),
            ]);
        }
        table
    }

    pub fn bzip2_bytes(data: &[u8]) -> Vec<u8> {
        let mut encoder =
            bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
        encoder.write_all(data).expect("bzip2 write");
        encoder.finish().expect("bzip2 finish")
    }

    pub fn gzip_bytes(data: &[u8]) -> Vec<u8> {
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data).expect("gzip write");
        encoder.finish().expect("gzip finish")
    }

    /// A catalog item with plausible values and a computed identity.
    pub fn catalog_item(title: &str, channel: &str, date_ts: Option<i64>) -> CatalogItem {
        let website = format!("https://www.example/{}", title.to_lowercase().replace(' ', "-"));
        CatalogItem {
            id: compute_item_id(channel, Some(&website), None, title, date_ts),
            kind: DEFAULT_ITEM_KIND.to_string(),
            title: title.to_string(),
            channel: Some(channel.to_string()),
            topic: None,
            description: None,
            date_ts,
            duration_sec: Some(1800),
            url_video: Some(format!("{}.mp4", website)),
            url_website: Some(website),
            is_hd: false,
            has_subtitles: false,
            category: None,
            poster: None,
            created_at: None,
            updated_at: None,
        }
    }

    pub const CATEGORY_RULES: &str = r#"{
        "senders": ["ARD", "ZDF", "arte"],
        "categories": {
            "news": {
                "priority": 10,
                "rules": [{ "field": "title", "match": ["tagesschau", "nachrichten"] }]
            },
            "docs": {
                "priority": 5,
                "rules": [{ "field": "topic", "match": ["doku"] }]
            }
        }
    }"#;
}

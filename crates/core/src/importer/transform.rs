//! Row to catalog item transformation.

use std::collections::BTreeMap;

use rusqlite::types::Value;

use super::channels::{poster_for_channel, resolve_channel};
use super::normalize::{normalize_timestamp, parse_duration, text, truthy};
use super::{LogicalField, TransformError};
use crate::catalog::{CatalogItem, DEFAULT_ITEM_KIND};
use crate::classifier::{Classifier, UNCATEGORIZED};
use crate::identity::compute_item_id;

static NULL: Value = Value::Null;

/// Values of one projected snapshot row, keyed by logical field.
#[derive(Debug, Clone, Default)]
pub struct SourceRow {
    values: BTreeMap<LogicalField, Value>,
}

impl SourceRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, field: LogicalField, value: Value) {
        self.values.insert(field, value);
    }

    pub fn with(mut self, field: LogicalField, value: impl Into<Value>) -> Self {
        self.set(field, value.into());
        self
    }

    /// Value of `field`, `Null` when unmapped.
    pub fn get(&self, field: LogicalField) -> &Value {
        self.values.get(&field).unwrap_or(&NULL)
    }
}

/// Turns source rows into catalog items.
pub struct RowTransformer<'a> {
    classifier: &'a Classifier,
    now: i64,
}

impl<'a> RowTransformer<'a> {
    /// `now` anchors the timestamp plausibility window.
    pub fn new(classifier: &'a Classifier, now: i64) -> Self {
        Self { classifier, now }
    }

    /// Returns `Ok(None)` for rows that lack a title or any locator.
    pub fn transform(&self, row: &SourceRow) -> Result<Option<CatalogItem>, TransformError> {
        let Some(title) = self.text_field(row, LogicalField::Title)? else {
            return Ok(None);
        };
        let url_video = self.text_field(row, LogicalField::UrlVideo)?;
        let url_website = self.text_field(row, LogicalField::UrlWebsite)?;
        if url_video.is_none() && url_website.is_none() {
            return Ok(None);
        }

        reject_binary(row, LogicalField::Channel)?;
        let channel = resolve_channel(row.get(LogicalField::Channel));
        let date_ts = normalize_timestamp(row.get(LogicalField::DateTs), self.now);

        let mut item = CatalogItem {
            id: compute_item_id(
                channel.as_deref().unwrap_or(""),
                url_website.as_deref(),
                url_video.as_deref(),
                &title,
                date_ts,
            ),
            kind: DEFAULT_ITEM_KIND.to_string(),
            title,
            topic: self.text_field(row, LogicalField::Topic)?,
            description: self.text_field(row, LogicalField::Description)?,
            date_ts,
            duration_sec: parse_duration(row.get(LogicalField::Duration)),
            poster: channel.as_deref().and_then(poster_for_channel),
            channel,
            url_video,
            url_website,
            is_hd: truthy(row.get(LogicalField::IsHd)),
            has_subtitles: truthy(row.get(LogicalField::HasSubtitles)),
            category: None,
            created_at: None,
            updated_at: None,
        };

        let category = self.classifier.classify(&item);
        if category != UNCATEGORIZED {
            item.category = Some(category.to_string());
        }

        Ok(Some(item))
    }

    fn text_field(
        &self,
        row: &SourceRow,
        field: LogicalField,
    ) -> Result<Option<String>, TransformError> {
        reject_binary(row, field)?;
        Ok(text(row.get(field)))
    }
}

fn reject_binary(row: &SourceRow, field: LogicalField) -> Result<(), TransformError> {
    match row.get(field) {
        Value::Blob(_) => Err(TransformError::Binary { field }),
        _ => Ok(()),
    }
}

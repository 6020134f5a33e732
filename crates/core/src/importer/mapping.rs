//! Logical field to source column resolution.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::inspector::{quote_identifier, ColumnInfo, SchemaError};

/// Fields the importer knows how to fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalField {
    Title,
    Channel,
    Topic,
    Description,
    DateTs,
    Duration,
    UrlVideo,
    UrlWebsite,
    IsHd,
    HasSubtitles,
}

impl LogicalField {
    pub const ALL: [LogicalField; 10] = [
        LogicalField::Title,
        LogicalField::Channel,
        LogicalField::Topic,
        LogicalField::Description,
        LogicalField::DateTs,
        LogicalField::Duration,
        LogicalField::UrlVideo,
        LogicalField::UrlWebsite,
        LogicalField::IsHd,
        LogicalField::HasSubtitles,
    ];

    /// Name used as the projection alias.
    pub fn name(&self) -> &'static str {
        match self {
            LogicalField::Title => "title",
            LogicalField::Channel => "channel",
            LogicalField::Topic => "topic",
            LogicalField::Description => "description",
            LogicalField::DateTs => "date_ts",
            LogicalField::Duration => "duration",
            LogicalField::UrlVideo => "url_video",
            LogicalField::UrlWebsite => "url_website",
            LogicalField::IsHd => "is_hd",
            LogicalField::HasSubtitles => "has_subtitles",
        }
    }

    /// Source column names tried in order.
    pub fn candidates(&self) -> &'static [&'static str] {
        match self {
            LogicalField::Title => &["title", "titel", "thema"],
            LogicalField::Channel => &["channel", "sender", "channelid"],
            LogicalField::Topic => &["topic", "thema", "showid"],
            LogicalField::Description => &["description", "beschreibung"],
            LogicalField::DateTs => &["aired", "timestamp", "datum", "date", "zeit", "time"],
            LogicalField::Duration => &["duration", "dauer"],
            LogicalField::UrlVideo => &["url_video", "url", "url_video_hd"],
            LogicalField::UrlWebsite => &["url_website", "website"],
            LogicalField::IsHd => &["url_video_hd", "hd"],
            LogicalField::HasSubtitles => &["url_subtitle", "url_sub", "untertitel"],
        }
    }
}

impl fmt::Display for LogicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolved source column per logical field. Unmapped fields are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnMapping {
    columns: BTreeMap<LogicalField, String>,
}

impl ColumnMapping {
    pub fn get(&self, field: LogicalField) -> Option<&str> {
        self.columns.get(&field).map(String::as_str)
    }

    pub fn is_mapped(&self, field: LogicalField) -> bool {
        self.columns.contains_key(&field)
    }

    pub fn insert(&mut self, field: LogicalField, column: impl Into<String>) {
        self.columns.insert(field, column.into());
    }

    /// Mapped fields in projection order.
    pub fn fields(&self) -> Vec<LogicalField> {
        self.columns.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Check the fields an import cannot do without: a title and at least
    /// one locator.
    pub fn validate(&self) -> Result<(), SchemaError> {
        let mut missing = Vec::new();
        if !self.is_mapped(LogicalField::Title) {
            missing.push(LogicalField::Title.name().to_string());
        }
        if !self.is_mapped(LogicalField::UrlVideo) && !self.is_mapped(LogicalField::UrlWebsite) {
            missing.push(format!(
                "{}/{}",
                LogicalField::UrlVideo.name(),
                LogicalField::UrlWebsite.name()
            ));
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(SchemaError::MissingColumns(missing))
        }
    }
}

impl fmt::Display for ColumnMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .columns
            .iter()
            .map(|(field, column)| format!("{}={}", field, column))
            .collect();
        f.write_str(&parts.join(", "))
    }
}

/// Resolve each logical field to the first candidate present in `columns`
/// (case-insensitive). The source column keeps its original spelling.
pub fn detect_column_mapping(columns: &[ColumnInfo]) -> ColumnMapping {
    let mut mapping = ColumnMapping::default();

    for field in LogicalField::ALL {
        let hit = field.candidates().iter().find_map(|candidate| {
            columns
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case(candidate))
                .map(|c| c.name.clone())
        });
        if let Some(column) = hit {
            mapping.insert(field, column);
        }
    }

    mapping
}

/// `SELECT` projecting only mapped columns, aliased to logical names, in
/// the order of [`ColumnMapping::fields`].
pub fn build_projection(table: &str, mapping: &ColumnMapping) -> String {
    let columns: Vec<String> = mapping
        .columns
        .iter()
        .map(|(field, column)| format!("{} AS {}", quote_identifier(column), field.name()))
        .collect();

    format!("SELECT {} FROM {}", columns.join(", "), quote_identifier(table))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(names: &[&str]) -> Vec<ColumnInfo> {
        names
            .iter()
            .map(|n| ColumnInfo {
                name: n.to_string(),
                declared_type: String::new(),
                not_null: false,
                primary_key: false,
            })
            .collect()
    }

    #[test]
    fn test_detect_mediathekview_layout() {
        let mapping = detect_column_mapping(&columns(&[
            "id",
            "channelid",
            "Thema",
            "Titel",
            "Datum",
            "Dauer",
            "url",
            "url_video_hd",
            "website",
        ]));

        assert_eq!(mapping.get(LogicalField::Title), Some("Titel"));
        assert_eq!(mapping.get(LogicalField::Topic), Some("Thema"));
        assert_eq!(mapping.get(LogicalField::Channel), Some("channelid"));
        assert_eq!(mapping.get(LogicalField::DateTs), Some("Datum"));
        assert_eq!(mapping.get(LogicalField::Duration), Some("Dauer"));
        assert_eq!(mapping.get(LogicalField::UrlVideo), Some("url"));
        assert_eq!(mapping.get(LogicalField::UrlWebsite), Some("website"));
        assert_eq!(mapping.get(LogicalField::IsHd), Some("url_video_hd"));
        assert_eq!(mapping.get(LogicalField::Description), None);
        assert_eq!(mapping.get(LogicalField::HasSubtitles), None);
        assert!(mapping.validate().is_ok());
    }

    #[test]
    fn test_candidate_order_wins() {
        // "thema" is the last title candidate and the second topic candidate.
        let mapping = detect_column_mapping(&columns(&["thema", "url"]));
        assert_eq!(mapping.get(LogicalField::Title), Some("thema"));
        assert_eq!(mapping.get(LogicalField::Topic), Some("thema"));

        let mapping = detect_column_mapping(&columns(&["thema", "title", "url"]));
        assert_eq!(mapping.get(LogicalField::Title), Some("title"));
    }

    #[test]
    fn test_validate_names_missing_title() {
        let mapping = detect_column_mapping(&columns(&["sender", "url"]));
        match mapping.validate() {
            Err(SchemaError::MissingColumns(missing)) => assert_eq!(missing, vec!["title"]),
            other => panic!("unexpected: {:?}", other),
        }

        let mapping = detect_column_mapping(&columns(&["sender"]));
        match mapping.validate() {
            Err(SchemaError::MissingColumns(missing)) => {
                assert_eq!(missing, vec!["title", "url_video/url_website"])
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_build_projection() {
        let mapping = detect_column_mapping(&columns(&["Titel", "url", "sender"]));
        assert_eq!(
            build_projection("filme", &mapping),
            r#"SELECT "Titel" AS title, "sender" AS channel, "url" AS url_video FROM "filme""#
        );
        assert_eq!(
            mapping.fields(),
            vec![LogicalField::Title, LogicalField::Channel, LogicalField::UrlVideo]
        );
        assert_eq!(mapping.to_string(), "title=Titel, channel=sender, url_video=url");
    }
}

//! Types for the cycle state file.

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, IF_MODIFIED_SINCE, IF_NONE_MATCH};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Current layout version of the state file.
pub const STATE_SCHEMA_VERSION: u32 = 1;

/// Errors from reading or writing the state file.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("state file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("state serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Metadata about past update cycles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleState {
    /// When a cycle last completed successfully.
    #[serde(default)]
    pub last_success_at: Option<DateTime<Utc>>,
    /// When a cycle was last started, whatever its outcome.
    #[serde(default)]
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// `ETag` of the last imported snapshot.
    #[serde(default)]
    pub etag: Option<String>,
    /// `Last-Modified` of the last imported snapshot.
    #[serde(default)]
    pub last_modified: Option<String>,
    /// Row count of the primary table in the last imported snapshot.
    #[serde(default)]
    pub row_count: u64,
    /// Newest originating timestamp seen by the validator.
    #[serde(default)]
    pub max_timestamp: Option<i64>,
    /// Label of the snapshot the catalog was built from.
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default = "default_version")]
    pub version: u32,
}

fn default_version() -> u32 {
    STATE_SCHEMA_VERSION
}

impl Default for CycleState {
    fn default() -> Self {
        Self {
            last_success_at: None,
            last_attempt_at: None,
            etag: None,
            last_modified: None,
            row_count: 0,
            max_timestamp: None,
            source: None,
            version: STATE_SCHEMA_VERSION,
        }
    }
}

/// Values recorded when a cycle succeeds.
#[derive(Debug, Clone, Default)]
pub struct CycleSuccess {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub row_count: u64,
    pub max_timestamp: Option<i64>,
    pub source: Option<String>,
}

impl CycleState {
    /// Stamp the start of a cycle.
    pub fn record_attempt(&mut self, at: DateTime<Utc>) {
        self.last_attempt_at = Some(at);
    }

    /// Record a fully successful cycle.
    ///
    /// Validators missing from the new response keep their previous value.
    pub fn record_success(&mut self, at: DateTime<Utc>, success: CycleSuccess) {
        self.last_success_at = Some(at);
        self.last_attempt_at = Some(at);

        if success.etag.is_some() {
            self.etag = success.etag;
        }
        if success.last_modified.is_some() {
            self.last_modified = success.last_modified;
        }
        self.row_count = success.row_count;
        self.max_timestamp = success.max_timestamp;
        if success.source.is_some() {
            self.source = success.source;
        }
    }

    /// Request preconditions derived from the stored validators.
    ///
    /// Values that are not valid header text are skipped.
    pub fn conditional_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if let Some(value) = self
            .etag
            .as_deref()
            .and_then(|v| HeaderValue::from_str(v).ok())
        {
            headers.insert(IF_NONE_MATCH, value);
        }

        if let Some(value) = self
            .last_modified
            .as_deref()
            .and_then(|v| HeaderValue::from_str(v).ok())
        {
            headers.insert(IF_MODIFIED_SINCE, value);
        }

        headers
    }

    /// Whether a new cycle is due.
    pub fn needs_refresh(&self, max_age_secs: u64) -> bool {
        self.needs_refresh_at(max_age_secs, Utc::now())
    }

    /// `needs_refresh` against an explicit clock.
    pub fn needs_refresh_at(&self, max_age_secs: u64, now: DateTime<Utc>) -> bool {
        match self.last_success_at {
            None => true,
            Some(last) => {
                let age = now.signed_duration_since(last).num_seconds();
                age > i64::try_from(max_age_secs).unwrap_or(i64::MAX)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_default_state() {
        let state = CycleState::default();
        assert!(state.last_success_at.is_none());
        assert_eq!(state.row_count, 0);
        assert_eq!(state.version, STATE_SCHEMA_VERSION);
    }

    #[test]
    fn test_conditional_headers_empty_without_tokens() {
        let state = CycleState::default();
        assert!(state.conditional_headers().is_empty());
    }

    #[test]
    fn test_conditional_headers_from_tokens() {
        let state = CycleState {
            etag: Some("\"abc\"".to_string()),
            last_modified: Some("Wed, 21 Oct 2015 07:28:00 GMT".to_string()),
            ..Default::default()
        };

        let headers = state.conditional_headers();
        assert_eq!(headers.get(IF_NONE_MATCH).unwrap(), "\"abc\"");
        assert_eq!(
            headers.get(IF_MODIFIED_SINCE).unwrap(),
            "Wed, 21 Oct 2015 07:28:00 GMT"
        );
    }

    #[test]
    fn test_needs_refresh() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let mut state = CycleState::default();
        assert!(state.needs_refresh_at(3600, now));

        state.last_success_at = Some(now - Duration::minutes(30));
        assert!(!state.needs_refresh_at(3600, now));

        state.last_success_at = Some(now - Duration::hours(2));
        assert!(state.needs_refresh_at(3600, now));
    }

    #[test]
    fn test_record_success_keeps_missing_validators() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut state = CycleState {
            etag: Some("\"old\"".to_string()),
            last_modified: Some("old-date".to_string()),
            ..Default::default()
        };

        state.record_success(
            start,
            CycleSuccess {
                etag: Some("\"new\"".to_string()),
                last_modified: None,
                row_count: 42,
                max_timestamp: Some(1_700_000_000),
                source: Some("filmliste-v2.db".to_string()),
            },
        );

        assert_eq!(state.etag.as_deref(), Some("\"new\""));
        assert_eq!(state.last_modified.as_deref(), Some("old-date"));
        assert_eq!(state.row_count, 42);
        assert_eq!(state.last_success_at, Some(start));
        assert_eq!(state.last_attempt_at, Some(start));
    }

    #[test]
    fn test_state_json_uses_camel_case() {
        let state = CycleState {
            row_count: 5,
            ..Default::default()
        };
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"rowCount\":5"));
        assert!(json.contains("\"lastSuccessAt\":null"));
    }
}

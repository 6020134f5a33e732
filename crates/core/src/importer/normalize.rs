//! Value normalization for loosely typed snapshot columns.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rusqlite::types::Value;

/// 2000-01-01T00:00:00Z. Earlier timestamps are treated as bogus.
pub const MIN_PLAUSIBLE_TS: i64 = 946_684_800;

/// How far into the future a timestamp may lie.
pub const MAX_FUTURE_SECS: i64 = 365 * 24 * 60 * 60;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d.%m.%Y"];

/// Keep `ts` only if it lies between 2000 and one year after `now`.
pub fn plausible_timestamp(ts: i64, now: i64) -> Option<i64> {
    (MIN_PLAUSIBLE_TS..=now.saturating_add(MAX_FUTURE_SECS))
        .contains(&ts)
        .then_some(ts)
}

/// Parse a date or timestamp value into epoch seconds. Text without an
/// offset is read as UTC.
pub fn parse_timestamp(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(i) => Some(*i),
        Value::Real(f) if f.is_finite() => Some(f.trunc() as i64),
        Value::Text(s) => parse_timestamp_str(s),
        _ => None,
    }
}

fn parse_timestamp_str(s: &str) -> Option<i64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(i) = s.parse::<i64>() {
        return Some(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return f.is_finite().then(|| f.trunc() as i64);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.and_utc().timestamp());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc().timestamp());
        }
    }
    None
}

/// Parse and range-check a timestamp; anything unusable becomes `None`.
pub fn normalize_timestamp(value: &Value, now: i64) -> Option<i64> {
    parse_timestamp(value).and_then(|ts| plausible_timestamp(ts, now))
}

/// Duration in seconds from an integer or an `HH:MM:SS` / `MM:SS` string.
pub fn parse_duration(value: &Value) -> Option<i64> {
    let secs = match value {
        Value::Integer(i) => Some(*i),
        Value::Real(f) if f.is_finite() => Some(f.round() as i64),
        Value::Text(s) => parse_duration_str(s.trim()),
        _ => None,
    }?;
    (secs > 0).then_some(secs)
}

fn parse_duration_str(s: &str) -> Option<i64> {
    if let Ok(i) = s.parse::<i64>() {
        return Some(i);
    }

    let parts: Vec<&str> = s.split(':').collect();
    if !(2..=3).contains(&parts.len()) {
        return None;
    }
    let mut secs: i64 = 0;
    for part in parts {
        let n: i64 = part.trim().parse().ok()?;
        if n < 0 {
            return None;
        }
        secs = secs.checked_mul(60)?.checked_add(n)?;
    }
    Some(secs)
}

/// Trimmed, non-empty text. Numbers are rendered as text.
pub fn text(value: &Value) -> Option<String> {
    match value {
        Value::Text(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(f) => Some(f.to_string()),
        _ => None,
    }
}

/// Whether a flag-like column is set (non-zero number, non-empty text).
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Integer(i) => *i != 0,
        Value::Real(f) => *f != 0.0,
        Value::Text(s) => !s.trim().is_empty(),
        Value::Blob(b) => !b.is_empty(),
    }
}

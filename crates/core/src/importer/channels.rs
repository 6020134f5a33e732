//! Channel names and logos.

use rusqlite::types::Value;

const CHANNELS: &[(i64, &str)] = &[
    (1, "ARD"),
    (2, "ZDF"),
    (3, "arte"),
    (4, "3sat"),
    (5, "BR"),
    (6, "HR"),
    (7, "MDR"),
    (8, "NDR"),
    (9, "Radio Bremen TV"),
    (10, "RBB"),
    (11, "SR"),
    (12, "SWR"),
    (13, "WDR"),
    (14, "KIKA"),
    (15, "Phoenix"),
    (16, "tagesschau24"),
    (17, "ARD-alpha"),
    (18, "ONE"),
    (19, "ZDFneo"),
    (20, "ZDFinfo"),
    (21, "Funk"),
    (22, "DW (Deutsch)"),
    (23, "ORF"),
    (24, "SRF"),
    (25, "rbtv"),
    (26, "ServusTV"),
    (27, "KabelEins"),
    (28, "Sport1"),
    (29, "Eurosport"),
    (30, "DW (English)"),
];

const LOGO_BASE_URL: &str = "https://raw.githubusercontent.com/jnk22/kodinerds-iptv/master/logos/tv";

const LOGOS: &[(&str, &str)] = &[
    ("ARD", "ard.png"),
    ("Das Erste", "ard.png"),
    ("tagesschau24", "tagesschau24.png"),
    ("ARD-alpha", "ardalpha.png"),
    ("ONE", "one.png"),
    ("BR", "br.png"),
    ("HR", "hr.png"),
    ("MDR", "mdr.png"),
    ("NDR", "ndr.png"),
    ("RBB", "rbb.png"),
    ("SR", "sr.png"),
    ("SWR", "swr.png"),
    ("WDR", "wdr.png"),
    ("ZDF", "zdf.png"),
    ("ZDFneo", "zdfneo.png"),
    ("ZDFinfo", "zdfinfo.png"),
    ("phoenix", "phoenix.png"),
    ("arte", "arte.png"),
    ("3sat", "3sat.png"),
    ("KiKA", "kika.png"),
];

/// Name of a numeric upstream channel id.
pub fn channel_name(id: i64) -> Option<&'static str> {
    CHANNELS
        .iter()
        .find(|(known, _)| *known == id)
        .map(|(_, name)| *name)
}

fn channel_label(id: i64) -> String {
    channel_name(id)
        .map(String::from)
        .unwrap_or_else(|| format!("Channel {}", id))
}

/// Resolve a channel column value. Numeric ids (as numbers or digit
/// strings) go through the id table; other text is used as-is.
pub fn resolve_channel(value: &Value) -> Option<String> {
    match value {
        Value::Integer(id) => Some(channel_label(*id)),
        Value::Real(f) if f.fract() == 0.0 && f.is_finite() => Some(channel_label(*f as i64)),
        Value::Text(s) => {
            let s = s.trim();
            if s.is_empty() {
                None
            } else if let Ok(id) = s.parse::<i64>() {
                Some(channel_label(id))
            } else {
                Some(s.to_string())
            }
        }
        _ => None,
    }
}

/// Logo URL for a channel: exact match first, then case-insensitive.
pub fn poster_for_channel(channel: &str) -> Option<String> {
    let file = LOGOS
        .iter()
        .find(|(name, _)| *name == channel)
        .or_else(|| LOGOS.iter().find(|(name, _)| name.eq_ignore_ascii_case(channel)))
        .map(|(_, file)| *file)?;
    Some(format!("{}/{}", LOGO_BASE_URL, file))
}

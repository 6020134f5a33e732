//! Content-addressed catalog identities.
//!
//! An identity is `de-mvw:` followed by the hex SHA-256 of
//! `channel|locator|title|timestamp`, where the locator is the website URL
//! when present and the video URL otherwise, and a missing timestamp is the
//! empty string. The same logical item therefore keeps its identity across
//! imports and process restarts.

use sha2::{Digest, Sha256};

/// Prefix of every catalog identity.
pub const ID_PREFIX: &str = "de-mvw:";

const DIGEST_HEX_LEN: usize = 64;

/// Compute the identity of an item from its defining fields.
pub fn compute_item_id(
    channel: &str,
    url_website: Option<&str>,
    url_video: Option<&str>,
    title: &str,
    timestamp: Option<i64>,
) -> String {
    let locator = non_blank(url_website).or(non_blank(url_video)).unwrap_or("");
    let ts = timestamp.map(|t| t.to_string()).unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(channel.as_bytes());
    hasher.update(b"|");
    hasher.update(locator.as_bytes());
    hasher.update(b"|");
    hasher.update(title.as_bytes());
    hasher.update(b"|");
    hasher.update(ts.as_bytes());

    format!("{}{:x}", ID_PREFIX, hasher.finalize())
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Extract the digest part of an identity, if the identity is well-formed.
pub fn parse_item_id(id: &str) -> Option<&str> {
    let digest = id.strip_prefix(ID_PREFIX)?;
    let well_formed = digest.len() == DIGEST_HEX_LEN
        && digest.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase());
    well_formed.then_some(digest)
}

pub fn is_valid_item_id(id: &str) -> bool {
    parse_item_id(id).is_some()
}

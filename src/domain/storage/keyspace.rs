//! Key-space layout
//!
//! String keys in colon-delimited namespaces:
//!
//! - `key:<id>` — the API key record
//! - `lookup:<plaintext>` — plaintext credential to key id
//! - `hmac:<plaintext>` — plaintext credential to signature over the key id
//! - `keyindex:<20-digit-zero-padded-ms-timestamp>_<id>` — creation-time index
//! - `rotation:<originalId>` — in-flight rotation record

use chrono::{DateTime, Utc};

use crate::domain::api_key::ApiKeyId;

pub const RECORD_PREFIX: &str = "key:";
pub const LOOKUP_PREFIX: &str = "lookup:";
pub const HMAC_PREFIX: &str = "hmac:";
pub const TIME_INDEX_PREFIX: &str = "keyindex:";
pub const ROTATION_PREFIX: &str = "rotation:";

pub fn record_key(id: &ApiKeyId) -> String {
    format!("{RECORD_PREFIX}{id}")
}

pub fn lookup_key(plaintext: &str) -> String {
    format!("{LOOKUP_PREFIX}{plaintext}")
}

pub fn hmac_key(plaintext: &str) -> String {
    format!("{HMAC_PREFIX}{plaintext}")
}

pub fn rotation_key(original_id: &ApiKeyId) -> String {
    format!("{ROTATION_PREFIX}{original_id}")
}

/// Time-index key: zero-padded millisecond timestamp so lexicographic order
/// matches creation order, suffixed with the id for uniqueness
pub fn time_index_key(created_at: DateTime<Utc>, id: &ApiKeyId) -> String {
    time_index_key_from_millis(created_at.timestamp_millis(), &id.to_string())
}

pub fn time_index_key_from_millis(timestamp_millis: i64, id: &str) -> String {
    format!("{TIME_INDEX_PREFIX}{timestamp_millis:020}_{id}")
}

/// Split a time-index key back into its (timestamp, id) parts
pub fn parse_time_index_key(key: &str) -> Option<(i64, &str)> {
    let rest = key.strip_prefix(TIME_INDEX_PREFIX)?;
    let (timestamp, id) = rest.split_once('_')?;
    let timestamp = timestamp.parse::<i64>().ok()?;

    if id.is_empty() {
        return None;
    }

    Some((timestamp, id))
}

/// Plaintext half of a lookup-index key
pub fn plaintext_from_lookup_key(key: &str) -> Option<&str> {
    key.strip_prefix(LOOKUP_PREFIX)
}

/// Plaintext half of an HMAC-index key
pub fn plaintext_from_hmac_key(key: &str) -> Option<&str> {
    key.strip_prefix(HMAC_PREFIX)
}

//! Pagination cursor codec
//!
//! Cursors are opaque to callers: base64 of a small JSON object identifying
//! the last item of the previous page. Anything that fails to decode is
//! treated as "no cursor" rather than an error, for forward compatibility.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

/// Resume point for cursor-based listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// Id of the last item on the previous page
    pub id: String,
    /// Creation timestamp of that item, epoch milliseconds
    pub ts: i64,
}

impl Cursor {
    pub fn new(id: impl Into<String>, ts: i64) -> Self {
        Self { id: id.into(), ts }
    }

    /// Encode into the opaque string handed to callers
    pub fn encode(&self) -> String {
        // Serializing two plain fields cannot fail
        let json = serde_json::to_string(self).expect("cursor serialization cannot fail");
        STANDARD.encode(json)
    }

    /// Decode an opaque cursor; any malformed input is treated as absent
    pub fn decode(raw: &str) -> Option<Self> {
        let bytes = STANDARD.decode(raw.trim()).ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}

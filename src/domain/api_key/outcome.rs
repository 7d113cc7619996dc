//! Structured operation results
//!
//! Credential validation is a hot path invoked per request, so its outcome is
//! always a value, never an error: callers map these to transport responses
//! without exception handling. Mutation results carry the material callers
//! need for the same mapping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::{ApiKey, ApiKeyId};

/// Warning attached to a successful validation of a rotated key inside its
/// grace period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationWarning {
    pub rotated_to: ApiKeyId,
    pub grace_period_ends: DateTime<Utc>,
}

/// Outcome of validating a presented credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ValidationOutcome {
    /// Credential is valid; includes a rotation warning during a grace period
    Valid {
        key_id: ApiKeyId,
        owner: String,
        scopes: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        rotation: Option<RotationWarning>,
    },
    /// Input is empty or does not carry the configured prefix
    InvalidFormat,
    /// Unknown credential; also covers stale or removed records so callers
    /// cannot distinguish "never existed" from "deleted"
    InvalidKey,
    /// Key was revoked (explicitly or via expiry in an earlier call)
    Revoked,
    /// Key expired and was auto-revoked by this call
    Expired,
    /// Key was rotated and its grace period is over
    RotationExpired {
        #[serde(skip_serializing_if = "Option::is_none")]
        rotated_to: Option<ApiKeyId>,
    },
    /// Key is valid but does not cover the required scopes
    InsufficientScope {
        required: Vec<String>,
        held: Vec<String>,
    },
    /// Lookup index signature check failed; storage corruption or tampering
    SignatureMismatch,
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }
}

/// Result of creating a new API key
#[derive(Debug, Clone)]
pub struct CreatedKey {
    /// The key record (envelope stripped)
    pub api_key: ApiKey,
    /// The full credential, surfaced exactly once
    pub plaintext: String,
}

/// Result of revoking a key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationOutcome {
    pub key_id: ApiKeyId,
    /// True when the key was already revoked and this call changed nothing
    pub already_revoked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<DateTime<Utc>>,
    /// Successor revoked alongside a rotated key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cascaded: Option<ApiKeyId>,
    pub message: String,
}

/// Summary of the deprecated key in a rotation result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeprecatedKey {
    pub key_id: ApiKeyId,
    pub name: String,
    pub rotated_at: DateTime<Utc>,
    pub grace_period_ends: DateTime<Utc>,
}

/// Result of rotating a key
#[derive(Debug, Clone)]
pub struct RotationOutcome {
    pub deprecated: DeprecatedKey,
    /// The successor key record (envelope stripped)
    pub new_key: ApiKey,
    /// The successor credential, surfaced exactly once
    pub plaintext: String,
}

/// One page of keys from cursor-based listing
#[derive(Debug, Clone)]
pub struct KeyPage {
    pub items: Vec<ApiKey>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

/// Counts from one reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    /// Expired-but-active keys revoked
    pub revoked_count: usize,
    /// Rotation records retired after their grace period
    pub rotation_count: usize,
    /// Orphaned lookup/HMAC index entries deleted
    pub stale_count: usize,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid() {
        let outcome = ValidationOutcome::Valid {
            key_id: ApiKeyId::generate(),
            owner: "team".to_string(),
            scopes: vec!["read:data".to_string()],
            rotation: None,
        };

        assert!(outcome.is_valid());
        assert!(!ValidationOutcome::InvalidKey.is_valid());
        assert!(!ValidationOutcome::Revoked.is_valid());
    }

    #[test]
    fn test_outcome_serializes_with_tag() {
        let json = serde_json::to_string(&ValidationOutcome::InvalidFormat).unwrap();
        assert!(json.contains("\"result\":\"invalid_format\""));

        let json = serde_json::to_string(&ValidationOutcome::RotationExpired {
            rotated_to: None,
        })
        .unwrap();
        assert!(json.contains("rotation_expired"));
    }
}

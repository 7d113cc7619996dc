//! API Key entity and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::validation::ApiKeyValidationError;

/// Schema version written into new key records and envelopes
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// API Key identifier - a random 128-bit UUID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiKeyId(Uuid);

impl ApiKeyId {
    /// Generate a fresh random identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an identifier from its canonical string form
    pub fn parse(raw: &str) -> Result<Self, ApiKeyValidationError> {
        Uuid::parse_str(raw.trim())
            .map(Self)
            .map_err(|_| ApiKeyValidationError::MalformedId)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl std::fmt::Display for ApiKeyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of an API key
///
/// `Revoked` and `Rotated` are terminal: a rotated key spawns a fresh active
/// successor, but the original never transitions again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ApiKeyStatus {
    /// Key is active and can be used
    #[default]
    Active,
    /// Key has been revoked (explicitly or via expiry) and cannot be used
    Revoked,
    /// Key was rotated; its successor carries the traffic after the grace period
    Rotated,
}

impl ApiKeyStatus {
    /// Check if the key is usable
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Active)
    }
}

/// Versioned encrypted envelope holding the credential at rest
///
/// The only persisted representation of the plaintext credential. Ciphertext
/// and IV are base64; `schema_version` gates decryption of future formats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedSecret {
    pub ciphertext: String,
    pub iv: String,
    pub schema_version: u32,
}

/// API Key entity
///
/// The plaintext credential is never a field here; it is returned to the
/// caller exactly once at creation or rotation time and otherwise only exists
/// inside `encrypted_secret`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    /// Unique identifier for the key
    id: ApiKeyId,
    /// Display name for the key
    name: String,
    /// Owner of the key (team, service, or user label)
    owner: String,
    /// Scopes granted to this key, case-preserved
    scopes: Vec<String>,
    /// Current status of the key
    status: ApiKeyStatus,
    /// Encrypted credential envelope; stripped from all outward-facing copies
    #[serde(skip_serializing_if = "Option::is_none")]
    encrypted_secret: Option<EncryptedSecret>,
    /// Creation timestamp
    created_at: DateTime<Utc>,
    /// Expiration timestamp (None = never expires)
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
    /// Last time the key passed validation
    #[serde(skip_serializing_if = "Option::is_none")]
    last_used_at: Option<DateTime<Utc>>,
    /// When the key was revoked
    #[serde(skip_serializing_if = "Option::is_none")]
    revoked_at: Option<DateTime<Utc>>,
    /// When the key was rotated
    #[serde(skip_serializing_if = "Option::is_none")]
    rotated_at: Option<DateTime<Utc>>,
    /// Successor key, set when status is `Rotated`
    #[serde(skip_serializing_if = "Option::is_none")]
    rotated_to: Option<ApiKeyId>,
    /// Predecessor key, set on keys spawned by rotation
    #[serde(skip_serializing_if = "Option::is_none")]
    rotated_from: Option<ApiKeyId>,
    /// Record schema version, for forward-compatible changes
    schema_version: u32,
}

impl ApiKey {
    /// Create a new active API key
    pub fn new(
        id: ApiKeyId,
        name: impl Into<String>,
        owner: impl Into<String>,
        scopes: Vec<String>,
        encrypted_secret: EncryptedSecret,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            owner: owner.into(),
            scopes,
            status: ApiKeyStatus::Active,
            encrypted_secret: Some(encrypted_secret),
            created_at: Utc::now(),
            expires_at: None,
            last_used_at: None,
            revoked_at: None,
            rotated_at: None,
            rotated_to: None,
            rotated_from: None,
            schema_version: CURRENT_SCHEMA_VERSION,
        }
    }

    /// Set expiration
    pub fn with_expiration(mut self, expires_at: Option<DateTime<Utc>>) -> Self {
        self.expires_at = expires_at;
        self
    }

    /// Mark this key as the successor of a rotated key
    pub fn with_rotated_from(mut self, original: ApiKeyId) -> Self {
        self.rotated_from = Some(original);
        self
    }

    // Getters

    pub fn id(&self) -> &ApiKeyId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    pub fn status(&self) -> ApiKeyStatus {
        self.status
    }

    pub fn encrypted_secret(&self) -> Option<&EncryptedSecret> {
        self.encrypted_secret.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn last_used_at(&self) -> Option<DateTime<Utc>> {
        self.last_used_at
    }

    pub fn revoked_at(&self) -> Option<DateTime<Utc>> {
        self.revoked_at
    }

    pub fn rotated_at(&self) -> Option<DateTime<Utc>> {
        self.rotated_at
    }

    pub fn rotated_to(&self) -> Option<&ApiKeyId> {
        self.rotated_to.as_ref()
    }

    pub fn rotated_from(&self) -> Option<&ApiKeyId> {
        self.rotated_from.as_ref()
    }

    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    // Status checks

    /// Check if the key has passed its expiration timestamp
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at < now,
            None => false,
        }
    }

    /// Check if the key is active and not past expiry
    pub fn is_valid(&self) -> bool {
        self.status.is_usable() && !self.is_expired_at(Utc::now())
    }

    // Mutators

    /// Revoke the key
    pub fn revoke(&mut self, at: DateTime<Utc>) {
        self.status = ApiKeyStatus::Revoked;
        self.revoked_at = Some(at);
    }

    /// Mark the key as rotated to a successor
    pub fn mark_rotated(&mut self, to: ApiKeyId, at: DateTime<Utc>) {
        self.status = ApiKeyStatus::Rotated;
        self.rotated_to = Some(to);
        self.rotated_at = Some(at);
    }

    /// Record key usage
    pub fn record_usage(&mut self, at: DateTime<Utc>) {
        self.last_used_at = Some(at);
    }

    /// Copy of the key with the encrypted envelope stripped
    ///
    /// Everything returned to callers goes through this; the envelope never
    /// leaves the engine.
    pub fn sanitized(&self) -> Self {
        let mut copy = self.clone();
        copy.encrypted_secret = None;
        copy
    }
}

//! Rotation record entity
//!
//! One record exists per in-flight rotation, keyed by the *original* key id.
//! Reconciliation deletes it once the grace period elapses; the original key
//! stays `Rotated` permanently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::ApiKeyId;

/// Status of a rotation record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RotationStatus {
    /// Grace period has not elapsed; the old credential still validates
    #[default]
    Active,
}

/// In-flight rotation linking an original key to its successor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationRecord {
    original_key_id: ApiKeyId,
    new_key_id: ApiKeyId,
    rotated_at: DateTime<Utc>,
    grace_period_ends: DateTime<Utc>,
    status: RotationStatus,
}

impl RotationRecord {
    pub fn new(
        original_key_id: ApiKeyId,
        new_key_id: ApiKeyId,
        rotated_at: DateTime<Utc>,
        grace_period_ends: DateTime<Utc>,
    ) -> Self {
        Self {
            original_key_id,
            new_key_id,
            rotated_at,
            grace_period_ends,
            status: RotationStatus::Active,
        }
    }

    pub fn original_key_id(&self) -> &ApiKeyId {
        &self.original_key_id
    }

    pub fn new_key_id(&self) -> &ApiKeyId {
        &self.new_key_id
    }

    pub fn rotated_at(&self) -> DateTime<Utc> {
        self.rotated_at
    }

    pub fn grace_period_ends(&self) -> DateTime<Utc> {
        self.grace_period_ends
    }

    pub fn status(&self) -> RotationStatus {
        self.status
    }

    /// Whether the grace period has elapsed at `now`
    pub fn grace_elapsed_at(&self, now: DateTime<Utc>) -> bool {
        now > self.grace_period_ends
    }

    /// Rotation summary attached to `get_key` responses
    pub fn info(&self) -> RotationInfo {
        RotationInfo {
            new_key_id: self.new_key_id,
            rotated_at: self.rotated_at,
            grace_period_ends: self.grace_period_ends,
        }
    }
}

/// Rotation details surfaced alongside a rotated key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationInfo {
    pub new_key_id: ApiKeyId,
    pub rotated_at: DateTime<Utc>,
    pub grace_period_ends: DateTime<Utc>,
}

//! API key lifecycle engine
//!
//! Owns every mutation of the key namespaces. Creation, rotation, and
//! revocation batch their index writes through [`KeyValueStore::commit`] so
//! the four indices never disagree after a partial failure; the two
//! single-key writes that skip batching (the lazy expiry flip and the
//! `last_used_at` touch) are idempotent and self-correcting on the next read.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::domain::api_key::{
    missing_scopes, validate_key_input, ApiKey, ApiKeyId, ApiKeyStatus, CreatedKey, DeprecatedKey,
    KeyLimits, KeyPage, RevocationOutcome, RotationInfo, RotationOutcome, RotationRecord,
    RotationWarning, ValidatedKeyInput, ValidationOutcome,
};
use crate::domain::storage::{keyspace, KeyValueStore, KvEntry, ListOptions, WriteBatch};
use crate::domain::{CryptoProvider, DomainError};

use super::cursor::Cursor;

/// Grace period applied to rotations that do not specify one
pub const DEFAULT_GRACE_PERIOD_DAYS: i64 = 30;

/// Upper bound on the rotation grace period; larger requests are clamped
pub const MAX_GRACE_PERIOD_DAYS: i64 = 90;

/// Extra commit attempts after a revocation commit fails with a storage error
const REVOKE_RETRY_ATTEMPTS: u32 = 2;

/// Base backoff between revocation commit attempts, multiplied by the attempt
const REVOKE_RETRY_BACKOFF_MS: u64 = 200;

/// Input for creating a new API key
#[derive(Debug, Clone)]
pub struct CreateKeyRequest {
    pub name: String,
    pub owner: String,
    pub scopes: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Overrides applied to the successor key during rotation
///
/// Unset fields are inherited from the key being rotated; the owner always
/// carries over.
#[derive(Debug, Clone, Default)]
pub struct RotateKeyOptions {
    pub grace_period_days: Option<i64>,
    pub name: Option<String>,
    pub scopes: Option<Vec<String>>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// A key record together with its in-flight rotation, if any
#[derive(Debug, Clone)]
pub struct KeyDetails {
    pub api_key: ApiKey,
    pub rotation: Option<RotationInfo>,
}

/// Serialize a record for storage
pub(super) fn encode<T: Serialize>(value: &T) -> Result<String, DomainError> {
    serde_json::to_string(value).map_err(|e| DomainError::serialization(e.to_string()))
}

/// Deserialize a stored record
pub(super) fn decode<T: DeserializeOwned>(raw: &str) -> Result<T, DomainError> {
    serde_json::from_str(raw).map_err(|e| DomainError::serialization(e.to_string()))
}

/// API key lifecycle engine over a [`KeyValueStore`] and a [`CryptoProvider`]
#[derive(Debug)]
pub struct ApiKeyService<S: KeyValueStore + 'static, C: CryptoProvider + ?Sized + 'static> {
    store: Arc<S>,
    crypto: Arc<C>,
    limits: KeyLimits,
    default_expiration_days: Option<i64>,
}

impl<S: KeyValueStore + 'static, C: CryptoProvider + ?Sized + 'static> ApiKeyService<S, C> {
    pub fn new(store: Arc<S>, crypto: Arc<C>) -> Self {
        Self {
            store,
            crypto,
            limits: KeyLimits::default(),
            default_expiration_days: None,
        }
    }

    pub fn with_limits(mut self, limits: KeyLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Lifetime applied to new keys whose request carries no expiry
    pub fn with_default_expiration_days(mut self, days: Option<i64>) -> Self {
        self.default_expiration_days = days;
        self
    }

    pub(super) fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Create a new API key
    ///
    /// The plaintext credential in the returned [`CreatedKey`] is surfaced
    /// here and never again; only its encrypted envelope is persisted.
    pub async fn create_key(&self, request: CreateKeyRequest) -> Result<CreatedKey, DomainError> {
        let input =
            validate_key_input(&request.name, &request.owner, &request.scopes, &self.limits)?;

        info!(
            "Creating API key: name={}, owner={}",
            input.name, input.owner
        );

        let expires_at = request.expires_at.or_else(|| {
            self.default_expiration_days
                .map(|days| Utc::now() + Duration::days(days))
        });

        let created = self.persist_new_key(input, expires_at, None).await?;

        info!("Created API key: id={}", created.api_key.id());

        Ok(created)
    }

    /// Validate a presented credential against required scopes
    ///
    /// Every recognizable condition is an outcome, not an error; only storage
    /// and serialization failures surface as `Err`.
    pub async fn validate_key(
        &self,
        presented: &str,
        required_scopes: &[String],
    ) -> Result<ValidationOutcome, DomainError> {
        let presented = presented.trim();

        if presented.is_empty() || !presented.starts_with(self.crypto.credential_prefix()) {
            return Ok(ValidationOutcome::InvalidFormat);
        }

        let Some(raw_id) = self.store.get(&keyspace::lookup_key(presented)).await? else {
            return Ok(ValidationOutcome::InvalidKey);
        };

        let Ok(key_id) = ApiKeyId::parse(&raw_id) else {
            warn!("Lookup entry holds a malformed key id; removing it");
            self.heal_stale_lookup(presented).await;
            return Ok(ValidationOutcome::InvalidKey);
        };

        // The signature index is advisory: a missing entry passes, a present
        // entry that fails verification is a hard stop
        if let Some(signature) = self.store.get(&keyspace::hmac_key(presented)).await? {
            if !self.crypto.verify(&key_id, &signature) {
                error!("API key lookup signature mismatch: id={}", key_id);
                return Ok(ValidationOutcome::SignatureMismatch);
            }
        }

        let Some(mut key) = self.load_key(&key_id).await? else {
            warn!(
                "Lookup entry points at a missing record: id={}; removing it",
                key_id
            );
            self.heal_stale_lookup(presented).await;
            return Ok(ValidationOutcome::InvalidKey);
        };

        let now = Utc::now();
        let mut rotation = None;

        match key.status() {
            ApiKeyStatus::Revoked => return Ok(ValidationOutcome::Revoked),
            ApiKeyStatus::Rotated => match self.load_rotation(&key_id).await? {
                Some(record) if !record.grace_elapsed_at(now) => {
                    rotation = Some(RotationWarning {
                        rotated_to: *record.new_key_id(),
                        grace_period_ends: record.grace_period_ends(),
                    });
                }
                _ => {
                    return Ok(ValidationOutcome::RotationExpired {
                        rotated_to: key.rotated_to().copied(),
                    });
                }
            },
            ApiKeyStatus::Active => {
                if key.is_expired_at(now) {
                    key.revoke(now);
                    let encoded = encode(&key)?;

                    // Idempotent flip; the next validation repeats it if this
                    // write is lost
                    if let Err(e) = self.store.put(&keyspace::record_key(&key_id), &encoded).await
                    {
                        warn!(
                            "Failed to persist expiry revocation: id={}, error={}",
                            key_id, e
                        );
                    }

                    info!("API key expired and was auto-revoked: id={}", key_id);
                    return Ok(ValidationOutcome::Expired);
                }
            }
        }

        let missing = missing_scopes(key.scopes(), required_scopes);

        if !missing.is_empty() {
            debug!(
                "API key lacks required scopes: id={}, missing={:?}",
                key_id, missing
            );
            return Ok(ValidationOutcome::InsufficientScope {
                required: required_scopes.to_vec(),
                held: key.scopes().to_vec(),
            });
        }

        self.touch_last_used(key_id);

        Ok(ValidationOutcome::Valid {
            key_id,
            owner: key.owner().to_string(),
            scopes: key.scopes().to_vec(),
            rotation,
        })
    }

    /// Revoke a key, cascading to the active successor of a rotated key
    ///
    /// Revoking an already-revoked key is a no-op reported as such. The
    /// commit is retried on transient storage failures.
    pub async fn revoke_key(
        &self,
        id: &str,
        reason: Option<&str>,
    ) -> Result<RevocationOutcome, DomainError> {
        let key_id = ApiKeyId::parse(id)?;
        let mut key = self
            .load_key(&key_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("API key '{key_id}' not found")))?;

        if key.status() == ApiKeyStatus::Revoked {
            debug!("API key already revoked: id={}", key_id);
            return Ok(RevocationOutcome {
                key_id,
                already_revoked: true,
                revoked_at: key.revoked_at(),
                cascaded: None,
                message: format!("API key '{key_id}' was already revoked"),
            });
        }

        let now = Utc::now();
        let was_rotated = key.status() == ApiKeyStatus::Rotated;
        key.revoke(now);

        let mut batch = WriteBatch::new();
        batch.put(keyspace::record_key(&key_id), encode(&key)?);

        let mut cascaded = None;

        if was_rotated {
            if let Some(record) = self.load_rotation(&key_id).await? {
                let successor_id = *record.new_key_id();

                if let Some(mut successor) = self.load_key(&successor_id).await? {
                    if successor.status() == ApiKeyStatus::Active {
                        successor.revoke(now);
                        batch.put(keyspace::record_key(&successor_id), encode(&successor)?);
                        cascaded = Some(successor_id);
                    }
                }

                batch.delete(keyspace::rotation_key(&key_id));
            }
        }

        self.commit_with_retry(batch).await?;

        info!(
            "Revoked API key: id={}, cascaded={:?}, reason={}",
            key_id,
            cascaded,
            reason.unwrap_or("not given")
        );

        let mut message = match cascaded {
            Some(successor) => {
                format!("API key '{key_id}' revoked; successor '{successor}' revoked with it")
            }
            None => format!("API key '{key_id}' revoked"),
        };

        if let Some(reason) = reason {
            message.push_str(&format!(" ({reason})"));
        }

        Ok(RevocationOutcome {
            key_id,
            already_revoked: false,
            revoked_at: Some(now),
            cascaded,
            message,
        })
    }

    /// Rotate a key: issue a successor and keep the old credential valid for
    /// a grace period
    ///
    /// The successor is committed before the original is marked rotated, so a
    /// failure between the two commits leaves the original active and the
    /// successor as a plain extra key rather than breaking either credential.
    pub async fn rotate_key(
        &self,
        id: &str,
        options: RotateKeyOptions,
    ) -> Result<RotationOutcome, DomainError> {
        let key_id = ApiKeyId::parse(id)?;
        let mut original = self
            .load_key(&key_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("API key '{key_id}' not found")))?;

        // An in-flight rotation wins over the status check so the caller
        // learns the successor id
        if let Some(record) = self.load_rotation(&key_id).await? {
            return Err(DomainError::already_rotating(record.new_key_id().to_string()));
        }

        if !original.status().is_usable() {
            return Err(DomainError::invalid_state(format!(
                "API key '{key_id}' cannot be rotated from status {:?}",
                original.status()
            )));
        }

        let now = Utc::now();

        if original.is_expired_at(now) {
            return Err(DomainError::invalid_state(format!(
                "API key '{key_id}' has expired and cannot be rotated"
            )));
        }

        let grace_days = options
            .grace_period_days
            .unwrap_or(DEFAULT_GRACE_PERIOD_DAYS)
            .clamp(0, MAX_GRACE_PERIOD_DAYS);

        let name = options.name.unwrap_or_else(|| original.name().to_string());
        let scopes = options.scopes.unwrap_or_else(|| original.scopes().to_vec());
        let expires_at = options.expires_at.or(original.expires_at());
        let input = validate_key_input(&name, original.owner(), &scopes, &self.limits)?;

        let created = self.persist_new_key(input, expires_at, Some(key_id)).await?;
        let new_id = *created.api_key.id();

        original.mark_rotated(new_id, now);
        let record = RotationRecord::new(key_id, new_id, now, now + Duration::days(grace_days));

        let mut batch = WriteBatch::new();
        batch.put(keyspace::record_key(&key_id), encode(&original)?);
        batch.put(keyspace::rotation_key(&key_id), encode(&record)?);
        self.store.commit(batch).await?;

        info!(
            "Rotated API key: id={}, new_id={}, grace_days={}",
            key_id, new_id, grace_days
        );

        Ok(RotationOutcome {
            deprecated: DeprecatedKey {
                key_id,
                name: original.name().to_string(),
                rotated_at: now,
                grace_period_ends: record.grace_period_ends(),
            },
            new_key: created.api_key,
            plaintext: created.plaintext,
        })
    }

    /// Fetch a key by id, with rotation details when one is in flight
    pub async fn get_key(&self, id: &str) -> Result<Option<KeyDetails>, DomainError> {
        let key_id = ApiKeyId::parse(id)?;

        let Some(key) = self.load_key(&key_id).await? else {
            return Ok(None);
        };

        let rotation = if key.status() == ApiKeyStatus::Rotated {
            self.load_rotation(&key_id).await?.map(|r| r.info())
        } else {
            None
        };

        Ok(Some(KeyDetails {
            api_key: key.sanitized(),
            rotation,
        }))
    }

    /// List keys newest-first with offset pagination
    pub async fn list_keys(&self, limit: usize, offset: usize) -> Result<Vec<ApiKey>, DomainError> {
        let entries = self
            .store
            .list(&ListOptions::prefix(keyspace::RECORD_PREFIX))
            .await?;

        let mut keys = Vec::with_capacity(entries.len());

        for entry in entries {
            match decode::<ApiKey>(&entry.value) {
                Ok(key) => keys.push(key),
                Err(e) => warn!("Skipping undecodable key record '{}': {}", entry.key, e),
            }
        }

        keys.sort_by(|a, b| b.created_at().cmp(&a.created_at()));

        Ok(keys
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|key| key.sanitized())
            .collect())
    }

    /// List keys in creation order using an opaque cursor
    ///
    /// Pages walk the time index; a page may come back shorter than `limit`
    /// when index entries were filtered out, but the cursor still advances so
    /// repeated calls always terminate. An undecodable cursor is treated as
    /// absent.
    pub async fn list_keys_with_cursor(
        &self,
        limit: usize,
        cursor: Option<&str>,
        include_rotated: bool,
    ) -> Result<KeyPage, DomainError> {
        let limit = limit.max(1);

        let mut options =
            ListOptions::prefix(keyspace::TIME_INDEX_PREFIX).with_limit(limit + 1);

        if let Some(cursor) = cursor.and_then(Cursor::decode) {
            options = options.with_start(keyspace::time_index_key_from_millis(
                cursor.ts, &cursor.id,
            ));
        }

        let entries = self.store.list(&options).await?;
        let has_more = entries.len() > limit;
        let consumed: Vec<KvEntry> = entries.into_iter().take(limit).collect();

        let mut items = Vec::new();

        for entry in &consumed {
            let Some((_, id)) = keyspace::parse_time_index_key(&entry.key) else {
                warn!("Skipping malformed time-index entry '{}'", entry.key);
                continue;
            };

            let Ok(key_id) = ApiKeyId::parse(id) else {
                continue;
            };

            let Some(key) = self.load_key(&key_id).await? else {
                // Stale index entry; reconciliation removes it
                continue;
            };

            if key.status() == ApiKeyStatus::Rotated && !include_rotated {
                continue;
            }

            items.push(key.sanitized());
        }

        let next_cursor = if has_more {
            consumed.last().and_then(|entry| {
                keyspace::parse_time_index_key(&entry.key)
                    .map(|(ts, id)| Cursor::new(id, ts).encode())
            })
        } else {
            None
        };

        Ok(KeyPage {
            items,
            next_cursor,
            has_more,
        })
    }

    /// Generate and persist a key with all four index entries in one commit
    async fn persist_new_key(
        &self,
        input: ValidatedKeyInput,
        expires_at: Option<DateTime<Utc>>,
        rotated_from: Option<ApiKeyId>,
    ) -> Result<CreatedKey, DomainError> {
        let id = ApiKeyId::generate();
        let plaintext = self.crypto.generate_credential();
        let envelope = self.crypto.encrypt(&plaintext)?;
        let signature = self.crypto.sign(&id);

        let mut key = ApiKey::new(id, input.name, input.owner, input.scopes, envelope)
            .with_expiration(expires_at);

        if let Some(original) = rotated_from {
            key = key.with_rotated_from(original);
        }

        let mut batch = WriteBatch::new();
        batch.put(keyspace::record_key(&id), encode(&key)?);
        batch.put(keyspace::lookup_key(&plaintext), id.to_string());
        batch.put(keyspace::hmac_key(&plaintext), signature);
        batch.put(
            keyspace::time_index_key(key.created_at(), &id),
            id.to_string(),
        );
        self.store.commit(batch).await?;

        Ok(CreatedKey {
            api_key: key.sanitized(),
            plaintext,
        })
    }

    pub(super) async fn load_key(&self, id: &ApiKeyId) -> Result<Option<ApiKey>, DomainError> {
        match self.store.get(&keyspace::record_key(id)).await? {
            Some(raw) => Ok(Some(decode(&raw)?)),
            None => Ok(None),
        }
    }

    pub(super) async fn load_rotation(
        &self,
        id: &ApiKeyId,
    ) -> Result<Option<RotationRecord>, DomainError> {
        match self.store.get(&keyspace::rotation_key(id)).await? {
            Some(raw) => Ok(Some(decode(&raw)?)),
            None => Ok(None),
        }
    }

    /// Remove a lookup pair whose target no longer exists
    ///
    /// Best effort: validation already returns `InvalidKey` either way, and a
    /// surviving stale entry is removed by the next validation or by
    /// reconciliation.
    async fn heal_stale_lookup(&self, plaintext: &str) {
        for index_key in [keyspace::lookup_key(plaintext), keyspace::hmac_key(plaintext)] {
            if let Err(e) = self.store.delete(&index_key).await {
                warn!("Failed to remove stale index entry: {}", e);
            }
        }
    }

    /// Record usage without holding up the validation response
    fn touch_last_used(&self, key_id: ApiKeyId) {
        let store = Arc::clone(&self.store);

        tokio::spawn(async move {
            let record_key = keyspace::record_key(&key_id);

            let result: Result<(), DomainError> = async {
                let Some(raw) = store.get(&record_key).await? else {
                    return Ok(());
                };

                let mut key: ApiKey = decode(&raw)?;
                key.record_usage(Utc::now());
                store.put(&record_key, &encode(&key)?).await
            }
            .await;

            if let Err(e) = result {
                warn!("Failed to record usage for API key {}: {}", key_id, e);
            }
        });
    }

    /// Commit a revocation batch, retrying transient storage failures with
    /// linear backoff
    async fn commit_with_retry(&self, batch: WriteBatch) -> Result<(), DomainError> {
        let mut attempt: u32 = 0;

        loop {
            match self.store.commit(batch.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_storage() && attempt < REVOKE_RETRY_ATTEMPTS => {
                    attempt += 1;
                    warn!(
                        "Revocation commit failed, retrying: attempt={}, error={}",
                        attempt, e
                    );
                    tokio::time::sleep(std::time::Duration::from_millis(
                        REVOKE_RETRY_BACKOFF_MS * u64::from(attempt),
                    ))
                    .await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

//! Reconciliation sweep
//!
//! Lazy expiry and best-effort healing leave debris behind: expired keys that
//! were never presented again, rotation records past their grace period, and
//! index entries whose target is gone. A periodic sweep walks each namespace,
//! queues every repair, and commits them in one batch. Every action here is
//! idempotent, so overlapping or repeated sweeps are harmless.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use tracing::{info, warn};

use crate::domain::api_key::{ApiKey, ApiKeyStatus, CleanupReport, RotationRecord};
use crate::domain::storage::{keyspace, KeyValueStore, ListOptions, WriteBatch};
use crate::domain::{CryptoProvider, DomainError};

use super::service::{decode, encode, ApiKeyService};

impl<S: KeyValueStore + 'static, C: CryptoProvider + ?Sized + 'static> ApiKeyService<S, C> {
    /// Run one reconciliation pass over all key namespaces
    ///
    /// Revokes expired-but-active keys, retires rotation records whose grace
    /// period has elapsed, and deletes lookup pairs, orphaned signature
    /// entries, and time-index entries that no longer point at a usable
    /// record. All repairs land in a single commit. Lookup pairs of a rotated
    /// key survive while its rotation record does, so grace-period validation
    /// keeps working between sweeps.
    pub async fn cleanup_expired_keys(&self) -> Result<CleanupReport, DomainError> {
        let now = Utc::now();
        let mut batch = WriteBatch::new();

        info!("Starting reconciliation sweep");

        // Pass 1: settle expired-but-active keys
        let mut records: HashMap<String, ApiKey> = HashMap::new();
        let mut revoked_count = 0;

        let entries = self
            .store()
            .list(&ListOptions::prefix(keyspace::RECORD_PREFIX))
            .await?;

        for entry in entries {
            let mut key: ApiKey = match decode(&entry.value) {
                Ok(key) => key,
                Err(e) => {
                    warn!("Skipping undecodable key record '{}': {}", entry.key, e);
                    continue;
                }
            };

            if key.status() == ApiKeyStatus::Active && key.is_expired_at(now) {
                key.revoke(now);
                batch.put(entry.key.as_str(), encode(&key)?);
                revoked_count += 1;
            }

            records.insert(key.id().to_string(), key);
        }

        // Pass 2: retire rotation records past their grace period
        let mut live_rotations: HashSet<String> = HashSet::new();
        let mut rotation_count = 0;

        let entries = self
            .store()
            .list(&ListOptions::prefix(keyspace::ROTATION_PREFIX))
            .await?;

        for entry in entries {
            let record: RotationRecord = match decode(&entry.value) {
                Ok(record) => record,
                Err(e) => {
                    warn!("Skipping undecodable rotation record '{}': {}", entry.key, e);
                    continue;
                }
            };

            if record.grace_elapsed_at(now) {
                batch.delete(entry.key.as_str());
                rotation_count += 1;
            } else {
                live_rotations.insert(record.original_key_id().to_string());
            }
        }

        // Pass 3: drop lookup pairs whose target is gone or no longer usable
        let mut surviving_lookups: HashSet<String> = HashSet::new();
        let mut removed_hmacs: HashSet<String> = HashSet::new();
        let mut stale_count = 0;

        let entries = self
            .store()
            .list(&ListOptions::prefix(keyspace::LOOKUP_PREFIX))
            .await?;

        for entry in entries {
            let stale = match records.get(entry.value.trim()) {
                None => true,
                Some(key) => match key.status() {
                    ApiKeyStatus::Active => false,
                    ApiKeyStatus::Revoked => true,
                    ApiKeyStatus::Rotated => !live_rotations.contains(&key.id().to_string()),
                },
            };

            let Some(plaintext) = keyspace::plaintext_from_lookup_key(&entry.key) else {
                continue;
            };

            if stale {
                // The paired signature entry goes with it, counted as one repair
                batch.delete(entry.key.as_str());
                batch.delete(keyspace::hmac_key(plaintext));
                removed_hmacs.insert(plaintext.to_string());
                stale_count += 1;
            } else {
                surviving_lookups.insert(plaintext.to_string());
            }
        }

        // Pass 4: drop signature entries with no lookup partner
        let entries = self
            .store()
            .list(&ListOptions::prefix(keyspace::HMAC_PREFIX))
            .await?;

        for entry in entries {
            let Some(plaintext) = keyspace::plaintext_from_hmac_key(&entry.key) else {
                continue;
            };

            if !surviving_lookups.contains(plaintext) && removed_hmacs.insert(plaintext.to_string())
            {
                batch.delete(entry.key.as_str());
                stale_count += 1;
            }
        }

        // Pass 5: drop orphaned time-index entries
        let entries = self
            .store()
            .list(&ListOptions::prefix(keyspace::TIME_INDEX_PREFIX))
            .await?;

        for entry in entries {
            let stale = match keyspace::parse_time_index_key(&entry.key) {
                Some((_, id)) => !records.contains_key(id),
                None => true,
            };

            if stale {
                batch.delete(entry.key.as_str());
                stale_count += 1;
            }
        }

        if !batch.is_empty() {
            self.store().commit(batch).await?;
        }

        info!(
            "Reconciliation sweep finished: revoked={}, rotations_retired={}, stale_removed={}",
            revoked_count, rotation_count, stale_count
        );

        Ok(CleanupReport {
            revoked_count,
            rotation_count,
            stale_count,
            timestamp: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use super::*;
    use crate::domain::api_key::ValidationOutcome;
    use crate::infrastructure::api_key::{CreateKeyRequest, RotateKeyOptions};
    use crate::infrastructure::crypto::DeterministicCryptoProvider;
    use crate::infrastructure::storage::InMemoryKeyValueStore;

    type TestService = ApiKeyService<InMemoryKeyValueStore, DeterministicCryptoProvider>;

    fn wired() -> (Arc<InMemoryKeyValueStore>, TestService) {
        let store = Arc::new(InMemoryKeyValueStore::new());
        let crypto = Arc::new(DeterministicCryptoProvider::new("test-secret", "km_"));
        let service = ApiKeyService::new(Arc::clone(&store), crypto);
        (store, service)
    }

    fn request(name: &str) -> CreateKeyRequest {
        CreateKeyRequest {
            name: name.to_string(),
            owner: "platform-team".to_string(),
            scopes: vec!["read:data".to_string()],
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn test_sweep_on_clean_store_does_nothing() {
        let (_, service) = wired();
        service.create_key(request("healthy")).await.unwrap();

        let report = service.cleanup_expired_keys().await.unwrap();

        assert_eq!(report.revoked_count, 0);
        assert_eq!(report.rotation_count, 0);
        assert_eq!(report.stale_count, 0);
    }

    #[tokio::test]
    async fn test_sweep_settles_all_debris() {
        let (store, service) = wired();

        // An expired key that was never presented again
        let mut expired = request("expired");
        expired.expires_at = Some(Utc::now() - Duration::hours(1));
        let expired = service.create_key(expired).await.unwrap();

        // A rotation whose grace period has elapsed
        let rotated = service.create_key(request("rotated")).await.unwrap();
        let rotation = service
            .rotate_key(
                &rotated.api_key.id().to_string(),
                RotateKeyOptions {
                    grace_period_days: Some(0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        // A healthy key, untouched by the sweep
        let healthy = service.create_key(request("healthy")).await.unwrap();

        // Two lookup pairs with no record behind them
        store
            .put("lookup:km_orphan1", &uuid::Uuid::new_v4().to_string())
            .await
            .unwrap();
        store.put("lookup:km_orphan2", "garbage").await.unwrap();

        let report = service.cleanup_expired_keys().await.unwrap();

        assert_eq!(report.revoked_count, 1);
        assert_eq!(report.rotation_count, 1);
        // Two orphans plus the lookups of the revoked and rotated keys
        assert_eq!(report.stale_count, 4);

        // Settled credentials no longer resolve at all
        let outcome = service.validate_key(&expired.plaintext, &[]).await.unwrap();
        assert_eq!(outcome, ValidationOutcome::InvalidKey);

        let outcome = service.validate_key(&rotated.plaintext, &[]).await.unwrap();
        assert_eq!(outcome, ValidationOutcome::InvalidKey);

        // The rotated record itself survives with its lineage
        let details = service
            .get_key(&rotated.api_key.id().to_string())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(details.api_key.status(), ApiKeyStatus::Rotated);
        assert_eq!(details.api_key.rotated_to(), Some(rotation.new_key.id()));
        assert!(details.rotation.is_none());

        // Healthy and successor keys keep working
        assert!(service
            .validate_key(&healthy.plaintext, &[])
            .await
            .unwrap()
            .is_valid());
        assert!(service
            .validate_key(&rotation.plaintext, &[])
            .await
            .unwrap()
            .is_valid());
    }

    #[tokio::test]
    async fn test_sweep_is_idempotent() {
        let (store, service) = wired();

        let mut expired = request("expired");
        expired.expires_at = Some(Utc::now() - Duration::hours(1));
        service.create_key(expired).await.unwrap();
        store.put("lookup:km_orphan", "garbage").await.unwrap();

        let first = service.cleanup_expired_keys().await.unwrap();
        assert_eq!(first.revoked_count, 1);

        let second = service.cleanup_expired_keys().await.unwrap();
        assert_eq!(second.revoked_count, 0);
        assert_eq!(second.rotation_count, 0);
        assert_eq!(second.stale_count, 0);
    }

    #[tokio::test]
    async fn test_sweep_preserves_grace_period_lookups() {
        let (_, service) = wired();

        let created = service.create_key(request("rotating")).await.unwrap();
        service
            .rotate_key(&created.api_key.id().to_string(), RotateKeyOptions::default())
            .await
            .unwrap();

        let report = service.cleanup_expired_keys().await.unwrap();
        assert_eq!(report.rotation_count, 0);
        assert_eq!(report.stale_count, 0);

        // The old credential still validates inside the grace period
        let outcome = service.validate_key(&created.plaintext, &[]).await.unwrap();
        assert!(outcome.is_valid());
    }

    #[tokio::test]
    async fn test_sweep_removes_orphaned_signature_entries() {
        let (store, service) = wired();
        service.create_key(request("healthy")).await.unwrap();

        // A signature entry with no lookup partner
        store.put("hmac:km_orphan", "deadbeef").await.unwrap();

        let report = service.cleanup_expired_keys().await.unwrap();

        assert_eq!(report.stale_count, 1);
        assert!(store.get("hmac:km_orphan").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sweep_removes_orphaned_time_index_entries() {
        let (store, service) = wired();

        let created = service.create_key(request("doomed")).await.unwrap();

        // Tear the record out from under its indices
        store
            .delete(&keyspace::record_key(created.api_key.id()))
            .await
            .unwrap();

        let report = service.cleanup_expired_keys().await.unwrap();

        // The lookup pair and the time-index entry
        assert_eq!(report.stale_count, 2);

        let remaining = store
            .list(&ListOptions::prefix(keyspace::TIME_INDEX_PREFIX))
            .await
            .unwrap();
        assert!(remaining.is_empty());
    }

    #[tokio::test]
    async fn test_sweep_repairs_land_in_one_commit() {
        let (store, service) = wired();

        let mut expired = request("expired");
        expired.expires_at = Some(Utc::now() - Duration::hours(1));
        service.create_key(expired).await.unwrap();

        // The single batched commit is the only write the sweep performs
        store.inject_failures(1);
        assert!(service.cleanup_expired_keys().await.is_err());

        store.inject_failures(0);
        let report = service.cleanup_expired_keys().await.unwrap();
        assert_eq!(report.revoked_count, 1);
    }
}

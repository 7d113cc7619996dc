//! Keymaster
//!
//! API key issuance and validation over an ordered key-value store:
//! - Opaque bearer credentials, encrypted at rest in versioned envelopes
//! - HMAC-signed lookup indices with self-healing on stale entries
//! - Rotation with a grace period for zero-downtime credential rollover
//! - Cursor pagination over a creation-time index
//! - A reconciliation sweep that settles lazy-expiry and index debris

pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;

use domain::{CryptoProvider, DomainError, KeyValueStore};
use infrastructure::api_key::ApiKeyService;
use infrastructure::crypto::{AeadCryptoProvider, DeterministicCryptoProvider};

/// Build the crypto provider selected by configuration
///
/// Configuration validation has already rejected the deterministic provider
/// for production deployments; it is re-checked here so a hand-built config
/// cannot slip past.
pub fn crypto_from_config(
    config: &config::KeyManagerConfig,
) -> Result<Arc<dyn CryptoProvider>, DomainError> {
    config
        .validate()
        .map_err(|e| DomainError::configuration(e.to_string()))?;

    if config.deterministic_crypto {
        Ok(Arc::new(DeterministicCryptoProvider::new(
            &config.hmac_secret,
            &config.credential_prefix,
        )))
    } else {
        Ok(Arc::new(AeadCryptoProvider::new(
            &config.encryption_secret,
            &config.hmac_secret,
            &config.credential_prefix,
        )))
    }
}

/// Wire a lifecycle engine from configuration and a storage adapter
pub fn build_service<S: KeyValueStore + 'static>(
    config: &config::KeyManagerConfig,
    store: Arc<S>,
) -> Result<ApiKeyService<S, dyn CryptoProvider>, DomainError> {
    let crypto = crypto_from_config(config)?;

    Ok(ApiKeyService::new(store, crypto)
        .with_limits(config.limits())
        .with_default_expiration_days(config.default_expiration_days))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KeyManagerConfig;
    use infrastructure::storage::InMemoryKeyValueStore;

    fn test_config() -> KeyManagerConfig {
        KeyManagerConfig {
            encryption_secret: "enc-secret".to_string(),
            hmac_secret: "hmac-secret".to_string(),
            deterministic_crypto: true,
            ..KeyManagerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_build_service_from_config() {
        let service = build_service(&test_config(), Arc::new(InMemoryKeyValueStore::new()))
            .expect("valid config wires a service");

        let created = service
            .create_key(infrastructure::api_key::CreateKeyRequest {
                name: "wired".to_string(),
                owner: "platform-team".to_string(),
                scopes: vec!["read:data".to_string()],
                expires_at: None,
            })
            .await
            .unwrap();

        assert!(created.plaintext.starts_with("km_"));
    }

    #[test]
    fn test_build_service_rejects_invalid_config() {
        let config = KeyManagerConfig {
            production: true,
            ..test_config()
        };

        let result = build_service(&config, Arc::new(InMemoryKeyValueStore::new()));
        assert!(matches!(result, Err(DomainError::Configuration { .. })));
    }
}

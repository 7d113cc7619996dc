//! Deterministic crypto provider for reproducible test fixtures
//!
//! Credentials come from a counter instead of a CSPRNG and "encryption" is a
//! reversible encoding, so fixtures can assert on exact values. Config
//! loading rejects this provider when the deployment is flagged production;
//! nothing in the engine can switch to it at runtime.

use std::sync::atomic::{AtomicU64, Ordering};

use base64::{engine::general_purpose::STANDARD, Engine};
use sha2::{Digest, Sha256};

use crate::domain::api_key::{ApiKeyId, EncryptedSecret, CURRENT_SCHEMA_VERSION};
use crate::domain::crypto::CryptoProvider;
use crate::domain::DomainError;

/// [`CryptoProvider`] with predictable output, for test wiring only
#[derive(Debug)]
pub struct DeterministicCryptoProvider {
    counter: AtomicU64,
    hmac_secret: Vec<u8>,
    prefix: String,
}

impl DeterministicCryptoProvider {
    pub fn new(hmac_secret: &str, prefix: impl Into<String>) -> Self {
        Self {
            counter: AtomicU64::new(1),
            hmac_secret: hmac_secret.as_bytes().to_vec(),
            prefix: prefix.into(),
        }
    }
}

impl CryptoProvider for DeterministicCryptoProvider {
    fn credential_prefix(&self) -> &str {
        &self.prefix
    }

    fn generate_credential(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        // Same shape as production credentials: prefix + 64 hex chars
        format!("{}{:064x}", self.prefix, n)
    }

    fn encrypt(&self, plaintext: &str) -> Result<EncryptedSecret, DomainError> {
        Ok(EncryptedSecret {
            ciphertext: STANDARD.encode(plaintext.as_bytes()),
            iv: STANDARD.encode([0u8; 12]),
            schema_version: CURRENT_SCHEMA_VERSION,
        })
    }

    fn decrypt(&self, envelope: &EncryptedSecret) -> Result<String, DomainError> {
        if envelope.schema_version != CURRENT_SCHEMA_VERSION {
            return Err(DomainError::decryption(format!(
                "unsupported envelope schema version {}",
                envelope.schema_version
            )));
        }

        let bytes = STANDARD
            .decode(&envelope.ciphertext)
            .map_err(|e| DomainError::decryption(format!("invalid ciphertext encoding: {e}")))?;

        String::from_utf8(bytes)
            .map_err(|e| DomainError::decryption(format!("decrypted data is not valid UTF-8: {e}")))
    }

    fn sign(&self, key_id: &ApiKeyId) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.hmac_secret);
        hasher.update(key_id.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }

    fn verify(&self, key_id: &ApiKeyId, signature: &str) -> bool {
        self.sign(key_id) == signature
    }
}

//! Production crypto provider
//!
//! AES-256-GCM envelope encryption with a PBKDF2-derived key, HMAC-SHA256
//! index signing, and CSPRNG credential generation.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use hmac::{Hmac, Mac};
use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;

use crate::domain::api_key::{ApiKeyId, EncryptedSecret, CURRENT_SCHEMA_VERSION};
use crate::domain::crypto::CryptoProvider;
use crate::domain::DomainError;

type HmacSha256 = Hmac<Sha256>;

/// Length of AES-256 key in bytes.
const KEY_LENGTH: usize = 32;

/// Length of GCM nonce in bytes.
const NONCE_LENGTH: usize = 12;

/// PBKDF2 rounds for deriving the encryption key from the configured secret.
const PBKDF2_ITERATIONS: u32 = 100_000;

/// Application-level salt for key derivation. Fixed so the same secret always
/// derives the same key; per-message uniqueness comes from the random IV.
const KEY_DERIVATION_SALT: &[u8] = b"keymaster.credential-envelope.v1";

/// Number of random bytes in a generated credential.
const CREDENTIAL_BYTES: usize = 32;

/// AES-GCM based [`CryptoProvider`]
#[derive(Clone)]
pub struct AeadCryptoProvider {
    encryption_key: [u8; KEY_LENGTH],
    hmac_secret: Vec<u8>,
    prefix: String,
}

impl AeadCryptoProvider {
    /// Create a provider, deriving the encryption key from `encryption_secret`
    ///
    /// Derivation runs once here rather than per call; the salt is fixed, so
    /// the derived key is a pure function of the secret.
    pub fn new(
        encryption_secret: &str,
        hmac_secret: &str,
        prefix: impl Into<String>,
    ) -> Self {
        let mut encryption_key = [0u8; KEY_LENGTH];
        pbkdf2_hmac::<Sha256>(
            encryption_secret.as_bytes(),
            KEY_DERIVATION_SALT,
            PBKDF2_ITERATIONS,
            &mut encryption_key,
        );

        Self {
            encryption_key,
            hmac_secret: hmac_secret.as_bytes().to_vec(),
            prefix: prefix.into(),
        }
    }

    fn mac(&self) -> HmacSha256 {
        // HMAC-SHA256 accepts keys of any length; this cannot fail
        <HmacSha256 as Mac>::new_from_slice(&self.hmac_secret)
            .expect("HMAC-SHA256 accepts keys of any length")
    }
}

impl CryptoProvider for AeadCryptoProvider {
    fn credential_prefix(&self) -> &str {
        &self.prefix
    }

    fn generate_credential(&self) -> String {
        let mut random_bytes = [0u8; CREDENTIAL_BYTES];
        OsRng.fill_bytes(&mut random_bytes);

        format!("{}{}", self.prefix, hex::encode(random_bytes))
    }

    fn encrypt(&self, plaintext: &str) -> Result<EncryptedSecret, DomainError> {
        let cipher = Aes256Gcm::new_from_slice(&self.encryption_key)
            .map_err(|e| DomainError::decryption(format!("failed to create cipher: {e}")))?;

        let mut nonce_bytes = [0u8; NONCE_LENGTH];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| DomainError::decryption(format!("encryption failed: {e}")))?;

        Ok(EncryptedSecret {
            ciphertext: STANDARD.encode(ciphertext),
            iv: STANDARD.encode(nonce_bytes),
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

        let ciphertext = STANDARD
            .decode(&envelope.ciphertext)
            .map_err(|e| DomainError::decryption(format!("invalid ciphertext encoding: {e}")))?;

        let nonce_bytes = STANDARD
            .decode(&envelope.iv)
            .map_err(|e| DomainError::decryption(format!("invalid IV encoding: {e}")))?;

        if nonce_bytes.len() != NONCE_LENGTH {
            return Err(DomainError::decryption(format!(
                "IV must be {} bytes, got {}",
                NONCE_LENGTH,
                nonce_bytes.len()
            )));
        }

        let cipher = Aes256Gcm::new_from_slice(&self.encryption_key)
            .map_err(|e| DomainError::decryption(format!("failed to create cipher: {e}")))?;

        let plaintext = cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
            .map_err(|e| DomainError::decryption(format!("decryption failed: {e}")))?;

        String::from_utf8(plaintext)
            .map_err(|e| DomainError::decryption(format!("decrypted data is not valid UTF-8: {e}")))
    }

    fn sign(&self, key_id: &ApiKeyId) -> String {
        let mut mac = self.mac();
        mac.update(key_id.to_string().as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn verify(&self, key_id: &ApiKeyId, signature: &str) -> bool {
        let Ok(expected) = hex::decode(signature) else {
            return false;
        };

        let mut mac = self.mac();
        mac.update(key_id.to_string().as_bytes());
        // verify_slice compares the full tag in constant time
        mac.verify_slice(&expected).is_ok()
    }
}

impl std::fmt::Debug for AeadCryptoProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AeadCryptoProvider")
            .field("encryption_key", &"[REDACTED]")
            .field("hmac_secret", &"[REDACTED]")
            .field("prefix", &self.prefix)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> AeadCryptoProvider {
        AeadCryptoProvider::new("test-encryption-secret", "test-hmac-secret", "km_")
    }

    #[test]
    fn test_generate_credential_shape() {
        let provider = provider();
        let credential = provider.generate_credential();

        assert!(credential.starts_with("km_"));
        // 32 random bytes hex-encoded
        assert_eq!(credential.len(), "km_".len() + 64);
        assert!(credential["km_".len()..]
            .chars()
            .all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_generated_credentials_are_unique() {
        let provider = provider();
        assert_ne!(provider.generate_credential(), provider.generate_credential());
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let provider = provider();
        let plaintext = provider.generate_credential();

        let envelope = provider.encrypt(&plaintext).unwrap();
        assert_eq!(envelope.schema_version, CURRENT_SCHEMA_VERSION);

        let decrypted = provider.decrypt(&envelope).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_encrypt_uses_fresh_iv() {
        let provider = provider();

        let first = provider.encrypt("same-plaintext").unwrap();
        let second = provider.encrypt("same-plaintext").unwrap();

        assert_ne!(first.iv, second.iv);
        assert_ne!(first.ciphertext, second.ciphertext);
    }

    #[test]
    fn test_decrypt_rejects_unknown_version() {
        let provider = provider();
        let mut envelope = provider.encrypt("secret").unwrap();
        envelope.schema_version = 99;

        let result = provider.decrypt(&envelope);
        assert!(matches!(result, Err(DomainError::Decryption { .. })));
    }

    #[test]
    fn test_decrypt_rejects_corrupted_ciphertext() {
        let provider = provider();
        let envelope = provider.encrypt("secret").unwrap();

        let mut bytes = STANDARD.decode(&envelope.ciphertext).unwrap();
        bytes[0] ^= 0xFF;
        let corrupted = EncryptedSecret {
            ciphertext: STANDARD.encode(bytes),
            ..envelope
        };

        assert!(provider.decrypt(&corrupted).is_err());
    }

    #[test]
    fn test_decrypt_with_different_secret_fails() {
        let provider = provider();
        let other = AeadCryptoProvider::new("other-secret", "test-hmac-secret", "km_");

        let envelope = provider.encrypt("secret").unwrap();
        assert!(other.decrypt(&envelope).is_err());
    }

    #[test]
    fn test_sign_and_verify() {
        let provider = provider();
        let id = ApiKeyId::generate();

        let signature = provider.sign(&id);

        assert!(provider.verify(&id, &signature));
        assert!(!provider.verify(&ApiKeyId::generate(), &signature));
        assert!(!provider.verify(&id, "deadbeef"));
        assert!(!provider.verify(&id, "not-hex"));
    }

    #[test]
    fn test_sign_is_deterministic() {
        let provider = provider();
        let id = ApiKeyId::generate();

        assert_eq!(provider.sign(&id), provider.sign(&id));
    }

    #[test]
    fn test_different_hmac_secrets_disagree() {
        let provider = provider();
        let other = AeadCryptoProvider::new("test-encryption-secret", "other-hmac", "km_");
        let id = ApiKeyId::generate();

        let signature = provider.sign(&id);
        assert!(!other.verify(&id, &signature));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let provider = provider();
        let debug = format!("{provider:?}");

        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("test-hmac-secret"));
    }
}

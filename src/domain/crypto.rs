//! Crypto provider trait
//!
//! The engine never touches key material directly; it is constructed with a
//! [`CryptoProvider`] and every cryptographic decision flows through it. Test
//! wiring injects a deterministic implementation here instead of flipping a
//! runtime switch inside the engine.

use std::fmt::Debug;

use crate::domain::api_key::{ApiKeyId, EncryptedSecret};
use crate::domain::DomainError;

/// Cryptographic operations backing the key lifecycle engine
pub trait CryptoProvider: Send + Sync + Debug {
    /// The prefix every generated credential starts with
    ///
    /// Validation rejects presented credentials that do not carry it, before
    /// any storage access.
    fn credential_prefix(&self) -> &str;

    /// Draw a fresh credential: prefix plus 32 random bytes, hex-encoded
    fn generate_credential(&self) -> String;

    /// Encrypt a plaintext credential into a versioned envelope
    fn encrypt(&self, plaintext: &str) -> Result<EncryptedSecret, DomainError>;

    /// Decrypt an envelope back to the plaintext credential
    ///
    /// Must reject envelopes whose `schema_version` it does not recognize.
    fn decrypt(&self, envelope: &EncryptedSecret) -> Result<String, DomainError>;

    /// Keyed-hash signature over a key id, hex-encoded
    fn sign(&self, key_id: &ApiKeyId) -> String;

    /// Verify a signature produced by [`sign`](Self::sign)
    ///
    /// Comparison is constant-time over the full value.
    fn verify(&self, key_id: &ApiKeyId, signature: &str) -> bool;
}

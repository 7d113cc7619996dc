//! Crypto provider implementations

mod aead;
mod deterministic;

pub use aead::AeadCryptoProvider;
pub use deterministic::DeterministicCryptoProvider;

//! Domain layer - Core entities, contracts, and errors

pub mod api_key;
pub mod crypto;
pub mod error;
pub mod storage;

pub use api_key::{
    ApiKey, ApiKeyId, ApiKeyStatus, ApiKeyValidationError, CleanupReport, CreatedKey,
    DeprecatedKey, EncryptedSecret, KeyLimits, KeyPage, RevocationOutcome, RotationInfo,
    RotationOutcome, RotationRecord, RotationWarning, ValidationOutcome,
};
pub use crypto::CryptoProvider;
pub use error::DomainError;
pub use storage::{KeyValueStore, KvEntry, ListOptions, WriteBatch, WriteOp};

//! API Key domain types

pub mod entity;
pub mod outcome;
pub mod rotation;
pub mod scope;
pub mod validation;

pub use entity::{ApiKey, ApiKeyId, ApiKeyStatus, EncryptedSecret, CURRENT_SCHEMA_VERSION};
pub use outcome::{
    CleanupReport, CreatedKey, DeprecatedKey, KeyPage, RevocationOutcome, RotationOutcome,
    RotationWarning, ValidationOutcome,
};
pub use rotation::{RotationInfo, RotationRecord, RotationStatus};
pub use scope::{missing_scopes, scope_covers, scopes_satisfy};
pub use validation::{validate_key_input, ApiKeyValidationError, KeyLimits, ValidatedKeyInput};

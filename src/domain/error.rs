use thiserror::Error;

/// Core domain errors
///
/// Covers the mutation paths (create/revoke/rotate/cleanup). Validation of a
/// presented credential is a hot path and reports its outcome through
/// [`crate::domain::api_key::ValidationOutcome`] instead; only storage-level
/// failures surface as errors there.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Invalid state: {message}")]
    InvalidState { message: String },

    #[error("Key is already rotating; successor is '{new_key_id}'")]
    AlreadyRotating { new_key_id: String },

    #[error("Decryption error: {message}")]
    Decryption { message: String },

    #[error("Signature error: {message}")]
    Signature { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl DomainError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    pub fn already_rotating(new_key_id: impl Into<String>) -> Self {
        Self::AlreadyRotating {
            new_key_id: new_key_id.into(),
        }
    }

    pub fn decryption(message: impl Into<String>) -> Self {
        Self::Decryption {
            message: message.into(),
        }
    }

    pub fn signature(message: impl Into<String>) -> Self {
        Self::Signature {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Whether this error came from the storage adapter and may be transient
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage { .. })
    }
}

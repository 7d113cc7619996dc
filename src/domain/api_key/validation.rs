//! API Key input validation

use thiserror::Error;

use crate::domain::DomainError;

/// Errors that can occur while validating key creation input
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiKeyValidationError {
    #[error("Key ID is not a valid UUID")]
    MalformedId,

    #[error("Name is required")]
    EmptyName,

    #[error("Name exceeds maximum length of {0} characters")]
    NameTooLong(usize),

    #[error("Owner is required")]
    EmptyOwner,

    #[error("Owner exceeds maximum length of {0} characters")]
    OwnerTooLong(usize),

    #[error("At least one non-empty scope is required")]
    NoScopes,

    #[error("Scope count exceeds maximum of {0}")]
    TooManyScopes(usize),

    #[error("Scope '{0}' exceeds maximum length of {1} characters")]
    ScopeTooLong(String, usize),
}

impl From<ApiKeyValidationError> for DomainError {
    fn from(err: ApiKeyValidationError) -> Self {
        DomainError::invalid_input(err.to_string())
    }
}

/// Length caps applied to key creation input
#[derive(Debug, Clone, Copy)]
pub struct KeyLimits {
    pub max_name_length: usize,
    pub max_owner_length: usize,
    pub max_scope_length: usize,
    pub max_scopes: usize,
}

impl Default for KeyLimits {
    fn default() -> Self {
        Self {
            max_name_length: 255,
            max_owner_length: 255,
            max_scope_length: 100,
            max_scopes: 50,
        }
    }
}

/// Creation input after trimming and cap enforcement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedKeyInput {
    pub name: String,
    pub owner: String,
    pub scopes: Vec<String>,
}

/// Validate and normalize key creation input
///
/// Name and owner are trimmed and required. Scopes are trimmed, empties
/// dropped, and duplicates removed case-insensitively (first occurrence wins,
/// original casing preserved); at least one scope must remain.
pub fn validate_key_input(
    name: &str,
    owner: &str,
    scopes: &[String],
    limits: &KeyLimits,
) -> Result<ValidatedKeyInput, ApiKeyValidationError> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ApiKeyValidationError::EmptyName);
    }

    if name.len() > limits.max_name_length {
        return Err(ApiKeyValidationError::NameTooLong(limits.max_name_length));
    }

    let owner = owner.trim();

    if owner.is_empty() {
        return Err(ApiKeyValidationError::EmptyOwner);
    }

    if owner.len() > limits.max_owner_length {
        return Err(ApiKeyValidationError::OwnerTooLong(limits.max_owner_length));
    }

    let mut seen = Vec::new();
    let mut normalized = Vec::new();

    for scope in scopes {
        let scope = scope.trim();

        if scope.is_empty() {
            continue;
        }

        if scope.len() > limits.max_scope_length {
            return Err(ApiKeyValidationError::ScopeTooLong(
                scope.to_string(),
                limits.max_scope_length,
            ));
        }

        let lowered = scope.to_lowercase();

        if seen.contains(&lowered) {
            continue;
        }

        seen.push(lowered);
        normalized.push(scope.to_string());
    }

    if normalized.is_empty() {
        return Err(ApiKeyValidationError::NoScopes);
    }

    if normalized.len() > limits.max_scopes {
        return Err(ApiKeyValidationError::TooManyScopes(limits.max_scopes));
    }

    Ok(ValidatedKeyInput {
        name: name.to_string(),
        owner: owner.to_string(),
        scopes: normalized,
    })
}

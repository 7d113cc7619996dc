//! API key lifecycle engine and its supporting pieces

pub mod cursor;
pub mod reconciliation;
pub mod service;

pub use cursor::Cursor;
pub use service::{
    ApiKeyService, CreateKeyRequest, KeyDetails, RotateKeyOptions, DEFAULT_GRACE_PERIOD_DAYS,
    MAX_GRACE_PERIOD_DAYS,
};

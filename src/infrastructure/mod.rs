//! Infrastructure layer - Concrete adapters behind the domain contracts

pub mod api_key;
pub mod crypto;
pub mod logging;
pub mod storage;

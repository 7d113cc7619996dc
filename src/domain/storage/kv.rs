//! Key-value store contract
//!
//! The engine assumes a single logical writer per key namespace but every call
//! is asynchronous I/O against a remote store, so a multi-step mutation is not
//! atomic unless batched: any mutation touching more than one index goes
//! through [`KeyValueStore::commit`], which applies all writes or none.
//! Single-key writes that are idempotent and self-correcting on the next read
//! (the lazy expiry flip, the `last_used_at` touch) may use plain `put`.

use std::fmt::Debug;

use async_trait::async_trait;

use crate::domain::DomainError;

/// One listed key/value pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvEntry {
    pub key: String,
    pub value: String,
}

/// Options for ordered listing
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Only keys starting with this prefix are returned
    pub prefix: String,
    /// Exclusive lower bound: only keys strictly greater than this are returned
    pub start: Option<String>,
    /// Maximum number of entries to return
    pub limit: Option<usize>,
}

impl ListOptions {
    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            start: None,
            limit: None,
        }
    }

    pub fn with_start(mut self, start: impl Into<String>) -> Self {
        self.start = Some(start.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// A single batched write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    Put { key: String, value: String },
    Delete { key: String },
}

/// An all-or-nothing batch of writes
///
/// Built up by the engine and handed to [`KeyValueStore::commit`]; the adapter
/// must apply every operation or none of them.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.ops.push(WriteOp::Put {
            key: key.into(),
            value: value.into(),
        });
    }

    pub fn delete(&mut self, key: impl Into<String>) {
        self.ops.push(WriteOp::Delete { key: key.into() });
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

/// Contract over the external ordered key-value store
///
/// Consumed, not implemented, by the engine; the in-memory adapter exists for
/// tests and development.
#[async_trait]
pub trait KeyValueStore: Send + Sync + Debug {
    /// Get a value by key
    async fn get(&self, key: &str) -> Result<Option<String>, DomainError>;

    /// Write a single key
    async fn put(&self, key: &str, value: &str) -> Result<(), DomainError>;

    /// Delete a single key, returns true if it existed
    async fn delete(&self, key: &str) -> Result<bool, DomainError>;

    /// List entries in key order
    async fn list(&self, options: &ListOptions) -> Result<Vec<KvEntry>, DomainError>;

    /// Apply a batch of writes atomically
    async fn commit(&self, batch: WriteBatch) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_batch_collects_ops() {
        let mut batch = WriteBatch::new();
        assert!(batch.is_empty());

        batch.put("a", "1");
        batch.delete("b");

        assert_eq!(batch.len(), 2);
        assert_eq!(
            batch.ops()[0],
            WriteOp::Put {
                key: "a".to_string(),
                value: "1".to_string()
            }
        );
        assert_eq!(
            batch.ops()[1],
            WriteOp::Delete {
                key: "b".to_string()
            }
        );
    }

    #[test]
    fn test_list_options_builder() {
        let options = ListOptions::prefix("key:")
            .with_start("key:5")
            .with_limit(10);

        assert_eq!(options.prefix, "key:");
        assert_eq!(options.start.as_deref(), Some("key:5"));
        assert_eq!(options.limit, Some(10));
    }
}

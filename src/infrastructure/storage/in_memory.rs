//! In-memory key-value store
//!
//! Ordered store over a `BTreeMap`, useful for testing and development. Data
//! is lost when the process terminates. Supports injecting a number of
//! consecutive write failures to exercise retry and error-propagation paths.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::ops::Bound;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::storage::{KeyValueStore, KvEntry, ListOptions, WriteBatch, WriteOp};
use crate::domain::DomainError;

/// Thread-safe in-memory implementation of [`KeyValueStore`]
#[derive(Debug, Default)]
pub struct InMemoryKeyValueStore {
    entries: RwLock<BTreeMap<String, String>>,
    failures_remaining: RwLock<u32>,
}

impl InMemoryKeyValueStore {
    /// Creates a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with entries
    pub fn with_entries(entries: Vec<(String, String)>) -> Self {
        let store = Self::new();
        {
            let mut map = store.entries.write().unwrap();

            for (key, value) in entries {
                map.insert(key, value);
            }
        }
        store
    }

    /// Make the next `count` write operations (put/delete/commit) fail with a
    /// storage error; reads are unaffected
    pub fn inject_failures(&self, count: u32) {
        *self.failures_remaining.write().unwrap() = count;
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }

    fn check_failure(&self) -> Result<(), DomainError> {
        let mut remaining = self.failures_remaining.write().map_err(|e| {
            DomainError::storage(format!("Failed to acquire failure lock: {}", e))
        })?;

        if *remaining > 0 {
            *remaining -= 1;
            return Err(DomainError::storage("Injected storage failure"));
        }

        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, DomainError> {
        let entries = self
            .entries
            .read()
            .map_err(|e| DomainError::storage(format!("Failed to acquire read lock: {}", e)))?;

        Ok(entries.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), DomainError> {
        self.check_failure()?;

        let mut entries = self
            .entries
            .write()
            .map_err(|e| DomainError::storage(format!("Failed to acquire write lock: {}", e)))?;

        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        self.check_failure()?;

        let mut entries = self
            .entries
            .write()
            .map_err(|e| DomainError::storage(format!("Failed to acquire write lock: {}", e)))?;

        Ok(entries.remove(key).is_some())
    }

    async fn list(&self, options: &ListOptions) -> Result<Vec<KvEntry>, DomainError> {
        let entries = self
            .entries
            .read()
            .map_err(|e| DomainError::storage(format!("Failed to acquire read lock: {}", e)))?;

        let lower = match &options.start {
            // Exclusive start, but never before the prefix itself
            Some(start) if start.as_str() >= options.prefix.as_str() => {
                Bound::Excluded(start.clone())
            }
            _ => Bound::Included(options.prefix.clone()),
        };

        let mut result = Vec::new();

        for (key, value) in entries.range((lower, Bound::Unbounded)) {
            if !key.starts_with(&options.prefix) {
                break;
            }

            result.push(KvEntry {
                key: key.clone(),
                value: value.clone(),
            });

            if let Some(limit) = options.limit {
                if result.len() >= limit {
                    break;
                }
            }
        }

        Ok(result)
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), DomainError> {
        self.check_failure()?;

        // One write lock for the whole batch keeps it all-or-nothing
        let mut entries = self
            .entries
            .write()
            .map_err(|e| DomainError::storage(format!("Failed to acquire write lock: {}", e)))?;

        for op in batch.into_ops() {
            match op {
                WriteOp::Put { key, value } => {
                    entries.insert(key, value);
                }
                WriteOp::Delete { key } => {
                    entries.remove(&key);
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(key: &str, value: &str) -> (String, String) {
        (key.to_string(), value.to_string())
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let store = InMemoryKeyValueStore::new();

        store.put("key:1", "value-1").await.unwrap();

        let value = store.get("key:1").await.unwrap();
        assert_eq!(value.as_deref(), Some("value-1"));

        let missing = store.get("key:2").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_delete() {
        let store = InMemoryKeyValueStore::with_entries(vec![pair("key:1", "v")]);

        assert!(store.delete("key:1").await.unwrap());
        assert!(!store.delete("key:1").await.unwrap());
        assert!(store.get("key:1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_by_prefix_is_ordered() {
        let store = InMemoryKeyValueStore::with_entries(vec![
            pair("lookup:b", "2"),
            pair("key:1", "k"),
            pair("lookup:a", "1"),
            pair("lookup:c", "3"),
        ]);

        let entries = store.list(&ListOptions::prefix("lookup:")).await.unwrap();

        let keys: Vec<&str> = entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["lookup:a", "lookup:b", "lookup:c"]);
    }

    #[tokio::test]
    async fn test_list_start_is_exclusive() {
        let store = InMemoryKeyValueStore::with_entries(vec![
            pair("idx:1", "a"),
            pair("idx:2", "b"),
            pair("idx:3", "c"),
        ]);

        let entries = store
            .list(&ListOptions::prefix("idx:").with_start("idx:1"))
            .await
            .unwrap();

        let keys: Vec<&str> = entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["idx:2", "idx:3"]);
    }

    #[tokio::test]
    async fn test_list_respects_limit() {
        let store = InMemoryKeyValueStore::with_entries(vec![
            pair("idx:1", "a"),
            pair("idx:2", "b"),
            pair("idx:3", "c"),
        ]);

        let entries = store
            .list(&ListOptions::prefix("idx:").with_limit(2))
            .await
            .unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key, "idx:1");
    }

    #[tokio::test]
    async fn test_list_prefix_does_not_bleed_into_sibling_namespace() {
        // "key:" must not match "keyindex:" entries
        let store = InMemoryKeyValueStore::with_entries(vec![
            pair("key:1", "record"),
            pair("keyindex:000_1", "1"),
        ]);

        let entries = store.list(&ListOptions::prefix("key:")).await.unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, "key:1");
    }

    #[tokio::test]
    async fn test_commit_applies_all_ops() {
        let store = InMemoryKeyValueStore::with_entries(vec![pair("old", "x")]);

        let mut batch = WriteBatch::new();
        batch.put("a", "1");
        batch.put("b", "2");
        batch.delete("old");

        store.commit(batch).await.unwrap();

        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("1"));
        assert_eq!(store.get("b").await.unwrap().as_deref(), Some("2"));
        assert!(store.get("old").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_injected_failures_then_recovery() {
        let store = InMemoryKeyValueStore::new();
        store.inject_failures(2);

        assert!(store.put("k", "v").await.is_err());
        assert!(store.put("k", "v").await.is_err());

        // Reads never count against injected failures
        assert!(store.get("k").await.unwrap().is_none());

        // Third write succeeds
        store.put("k", "v").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_failed_commit_leaves_store_untouched() {
        let store = InMemoryKeyValueStore::with_entries(vec![pair("keep", "1")]);
        store.inject_failures(1);

        let mut batch = WriteBatch::new();
        batch.put("new", "2");
        batch.delete("keep");

        assert!(store.commit(batch).await.is_err());
        assert_eq!(store.get("keep").await.unwrap().as_deref(), Some("1"));
        assert!(store.get("new").await.unwrap().is_none());
    }
}

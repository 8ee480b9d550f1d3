//! In-memory storage implementation
//!
//! This module provides an in-memory [`KeyValueStore`], suitable for
//! testing and simulation environments.

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::trace;

use crate::{KeyValueStore, StorageError};

/// In-memory implementation of KeyValueStore
///
/// Uses `DashMap` for concurrent access. Contents are lost when the store
/// is dropped.
#[derive(Debug, Default)]
pub struct InMemoryKvStore {
    entries: DashMap<String, String>,
}

impl InMemoryKvStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write a raw value directly, bypassing any encoding
    pub fn insert_raw(&self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        trace!(key, bytes = value.len(), "Storing value");
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.entries.remove(key).is_some())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_remove() {
        let store = InMemoryKvStore::new();
        assert!(store.get("a").await.unwrap().is_none());

        tokio_test::assert_ok!(store.set("a", "1".to_string()).await);
        tokio_test::assert_ok!(store.set("a", "2".to_string()).await);
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("2"));
        assert_eq!(store.len(), 1);

        assert!(store.remove("a").await.unwrap());
        assert!(!store.remove("a").await.unwrap());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_keys_with_prefix_sorted() {
        let store = InMemoryKvStore::new();
        store.insert_raw("tile:2", "x");
        store.insert_raw("tile:1", "x");
        store.insert_raw("other:1", "x");

        let keys = store.keys_with_prefix("tile:").await.unwrap();
        assert_eq!(keys, vec!["tile:1".to_string(), "tile:2".to_string()]);
    }
}

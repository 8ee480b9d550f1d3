//! Persistent storage implementation
//!
//! This module provides a file-backed [`KeyValueStore`] on top of redb.
//! Every write commits its own transaction, so a completed `set` is
//! durable.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use redb::{Database, TableDefinition};
use tracing::{debug, info, instrument};

use crate::{KeyValueStore, StorageError};

// Key: storage key string, Value: encoded value string
const ENTRIES: TableDefinition<&str, &str> = TableDefinition::new("entries");

/// Configuration for redb storage
#[derive(Debug, Clone)]
pub struct RedbStorageConfig {
    /// Path to the database file
    pub db_path: PathBuf,
}

impl Default for RedbStorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/fogmap.redb"),
        }
    }
}

impl RedbStorageConfig {
    pub fn at(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }
}

/// redb-backed key-value store
#[derive(Clone)]
pub struct RedbKvStore {
    db: Arc<Database>,
    config: RedbStorageConfig,
}

impl std::fmt::Debug for RedbKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbKvStore")
            .field("db_path", &self.config.db_path)
            .finish()
    }
}

impl RedbKvStore {
    /// Open or create the database
    #[instrument(skip(config), fields(path = %config.db_path.display()))]
    pub fn open(config: RedbStorageConfig) -> Result<Self, StorageError> {
        // Ensure parent directory exists
        if let Some(parent) = config.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db = Database::create(&config.db_path)
            .map_err(|e| StorageError::database(e.to_string()))?;

        info!("Opened redb database");

        let store = Self {
            db: Arc::new(db),
            config,
        };
        store.init_tables()?;
        Ok(store)
    }

    /// Create the entries table if it doesn't exist
    fn init_tables(&self) -> Result<(), StorageError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| StorageError::database(e.to_string()))?;
        write_txn
            .open_table(ENTRIES)
            .map_err(|e| StorageError::database(e.to_string()))?;
        write_txn
            .commit()
            .map_err(|e| StorageError::database(e.to_string()))?;

        debug!("Initialized redb tables");
        Ok(())
    }

    /// Get the configuration
    pub fn config(&self) -> &RedbStorageConfig {
        &self.config
    }
}

#[async_trait]
impl KeyValueStore for RedbKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| StorageError::database(e.to_string()))?;
        let table = read_txn
            .open_table(ENTRIES)
            .map_err(|e| StorageError::database(e.to_string()))?;

        let value = table
            .get(key)
            .map_err(|e| StorageError::database(e.to_string()))?
            .map(|v| v.value().to_string());
        Ok(value)
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| StorageError::database(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(ENTRIES)
                .map_err(|e| StorageError::database(e.to_string()))?;
            table
                .insert(key, value.as_str())
                .map_err(|e| StorageError::database(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| StorageError::database(e.to_string()))?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, StorageError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| StorageError::database(e.to_string()))?;
        let removed = {
            let mut table = write_txn
                .open_table(ENTRIES)
                .map_err(|e| StorageError::database(e.to_string()))?;
            table
                .remove(key)
                .map_err(|e| StorageError::database(e.to_string()))?
                .is_some()
        };
        write_txn
            .commit()
            .map_err(|e| StorageError::database(e.to_string()))?;
        Ok(removed)
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| StorageError::database(e.to_string()))?;
        let table = read_txn
            .open_table(ENTRIES)
            .map_err(|e| StorageError::database(e.to_string()))?;

        let mut keys = Vec::new();
        let range = table
            .range(prefix..)
            .map_err(|e| StorageError::database(e.to_string()))?;

        for entry in range {
            let (key, _) = entry.map_err(|e| StorageError::database(e.to_string()))?;
            let key = key.value();

            // Keys are sorted, so the first miss ends the prefix
            if !key.starts_with(prefix) {
                break;
            }
            keys.push(key.to_string());
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (RedbKvStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = RedbKvStore::open(RedbStorageConfig::at(temp_dir.path().join("test.redb")))
            .unwrap();
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_put_get() {
        let (store, _temp) = create_test_store();

        store.set("tile:1", "value".to_string()).await.unwrap();
        assert_eq!(store.get("tile:1").await.unwrap().as_deref(), Some("value"));
        assert!(store.get("tile:2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete() {
        let (store, _temp) = create_test_store();

        store.set("delete_me", "v".to_string()).await.unwrap();
        assert!(store.remove("delete_me").await.unwrap());
        assert!(!store.remove("delete_me").await.unwrap());
        assert!(store.get("delete_me").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_scan_prefix() {
        let (store, _temp) = create_test_store();

        store.set("discovery-tile:15/1/1", "a".into()).await.unwrap();
        store.set("discovery-tile:15/1/2", "b".into()).await.unwrap();
        store.set("other:1", "c".into()).await.unwrap();
        store.set("zzz", "d".into()).await.unwrap();

        let keys = store.keys_with_prefix("discovery-tile:").await.unwrap();
        assert_eq!(keys.len(), 2);
        assert!(keys.iter().all(|k| k.starts_with("discovery-tile:")));
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("reopen.redb");

        {
            let store = RedbKvStore::open(RedbStorageConfig::at(&path)).unwrap();
            store.set("k", "v".into()).await.unwrap();
        }

        let store = RedbKvStore::open(RedbStorageConfig::at(&path)).unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
    }
}

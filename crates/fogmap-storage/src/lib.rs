//! # Fogmap Storage
//!
//! Durable persistence for revealed discovery tiles.
//!
//! Tiles are written to a generic string key-value store, one key per tile,
//! independent of the in-memory cache's eviction policy.
//!
//! ## Features
//!
//! - **KeyValueStore trait**: Abstraction over a durable string key-value store
//! - **InMemoryKvStore**: In-memory implementation for testing/simulation
//! - **RedbKvStore**: File-backed implementation on redb for production
//! - **TilePersistence trait**: Save/load of one tile's revealed points
//! - **KvTilePersistence**: JSON tiles under `"<prefix>:<zoom>/<x>/<y>"` keys
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use fogmap_core::{StoredTile, TileId, TilePoint};
//! use fogmap_storage::{InMemoryKvStore, KvTilePersistence, TilePersistence};
//!
//! #[tokio::main]
//! async fn main() {
//!     let persistence = KvTilePersistence::new(Arc::new(InMemoryKvStore::new()));
//!     let id = TileId::new(15, 9739, 12405);
//!
//!     let tile = StoredTile { points: vec![TilePoint::new(10.0, 20.0, 13.6)] };
//!     persistence.save_tile(&id, &tile).await.unwrap();
//!
//!     assert_eq!(persistence.load_tile(&id).await, Some(tile));
//! }
//! ```

pub mod memory;
pub mod persistent;
pub mod tiles;

// Re-exports
pub use fogmap_core::StorageError;
pub use memory::InMemoryKvStore;
pub use persistent::{RedbKvStore, RedbStorageConfig};
pub use tiles::{DEFAULT_KEY_PREFIX, KvTilePersistence};

use async_trait::async_trait;
use fogmap_core::{StoredTile, TileId};

/// A durable string key-value store
///
/// Values are opaque strings; callers own the encoding. Each call is
/// atomic from the caller's point of view, and no operation spans more
/// than one key.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Overwrite the value stored under `key`
    async fn set(&self, key: &str, value: String) -> Result<(), StorageError>;

    /// Remove `key`, returning whether it existed
    async fn remove(&self, key: &str) -> Result<bool, StorageError>;

    /// All keys starting with `prefix`, in ascending order
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}

/// Durable storage of a tile's revealed points
#[async_trait]
pub trait TilePersistence: Send + Sync {
    /// Overwrite the stored record for `tile_id`
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be encoded or written.
    async fn save_tile(&self, tile_id: &TileId, tile: &StoredTile) -> Result<(), StorageError>;

    /// Read the stored record for `tile_id`
    ///
    /// Returns `None` when no record exists, and also when the record cannot
    /// be read or decoded. Callers treat all three as "no prior data".
    async fn load_tile(&self, tile_id: &TileId) -> Option<StoredTile>;

    /// Ids of every tile with a stored record
    async fn stored_tile_ids(&self) -> Result<Vec<TileId>, StorageError>;
}

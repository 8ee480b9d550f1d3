//! Tile persistence over a key-value store
//!
//! Each tile is one key, `"<prefix>:<zoom>/<x>/<y>"`, holding the JSON
//! encoding of its points: `{"points":[{"x":..,"y":..,"r":..}]}`.

use std::sync::Arc;

use async_trait::async_trait;
use fogmap_core::{StoredTile, TileId};
use tracing::{debug, instrument, warn};

use crate::{KeyValueStore, StorageError, TilePersistence};

/// Key prefix used when none is configured
pub const DEFAULT_KEY_PREFIX: &str = "discovery-tile";

/// [`TilePersistence`] backed by any [`KeyValueStore`]
#[derive(Clone)]
pub struct KvTilePersistence {
    store: Arc<dyn KeyValueStore>,
    prefix: String,
}

impl std::fmt::Debug for KvTilePersistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvTilePersistence")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl KvTilePersistence {
    /// Persist tiles into `store` under the default key prefix
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_prefix(store, DEFAULT_KEY_PREFIX)
    }

    /// Persist tiles into `store` under a custom key prefix
    pub fn with_prefix(store: Arc<dyn KeyValueStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    /// Storage key for a tile
    pub fn key_for(&self, tile_id: &TileId) -> String {
        format!("{}:{}", self.prefix, tile_id)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The underlying key-value store
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }
}

#[async_trait]
impl TilePersistence for KvTilePersistence {
    #[instrument(skip(self, tile_id, tile), fields(tile = %tile_id, points = tile.points.len()))]
    async fn save_tile(&self, tile_id: &TileId, tile: &StoredTile) -> Result<(), StorageError> {
        let encoded =
            serde_json::to_string(tile).map_err(|e| StorageError::serialization(e.to_string()))?;
        self.store.set(&self.key_for(tile_id), encoded).await?;
        debug!("Saved tile");
        Ok(())
    }

    async fn load_tile(&self, tile_id: &TileId) -> Option<StoredTile> {
        let key = self.key_for(tile_id);
        let raw = match self.store.get(&key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(tile = %tile_id, error = %e, "Failed to read tile, treating as absent");
                return None;
            }
        };

        match serde_json::from_str::<StoredTile>(&raw) {
            Ok(tile) => Some(tile),
            Err(e) => {
                warn!(tile = %tile_id, error = %e, "Corrupt tile record, treating as absent");
                None
            }
        }
    }

    async fn stored_tile_ids(&self) -> Result<Vec<TileId>, StorageError> {
        let key_prefix = format!("{}:", self.prefix);
        let keys = self.store.keys_with_prefix(&key_prefix).await?;

        Ok(keys
            .iter()
            .filter_map(|key| key.strip_prefix(&key_prefix))
            .filter_map(|raw| TileId::from_raw(raw).ok())
            .collect())
    }
}

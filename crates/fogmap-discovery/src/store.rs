//! Bounded in-memory tile store
//!
//! [`TileStore`] keeps at most `max_tiles_in_memory` tile records resident,
//! ordered by recency of access. Mutated tiles are written back to
//! [`TilePersistence`] after a quiet period, and a tile leaving memory is
//! written before it goes, so no reveal is lost to eviction.
//!
//! All cache state sits behind one async mutex that is held across the
//! whole load-mutate-store-evict sequence of a reveal. Concurrent reveals
//! therefore never lose each other's points or evict the same tile twice.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use fogmap_core::{DiscoveryConfig, TileId, TilePoint, TileRecord, geo};
use fogmap_storage::TilePersistence;
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

use crate::debounce::DebounceScheduler;

/// Result of revealing one position
#[derive(Debug, Clone, PartialEq)]
pub struct Reveal {
    /// The tile after the new point was appended
    pub tile: TileRecord,
    /// The point that was appended
    pub point: TilePoint,
}

/// Statistics about tile store usage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TileStoreStats {
    /// Number of tiles currently resident
    pub resident_tiles: usize,
    /// Tiles found in memory when needed
    pub hits: u64,
    /// Tiles brought back from persistence
    pub loads: u64,
    /// Tiles created empty because nothing was stored
    pub created: u64,
    /// Tiles removed from memory by LRU eviction
    pub evictions: u64,
    /// Successful writes to persistence
    pub saves: u64,
    /// Writes to persistence that failed
    pub failed_saves: u64,
}

/// Resident tiles plus their LRU order
struct TileCache {
    /// Map from tile id to record
    tiles: HashMap<TileId, TileRecord>,
    /// LRU queue (most recently used at back, least recently used at front)
    lru_queue: VecDeque<TileId>,
    stats: TileStoreStats,
}

impl TileCache {
    fn new() -> Self {
        Self {
            tiles: HashMap::new(),
            lru_queue: VecDeque::new(),
            stats: TileStoreStats::default(),
        }
    }

    /// Move a key to the back of the LRU queue (mark as most recently used)
    fn touch(&mut self, id: &TileId) {
        self.lru_queue.retain(|k| k != id);
        self.lru_queue.push_back(id.clone());
    }

    fn insert(&mut self, record: TileRecord) {
        let id = record.id.clone();
        self.tiles.insert(id.clone(), record);
        self.touch(&id);
        self.stats.resident_tiles = self.tiles.len();
    }

    fn remove(&mut self, id: &TileId) -> Option<TileRecord> {
        let removed = self.tiles.remove(id);
        if removed.is_some() {
            self.lru_queue.retain(|k| k != id);
            self.stats.resident_tiles = self.tiles.len();
        }
        removed
    }

    fn least_recent(&self) -> Option<&TileId> {
        self.lru_queue.front()
    }
}

struct TileStoreInner {
    config: DiscoveryConfig,
    persistence: Arc<dyn TilePersistence>,
    cache: Mutex<TileCache>,
    saves: DebounceScheduler<TileId>,
}

impl TileStoreInner {
    async fn load_record(&self, tile_id: &TileId) -> Option<TileRecord> {
        let stored = self.persistence.load_tile(tile_id).await?;
        Some(TileRecord::from_stored(tile_id.clone(), stored))
    }

    /// Write one tile, logging instead of failing
    async fn persist(&self, cache: &mut TileCache, record: &TileRecord) -> bool {
        match self.persistence.save_tile(&record.id, &record.to_stored()).await {
            Ok(()) => {
                cache.stats.saves += 1;
                true
            }
            Err(e) => {
                cache.stats.failed_saves += 1;
                warn!(tile = %record.id, error = %e, "Failed to persist tile");
                false
            }
        }
    }

    /// Debounced write-back: save the tile's latest state if still resident
    async fn persist_if_resident(&self, tile_id: &TileId) {
        let mut cache = self.cache.lock().await;
        if let Some(record) = cache.tiles.get(tile_id).cloned() {
            self.persist(&mut cache, &record).await;
        }
    }

    /// Evict least recently used tiles until within capacity
    async fn evict_locked(&self, cache: &mut TileCache) {
        while cache.tiles.len() > self.config.max_tiles_in_memory {
            let Some(victim) = cache.least_recent().cloned() else {
                return;
            };
            if let Some(record) = cache.tiles.get(&victim).cloned() {
                // Persist first; a failed write is logged and the tile still
                // leaves memory so the bound holds.
                self.persist(cache, &record).await;
            }
            cache.remove(&victim);
            self.saves.cancel(&victim);
            cache.stats.evictions += 1;
            debug!(tile = %victim, resident = cache.tiles.len(), "Evicted tile");
        }
    }
}

/// Bounded LRU cache of revealed tiles with debounced write-back
///
/// Cloning is cheap and every clone shares the same cache.
#[derive(Clone)]
pub struct TileStore {
    inner: Arc<TileStoreInner>,
}

impl std::fmt::Debug for TileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileStore")
            .field("config", &self.inner.config)
            .field("saves", &self.inner.saves)
            .finish_non_exhaustive()
    }
}

impl TileStore {
    /// Create an empty store writing through `persistence`
    pub fn new(config: DiscoveryConfig, persistence: Arc<dyn TilePersistence>) -> Self {
        let saves =
            DebounceScheduler::new(config.save_debounce()).with_max_wait(config.save_max_wait());
        Self {
            inner: Arc::new(TileStoreInner {
                config,
                persistence,
                cache: Mutex::new(TileCache::new()),
                saves,
            }),
        }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.inner.config
    }

    /// In-memory lookup only; never touches persistence or LRU order
    pub async fn get_tile(&self, tile_id: &TileId) -> Option<TileRecord> {
        self.inner.cache.lock().await.tiles.get(tile_id).cloned()
    }

    /// Insert or replace a tile, mark it most recently used, and enforce
    /// the memory bound
    pub async fn set_tile(&self, tile_id: TileId, mut tile: TileRecord) {
        tile.id = tile_id;
        let mut cache = self.inner.cache.lock().await;
        cache.insert(tile);
        self.inner.evict_locked(&mut cache).await;
    }

    /// Mark a resident tile as most recently used; no-op if absent
    pub async fn touch(&self, tile_id: &TileId) {
        let mut cache = self.inner.cache.lock().await;
        if cache.tiles.contains_key(tile_id) {
            cache.touch(tile_id);
        }
    }

    /// Read a tile from persistence, bypassing memory
    pub async fn load_tile(&self, tile_id: &TileId) -> Option<TileRecord> {
        self.inner.load_record(tile_id).await
    }

    /// Evict least recently used tiles, persisting each, until within
    /// `max_tiles_in_memory`
    pub async fn evict_if_needed(&self) {
        let mut cache = self.inner.cache.lock().await;
        self.inner.evict_locked(&mut cache).await;
    }

    /// Reveal a circle around `(lat, lon)` and return the new point
    pub async fn reveal_at(&self, lat: f64, lon: f64) -> Reveal {
        let config = &self.inner.config;
        let pixel = geo::project_to_tile_pixel(lon, lat, config.tile_zoom, config.tile_size_px);
        let tile_id = pixel.tile_id(config.tile_zoom);
        let radius_px = geo::meters_to_pixels(lat, config.reveal_radius_meters, config.tile_zoom);
        let point = TilePoint::new(f64::from(pixel.pixel_x), f64::from(pixel.pixel_y), radius_px);

        let mut cache = self.inner.cache.lock().await;

        let mut tile = match cache.remove(&tile_id) {
            Some(tile) => {
                cache.stats.hits += 1;
                tile
            }
            None => match self.inner.load_record(&tile_id).await {
                Some(tile) => {
                    cache.stats.loads += 1;
                    tile
                }
                None => {
                    cache.stats.created += 1;
                    TileRecord::empty(tile_id.clone())
                }
            },
        };

        tile.points.push(point);
        if let Some(limit) = config.compact_after_points {
            if tile.len() > limit {
                let removed = tile.compact();
                debug!(tile = %tile_id, removed, remaining = tile.len(), "Compacted tile");
            }
        }

        let snapshot = tile.clone();
        cache.insert(tile);
        self.schedule_save(tile_id.clone());
        self.inner.evict_locked(&mut cache).await;

        trace!(tile = %tile_id, x = point.x, y = point.y, r = point.r, "Revealed point");
        Reveal {
            tile: snapshot,
            point,
        }
    }

    /// Ids of the tiles around the one containing `(lat, lon)`
    pub fn nearby_tile_ids(&self, lat: f64, lon: f64) -> Vec<TileId> {
        let config = &self.inner.config;
        let pixel = geo::project_to_tile_pixel(lon, lat, config.tile_zoom, config.tile_size_px);
        geo::tiles_around(
            pixel.tile_x,
            pixel.tile_y,
            config.max_tiles_load_radius,
            config.tile_zoom,
        )
    }

    /// Bring every existing tile around `(lat, lon)` into memory
    ///
    /// Tiles already resident are used as-is; others are read from
    /// persistence. Only tiles with a record are returned.
    pub async fn load_nearby(&self, lat: f64, lon: f64) -> Vec<TileRecord> {
        let ids = self.nearby_tile_ids(lat, lon);
        let mut found = Vec::new();
        let mut cache = self.inner.cache.lock().await;

        for id in ids {
            if let Some(tile) = cache.tiles.get(&id).cloned() {
                cache.stats.hits += 1;
                cache.touch(&id);
                found.push(tile);
                continue;
            }
            if let Some(tile) = self.inner.load_record(&id).await {
                cache.stats.loads += 1;
                cache.insert(tile.clone());
                found.push(tile);
            }
        }

        self.inner.evict_locked(&mut cache).await;
        debug!(lat, lon, tiles = found.len(), "Loaded nearby tiles");
        found
    }

    /// Persist every tile with a pending write-back now
    ///
    /// Returns the number of tiles written.
    pub async fn flush(&self) -> usize {
        let pending = self.inner.saves.take_pending();
        let mut cache = self.inner.cache.lock().await;
        let mut written = 0;

        for id in pending {
            if let Some(record) = cache.tiles.get(&id).cloned() {
                if self.inner.persist(&mut cache, &record).await {
                    written += 1;
                }
            }
        }
        written
    }

    fn schedule_save(&self, tile_id: TileId) {
        let inner = Arc::clone(&self.inner);
        let key = tile_id.clone();
        self.inner.saves.schedule(key, move || async move {
            inner.persist_if_resident(&tile_id).await;
        });
    }

    /// Whether a write-back is waiting for `tile_id`
    pub fn has_pending_save(&self, tile_id: &TileId) -> bool {
        self.inner.saves.is_pending(tile_id)
    }

    /// Number of resident tiles
    pub async fn len(&self) -> usize {
        self.inner.cache.lock().await.tiles.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Resident tile ids from least to most recently used
    pub async fn resident_ids(&self) -> Vec<TileId> {
        self.inner.cache.lock().await.lru_queue.iter().cloned().collect()
    }

    pub async fn stats(&self) -> TileStoreStats {
        self.inner.cache.lock().await.stats
    }
}

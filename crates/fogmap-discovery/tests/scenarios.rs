//! End-to-end behavior of the reveal pipeline

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use fogmap_core::{
    DiscoveryConfig, LocationSample, MiniMapConfig, SimulatedLocationProvider, StoredTile, TileId,
    geo,
};
use fogmap_discovery::{
    MapMode, ModeContext, ModeManager, RecordingRenderer, RendererBridge, RendererMessage,
    TileStore,
};
use fogmap_storage::{InMemoryKvStore, KvTilePersistence, StorageError, TilePersistence};

/// Persistence wrapper that counts writes per call
struct CountingPersistence {
    inner: KvTilePersistence,
    saves: AtomicUsize,
}

impl CountingPersistence {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: KvTilePersistence::new(Arc::new(InMemoryKvStore::new())),
            saves: AtomicUsize::new(0),
        })
    }

    fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TilePersistence for CountingPersistence {
    async fn save_tile(&self, tile_id: &TileId, tile: &StoredTile) -> Result<(), StorageError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save_tile(tile_id, tile).await
    }

    async fn load_tile(&self, tile_id: &TileId) -> Option<StoredTile> {
        self.inner.load_tile(tile_id).await
    }

    async fn stored_tile_ids(&self) -> Result<Vec<TileId>, StorageError> {
        self.inner.stored_tile_ids().await
    }
}

/// Longitude of the center of tile column `x` at zoom 15
fn tile_center_lon(x: i64) -> f64 {
    (x as f64 + 0.5) / 32768.0 * 360.0 - 180.0
}

#[tokio::test]
async fn reveal_in_new_york_at_zoom_15() {
    let store = TileStore::new(DiscoveryConfig::default(), CountingPersistence::new());

    let reveal = store.reveal_at(40.0, -73.0).await;

    assert_eq!(reveal.tile.id.as_str(), "15/9739/12405");
    assert_eq!(reveal.tile.points.len(), 1);
    assert!((reveal.point.r - 13.66).abs() < 0.01);

    let expected = geo::project_to_tile_pixel(-73.0, 40.0, 15, 256);
    assert_eq!(reveal.point.x, f64::from(expected.pixel_x));
    assert_eq!(reveal.point.y, f64::from(expected.pixel_y));
}

#[tokio::test]
async fn eviction_keeps_bound_and_loses_nothing() {
    let persistence = CountingPersistence::new();
    let config = DiscoveryConfig::default().with_max_tiles_in_memory(2);
    let store = TileStore::new(config, persistence.clone());

    let lat = 40.0;
    let a = store.reveal_at(lat, tile_center_lon(9739)).await.tile.id;
    let b = store.reveal_at(lat, tile_center_lon(9740)).await.tile.id;
    let c = store.reveal_at(lat, tile_center_lon(9741)).await.tile.id;
    assert_ne!(a, b);
    assert_ne!(b, c);

    assert_eq!(store.len().await, 2);
    assert!(store.get_tile(&a).await.is_none());
    assert!(store.get_tile(&b).await.is_some());
    assert!(store.get_tile(&c).await.is_some());

    let reloaded = store.load_tile(&a).await.expect("evicted tile was persisted");
    assert_eq!(reloaded.points.len(), 1);
    assert_eq!(persistence.saves(), 1);
}

#[tokio::test(start_paused = true)]
async fn rapid_reveals_coalesce_into_one_save() {
    let persistence = CountingPersistence::new();
    let store = TileStore::new(DiscoveryConfig::default(), persistence.clone());

    let mut tile_id = None;
    for _ in 0..3 {
        tile_id = Some(store.reveal_at(40.0, -73.0).await.tile.id);
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    let tile_id = tile_id.unwrap();
    assert_eq!(persistence.saves(), 0);

    // 750ms after the last reveal
    tokio::time::sleep(Duration::from_millis(700)).await;
    assert_eq!(persistence.saves(), 1);

    let stored = persistence.load_tile(&tile_id).await.unwrap();
    assert_eq!(stored.points.len(), 3);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(persistence.saves(), 1);
}

#[tokio::test]
async fn nearby_ids_form_three_by_three_block() {
    let store = TileStore::new(DiscoveryConfig::default(), CountingPersistence::new());

    let ids = store.nearby_tile_ids(40.0, -73.0);
    assert_eq!(ids.len(), 9);
    assert!(ids.contains(&TileId::new(15, 9739, 12405)));
    for dx in -1..=1 {
        for dy in -1..=1 {
            assert!(ids.contains(&TileId::new(15, 9739 + dx, 12405 + dy)));
        }
    }
}

#[tokio::test(start_paused = true)]
async fn deactivate_mid_debounce_still_saves() {
    let persistence = CountingPersistence::new();
    let provider = Arc::new(SimulatedLocationProvider::new());
    let renderer = RecordingRenderer::new();
    let ctx = ModeContext::new(RendererBridge::with_sink(renderer.clone()), provider.clone());
    let manager = ModeManager::new(
        ctx,
        DiscoveryConfig::default(),
        MiniMapConfig::default(),
        persistence.clone(),
    );

    manager.set_active_mode(Some(MapMode::Discovery)).await.join().await;
    provider.push_location(LocationSample::at(40.0, -73.0));
    tokio::time::sleep(Duration::from_millis(10)).await;

    let tile_id = TileId::new(15, 9739, 12405);
    assert!(manager.discovery().store().has_pending_save(&tile_id));
    assert!(persistence.load_tile(&tile_id).await.is_none());

    manager.set_active_mode(None).await.join().await;
    assert!(renderer.messages().contains(&RendererMessage::ClearDiscoveryFog));

    tokio::time::sleep(Duration::from_secs(1)).await;
    let stored = persistence.load_tile(&tile_id).await.expect("pending save completed");
    assert_eq!(stored.points.len(), 1);
}

#[tokio::test]
async fn radius_grows_toward_the_pole() {
    let store = TileStore::new(DiscoveryConfig::default(), CountingPersistence::new());

    let mut previous = 0.0;
    for lat in [0.0, 20.0, 40.0, 60.0, 80.0] {
        let reveal = store.reveal_at(lat, 10.0).await;
        assert!(reveal.point.r > previous);
        previous = reveal.point.r;

        let meters = reveal.point.r * geo::meters_per_pixel(lat, 15);
        assert!((meters - 50.0).abs() < 1e-9);
    }
}

//! Integration tests for fogmap-storage
//!
//! These tests exercise tile persistence against the redb backend,
//! including reopening the database and concurrent writers.

use std::sync::Arc;

use fogmap_core::{StoredTile, TileId, TilePoint};
use fogmap_storage::{
    InMemoryKvStore, KeyValueStore, KvTilePersistence, RedbKvStore, RedbStorageConfig,
    TilePersistence,
};
use tempfile::TempDir;

fn points(n: usize) -> Vec<TilePoint> {
    (0..n)
        .map(|i| TilePoint::new(i as f64, (i * 2) as f64, 13.66))
        .collect()
}

#[tokio::test]
async fn test_tiles_survive_database_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("tiles.redb");
    let id = TileId::new(15, 9739, 12405);

    {
        let kv = RedbKvStore::open(RedbStorageConfig::at(&path)).unwrap();
        let persistence = KvTilePersistence::new(Arc::new(kv));
        persistence
            .save_tile(&id, &StoredTile { points: points(3) })
            .await
            .unwrap();
    }

    let kv = RedbKvStore::open(RedbStorageConfig::at(&path)).unwrap();
    let persistence = KvTilePersistence::new(Arc::new(kv));
    let loaded = persistence.load_tile(&id).await.expect("tile should persist");
    assert_eq!(loaded.points, points(3));
    assert_eq!(persistence.stored_tile_ids().await.unwrap(), vec![id]);
}

#[tokio::test]
async fn test_corrupt_redb_value_reads_as_absent() {
    let temp_dir = TempDir::new().unwrap();
    let kv = Arc::new(RedbKvStore::open(RedbStorageConfig::at(temp_dir.path().join("c.redb"))).unwrap());
    let persistence = KvTilePersistence::new(kv.clone());
    let id = TileId::new(15, 1, 1);

    kv.set(&persistence.key_for(&id), "\u{0}garbage".to_string())
        .await
        .unwrap();
    assert!(persistence.load_tile(&id).await.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_saves_to_distinct_tiles() {
    let persistence = Arc::new(KvTilePersistence::new(Arc::new(InMemoryKvStore::new())));
    let mut handles = Vec::new();

    for x in 0..32i64 {
        let persistence = Arc::clone(&persistence);
        handles.push(tokio::spawn(async move {
            let id = TileId::new(15, x, 0);
            for n in 1..=10 {
                persistence
                    .save_tile(&id, &StoredTile { points: points(n) })
                    .await
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let ids = persistence.stored_tile_ids().await.unwrap();
    assert_eq!(ids.len(), 32);
    for id in ids {
        assert_eq!(persistence.load_tile(&id).await.unwrap().points.len(), 10);
    }
}

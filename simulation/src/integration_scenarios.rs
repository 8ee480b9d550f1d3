//! End-to-end sessions through the full fogmap stack
//!
//! These scenarios drive:
//! - fogmap-core (tile math, simulated location service)
//! - fogmap-storage (in-memory and redb key-value stores)
//! - fogmap-discovery (tile store, tracking, mode lifecycle, renderer bridge)

use crate::config::{SimulationConfig, WalkConfig};
use crate::session::{Session, inspect, open_store};
use crate::track::parse_track;
use crate::walk::RandomWalk;

fn seeded_config(steps: usize) -> SimulationConfig {
    SimulationConfig {
        walk: WalkConfig {
            steps,
            seed: Some(42),
            ..WalkConfig::default()
        },
        ..SimulationConfig::default()
    }
}

#[tokio::test]
async fn test_seeded_walk_reveals_every_step() {
    let config = seeded_config(25);
    let samples: Vec<_> = RandomWalk::new(&config.walk).collect();
    let session = Session::new(config, open_store(None).unwrap(), samples.first().copied(), false);

    let report = session.run(samples).await.unwrap();

    // 15 m steps always clear the 10 m movement threshold
    assert_eq!(report.samples, 25);
    assert_eq!(report.revealed, 25);
    assert!(report.stored_tiles >= 1);
    assert_eq!(report.stats.failed_saves, 0);
    assert_eq!(report.messages.get("revealDiscoveryPoint"), Some(&25));
    assert_eq!(report.messages.get("setDiscoveryMode"), Some(&2));
    assert_eq!(report.messages.get("clearDiscoveryFog"), Some(&1));
    assert!(!session.manager().discovery().is_tracking());
}

#[tokio::test]
async fn test_small_moves_are_filtered() {
    // ~1 m apart, then one jump of ~110 m
    let samples = parse_track(
        "40.00000,-73.0\n40.00001,-73.0\n40.00002,-73.0\n40.00100,-73.0\n",
    )
    .unwrap();
    let session = Session::new(
        SimulationConfig::default(),
        open_store(None).unwrap(),
        samples.first().copied(),
        false,
    );

    let report = session.run(samples).await.unwrap();
    assert_eq!(report.samples, 4);
    assert_eq!(report.revealed, 2);
}

#[tokio::test]
async fn test_replay_into_redb_then_inspect() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(Some(&dir.path().join("fog.redb"))).unwrap();

    let mut config = seeded_config(40);
    config.discovery.max_tiles_in_memory = 2;
    let prefix = config.discovery.storage_key_prefix.clone();
    let samples: Vec<_> = RandomWalk::new(&config.walk).collect();

    let session = Session::new(config, store.clone(), samples.first().copied(), false);
    let report = session.run(samples).await.unwrap();
    assert!(report.stats.resident_tiles <= 2);

    let tiles = inspect(store, &prefix).await.unwrap();
    assert_eq!(tiles.len(), report.stored_tiles);

    // Nothing is lost to eviction
    let stored_points: usize = tiles.iter().map(|tile| tile.points).sum();
    assert_eq!(stored_points, report.revealed);
}

#[tokio::test]
async fn test_second_session_loads_previous_tiles() {
    let store = open_store(None).unwrap();
    let samples = parse_track("40.0,-73.0\n40.0005,-73.0\n").unwrap();

    let first = Session::new(
        SimulationConfig::default(),
        store.clone(),
        samples.first().copied(),
        false,
    );
    first.run(samples.clone()).await.unwrap();

    let second = Session::new(
        SimulationConfig::default(),
        store,
        samples.first().copied(),
        false,
    );
    let report = second.run(samples).await.unwrap();

    assert!(report.stats.loads >= 1);
    assert_eq!(report.stats.created, 0);
    assert!(second.renderer().count("setDiscoveryTiles") >= 1);
}

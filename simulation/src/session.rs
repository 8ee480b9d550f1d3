//! One simulated discovery session
//!
//! A [`Session`] wires the discovery engine to a simulated device and a
//! [`SimRenderer`], feeds it a sequence of positions, and reports what
//! ended up in memory and in storage.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow};
use fogmap_core::{LocationSample, SimulatedLocationProvider, TileId};
use fogmap_discovery::{
    MapMode, ModeContext, ModeManager, MovementFilter, RendererBridge, TileStoreStats,
};
use fogmap_storage::{
    InMemoryKvStore, KeyValueStore, KvTilePersistence, RedbKvStore, RedbStorageConfig,
    TilePersistence,
};
use tracing::{debug, info};

use crate::config::SimulationConfig;
use crate::renderer::SimRenderer;

const REVEAL: &str = "revealDiscoveryPoint";
const REVEAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Open the redb database at `db`, or an in-memory store without one
pub fn open_store(db: Option<&Path>) -> anyhow::Result<Arc<dyn KeyValueStore>> {
    match db {
        Some(path) => {
            let store = RedbKvStore::open(RedbStorageConfig::at(path))
                .with_context(|| format!("opening {}", path.display()))?;
            Ok(Arc::new(store))
        }
        None => Ok(Arc::new(InMemoryKvStore::new())),
    }
}

/// Summary of a finished session
#[derive(Debug, Clone)]
pub struct SessionReport {
    /// Position samples fed to the device
    pub samples: usize,
    /// Samples that produced a reveal
    pub revealed: usize,
    /// Tiles written by the final flush
    pub flushed: usize,
    /// Tiles in storage after the session
    pub stored_tiles: usize,
    pub stats: TileStoreStats,
    /// Renderer messages by type
    pub messages: BTreeMap<&'static str, usize>,
}

impl fmt::Display for SessionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Session Summary ===")?;
        writeln!(f, "  Samples:         {}", self.samples)?;
        writeln!(f, "  Revealed:        {}", self.revealed)?;
        writeln!(f, "  Resident tiles:  {}", self.stats.resident_tiles)?;
        writeln!(f, "  Stored tiles:    {}", self.stored_tiles)?;
        writeln!(f, "  Tiles created:   {}", self.stats.created)?;
        writeln!(f, "  Storage loads:   {}", self.stats.loads)?;
        writeln!(f, "  Evictions:       {}", self.stats.evictions)?;
        writeln!(
            f,
            "  Saves:           {} ({} failed, {} at flush)",
            self.stats.saves, self.stats.failed_saves, self.flushed
        )?;
        write!(f, "  Messages:")?;
        for (kind, count) in &self.messages {
            write!(f, " {kind}={count}")?;
        }
        Ok(())
    }
}

/// Discovery engine driven by simulated positions
pub struct Session {
    config: SimulationConfig,
    provider: Arc<SimulatedLocationProvider>,
    renderer: Arc<SimRenderer>,
    persistence: Arc<KvTilePersistence>,
    manager: ModeManager,
}

impl Session {
    /// Build a session over `store`; `echo` prints renderer messages
    pub fn new(
        config: SimulationConfig,
        store: Arc<dyn KeyValueStore>,
        start: Option<LocationSample>,
        echo: bool,
    ) -> Self {
        let provider = Arc::new(SimulatedLocationProvider::new());
        let renderer = Arc::new(SimRenderer::new(echo));
        let persistence = Arc::new(KvTilePersistence::with_prefix(
            store,
            config.discovery.storage_key_prefix.clone(),
        ));

        let mut ctx = ModeContext::new(RendererBridge::with_sink(renderer.clone()), provider.clone());
        if let Some(start) = start {
            ctx = ctx.with_initial_location(start.latitude(), start.longitude());
        }

        let manager = ModeManager::new(
            ctx,
            config.discovery.clone(),
            config.minimap.clone(),
            persistence.clone(),
        );

        Self {
            config,
            provider,
            renderer,
            persistence,
            manager,
        }
    }

    pub fn manager(&self) -> &ModeManager {
        &self.manager
    }

    pub fn renderer(&self) -> &SimRenderer {
        &self.renderer
    }

    /// Activate discovery, walk through `samples`, deactivate and flush
    pub async fn run(&self, samples: Vec<LocationSample>) -> anyhow::Result<SessionReport> {
        self.manager
            .set_active_mode(Some(MapMode::Discovery))
            .await
            .join()
            .await;

        let mut filter = MovementFilter::new(self.config.discovery.move_threshold_meters);
        let baseline = self.renderer.count(REVEAL);
        let mut expected = baseline;

        for sample in &samples {
            if filter.accept(sample) {
                expected += 1;
            }
            self.provider.push_location(*sample);
            self.wait_for_reveals(expected).await?;
        }

        self.manager.set_active_mode(None).await.join().await;
        let store = self.manager.discovery().store();
        let flushed = store.flush().await;

        let report = SessionReport {
            samples: samples.len(),
            revealed: expected - baseline,
            flushed,
            stored_tiles: self.persistence.stored_tile_ids().await?.len(),
            stats: store.stats().await,
            messages: self.renderer.counts(),
        };
        info!(
            samples = report.samples,
            revealed = report.revealed,
            stored = report.stored_tiles,
            "Session finished"
        );
        Ok(report)
    }

    /// Wait until the renderer has seen `expected` reveals
    async fn wait_for_reveals(&self, expected: usize) -> anyhow::Result<()> {
        loop {
            let changed = self.renderer.changed();
            let seen = self.renderer.count(REVEAL);
            if seen >= expected {
                return Ok(());
            }
            debug!(seen, expected, "Waiting for reveal");
            tokio::time::timeout(REVEAL_TIMEOUT, changed)
                .await
                .map_err(|_| anyhow!("no reveal after {REVEAL_TIMEOUT:?} (seen {seen}, expected {expected})"))?;
        }
    }
}

/// One stored tile, as listed by `inspect`
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct StoredTileSummary {
    pub id: TileId,
    pub points: usize,
}

/// List every tile stored under `prefix`
pub async fn inspect(
    store: Arc<dyn KeyValueStore>,
    prefix: &str,
) -> anyhow::Result<Vec<StoredTileSummary>> {
    let persistence = KvTilePersistence::with_prefix(store, prefix);
    let mut summaries = Vec::new();

    for id in persistence.stored_tile_ids().await? {
        let points = persistence
            .load_tile(&id)
            .await
            .map(|tile| tile.points.len())
            .unwrap_or(0);
        summaries.push(StoredTileSummary { id, points });
    }
    Ok(summaries)
}

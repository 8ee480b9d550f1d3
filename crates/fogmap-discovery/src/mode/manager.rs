use std::sync::Arc;

use fogmap_core::{DiscoveryConfig, MiniMapConfig};
use fogmap_storage::TilePersistence;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{DiscoveryMode, MapMode, MiniMapMode, ModeContext, ModeService, ModeTasks};
use crate::store::TileStore;

/// Keeps at most one map mode active
///
/// Transitions are serialized: a switch finishes deactivating the old mode
/// before the new one activates, and concurrent switches queue up.
pub struct ModeManager {
    discovery: DiscoveryMode,
    minimap: MiniMapMode,
    active: Mutex<Option<MapMode>>,
}

impl std::fmt::Debug for ModeManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModeManager")
            .field("discovery", &self.discovery)
            .field("minimap", &self.minimap)
            .finish_non_exhaustive()
    }
}

impl ModeManager {
    /// Build both modes over one shared context
    pub fn new(
        ctx: ModeContext,
        discovery_config: DiscoveryConfig,
        minimap_config: MiniMapConfig,
        persistence: Arc<dyn TilePersistence>,
    ) -> Self {
        let store = TileStore::new(discovery_config, persistence);
        Self::from_modes(
            DiscoveryMode::new(ctx.clone(), store),
            MiniMapMode::new(ctx, minimap_config),
        )
    }

    pub fn from_modes(discovery: DiscoveryMode, minimap: MiniMapMode) -> Self {
        Self {
            discovery,
            minimap,
            active: Mutex::new(None),
        }
    }

    pub fn discovery(&self) -> &DiscoveryMode {
        &self.discovery
    }

    pub fn minimap(&self) -> &MiniMapMode {
        &self.minimap
    }

    fn service(&self, mode: MapMode) -> &dyn ModeService {
        match mode {
            MapMode::Discovery => &self.discovery,
            MapMode::MiniMap => &self.minimap,
        }
    }

    pub async fn active_mode(&self) -> Option<MapMode> {
        *self.active.lock().await
    }

    /// Switch to `mode`, or turn every mode off with `None`
    ///
    /// Selecting the mode that is already active re-syncs it.
    pub async fn set_active_mode(&self, mode: Option<MapMode>) -> ModeTasks {
        let mut active = self.active.lock().await;

        if *active == mode {
            return match mode {
                Some(mode) => self.service(mode).sync().await,
                None => ModeTasks::none(),
            };
        }

        if let Some(previous) = active.take() {
            self.service(previous).deactivate().await;
        }

        *active = mode;
        info!(mode = ?mode, "Active map mode changed");

        match mode {
            Some(mode) => self.service(mode).activate().await,
            None => ModeTasks::none(),
        }
    }

    /// Re-sync the active mode, e.g. after a permission change
    pub async fn sync_active_mode(&self) -> ModeTasks {
        let active = self.active.lock().await;
        match *active {
            Some(mode) => {
                debug!(%mode, "Syncing active mode");
                self.service(mode).sync().await
            }
            None => ModeTasks::none(),
        }
    }

    pub async fn notify_theme_change(&self) -> ModeTasks {
        let active = self.active.lock().await;
        match *active {
            Some(mode) => self.service(mode).on_theme_change().await,
            None => ModeTasks::none(),
        }
    }

    /// The renderer reloaded and lost its state
    pub async fn notify_renderer_load(&self) -> ModeTasks {
        let active = self.active.lock().await;
        match *active {
            Some(mode) => self.service(mode).on_renderer_load().await,
            None => ModeTasks::none(),
        }
    }
}

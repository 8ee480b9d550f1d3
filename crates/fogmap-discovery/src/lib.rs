//! # Fogmap Discovery
//!
//! The fog-of-war discovery engine: a bounded, persistent reveal map that
//! records where the user has physically been.
//!
//! ## Data flow
//!
//! ```text
//! position update
//!   -> geo projection (tile id, pixel, radius)
//!   -> TileStore::reveal_at (load or create, append, LRU touch,
//!                            debounced save, evict)
//!   -> RendererBridge (revealDiscoveryPoint)
//! ```
//!
//! On activation the [`DiscoveryMode`] also bulk-loads the tiles around the
//! user and sends them to the renderer in one message.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use fogmap_core::{DiscoveryConfig, MiniMapConfig, SimulatedLocationProvider};
//! use fogmap_discovery::{MapMode, ModeContext, ModeManager, RecordingRenderer, RendererBridge};
//! use fogmap_storage::{InMemoryKvStore, KvTilePersistence};
//!
//! let renderer = RecordingRenderer::new();
//! let ctx = ModeContext::new(
//!     RendererBridge::with_sink(renderer.clone()),
//!     Arc::new(SimulatedLocationProvider::new()),
//! );
//! let persistence = Arc::new(KvTilePersistence::new(Arc::new(InMemoryKvStore::new())));
//! let manager = ModeManager::new(ctx, DiscoveryConfig::default(), MiniMapConfig::default(), persistence);
//!
//! manager.set_active_mode(Some(MapMode::Discovery)).await.join().await;
//! ```

pub mod bridge;
pub mod debounce;
pub mod mode;
pub mod store;
pub mod tracking;

pub use bridge::{RecordingRenderer, RendererBridge, RendererMessage, RendererSink, RendererTile};
pub use debounce::DebounceScheduler;
pub use mode::{
    DiscoveryMode, MapMode, MiniMapMode, MiniMapPosition, ModeContext, ModeManager, ModeService,
    ModeTasks,
};
pub use store::{Reveal, TileStore, TileStoreStats};
pub use tracking::{
    MovementFilter, TrackingHandle, TrackingOptions, start_heading_tracking, start_tracking,
};

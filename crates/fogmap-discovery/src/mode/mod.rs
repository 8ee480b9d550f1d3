//! Exclusive map modes
//!
//! A map mode is a self-contained behavior layered on the map (the fog of
//! war, the mini map). At most one is active at a time; the
//! [`ModeManager`] enforces that. Each mode implements [`ModeService`].
//!
//! Lifecycle calls never block on background work. Whatever a call starts
//! is handed back as [`ModeTasks`]: callers may await it or drop it, and
//! every task logs its own failures.

mod discovery;
mod manager;
mod minimap;

pub use discovery::DiscoveryMode;
pub use manager::ModeManager;
pub use minimap::{MiniMapMode, MiniMapPosition};

use std::sync::Arc;

use async_trait::async_trait;
use fogmap_core::{Coordinates, LocationProvider};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::bridge::RendererBridge;

/// Identifies one of the exclusive map modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MapMode {
    Discovery,
    MiniMap,
}

impl MapMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MapMode::Discovery => "discovery",
            MapMode::MiniMap => "minimap",
        }
    }
}

impl std::fmt::Display for MapMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host services shared by every mode
#[derive(Clone)]
pub struct ModeContext {
    pub renderer: RendererBridge,
    pub location: Arc<dyn LocationProvider>,
    /// Map center known before any GPS fix
    pub initial_location: Option<Coordinates>,
    /// Last heading shown to the user, shared with the host UI
    pub heading: Arc<RwLock<Option<f64>>>,
}

impl std::fmt::Debug for ModeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModeContext")
            .field("renderer", &self.renderer)
            .field("initial_location", &self.initial_location)
            .field("heading", &*self.heading.read())
            .finish_non_exhaustive()
    }
}

impl ModeContext {
    pub fn new(renderer: RendererBridge, location: Arc<dyn LocationProvider>) -> Self {
        Self {
            renderer,
            location,
            initial_location: None,
            heading: Arc::new(RwLock::new(None)),
        }
    }

    pub fn with_initial_location(mut self, latitude: f64, longitude: f64) -> Self {
        self.initial_location = Some(Coordinates::new(latitude, longitude));
        self
    }

    pub fn has_location_permission(&self) -> bool {
        self.location.has_permission()
    }

    /// Best position known without asking the device: the last fix, then
    /// the initial map center
    pub fn fallback_position(&self) -> Option<Coordinates> {
        self.location
            .last_known()
            .map(|sample| sample.coords)
            .or(self.initial_location)
    }

    pub fn heading(&self) -> Option<f64> {
        *self.heading.read()
    }

    pub fn set_heading(&self, heading: Option<f64>) {
        *self.heading.write() = heading;
    }
}

/// Background work started by a lifecycle call
#[derive(Debug, Default)]
#[must_use = "dropping ModeTasks detaches the work; call join() to wait for it"]
pub struct ModeTasks {
    handles: Vec<JoinHandle<()>>,
}

impl ModeTasks {
    /// Nothing was started
    pub fn none() -> Self {
        Self::default()
    }

    pub fn push(&mut self, handle: JoinHandle<()>) {
        self.handles.push(handle);
    }

    pub fn merge(&mut self, mut other: ModeTasks) {
        self.handles.append(&mut other.handles);
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every task to finish
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    warn!(error = %e, "Mode task panicked");
                }
            }
        }
    }

    /// Let the work run unobserved
    pub fn detach(self) {}
}

impl From<JoinHandle<()>> for ModeTasks {
    fn from(handle: JoinHandle<()>) -> Self {
        Self {
            handles: vec![handle],
        }
    }
}

/// One exclusive map mode
#[async_trait]
pub trait ModeService: Send + Sync {
    fn kind(&self) -> MapMode;

    fn is_active(&self) -> bool;

    /// Turn the mode on
    async fn activate(&self) -> ModeTasks;

    /// Turn the mode off; completes before returning
    async fn deactivate(&self);

    /// Re-send renderer state and re-ensure subscriptions; no-op when
    /// inactive
    async fn sync(&self) -> ModeTasks;

    async fn on_theme_change(&self) -> ModeTasks {
        self.sync().await
    }

    async fn on_renderer_load(&self) -> ModeTasks {
        self.sync().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fogmap_core::{LocationSample, SimulatedLocationProvider};

    #[test]
    fn test_fallback_prefers_last_fix() {
        let provider = Arc::new(SimulatedLocationProvider::new());
        let ctx = ModeContext::new(RendererBridge::new(), provider.clone())
            .with_initial_location(10.0, 20.0);

        assert_eq!(ctx.fallback_position(), Some(Coordinates::new(10.0, 20.0)));

        provider.set_last_known(Some(LocationSample::at(40.0, -73.0)));
        assert_eq!(ctx.fallback_position(), Some(Coordinates::new(40.0, -73.0)));
    }

    #[test]
    fn test_heading_is_shared_between_clones() {
        let ctx = ModeContext::new(
            RendererBridge::new(),
            Arc::new(SimulatedLocationProvider::new()),
        );
        let clone = ctx.clone();
        clone.set_heading(Some(42.0));
        assert_eq!(ctx.heading(), Some(42.0));
    }

    #[tokio::test]
    async fn test_mode_tasks_join() {
        let counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let mut tasks = ModeTasks::none();
        for _ in 0..3 {
            let counter = Arc::clone(&counter);
            tasks.push(tokio::spawn(async move {
                counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            }));
        }
        assert_eq!(tasks.len(), 3);
        tasks.join().await;
        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 3);
    }

    #[test]
    fn test_map_mode_names() {
        assert_eq!(MapMode::Discovery.to_string(), "discovery");
        assert_eq!(serde_json::to_string(&MapMode::MiniMap).unwrap(), "\"minimap\"");
    }
}

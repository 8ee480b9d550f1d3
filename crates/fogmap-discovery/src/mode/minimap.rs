//! Mini map mode
//!
//! A small, heading-up map that follows the user. Pressing the map zooms
//! out for context; releasing zooms back in.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use fogmap_core::{Accuracy, HeadingSample, LocationSample, MiniMapConfig, WatchOptions};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{MapMode, ModeContext, ModeService, ModeTasks};
use crate::tracking::{TrackingHandle, TrackingOptions, start_heading_tracking, start_tracking};

/// Where the mini map is centered and which way it faces
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MiniMapPosition {
    pub latitude: f64,
    pub longitude: f64,
    pub bearing: f64,
}

#[derive(Default)]
struct MiniMapState {
    epoch: Option<u64>,
    zoomed_out: bool,
    device_heading: Option<f64>,
    position: Option<MiniMapPosition>,
    tracking: Option<TrackingHandle>,
    tracking_starting: bool,
}

struct MiniMapInner {
    ctx: ModeContext,
    config: MiniMapConfig,
    state: Mutex<MiniMapState>,
    next_epoch: AtomicU64,
}

impl MiniMapInner {
    fn current_zoom(&self, state: &MiniMapState) -> f64 {
        if state.zoomed_out {
            self.config.zoom_out
        } else {
            self.config.zoom_in
        }
    }

    /// Seed the position from what the host knows before any fix
    fn ensure_fallback_position(&self, state: &mut MiniMapState) {
        if state.position.is_some() {
            return;
        }
        if let Some(coords) = self.ctx.fallback_position() {
            state.position = Some(MiniMapPosition {
                latitude: coords.latitude,
                longitude: coords.longitude,
                bearing: self.ctx.heading().unwrap_or(0.0),
            });
        }
    }

    /// Send the full renderer state for the current activation
    fn push_state(&self) {
        let (zoom, position) = {
            let mut state = self.state.lock();
            self.ensure_fallback_position(&mut state);
            (self.current_zoom(&state), state.position.unwrap_or_default())
        };
        let renderer = &self.ctx.renderer;
        renderer.send_minimap_mode(true);
        renderer.send_minimap_zoom(zoom, self.config.zoom_duration_ms);
        renderer.send_minimap_location(position.latitude, position.longitude, position.bearing);
    }

    /// Record a new position for `epoch` and forward it
    fn update_position(&self, epoch: u64, position: MiniMapPosition) {
        {
            let mut state = self.state.lock();
            if state.epoch != Some(epoch) {
                return;
            }
            state.position = Some(position);
        }
        self.ctx
            .renderer
            .send_minimap_location(position.latitude, position.longitude, position.bearing);
    }

    fn on_location(&self, epoch: u64, sample: LocationSample) {
        let device_heading = self.state.lock().device_heading;
        let bearing = device_heading.or(sample.heading).unwrap_or(0.0);
        self.ctx.set_heading(Some(bearing));
        self.update_position(epoch, MiniMapPosition {
            latitude: sample.latitude(),
            longitude: sample.longitude(),
            bearing,
        });
    }

    fn on_heading(&self, epoch: u64, sample: HeadingSample) {
        let heading = sample.resolved();
        {
            let mut state = self.state.lock();
            if state.epoch != Some(epoch) {
                return;
            }
            state.device_heading = Some(heading);
        }
        self.ctx.set_heading(Some(heading));

        let origin = self.ctx.fallback_position().unwrap_or_default();
        self.update_position(epoch, MiniMapPosition {
            latitude: origin.latitude,
            longitude: origin.longitude,
            bearing: heading,
        });
    }

    async fn ensure_tracking(self: Arc<Self>, epoch: u64) {
        if !self.ctx.has_location_permission() {
            return;
        }
        {
            let mut state = self.state.lock();
            if state.epoch != Some(epoch) || state.tracking_starting {
                return;
            }
            if state.tracking.as_ref().is_some_and(TrackingHandle::is_active) {
                return;
            }
            state.tracking_starting = true;
        }

        let options = TrackingOptions {
            watch: WatchOptions {
                accuracy: Accuracy::High,
                distance_interval_meters: self.config.location_distance_meters,
                time_interval_ms: self.config.heading_update_ms,
            },
            move_threshold_meters: 0.0,
        };

        let weak: Weak<Self> = Arc::downgrade(&self);
        let mut handle = start_tracking(Arc::clone(&self.ctx.location), options, move |sample| {
            if let Some(inner) = weak.upgrade() {
                inner.on_location(epoch, sample);
            }
            std::future::ready(())
        })
        .await;

        let weak: Weak<Self> = Arc::downgrade(&self);
        handle.merge(
            start_heading_tracking(Arc::clone(&self.ctx.location), move |sample| {
                if let Some(inner) = weak.upgrade() {
                    inner.on_heading(epoch, sample);
                }
            })
            .await,
        );

        let mut state = self.state.lock();
        state.tracking_starting = false;
        if state.epoch == Some(epoch) && handle.is_active() {
            state.tracking = Some(handle);
            debug!(epoch, "Mini map tracking running");
        }
    }
}

/// The mini map mode
///
/// Cloning is cheap; clones share state.
#[derive(Clone)]
pub struct MiniMapMode {
    inner: Arc<MiniMapInner>,
}

impl std::fmt::Debug for MiniMapMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("MiniMapMode")
            .field("active", &state.epoch.is_some())
            .field("zoomed_out", &state.zoomed_out)
            .field("position", &state.position)
            .finish_non_exhaustive()
    }
}

impl MiniMapMode {
    pub fn new(ctx: ModeContext, config: MiniMapConfig) -> Self {
        Self {
            inner: Arc::new(MiniMapInner {
                ctx,
                config,
                state: Mutex::new(MiniMapState::default()),
                next_epoch: AtomicU64::new(1),
            }),
        }
    }

    pub fn config(&self) -> &MiniMapConfig {
        &self.inner.config
    }

    pub fn is_zoomed_out(&self) -> bool {
        self.inner.state.lock().zoomed_out
    }

    /// Last position sent to the renderer
    pub fn position(&self) -> Option<MiniMapPosition> {
        self.inner.state.lock().position
    }

    /// Compass heading from the device, when one has been reported
    pub fn device_heading(&self) -> Option<f64> {
        self.inner.state.lock().device_heading
    }

    /// Heading to draw on the overlay
    pub fn overlay_heading(&self) -> Option<f64> {
        self.inner.ctx.heading()
    }

    pub fn is_tracking(&self) -> bool {
        self.inner
            .state
            .lock()
            .tracking
            .as_ref()
            .is_some_and(TrackingHandle::is_active)
    }

    /// User pressed the map: zoom out for context
    pub fn press_in(&self) {
        self.set_zoomed_out(true);
    }

    /// User released the map: zoom back in
    pub fn press_out(&self) {
        self.set_zoomed_out(false);
    }

    fn set_zoomed_out(&self, zoomed_out: bool) {
        let zoom = {
            let mut state = self.inner.state.lock();
            if state.epoch.is_none() {
                return;
            }
            state.zoomed_out = zoomed_out;
            self.inner.current_zoom(&state)
        };
        self.inner
            .ctx
            .renderer
            .send_minimap_zoom(zoom, self.inner.config.zoom_duration_ms);
    }

    fn spawn_tracking(&self, epoch: u64) -> ModeTasks {
        ModeTasks::from(tokio::spawn(Arc::clone(&self.inner).ensure_tracking(epoch)))
    }
}

#[async_trait]
impl ModeService for MiniMapMode {
    fn kind(&self) -> MapMode {
        MapMode::MiniMap
    }

    fn is_active(&self) -> bool {
        self.inner.state.lock().epoch.is_some()
    }

    async fn activate(&self) -> ModeTasks {
        let epoch = {
            let mut state = self.inner.state.lock();
            if state.epoch.is_some() {
                None
            } else {
                let epoch = self.inner.next_epoch.fetch_add(1, Ordering::SeqCst);
                state.epoch = Some(epoch);
                Some(epoch)
            }
        };
        let Some(epoch) = epoch else {
            return self.sync().await;
        };

        info!(epoch, "Mini map mode activated");
        self.inner.push_state();
        self.spawn_tracking(epoch)
    }

    async fn deactivate(&self) {
        let tracking = {
            let mut state = self.inner.state.lock();
            if state.epoch.take().is_none() {
                return;
            }
            state.zoomed_out = false;
            state.device_heading = None;
            state.tracking_starting = false;
            state.tracking.take()
        };
        if let Some(mut handle) = tracking {
            handle.stop();
        }

        self.inner.ctx.set_heading(None);
        self.inner.ctx.renderer.send_minimap_mode(false);
        info!("Mini map mode deactivated");
    }

    async fn sync(&self) -> ModeTasks {
        let Some(epoch) = self.inner.state.lock().epoch else {
            return ModeTasks::none();
        };
        self.inner.push_state();
        self.spawn_tracking(epoch)
    }
}

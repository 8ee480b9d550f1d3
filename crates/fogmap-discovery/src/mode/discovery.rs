//! Discovery mode: the fog of war
//!
//! While active, every position the user reaches is revealed in the
//! [`TileStore`] and the new circle is forwarded to the renderer.
//!
//! Each activation gets a fresh epoch. Background work started by one
//! activation checks its epoch before touching the renderer or installing
//! a subscription, so work that outlives a deactivation never leaks into
//! the next activation. Tile writes are not epoch-checked: a reveal that
//! was already taken is always stored.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use fogmap_core::LocationSample;
use parking_lot::Mutex;
use tracing::{debug, info, instrument};

use super::{MapMode, ModeContext, ModeService, ModeTasks};
use crate::store::{Reveal, TileStore};
use crate::tracking::{TrackingHandle, TrackingOptions, start_tracking};

enum TrackingSlot {
    Idle,
    Starting,
    Running(TrackingHandle),
}

enum DiscoveryState {
    Inactive,
    Active { epoch: u64, tracking: TrackingSlot },
}

struct DiscoveryInner {
    ctx: ModeContext,
    store: TileStore,
    tracking_options: TrackingOptions,
    state: Mutex<DiscoveryState>,
    next_epoch: AtomicU64,
}

impl DiscoveryInner {
    fn current_epoch(&self) -> Option<u64> {
        match &*self.state.lock() {
            DiscoveryState::Active { epoch, .. } => Some(*epoch),
            DiscoveryState::Inactive => None,
        }
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.current_epoch() == Some(epoch)
    }

    /// Reveal a position and, if the activation is still live, tell the
    /// renderer about the new circle
    async fn reveal(&self, epoch: u64, latitude: f64, longitude: f64) -> Reveal {
        let reveal = self.store.reveal_at(latitude, longitude).await;
        if self.is_current(epoch) {
            self.ctx.renderer.send_reveal(&reveal.tile.id, reveal.point);
        }
        reveal
    }

    async fn load_nearby(&self, epoch: u64) {
        if !self.is_current(epoch) {
            return;
        }
        let origin = self.ctx.fallback_position().unwrap_or_default();
        let tiles = self.store.load_nearby(origin.latitude, origin.longitude).await;

        if !tiles.is_empty() && self.is_current(epoch) {
            self.ctx.renderer.send_discovery_tiles(&tiles);
        }
    }

    async fn reveal_current(&self, epoch: u64) {
        if !self.is_current(epoch) {
            return;
        }

        let sample = match self.ctx.location.last_known() {
            Some(sample) => sample,
            None if self.ctx.has_location_permission() => {
                match self.ctx.location.current_position().await {
                    Ok(sample) => sample,
                    Err(e) => {
                        // Tracking reveals once a fix arrives
                        debug!(error = %e, "No position for initial reveal");
                        return;
                    }
                }
            }
            None => return,
        };

        self.reveal(epoch, sample.latitude(), sample.longitude()).await;
    }

    /// Start tracking for `epoch` unless it is already running
    async fn ensure_tracking(self: Arc<Self>, epoch: u64) {
        {
            let mut state = self.state.lock();
            let DiscoveryState::Active {
                epoch: active,
                tracking,
            } = &mut *state
            else {
                return;
            };
            if *active != epoch {
                return;
            }
            match tracking {
                TrackingSlot::Starting => return,
                TrackingSlot::Running(handle) if handle.is_active() => return,
                _ => *tracking = TrackingSlot::Starting,
            }
        }

        let weak: Weak<Self> = Arc::downgrade(&self);
        let handle = start_tracking(
            Arc::clone(&self.ctx.location),
            self.tracking_options,
            move |sample: LocationSample| {
                let weak = weak.clone();
                async move {
                    let Some(inner) = weak.upgrade() else {
                        return;
                    };
                    // A reveal in flight finishes even if tracking stops
                    let reveal = tokio::spawn(async move {
                        inner
                            .reveal(epoch, sample.latitude(), sample.longitude())
                            .await;
                    });
                    let _ = reveal.await;
                }
            },
        )
        .await;

        let mut state = self.state.lock();
        match &mut *state {
            DiscoveryState::Active {
                epoch: active,
                tracking,
            } if *active == epoch => {
                if handle.is_active() {
                    *tracking = TrackingSlot::Running(handle);
                    debug!(epoch, "Discovery tracking running");
                } else {
                    // Retried on the next sync
                    *tracking = TrackingSlot::Idle;
                }
            }
            // Deactivated while starting; dropping the handle stops it
            _ => drop(handle),
        }
    }
}

/// The fog-of-war map mode
///
/// Cloning is cheap; clones share state.
#[derive(Clone)]
pub struct DiscoveryMode {
    inner: Arc<DiscoveryInner>,
}

impl std::fmt::Debug for DiscoveryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryMode")
            .field("active", &self.is_active())
            .field("tracking", &self.is_tracking())
            .finish_non_exhaustive()
    }
}

impl DiscoveryMode {
    /// Tracking options follow the store's configuration
    pub fn new(ctx: ModeContext, store: TileStore) -> Self {
        let tracking_options = TrackingOptions::from_config(store.config());
        Self::with_tracking_options(ctx, store, tracking_options)
    }

    pub fn with_tracking_options(
        ctx: ModeContext,
        store: TileStore,
        tracking_options: TrackingOptions,
    ) -> Self {
        Self {
            inner: Arc::new(DiscoveryInner {
                ctx,
                store,
                tracking_options,
                state: Mutex::new(DiscoveryState::Inactive),
                next_epoch: AtomicU64::new(1),
            }),
        }
    }

    pub fn store(&self) -> &TileStore {
        &self.inner.store
    }

    pub fn context(&self) -> &ModeContext {
        &self.inner.ctx
    }

    /// Whether a location subscription is currently delivering
    pub fn is_tracking(&self) -> bool {
        matches!(
            &*self.inner.state.lock(),
            DiscoveryState::Active {
                tracking: TrackingSlot::Running(handle),
                ..
            } if handle.is_active()
        )
    }

    /// Nearby load, initial reveal and tracking for one activation
    fn refresh(&self, epoch: u64) -> ModeTasks {
        let mut tasks = ModeTasks::none();

        let inner = Arc::clone(&self.inner);
        tasks.push(tokio::spawn(async move { inner.load_nearby(epoch).await }));

        let inner = Arc::clone(&self.inner);
        tasks.push(tokio::spawn(async move { inner.reveal_current(epoch).await }));

        let inner = Arc::clone(&self.inner);
        tasks.push(tokio::spawn(inner.ensure_tracking(epoch)));

        tasks
    }
}

#[async_trait]
impl ModeService for DiscoveryMode {
    fn kind(&self) -> MapMode {
        MapMode::Discovery
    }

    fn is_active(&self) -> bool {
        self.inner.current_epoch().is_some()
    }

    #[instrument(skip(self), name = "discovery_activate")]
    async fn activate(&self) -> ModeTasks {
        let epoch = {
            let mut state = self.inner.state.lock();
            match &*state {
                DiscoveryState::Active { .. } => None,
                DiscoveryState::Inactive => {
                    let epoch = self.inner.next_epoch.fetch_add(1, Ordering::SeqCst);
                    *state = DiscoveryState::Active {
                        epoch,
                        tracking: TrackingSlot::Idle,
                    };
                    Some(epoch)
                }
            }
        };

        let Some(epoch) = epoch else {
            return self.sync().await;
        };

        info!(epoch, "Discovery mode activated");
        self.inner.ctx.renderer.send_discovery_mode(true);
        self.refresh(epoch)
    }

    #[instrument(skip(self), name = "discovery_deactivate")]
    async fn deactivate(&self) {
        let previous = std::mem::replace(&mut *self.inner.state.lock(), DiscoveryState::Inactive);

        let DiscoveryState::Active { epoch, tracking } = previous else {
            return;
        };
        if let TrackingSlot::Running(mut handle) = tracking {
            handle.stop();
        }

        self.inner.ctx.renderer.send_clear_fog();
        self.inner.ctx.renderer.send_discovery_mode(false);
        info!(epoch, "Discovery mode deactivated");
    }

    async fn sync(&self) -> ModeTasks {
        let Some(epoch) = self.inner.current_epoch() else {
            return ModeTasks::none();
        };
        debug!(epoch, "Syncing discovery mode");
        self.inner.ctx.renderer.send_discovery_mode(true);
        self.refresh(epoch)
    }
}

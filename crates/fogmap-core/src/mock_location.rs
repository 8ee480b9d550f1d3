//! Simulated location service
//!
//! Provides a [`LocationProvider`] driven by explicit calls instead of a
//! device GPS, for tests and the simulator.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fogmap_core::{LocationProvider, LocationSample, SimulatedLocationProvider, WatchOptions};
//!
//! let provider = SimulatedLocationProvider::new();
//! let mut stream = provider.watch_position(WatchOptions::default()).await?;
//!
//! provider.push_location(LocationSample::at(40.0, -73.0));
//! let sample = stream.recv().await.unwrap();
//! ```

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tracing::trace;

use crate::error::LocationError;
use crate::location::{
    HeadingSample, HeadingStream, LocationProvider, LocationSample, LocationStream, WatchOptions,
};

/// A location service whose fixes are pushed by the caller
#[derive(Debug)]
pub struct SimulatedLocationProvider {
    permission: AtomicBool,
    /// When set, `current_position` fails even with permission
    fail_fetch: AtomicBool,
    /// Fix returned by `current_position` when nothing is cached
    fresh_fix: RwLock<Option<LocationSample>>,
    last_known: RwLock<Option<LocationSample>>,
    position_watchers: Mutex<Vec<mpsc::UnboundedSender<LocationSample>>>,
    heading_watchers: Mutex<Vec<mpsc::UnboundedSender<HeadingSample>>>,
}

impl Default for SimulatedLocationProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedLocationProvider {
    /// Create a provider with permission granted and no fix yet
    pub fn new() -> Self {
        Self {
            permission: AtomicBool::new(true),
            fail_fetch: AtomicBool::new(false),
            fresh_fix: RwLock::new(None),
            last_known: RwLock::new(None),
            position_watchers: Mutex::new(Vec::new()),
            heading_watchers: Mutex::new(Vec::new()),
        }
    }

    /// Create a provider without location permission
    pub fn without_permission() -> Self {
        let provider = Self::new();
        provider.set_permission(false);
        provider
    }

    pub fn set_permission(&self, granted: bool) {
        self.permission.store(granted, Ordering::SeqCst);
    }

    /// Make `current_position` fail
    pub fn set_fetch_fails(&self, fails: bool) {
        self.fail_fetch.store(fails, Ordering::SeqCst);
    }

    /// Fix served by `current_position` (without touching `last_known`)
    pub fn set_fresh_fix(&self, sample: Option<LocationSample>) {
        *self.fresh_fix.write() = sample;
    }

    /// Set the cached fix without notifying watchers
    pub fn set_last_known(&self, sample: Option<LocationSample>) {
        *self.last_known.write() = sample;
    }

    /// Record a new fix and deliver it to every live position watcher
    pub fn push_location(&self, sample: LocationSample) {
        *self.last_known.write() = Some(sample);
        let mut watchers = self.position_watchers.lock();
        watchers.retain(|tx| tx.send(sample).is_ok());
        trace!(watchers = watchers.len(), lat = sample.latitude(), lon = sample.longitude(), "Pushed location");
    }

    /// Deliver a compass reading to every live heading watcher
    pub fn push_heading(&self, sample: HeadingSample) {
        let mut watchers = self.heading_watchers.lock();
        watchers.retain(|tx| tx.send(sample).is_ok());
    }

    /// Number of position subscriptions still held by someone
    pub fn position_watcher_count(&self) -> usize {
        self.position_watchers
            .lock()
            .iter()
            .filter(|tx| !tx.is_closed())
            .count()
    }

    /// Number of heading subscriptions still held by someone
    pub fn heading_watcher_count(&self) -> usize {
        self.heading_watchers
            .lock()
            .iter()
            .filter(|tx| !tx.is_closed())
            .count()
    }
}

#[async_trait]
impl LocationProvider for SimulatedLocationProvider {
    fn has_permission(&self) -> bool {
        self.permission.load(Ordering::SeqCst)
    }

    fn last_known(&self) -> Option<LocationSample> {
        *self.last_known.read()
    }

    async fn current_position(&self) -> Result<LocationSample, LocationError> {
        if !self.has_permission() {
            return Err(LocationError::PermissionDenied);
        }
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(LocationError::Unavailable("simulated fetch failure".into()));
        }
        let fix = *self.fresh_fix.read();
        fix.or_else(|| self.last_known())
            .ok_or_else(|| LocationError::Unavailable("no fix available".into()))
    }

    async fn watch_position(&self, _options: WatchOptions) -> Result<LocationStream, LocationError> {
        if !self.has_permission() {
            return Err(LocationError::PermissionDenied);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.position_watchers.lock().push(tx);
        Ok(rx)
    }

    async fn watch_heading(&self) -> Result<HeadingStream, LocationError> {
        if !self.has_permission() {
            return Err(LocationError::PermissionDenied);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.heading_watchers.lock().push(tx);
        Ok(rx)
    }
}

//! Location tracking adapter
//!
//! Turns a [`LocationProvider`] subscription into a stream of callback
//! invocations owned by a [`TrackingHandle`]. Samples are delivered one at
//! a time, in arrival order, and each callback is awaited before the next
//! sample is taken.

use std::future::Future;
use std::sync::Arc;

use fogmap_core::{
    Accuracy, Coordinates, DiscoveryConfig, HeadingSample, LocationProvider, LocationSample,
    WatchOptions, geo,
};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// How a position subscription is requested and filtered
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingOptions {
    /// Options passed to the location service
    pub watch: WatchOptions,
    /// Samples closer than this to the last delivered one are skipped
    pub move_threshold_meters: f64,
}

impl Default for TrackingOptions {
    fn default() -> Self {
        Self::from_config(&DiscoveryConfig::default())
    }
}

impl TrackingOptions {
    /// Options matching a discovery configuration
    pub fn from_config(config: &DiscoveryConfig) -> Self {
        Self {
            watch: WatchOptions {
                accuracy: Accuracy::High,
                distance_interval_meters: config.move_threshold_meters,
                time_interval_ms: config.tracking_interval_ms,
            },
            move_threshold_meters: config.move_threshold_meters,
        }
    }

    /// Deliver every sample the service reports
    pub fn unfiltered(mut self) -> Self {
        self.move_threshold_meters = 0.0;
        self
    }

    pub fn with_move_threshold_meters(mut self, meters: f64) -> Self {
        self.move_threshold_meters = meters;
        self
    }
}

/// Skips samples that have not moved far enough from the last accepted one
#[derive(Debug, Clone)]
pub struct MovementFilter {
    threshold_meters: f64,
    last: Option<Coordinates>,
}

impl MovementFilter {
    pub fn new(threshold_meters: f64) -> Self {
        Self {
            threshold_meters,
            last: None,
        }
    }

    /// Whether `sample` should be delivered; accepted samples become the
    /// new reference point
    pub fn accept(&mut self, sample: &LocationSample) -> bool {
        let moved_enough = match self.last {
            None => true,
            Some(last) => {
                self.threshold_meters <= 0.0
                    || geo::haversine_meters(last, sample.coords) >= self.threshold_meters
            }
        };
        if moved_enough {
            self.last = Some(sample.coords);
        }
        moved_enough
    }
}

/// Owns a live location subscription
///
/// Stopping or dropping the handle ends delivery. A handle created
/// without permission is inactive from the start and stopping it does
/// nothing.
#[derive(Debug, Default)]
pub struct TrackingHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl TrackingHandle {
    /// A handle with nothing behind it
    pub fn inactive() -> Self {
        Self::default()
    }

    fn from_task(task: JoinHandle<()>) -> Self {
        Self { tasks: vec![task] }
    }

    /// Take ownership of another handle's subscriptions
    pub fn merge(&mut self, mut other: TrackingHandle) {
        self.tasks.append(&mut other.tasks);
    }

    /// Whether any subscription is still delivering
    pub fn is_active(&self) -> bool {
        self.tasks.iter().any(|task| !task.is_finished())
    }

    /// Cancel every subscription; idempotent
    pub fn stop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for TrackingHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Subscribe to position updates and feed them to `on_sample`
///
/// Returns an inactive handle when permission is missing or the service
/// refuses the subscription.
pub async fn start_tracking<F, Fut>(
    provider: Arc<dyn LocationProvider>,
    options: TrackingOptions,
    on_sample: F,
) -> TrackingHandle
where
    F: Fn(LocationSample) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    if !provider.has_permission() {
        debug!("Location permission not granted, tracking inactive");
        return TrackingHandle::inactive();
    }

    let mut stream = match provider.watch_position(options.watch).await {
        Ok(stream) => stream,
        Err(e) => {
            debug!(error = %e, "Position subscription refused, tracking inactive");
            return TrackingHandle::inactive();
        }
    };

    let task = tokio::spawn(async move {
        let mut filter = MovementFilter::new(options.move_threshold_meters);
        while let Some(sample) = stream.recv().await {
            if !filter.accept(&sample) {
                trace!(lat = sample.latitude(), lon = sample.longitude(), "Skipping small move");
                continue;
            }
            on_sample(sample).await;
        }
        debug!("Position stream closed");
    });

    debug!(threshold = options.move_threshold_meters, "Tracking started");
    TrackingHandle::from_task(task)
}

/// Subscribe to compass updates and feed the resolved heading to `on_heading`
///
/// Returns an inactive handle when permission is missing or the device
/// has no compass.
pub async fn start_heading_tracking<F>(
    provider: Arc<dyn LocationProvider>,
    on_heading: F,
) -> TrackingHandle
where
    F: Fn(HeadingSample) + Send + Sync + 'static,
{
    if !provider.has_permission() {
        return TrackingHandle::inactive();
    }

    let mut stream = match provider.watch_heading().await {
        Ok(stream) => stream,
        Err(e) => {
            debug!(error = %e, "Heading subscription refused");
            return TrackingHandle::inactive();
        }
    };

    TrackingHandle::from_task(tokio::spawn(async move {
        while let Some(sample) = stream.recv().await {
            on_heading(sample);
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fogmap_core::SimulatedLocationProvider;
    use parking_lot::Mutex;
    use std::time::Duration;

    fn recorder() -> (
        Arc<Mutex<Vec<LocationSample>>>,
        impl Fn(LocationSample) -> std::future::Ready<()> + Send + Sync + 'static,
    ) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |sample| {
            sink.lock().push(sample);
            std::future::ready(())
        })
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[test]
    fn test_movement_filter() {
        let mut filter = MovementFilter::new(10.0);
        assert!(filter.accept(&LocationSample::at(40.0, -73.0)));
        // ~1m north
        assert!(!filter.accept(&LocationSample::at(40.00001, -73.0)));
        // ~111m north
        assert!(filter.accept(&LocationSample::at(40.001, -73.0)));

        let mut unfiltered = MovementFilter::new(0.0);
        assert!(unfiltered.accept(&LocationSample::at(1.0, 1.0)));
        assert!(unfiltered.accept(&LocationSample::at(1.0, 1.0)));
    }

    #[tokio::test]
    async fn test_without_permission_is_inactive() {
        let provider = Arc::new(SimulatedLocationProvider::without_permission());
        let (seen, callback) = recorder();

        let mut handle = start_tracking(provider.clone(), TrackingOptions::default(), callback).await;
        assert!(!handle.is_active());
        assert_eq!(provider.position_watcher_count(), 0);

        handle.stop();
        handle.stop();
        assert!(seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_samples_delivered_in_order() {
        let provider = Arc::new(SimulatedLocationProvider::new());
        let (seen, callback) = recorder();

        let handle = start_tracking(
            provider.clone(),
            TrackingOptions::default().unfiltered(),
            callback,
        )
        .await;
        assert!(handle.is_active());

        for i in 0..5 {
            provider.push_location(LocationSample::at(40.0 + f64::from(i) * 0.01, -73.0));
        }
        settle().await;

        let lats: Vec<f64> = seen.lock().iter().map(|s| s.latitude()).collect();
        assert_eq!(lats.len(), 5);
        assert!(lats.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_stop_ends_delivery() {
        let provider = Arc::new(SimulatedLocationProvider::new());
        let (seen, callback) = recorder();

        let mut handle = start_tracking(provider.clone(), TrackingOptions::default(), callback).await;
        provider.push_location(LocationSample::at(40.0, -73.0));
        settle().await;

        handle.stop();
        settle().await;
        assert!(!handle.is_active());

        provider.push_location(LocationSample::at(41.0, -73.0));
        settle().await;
        assert_eq!(seen.lock().len(), 1);
        assert_eq!(provider.position_watcher_count(), 0);
    }

    #[tokio::test]
    async fn test_drop_ends_delivery() {
        let provider = Arc::new(SimulatedLocationProvider::new());
        let (seen, callback) = recorder();

        let handle = start_tracking(provider.clone(), TrackingOptions::default(), callback).await;
        drop(handle);
        settle().await;

        provider.push_location(LocationSample::at(40.0, -73.0));
        settle().await;
        assert!(seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_heading_tracking() {
        let provider = Arc::new(SimulatedLocationProvider::new());
        let headings = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&headings);

        let handle = start_heading_tracking(provider.clone(), move |sample| {
            sink.lock().push(sample.resolved());
        })
        .await;
        assert!(handle.is_active());

        provider.push_heading(HeadingSample {
            true_heading: -1.0,
            magnetic_heading: 90.0,
        });
        settle().await;
        assert_eq!(*headings.lock(), vec![90.0]);
    }
}

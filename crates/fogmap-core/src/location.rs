//! Location service abstraction
//!
//! The device location stack is an external collaborator. Modes reach it
//! only through [`LocationProvider`], which allows the same lifecycle code
//! to run against a real platform service or a simulated one.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::LocationError;
use crate::geo::Coordinates;

/// A single position fix from the location service
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    pub coords: Coordinates,
    /// Course over ground in degrees, when the service reports one
    pub heading: Option<f64>,
    /// Horizontal accuracy in meters
    pub accuracy: Option<f64>,
    /// When the fix was taken (Unix millis)
    pub timestamp_millis: i64,
}

impl LocationSample {
    /// A fix at the given position, stamped with the current time
    pub fn at(latitude: f64, longitude: f64) -> Self {
        Self {
            coords: Coordinates::new(latitude, longitude),
            heading: None,
            accuracy: None,
            timestamp_millis: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Set the course over ground
    pub fn with_heading(mut self, heading: f64) -> Self {
        self.heading = Some(heading);
        self
    }

    pub fn latitude(&self) -> f64 {
        self.coords.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.coords.longitude
    }
}

/// A compass reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeadingSample {
    /// Heading relative to true north, negative when unavailable
    pub true_heading: f64,
    /// Heading relative to magnetic north
    pub magnetic_heading: f64,
}

impl HeadingSample {
    /// True heading when the device has one, magnetic heading otherwise
    pub fn resolved(&self) -> f64 {
        if self.true_heading >= 0.0 {
            self.true_heading
        } else {
            self.magnetic_heading
        }
    }
}

/// Requested accuracy of a position subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Accuracy {
    Balanced,
    #[default]
    High,
}

/// Granularity of a position subscription
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WatchOptions {
    pub accuracy: Accuracy,
    /// Minimum distance between reported samples (meters)
    pub distance_interval_meters: f64,
    /// Minimum time between reported samples (milliseconds)
    pub time_interval_ms: u64,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            accuracy: Accuracy::High,
            distance_interval_meters: 10.0,
            time_interval_ms: 1000,
        }
    }
}

/// Receiving end of a position subscription; dropping it unsubscribes
pub type LocationStream = mpsc::UnboundedReceiver<LocationSample>;

/// Receiving end of a compass subscription; dropping it unsubscribes
pub type HeadingStream = mpsc::UnboundedReceiver<HeadingSample>;

/// Access to the device location service
#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// Whether location permission is currently granted
    fn has_permission(&self) -> bool;

    /// Most recent fix known to the host, if any
    fn last_known(&self) -> Option<LocationSample>;

    /// Request a fresh fix
    async fn current_position(&self) -> Result<LocationSample, LocationError>;

    /// Subscribe to position updates
    async fn watch_position(&self, options: WatchOptions) -> Result<LocationStream, LocationError>;

    /// Subscribe to compass updates
    async fn watch_heading(&self) -> Result<HeadingStream, LocationError> {
        Err(LocationError::Unsupported("heading updates"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heading_falls_back_to_magnetic() {
        let reading = HeadingSample {
            true_heading: -1.0,
            magnetic_heading: 42.0,
        };
        assert_eq!(reading.resolved(), 42.0);

        let reading = HeadingSample {
            true_heading: 10.0,
            magnetic_heading: 42.0,
        };
        assert_eq!(reading.resolved(), 10.0);
    }

    #[test]
    fn test_sample_builder() {
        let sample = LocationSample::at(40.0, -73.0).with_heading(90.0);
        assert_eq!(sample.latitude(), 40.0);
        assert_eq!(sample.longitude(), -73.0);
        assert_eq!(sample.heading, Some(90.0));
        assert!(sample.timestamp_millis > 0);
    }
}

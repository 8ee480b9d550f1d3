//! Tunable constants for discovery and mini map modes

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for the fog-of-war discovery engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Edge length of a tile in pixels
    pub tile_size_px: u32,
    /// Fixed zoom level of the discovery tile grid
    pub tile_zoom: u8,
    /// Maximum number of tiles resident in memory
    pub max_tiles_in_memory: usize,
    /// Radius revealed around each position sample (meters)
    pub reveal_radius_meters: f64,
    /// Minimum movement before a new position sample is considered (meters)
    pub move_threshold_meters: f64,
    /// Tile radius loaded around the user on activation
    pub max_tiles_load_radius: u32,
    /// Quiet period before a mutated tile is written to storage
    pub save_debounce_ms: u64,
    /// Longest a continuously mutated tile waits before it is written
    pub save_max_wait_ms: u64,
    /// Minimum time between position samples from the location service
    pub tracking_interval_ms: u64,
    /// Prefix of persistent storage keys
    pub storage_key_prefix: String,
    /// Compact a tile's circles once it holds more than this many points
    pub compact_after_points: Option<usize>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            tile_size_px: 256,
            tile_zoom: 15,
            max_tiles_in_memory: 64,
            reveal_radius_meters: 50.0,
            move_threshold_meters: 10.0,
            max_tiles_load_radius: 1,
            save_debounce_ms: 750,
            save_max_wait_ms: 3000,
            tracking_interval_ms: 1000,
            storage_key_prefix: "discovery-tile".to_string(),
            compact_after_points: None,
        }
    }
}

impl DiscoveryConfig {
    /// Set the memory bound on resident tiles
    pub fn with_max_tiles_in_memory(mut self, max: usize) -> Self {
        self.max_tiles_in_memory = max;
        self
    }

    /// Set the reveal radius in meters
    pub fn with_reveal_radius_meters(mut self, meters: f64) -> Self {
        self.reveal_radius_meters = meters;
        self
    }

    /// Set the neighborhood radius loaded on activation
    pub fn with_load_radius(mut self, radius: u32) -> Self {
        self.max_tiles_load_radius = radius;
        self
    }

    /// Set the persistence debounce interval
    pub fn with_save_debounce(mut self, debounce: Duration) -> Self {
        self.save_debounce_ms = debounce.as_millis() as u64;
        self
    }

    /// Set the longest a busy tile can postpone its write
    pub fn with_save_max_wait(mut self, max_wait: Duration) -> Self {
        self.save_max_wait_ms = max_wait.as_millis() as u64;
        self
    }

    /// Set the movement threshold in meters
    pub fn with_move_threshold_meters(mut self, meters: f64) -> Self {
        self.move_threshold_meters = meters;
        self
    }

    /// Enable circle compaction above the given point count
    pub fn with_compaction(mut self, after_points: usize) -> Self {
        self.compact_after_points = Some(after_points);
        self
    }

    pub fn save_debounce(&self) -> Duration {
        Duration::from_millis(self.save_debounce_ms)
    }

    pub fn save_max_wait(&self) -> Duration {
        Duration::from_millis(self.save_max_wait_ms)
    }

    pub fn tracking_interval(&self) -> Duration {
        Duration::from_millis(self.tracking_interval_ms)
    }

    /// Check that every value is usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tile_size_px == 0 {
            return Err(ConfigError::MustBePositive {
                field: "tile_size_px",
            });
        }
        if self.tile_zoom > 30 {
            return Err(ConfigError::ZoomOutOfRange(self.tile_zoom));
        }
        if self.max_tiles_in_memory == 0 {
            return Err(ConfigError::MustBePositive {
                field: "max_tiles_in_memory",
            });
        }
        if self.reveal_radius_meters.is_nan() || self.reveal_radius_meters <= 0.0 {
            return Err(ConfigError::MustBePositive {
                field: "reveal_radius_meters",
            });
        }
        if self.save_max_wait_ms < self.save_debounce_ms {
            return Err(ConfigError::MaxWaitBelowDebounce {
                max_wait_ms: self.save_max_wait_ms,
                debounce_ms: self.save_debounce_ms,
            });
        }
        if self.storage_key_prefix.is_empty() {
            return Err(ConfigError::EmptyKeyPrefix);
        }
        Ok(())
    }
}

/// Configuration for the mini map mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MiniMapConfig {
    /// Zoom level while the mini map is focused
    pub zoom_in: f64,
    /// Zoom level while the user holds the map for context
    pub zoom_out: f64,
    /// Duration of the zoom animation (milliseconds)
    pub zoom_duration_ms: u64,
    /// Distance between position samples (meters)
    pub location_distance_meters: f64,
    /// Interval between position samples (milliseconds)
    pub heading_update_ms: u64,
}

impl Default for MiniMapConfig {
    fn default() -> Self {
        Self {
            zoom_in: 17.0,
            zoom_out: 14.5,
            zoom_duration_ms: 300,
            location_distance_meters: 1.0,
            heading_update_ms: 250,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = DiscoveryConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.save_debounce(), Duration::from_millis(750));
        assert_eq!(config.tile_zoom, 15);
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let config = DiscoveryConfig::default().with_max_tiles_in_memory(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MustBePositive {
                field: "max_tiles_in_memory"
            })
        ));
    }

    #[test]
    fn test_validate_rejects_max_wait_below_debounce() {
        let config = DiscoveryConfig::default().with_save_max_wait(Duration::from_millis(500));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MaxWaitBelowDebounce {
                max_wait_ms: 500,
                debounce_ms: 750
            })
        ));
        assert_eq!(DiscoveryConfig::default().save_max_wait(), Duration::from_secs(3));
    }

    #[test]
    fn test_validate_rejects_bad_radius() {
        let config = DiscoveryConfig::default().with_reveal_radius_meters(f64::NAN);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: DiscoveryConfig =
            serde_json::from_str(r#"{ "max_tiles_in_memory": 2, "tile_zoom": 16 }"#).unwrap();
        assert_eq!(config.max_tiles_in_memory, 2);
        assert_eq!(config.tile_zoom, 16);
        assert_eq!(config.tile_size_px, 256);
        assert_eq!(config.storage_key_prefix, "discovery-tile");
    }
}

//! Simulation configuration
//!
//! Everything has a default, so a TOML file only needs the values it
//! changes:
//!
//! ```toml
//! [discovery]
//! max_tiles_in_memory = 16
//! reveal_radius_meters = 75.0
//!
//! [walk]
//! steps = 500
//! seed = 7
//! ```

use std::path::Path;

use fogmap_core::{ConfigError, DiscoveryConfig, MiniMapConfig};
use fogmap_logging::LogConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors loading a simulation config file
#[derive(Debug, Error)]
pub enum SimConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Invalid(#[from] ConfigError),

    #[error("walk.{field} must be positive")]
    InvalidWalk { field: &'static str },
}

/// Parameters of a random walk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkConfig {
    pub start_latitude: f64,
    pub start_longitude: f64,
    /// Number of position samples to generate
    pub steps: usize,
    /// Distance between consecutive samples (meters)
    pub step_meters: f64,
    /// Largest change of direction per step (degrees)
    pub max_turn_degrees: f64,
    /// Fixed seed for a reproducible walk; random when absent
    pub seed: Option<u64>,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            // Central Park, New York
            start_latitude: 40.7812,
            start_longitude: -73.9665,
            steps: 200,
            step_meters: 15.0,
            max_turn_degrees: 30.0,
            seed: None,
        }
    }
}

/// Full simulator configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub discovery: DiscoveryConfig,
    pub minimap: MiniMapConfig,
    pub walk: WalkConfig,
    pub logging: LogConfig,
}

impl SimulationConfig {
    /// Load and validate a TOML config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SimConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, SimConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SimConfigError> {
        self.discovery.validate()?;
        if self.walk.step_meters.is_nan() || self.walk.step_meters <= 0.0 {
            return Err(SimConfigError::InvalidWalk {
                field: "step_meters",
            });
        }
        if self.walk.steps == 0 {
            return Err(SimConfigError::InvalidWalk { field: "steps" });
        }
        Ok(())
    }
}

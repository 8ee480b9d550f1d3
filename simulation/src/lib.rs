//! # Fogmap Simulation
//!
//! Drives the discovery engine with synthetic or recorded movement, without
//! a device or a map renderer.
//!
//! ## Architecture
//!
//! - **Config** (`config.rs`): [`SimulationConfig`], loaded from TOML
//! - **Walk** (`walk.rs`): seeded [`RandomWalk`] position generator
//! - **Track** (`track.rs`): `lat,lon` track files for replay
//! - **Renderer** (`renderer.rs`): [`SimRenderer`], a counting renderer stand-in
//! - **Session** (`session.rs`): one activate, move, deactivate cycle
//!
//! ## Example
//!
//! ```rust,ignore
//! use fogmap_simulation::*;
//!
//! let config = SimulationConfig::default();
//! let samples: Vec<_> = RandomWalk::new(&config.walk).collect();
//! let session = Session::new(config, open_store(None)?, samples.first().copied(), false);
//!
//! let report = session.run(samples).await?;
//! println!("{report}");
//! ```

pub mod config;
pub mod renderer;
pub mod session;
pub mod track;
pub mod walk;

#[cfg(test)]
mod integration_scenarios;

pub use config::{SimConfigError, SimulationConfig, WalkConfig};
pub use renderer::SimRenderer;
pub use session::{Session, SessionReport, StoredTileSummary, inspect, open_store};
pub use track::{TrackError, load_track, parse_track};
pub use walk::RandomWalk;

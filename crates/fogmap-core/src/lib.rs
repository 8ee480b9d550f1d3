//! # Fogmap Core
//!
//! Core types, projection math, and errors for the fogmap discovery engine.
//!
//! The discovery engine reveals a fog-of-war overlay wherever the user has
//! physically been. This crate holds the pieces every other crate shares:
//!
//! ## Key Modules
//!
//! - [`geo`]: Web Mercator projection onto the tile grid, meters to pixels
//! - [`tile`]: [`TileId`], [`TilePoint`], [`TileRecord`] and the persisted form
//! - [`config`]: [`DiscoveryConfig`] and [`MiniMapConfig`]
//! - [`location`]: the [`LocationProvider`] abstraction over the device GPS
//! - [`mock_location`]: [`SimulatedLocationProvider`] for tests and simulation

pub mod config;
pub mod error;
pub mod geo;
pub mod location;
pub mod mock_location;
pub mod tile;

// Re-export main types
pub use config::*;
pub use error::*;
pub use geo::{Coordinates, TilePixel, TileSpace};
pub use location::*;
pub use mock_location::*;
pub use tile::*;

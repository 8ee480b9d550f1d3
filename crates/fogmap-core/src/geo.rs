//! Web Mercator projection onto the slippy-map tile grid
//!
//! All functions are pure. Longitudes and latitudes are in degrees.

use serde::{Deserialize, Serialize};

use crate::tile::TileId;

/// Ground resolution at the equator for zoom 0 with 256px tiles (meters per pixel)
pub const EQUATOR_METERS_PER_PIXEL: f64 = 156_543.033_92;

/// Latitude at which Web Mercator maps to a square world
pub const MAX_MERCATOR_LATITUDE: f64 = 85.051_128_78;

/// Mean earth radius used for great-circle distances
pub const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

/// Fractional tile-grid position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileSpace {
    pub x: f64,
    pub y: f64,
}

/// Containing tile plus the pixel offset inside it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilePixel {
    pub tile_x: i64,
    pub tile_y: i64,
    pub pixel_x: u32,
    pub pixel_y: u32,
}

impl TilePixel {
    pub fn tile_id(&self, zoom: u8) -> TileId {
        TileId::new(zoom, self.tile_x, self.tile_y)
    }
}

/// A geographic position
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

fn world_size(zoom: u8) -> f64 {
    2f64.powi(i32::from(zoom))
}

/// Project a position to fractional tile coordinates at `zoom`
///
/// Latitudes beyond the Mercator limit are clamped to it.
pub fn project_to_tile_space(lon: f64, lat: f64, zoom: u8) -> TileSpace {
    let n = world_size(zoom);
    let lat = lat.clamp(-MAX_MERCATOR_LATITUDE, MAX_MERCATOR_LATITUDE);
    let lat_rad = lat.to_radians();

    let x = (lon + 180.0) / 360.0 * n;
    let y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / std::f64::consts::PI) / 2.0 * n;
    TileSpace { x, y }
}

/// Project a position to its containing tile and in-tile pixel offset
///
/// The tile always lies on the grid: columns wrap across the antimeridian
/// and rows at the clamped poles stay in the first or last row.
pub fn project_to_tile_pixel(lon: f64, lat: f64, zoom: u8, tile_size_px: u32) -> TilePixel {
    let TileSpace { x, y } = project_to_tile_space(lon, lat, zoom);
    let n = 1i64 << zoom.min(62);
    let size = f64::from(tile_size_px);
    let max_pixel = tile_size_px.saturating_sub(1);

    let tile_x = x.floor();
    // The remainder is in [0, 1); the min() guards float rounding at the edge.
    let pixel_x = (((x - tile_x) * size).floor() as u32).min(max_pixel);

    let (tile_y, pixel_y) = if y < 0.0 {
        (0, 0)
    } else if y >= n as f64 {
        (n - 1, max_pixel)
    } else {
        let tile_y = y.floor();
        let pixel_y = (((y - tile_y) * size).floor() as u32).min(max_pixel);
        (tile_y as i64, pixel_y)
    };

    TilePixel {
        tile_x: (tile_x as i64).rem_euclid(n),
        tile_y,
        pixel_x,
        pixel_y,
    }
}

/// Ground distance covered by one pixel at `lat` and `zoom`
pub fn meters_per_pixel(lat: f64, zoom: u8) -> f64 {
    EQUATOR_METERS_PER_PIXEL * lat.to_radians().cos() / world_size(zoom)
}

/// Convert a ground distance to on-tile pixels, correcting for latitude
pub fn meters_to_pixels(lat: f64, meters: f64, zoom: u8) -> f64 {
    let lat = lat.clamp(-MAX_MERCATOR_LATITUDE, MAX_MERCATOR_LATITUDE);
    meters / meters_per_pixel(lat, zoom)
}

/// Id of the tile at grid position `(tile_x, tile_y)`
pub fn tile_id(tile_x: i64, tile_y: i64, zoom: u8) -> TileId {
    TileId::new(zoom, tile_x, tile_y)
}

/// Square neighborhood of tiles within `radius` steps of `(tile_x, tile_y)`
///
/// Columns wrap across the antimeridian; rows outside the grid are skipped.
pub fn tiles_around(tile_x: i64, tile_y: i64, radius: u32, zoom: u8) -> Vec<TileId> {
    let radius = i64::from(radius);
    let n = 1i64 << zoom.min(62);
    let mut ids = Vec::with_capacity(((2 * radius + 1) * (2 * radius + 1)) as usize);

    for dx in -radius..=radius {
        let x = (tile_x + dx).rem_euclid(n);
        for dy in -radius..=radius {
            let y = tile_y + dy;
            if !(0..n).contains(&y) {
                continue;
            }
            ids.push(tile_id(x, y, zoom));
        }
    }
    ids
}

/// Great-circle distance between two positions
pub fn haversine_meters(a: Coordinates, b: Coordinates) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = lat2 - lat1;
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * h.sqrt().min(1.0).asin()
}

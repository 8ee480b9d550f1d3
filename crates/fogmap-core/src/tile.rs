//! Tile identifiers and reveal records
//!
//! A tile is one cell of the slippy-map grid at the discovery zoom level.
//! Each tile accumulates the circles revealed inside it, in tile-local
//! pixel space.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::FogmapError;

/// Unique identifier for a tile at a given zoom level
///
/// Formatted as `"<zoom>/<tile_x>/<tile_y>"`. This is the only key used by
/// the in-memory cache and by persistent storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TileId(String);

impl TileId {
    /// Compose the id for integer tile-grid coordinates
    pub fn new(zoom: u8, tile_x: i64, tile_y: i64) -> Self {
        Self(format!("{zoom}/{tile_x}/{tile_y}"))
    }

    /// Parse an id string back into `(zoom, tile_x, tile_y)`
    pub fn parse(raw: &str) -> Result<(u8, i64, i64), FogmapError> {
        let mut parts = raw.split('/');
        let invalid = || FogmapError::InvalidTileId(raw.to_string());

        let zoom = parts.next().and_then(|z| z.parse().ok()).ok_or_else(invalid)?;
        let x = parts.next().and_then(|x| x.parse().ok()).ok_or_else(invalid)?;
        let y = parts.next().and_then(|y| y.parse().ok()).ok_or_else(invalid)?;

        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok((zoom, x, y))
    }

    /// Validate and wrap an existing id string
    pub fn from_raw(raw: impl Into<String>) -> Result<Self, FogmapError> {
        let raw = raw.into();
        Self::parse(&raw)?;
        Ok(Self(raw))
    }

    /// Grid coordinates of this tile
    pub fn coords(&self) -> (u8, i64, i64) {
        // Every constructor goes through `new` or a successful `parse`.
        Self::parse(&self.0).unwrap_or((0, 0, 0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TileId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A revealed circle inside a tile
///
/// `x`/`y` are the pixel offset of the center within the tile and `r` is the
/// radius in pixels, all at the discovery zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TilePoint {
    pub x: f64,
    pub y: f64,
    pub r: f64,
}

impl TilePoint {
    pub fn new(x: f64, y: f64, r: f64) -> Self {
        Self { x, y, r }
    }

    /// Whether this circle lies entirely inside `other`
    pub fn is_within(&self, other: &TilePoint) -> bool {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt() + self.r <= other.r
    }
}

/// The full reveal history of one tile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileRecord {
    pub id: TileId,
    pub points: Vec<TilePoint>,
}

impl TileRecord {
    /// A tile with nothing revealed yet
    pub fn empty(id: TileId) -> Self {
        Self {
            id,
            points: Vec::new(),
        }
    }

    /// Rebuild a record from its persisted form
    pub fn from_stored(id: TileId, stored: StoredTile) -> Self {
        Self {
            id,
            points: stored.points,
        }
    }

    /// Persisted form of this record (the id lives in the storage key)
    pub fn to_stored(&self) -> StoredTile {
        StoredTile {
            points: self.points.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Drop circles that are fully covered by another circle of this tile
    ///
    /// The union of revealed circles is unchanged. Among identical circles
    /// the earliest one is kept. Returns the number of points removed.
    pub fn compact(&mut self) -> usize {
        let before = self.points.len();
        let points = std::mem::take(&mut self.points);

        let kept: Vec<TilePoint> = points
            .iter()
            .enumerate()
            .filter(|(i, point)| {
                !points.iter().enumerate().any(|(j, other)| {
                    if *i == j || !point.is_within(other) {
                        return false;
                    }
                    // Identical circles cover each other; only the first survives.
                    !(other.is_within(point) && j > *i)
                })
            })
            .map(|(_, point)| *point)
            .collect();

        self.points = kept;
        before - self.points.len()
    }
}

/// Persisted value of a tile: `{ "points": [...] }`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredTile {
    pub points: Vec<TilePoint>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_id_format_and_parse() {
        let id = TileId::new(15, 9545, 12318);
        assert_eq!(id.as_str(), "15/9545/12318");
        assert_eq!(id.coords(), (15, 9545, 12318));
        assert_eq!(TileId::new(15, 9545, 12318), id);
        assert_ne!(TileId::new(15, 12318, 9545), id);
    }

    #[test]
    fn test_tile_id_rejects_garbage() {
        assert!(TileId::from_raw("15/1").is_err());
        assert!(TileId::from_raw("15/1/2/3").is_err());
        assert!(TileId::from_raw("a/b/c").is_err());
        assert!(TileId::from_raw("15/-1/2").is_ok());
    }

    #[test]
    fn test_tile_record_json_shape() {
        let mut record = TileRecord::empty(TileId::new(15, 1, 2));
        record.points.push(TilePoint::new(10.0, 20.0, 3.5));

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], "15/1/2");
        assert_eq!(json["points"][0]["r"], 3.5);

        let stored = serde_json::to_string(&record.to_stored()).unwrap();
        assert_eq!(stored, r#"{"points":[{"x":10.0,"y":20.0,"r":3.5}]}"#);
    }

    #[test]
    fn test_compact_removes_only_covered_circles() {
        let mut record = TileRecord::empty(TileId::new(15, 0, 0));
        record.points = vec![
            TilePoint::new(100.0, 100.0, 10.0),
            TilePoint::new(102.0, 100.0, 3.0), // inside the first
            TilePoint::new(100.0, 100.0, 10.0), // duplicate of the first
            TilePoint::new(200.0, 200.0, 10.0), // disjoint
            TilePoint::new(108.0, 100.0, 5.0), // overlaps but pokes out
        ];

        let removed = record.compact();
        assert_eq!(removed, 2);
        assert_eq!(
            record.points,
            vec![
                TilePoint::new(100.0, 100.0, 10.0),
                TilePoint::new(200.0, 200.0, 10.0),
                TilePoint::new(108.0, 100.0, 5.0),
            ]
        );
    }

    #[test]
    fn test_compact_keeps_growing_circle() {
        let mut record = TileRecord::empty(TileId::new(15, 0, 0));
        record.points = vec![
            TilePoint::new(50.0, 50.0, 2.0),
            TilePoint::new(50.0, 50.0, 4.0),
        ];
        assert_eq!(record.compact(), 1);
        assert_eq!(record.points, vec![TilePoint::new(50.0, 50.0, 4.0)]);
    }
}

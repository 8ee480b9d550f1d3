//! Recorded tracks
//!
//! A track file is plain text with one `latitude,longitude` pair per line.
//! Blank lines, `#` comments and a leading `lat,lon` style header are
//! ignored.

use std::path::Path;

use fogmap_core::LocationSample;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackError {
    #[error("failed to read track: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    #[error("track has no positions")]
    Empty,
}

/// Read a track file into position samples
pub fn load_track(path: impl AsRef<Path>) -> Result<Vec<LocationSample>, TrackError> {
    parse_track(&std::fs::read_to_string(path)?)
}

/// Parse track text into position samples
pub fn parse_track(text: &str) -> Result<Vec<LocationSample>, TrackError> {
    let mut samples = Vec::new();

    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if samples.is_empty() && line.chars().next().is_some_and(char::is_alphabetic) {
            continue;
        }

        let malformed = |reason: &str| TrackError::Malformed {
            line: index + 1,
            reason: reason.to_string(),
        };

        let mut fields = line.split(',').map(str::trim);
        let lat: f64 = fields
            .next()
            .ok_or_else(|| malformed("missing latitude"))?
            .parse()
            .map_err(|_| malformed("latitude is not a number"))?;
        let lon: f64 = fields
            .next()
            .ok_or_else(|| malformed("missing longitude"))?
            .parse()
            .map_err(|_| malformed("longitude is not a number"))?;

        if !(-90.0..=90.0).contains(&lat) {
            return Err(malformed("latitude out of range"));
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(malformed("longitude out of range"));
        }
        samples.push(LocationSample::at(lat, lon));
    }

    if samples.is_empty() {
        return Err(TrackError::Empty);
    }
    Ok(samples)
}

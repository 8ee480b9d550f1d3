//! Synthetic movement
//!
//! [`RandomWalk`] yields position samples a fixed distance apart with a
//! bounded random change of direction between steps, which looks enough
//! like someone wandering around a city to exercise tile boundaries, LRU
//! eviction and the movement filter.

use fogmap_core::{LocationSample, geo};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::WalkConfig;

const METERS_PER_DEGREE_LAT: f64 = 111_320.0;

/// Deterministic-per-seed random walk
#[derive(Debug, Clone)]
pub struct RandomWalk {
    latitude: f64,
    longitude: f64,
    bearing: f64,
    step_meters: f64,
    max_turn: f64,
    remaining: usize,
    seed: u64,
    rng: StdRng,
}

impl RandomWalk {
    pub fn new(config: &WalkConfig) -> Self {
        let seed = config.seed.unwrap_or_else(rand::random);
        let mut rng = StdRng::seed_from_u64(seed);
        Self {
            latitude: config.start_latitude,
            longitude: config.start_longitude,
            bearing: rng.random_range(0.0..360.0),
            step_meters: config.step_meters,
            max_turn: config.max_turn_degrees.abs(),
            remaining: config.steps,
            seed,
            rng,
        }
    }

    /// Seed in use; pass it back through the config to repeat the walk
    pub fn seed(&self) -> u64 {
        self.seed
    }

    fn advance(&mut self) {
        if self.max_turn > 0.0 {
            self.bearing += self.rng.random_range(-self.max_turn..=self.max_turn);
        }
        self.bearing = self.bearing.rem_euclid(360.0);

        let (north, east) = {
            let rad = self.bearing.to_radians();
            (rad.cos() * self.step_meters, rad.sin() * self.step_meters)
        };
        self.latitude = (self.latitude + north / METERS_PER_DEGREE_LAT)
            .clamp(-geo::MAX_MERCATOR_LATITUDE, geo::MAX_MERCATOR_LATITUDE);
        let lon_scale = METERS_PER_DEGREE_LAT * self.latitude.to_radians().cos();
        self.longitude = (self.longitude + east / lon_scale + 180.0).rem_euclid(360.0) - 180.0;
    }
}

impl Iterator for RandomWalk {
    type Item = LocationSample;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        self.advance();
        Some(LocationSample::at(self.latitude, self.longitude).with_heading(self.bearing))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fogmap_core::Coordinates;

    fn config(seed: u64) -> WalkConfig {
        WalkConfig {
            steps: 50,
            seed: Some(seed),
            ..WalkConfig::default()
        }
    }

    #[test]
    fn test_same_seed_same_walk() {
        let a: Vec<_> = RandomWalk::new(&config(7)).map(|s| s.coords).collect();
        let b: Vec<_> = RandomWalk::new(&config(7)).map(|s| s.coords).collect();
        let c: Vec<_> = RandomWalk::new(&config(8)).map(|s| s.coords).collect();
        assert_eq!(a.len(), 50);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_steps_are_step_meters_apart() {
        let walk = WalkConfig::default();
        let mut previous = Coordinates::new(walk.start_latitude, walk.start_longitude);
        for sample in RandomWalk::new(&config(1)) {
            let distance = geo::haversine_meters(previous, sample.coords);
            assert!((distance - 15.0).abs() < 0.5, "step was {distance}m");
            previous = sample.coords;
        }
    }

    #[test]
    fn test_longitude_wraps() {
        let walk = RandomWalk::new(&WalkConfig {
            start_latitude: 0.0,
            start_longitude: 179.9999,
            steps: 20,
            step_meters: 100.0,
            max_turn_degrees: 0.0,
            seed: Some(3),
        });
        assert!(walk.into_iter().all(|s| (-180.0..180.0).contains(&s.longitude())));
    }
}

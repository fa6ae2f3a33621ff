//! Deterministic random source.
//!
//! One instance per worker slice plus one for the control thread, each
//! seeded from the config seed at construction, so reruns of the same
//! level produce the same perturbations and pump jitter.

use glam::Vec3;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

pub struct RandomSource {
    rng: SmallRng,
}

impl RandomSource {
    pub fn new(seed: u64) -> Self {
        Self { rng: SmallRng::seed_from_u64(seed) }
    }

    /// Random unit vector, used to separate near-coincident pairs.
    pub fn separation_axis(&mut self) -> Vec3 {
        loop {
            let v = self.in_unit_cube();
            let len_sq = v.length_squared();
            if len_sq > 1e-4 && len_sq <= 1.0 {
                return v / len_sq.sqrt();
            }
        }
    }

    /// Random point in the sphere of the given radius (pump release jitter).
    pub fn jitter_in_sphere(&mut self, radius: f32) -> Vec3 {
        if radius <= 0.0 {
            return Vec3::ZERO;
        }
        loop {
            let v = self.in_unit_cube();
            if v.length_squared() <= 1.0 {
                return v * radius;
            }
        }
    }

    fn in_unit_cube(&mut self) -> Vec3 {
        Vec3::new(
            self.rng.gen_range(-1.0f32..1.0),
            self.rng.gen_range(-1.0f32..1.0),
            self.rng.gen_range(-1.0f32..1.0),
        )
    }
}

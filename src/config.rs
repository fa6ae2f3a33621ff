//! Fluid tuning knobs.
//!
//! Everything scale-dependent lives here so levels can ship their own
//! tuning as TOML. Defaults are calibrated for half-voxel particles in
//! a 1-unit voxel world at a 60 Hz tick.

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Distance beyond which two particles do not interact.
    /// Also the spatial grid cell size.
    pub interaction_radius: f32,
    /// Collision radius written into every particle slot.
    pub particle_radius: f32,
    /// Density the pressure term relaxes toward; the gravity seed
    /// scales by `(rho - ambient) / rho`. Must stay below the 1.0
    /// density floor so isolated particles still fall.
    pub ambient_density: f32,
    /// Pressure stiffness.
    pub stiffness: f32,
    /// Near-pressure stiffness (short-range anti-clumping).
    pub near_stiffness: f32,
    /// Gain of the viscous nudge toward the neighbor-average velocity.
    pub viscosity_gain: f32,
    /// Per-second velocity damping.
    pub damping: f32,
    /// Hard cap on per-tick displacement, world units. Keep at or below
    /// the particle radius or fast particles can tunnel voxel faces.
    pub max_displacement: f32,
    /// Restitution of the collision impulse.
    pub restitution: f32,
    /// Magnitude of the gravity acceleration, units/s^2.
    pub gravity_accel: f32,
    /// Seconds a propagation-touched particle keeps glowing.
    pub glow_duration: f32,
    /// Worker thread override; `None` uses detected concurrency + 1.
    pub worker_threads: Option<usize>,
    /// Base seed for the deterministic per-worker generators.
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            interaction_radius: 1.25,
            particle_radius: 0.5,
            ambient_density: 0.6,
            stiffness: 8.0,
            near_stiffness: 20.0,
            viscosity_gain: 1.5,
            damping: 2.0,
            max_displacement: 0.4,
            restitution: 0.05,
            gravity_accel: 20.0,
            glow_duration: 1.5,
            worker_threads: None,
            seed: 0x71de,
        }
    }
}

impl SimConfig {
    /// Parse and validate a TOML tuning file.
    pub fn from_toml_str(text: &str) -> SimResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SimResult<()> {
        let positive = [
            ("interaction_radius", self.interaction_radius),
            ("particle_radius", self.particle_radius),
            ("max_displacement", self.max_displacement),
        ];
        for (field, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(SimError::Config { field, value });
            }
        }
        let finite = [
            ("ambient_density", self.ambient_density),
            ("stiffness", self.stiffness),
            ("near_stiffness", self.near_stiffness),
            ("viscosity_gain", self.viscosity_gain),
            ("damping", self.damping),
            ("restitution", self.restitution),
            ("gravity_accel", self.gravity_accel),
            ("glow_duration", self.glow_duration),
        ];
        for (field, value) in finite {
            if !value.is_finite() || value < 0.0 {
                return Err(SimError::Config { field, value });
            }
        }
        if self.ambient_density >= 1.0 {
            return Err(SimError::Config {
                field: "ambient_density",
                value: self.ambient_density,
            });
        }
        Ok(())
    }
}

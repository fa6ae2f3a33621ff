//! Particle-based fluid simulation for voxel worlds.
//!
//! A body of liquid is modeled as thousands of particles, each carrying
//! its own "down" direction, so gameplay can redirect where water
//! flows. The crate owns spatial neighbor search, the pressure and
//! viscosity integrator, collision against solid voxels and blocker
//! panes, and the parallel stage pipeline. World storage, rendering and
//! UI live outside and talk to the engine through plain buffers and the
//! query API.
//!
//! Typical frame:
//! ```no_run
//! use glam::{IVec3, Vec3};
//! use tide_engine::{SimConfig, SimulationEngine, TickInput, VoxelField};
//!
//! let field = VoxelField::air(IVec3::ZERO, IVec3::new(32, 32, 32))?;
//! let initial: Vec<Vec3> = (0..64)
//!     .map(|i| Vec3::new(4.0 + (i % 8) as f32, 8.0, 4.0 + (i / 8) as f32))
//!     .collect();
//! let mut sim = SimulationEngine::new(field, &initial, 0, SimConfig::default())?;
//!
//! let mut vertices = Vec::new();
//! loop {
//!     sim.tick(&TickInput::step(1.0 / 60.0));
//!     sim.swap_buffers();
//!     sim.copy_to_output(&mut vertices);
//!     // hand `vertices` and `sim.gravity_buffer()` to the renderer
//!     # break;
//! }
//! # Ok::<(), tide_engine::SimError>(())
//! ```

pub mod collision;
pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod gravity;
pub mod kernel;
pub mod particles;
pub mod pump;
pub mod rng;
pub mod spatial;

pub use collision::{VoxelField, WaterBlocker};
pub use config::SimConfig;
pub use engine::{RayPick, RegionQuery, SimulationEngine, TickInput, TickStats};
pub use error::{SimError, SimResult};
pub use gravity::{GravityChange, GravityDir};
pub use particles::{ParticleId, ParticleVertex};
pub use pump::WaterPump;

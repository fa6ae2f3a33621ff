//! Simulation engine: pipeline orchestration, worker pool, queries.

mod engine;
mod queries;
mod stats;
mod worker;

pub use engine::{SimulationEngine, TickInput};
pub use queries::{RayPick, RegionQuery};
pub use stats::TickStats;

//! Construction-boundary error handling.
//!
//! Nothing inside a tick produces an error: capacity overflow truncates
//! silently, degenerate geometry is guarded and skipped. The only
//! failures a caller can observe are violated construction or
//! configuration contracts.

use thiserror::Error;

/// Type alias for simulator construction results
pub type SimResult<T> = Result<T, SimError>;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("particle count {count} is not a multiple of the required alignment {alignment}")]
    MisalignedParticleCount { count: usize, alignment: usize },

    #[error("voxel field holds {actual} bits but the bounds require {expected}")]
    VoxelFieldSize { expected: usize, actual: usize },

    #[error("world bounds are empty or inverted: {0}")]
    EmptyBounds(String),

    #[error("invalid config value for {field}: {value}")]
    Config { field: &'static str, value: f32 },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("failed to build worker pool: {0}")]
    WorkerPool(String),
}

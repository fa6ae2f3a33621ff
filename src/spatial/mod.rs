//! Spatial acceleration structures, rebuilt from scratch every tick.

pub mod grid;
pub mod neighbors;

pub use grid::SpatialGrid;
pub use neighbors::NeighborTable;

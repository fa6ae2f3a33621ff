// Tide Engine constants - SINGLE SOURCE OF TRUTH
//
// Capacity caps are deliberate real-time bounds, not tunables: when a
// bounded collection fills up, further appends are dropped and counted,
// never raised as errors. Do NOT define these anywhere else.

/// Fixed capacities for the per-tick bounded collections
pub mod capacity {
    /// Particles a single grid cell can hold before appends drop
    pub const CELL_CAPACITY: usize = 512;

    /// Entries a single particle's neighbor list can hold before appends drop
    pub const NEIGHBOR_CAPACITY: usize = 512;

    /// Particles one pump may teleport in a single tick
    pub const MAX_PUMP_MOVES: usize = 32;
}

/// Allocation and worker-slice alignment
pub mod alignment {
    /// Live particle count must be a multiple of this
    pub const PARTICLE_ALIGNMENT: usize = 16;

    /// Worker slice lengths round up to this many particles
    /// (16 f32 lanes = one 64-byte cache line per component array)
    pub const SLICE_ALIGNMENT: usize = 16;
}

/// Spatial grid layout
pub mod grid {
    /// Edge length of a cell group; cell addresses fold through
    /// CELL_GROUP^3 blocks so a 3x3x3 scan stays memory-local
    pub const CELL_GROUP: i32 = 4;

    /// Cells of margin added around the voxel-world bounds
    pub const MARGIN_CELLS: i32 = 4;
}

/// Per-tick numeric guards
pub mod step {
    /// Upper clamp on the timestep, seconds
    pub const MAX_DT: f32 = 1.0 / 60.0;

    /// Collision correction passes per particle per tick
    pub const COLLISION_PASSES: usize = 4;

    /// Pair distances below this use a random separation axis instead
    /// of the (degenerate) geometric one
    pub const CORE_RADIUS: f32 = 1e-3;

    /// Softening added to pair distances before division
    pub const DISTANCE_EPSILON: f32 = 1e-6;
}

//! Per-tick pipeline statistics.

/// Stage timings and overflow counters for the most recent tick.
///
/// The drop counters make the silent-truncation contract observable:
/// sustained nonzero values mean the scene is over-dense for the fixed
/// capacities and accuracy is degrading.
#[derive(Debug, Default, Clone)]
pub struct TickStats {
    pub detect_close_us: u64,
    pub density_us: u64,
    pub acceleration_us: u64,
    pub diffuse_move_us: u64,
    /// Grid-cell appends dropped at capacity this tick.
    pub cell_drops: u32,
    /// Neighbor-list appends dropped at capacity this tick.
    pub neighbor_drops: u32,
    /// Particles teleported by pumps this tick.
    pub pump_moves: u32,
}

impl TickStats {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

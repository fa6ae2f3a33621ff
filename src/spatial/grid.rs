//! Uniform grid over the simulated region.
//!
//! Cell size equals the interaction radius, so any particle's possible
//! partners live in the 3x3x3 block around its own cell. Cells are
//! pre-allocated fixed-capacity lists: appends beyond capacity are
//! dropped and counted, never grown, so a tick can never stall on an
//! over-dense region.

use std::sync::atomic::{AtomicU32, Ordering};

use glam::{IVec3, Vec3};
use rayon::prelude::*;

use crate::constants::capacity::CELL_CAPACITY;
use crate::constants::grid::{CELL_GROUP, MARGIN_CELLS};
use crate::error::{SimError, SimResult};

const GROUP_VOLUME: usize = (CELL_GROUP * CELL_GROUP * CELL_GROUP) as usize;

pub struct SpatialGrid {
    origin: Vec3,
    inv_cell_size: f32,
    /// Cells per axis; every component is a multiple of CELL_GROUP.
    dims: IVec3,
    group_dims: IVec3,
    counts: Vec<AtomicU32>,
    entries: Vec<AtomicU32>,
    dropped: AtomicU32,
}

impl SpatialGrid {
    /// Bounds cover the voxel world plus a fixed margin of cells, each
    /// axis rounded up to whole cell groups. Derived once; never
    /// resized.
    pub fn new(world_min: IVec3, world_size: IVec3, cell_size: f32) -> SimResult<Self> {
        if world_size.cmple(IVec3::ZERO).any() {
            return Err(SimError::EmptyBounds(format!(
                "voxel world size {world_size}"
            )));
        }
        let origin = world_min.as_vec3() - Vec3::splat(MARGIN_CELLS as f32 * cell_size);
        let dims = IVec3::new(
            Self::axis_cells(world_size.x, cell_size),
            Self::axis_cells(world_size.y, cell_size),
            Self::axis_cells(world_size.z, cell_size),
        );
        let group_dims = dims / CELL_GROUP;
        let cells = (dims.x * dims.y * dims.z) as usize;

        let mut counts = Vec::with_capacity(cells);
        counts.resize_with(cells, || AtomicU32::new(0));
        let mut entries = Vec::with_capacity(cells * CELL_CAPACITY);
        entries.resize_with(cells * CELL_CAPACITY, || AtomicU32::new(0));

        Ok(Self {
            origin,
            inv_cell_size: 1.0 / cell_size,
            dims,
            group_dims,
            counts,
            entries,
            dropped: AtomicU32::new(0),
        })
    }

    fn axis_cells(world_units: i32, cell_size: f32) -> i32 {
        let covering = (world_units as f32 / cell_size).ceil() as i32;
        let with_margin = covering + 2 * MARGIN_CELLS;
        let d = with_margin / CELL_GROUP;
        let r = with_margin % CELL_GROUP;
        let div_ceil = if (r > 0 && CELL_GROUP > 0) || (r < 0 && CELL_GROUP < 0) {
            d + 1
        } else {
            d
        };
        div_ceil * CELL_GROUP
    }

    #[inline]
    pub fn dims(&self) -> IVec3 {
        self.dims
    }

    #[inline]
    pub fn cell_count(&self) -> usize {
        self.counts.len()
    }

    /// Cell coordinate for a position, clamped to the grid so margin
    /// escapees still land in a boundary cell.
    #[inline]
    pub fn cell_coord(&self, p: Vec3) -> IVec3 {
        ((p - self.origin) * self.inv_cell_size)
            .floor()
            .as_ivec3()
            .clamp(IVec3::ZERO, self.dims - IVec3::ONE)
    }

    #[inline]
    pub fn in_bounds(&self, c: IVec3) -> bool {
        c.cmpge(IVec3::ZERO).all() && c.cmplt(self.dims).all()
    }

    /// Fold a cell coordinate through its 4x4x4 group so the cells a
    /// neighbor scan touches sit close together in memory.
    #[inline]
    pub fn fold_index(&self, c: IVec3) -> usize {
        let g = c / CELL_GROUP;
        let l = c - g * CELL_GROUP;
        let group = (g.z * self.group_dims.y + g.y) * self.group_dims.x + g.x;
        let local = (l.z * CELL_GROUP + l.y) * CELL_GROUP + l.x;
        group as usize * GROUP_VOLUME + local as usize
    }

    /// Reset every cell count. Runs on the caller's rayon pool.
    pub fn clear_parallel(&self) {
        self.counts.par_iter().for_each(|c| c.store(0, Ordering::Relaxed));
    }

    /// Append a particle to its cell. Lock-free; safe to call from any
    /// worker. Appends past CELL_CAPACITY are dropped and counted.
    #[inline]
    pub fn insert(&self, particle: u32, p: Vec3) {
        let cell = self.fold_index(self.cell_coord(p));
        let slot = self.counts[cell].fetch_add(1, Ordering::Relaxed) as usize;
        if slot < CELL_CAPACITY {
            self.entries[cell * CELL_CAPACITY + slot].store(particle, Ordering::Relaxed);
        } else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Visit every particle stored in a cell.
    #[inline]
    pub fn for_each_in_cell(&self, cell: usize, mut f: impl FnMut(u32)) {
        let len = (self.counts[cell].load(Ordering::Relaxed) as usize).min(CELL_CAPACITY);
        let base = cell * CELL_CAPACITY;
        for k in 0..len {
            f(self.entries[base + k].load(Ordering::Relaxed));
        }
    }

    /// Drain the overflow counter (reported per tick in `TickStats`).
    pub fn take_dropped(&self) -> u32 {
        self.dropped.swap(0, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn small_grid() -> SpatialGrid {
        SpatialGrid::new(IVec3::ZERO, IVec3::new(8, 8, 8), 1.0).expect("valid bounds")
    }

    #[test]
    fn dims_are_group_multiples() {
        let grid = small_grid();
        let d = grid.dims();
        assert_eq!(d.x % CELL_GROUP, 0);
        assert_eq!(d.y % CELL_GROUP, 0);
        assert_eq!(d.z % CELL_GROUP, 0);
        // 8 cells covering + 2 * 4 margin = 16, already a group multiple
        assert_eq!(d, IVec3::splat(16));
    }

    #[test]
    fn rejects_empty_bounds() {
        let result = SpatialGrid::new(IVec3::ZERO, IVec3::new(0, 4, 4), 1.0);
        assert!(matches!(result, Err(SimError::EmptyBounds(_))));
    }

    #[test]
    fn fold_index_is_a_bijection() {
        let grid = small_grid();
        let mut seen = vec![false; grid.cell_count()];
        for z in 0..grid.dims().z {
            for y in 0..grid.dims().y {
                for x in 0..grid.dims().x {
                    let idx = grid.fold_index(IVec3::new(x, y, z));
                    assert!(!seen[idx], "cell index {idx} mapped twice");
                    seen[idx] = true;
                }
            }
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn insert_then_visit_round_trips() {
        let grid = small_grid();
        let p = Vec3::new(3.5, 2.5, 1.5);
        grid.insert(7, p);
        grid.insert(9, p);
        let mut found = Vec::new();
        grid.for_each_in_cell(grid.fold_index(grid.cell_coord(p)), |i| found.push(i));
        assert_eq!(found, vec![7, 9]);
    }

    #[test]
    fn overflow_drops_and_counts() {
        let grid = small_grid();
        let p = Vec3::splat(4.0);
        for i in 0..(CELL_CAPACITY as u32 + 40) {
            grid.insert(i, p);
        }
        let mut stored = 0;
        grid.for_each_in_cell(grid.fold_index(grid.cell_coord(p)), |_| stored += 1);
        assert_eq!(stored, CELL_CAPACITY);
        assert_eq!(grid.take_dropped(), 40);
        assert_eq!(grid.take_dropped(), 0);
    }

    #[test]
    fn out_of_bounds_positions_clamp_to_boundary_cells() {
        let grid = small_grid();
        let far = Vec3::splat(1_000.0);
        assert!(grid.in_bounds(grid.cell_coord(far)));
        let near = Vec3::splat(-1_000.0);
        assert_eq!(grid.cell_coord(near), IVec3::ZERO);
    }

    proptest! {
        /// Rebuilding with unchanged positions yields identical cell
        /// assignments.
        #[test]
        fn rebuild_is_idempotent(
            points in proptest::collection::vec((0.0f32..8.0, 0.0f32..8.0, 0.0f32..8.0), 1..200)
        ) {
            let grid = small_grid();
            let build = |grid: &SpatialGrid| {
                grid.clear_parallel();
                for (i, &(x, y, z)) in points.iter().enumerate() {
                    grid.insert(i as u32, Vec3::new(x, y, z));
                }
                let mut snapshot = Vec::new();
                for cell in 0..grid.cell_count() {
                    let mut members = Vec::new();
                    grid.for_each_in_cell(cell, |i| members.push(i));
                    if !members.is_empty() {
                        snapshot.push((cell, members));
                    }
                }
                snapshot
            };
            let first = build(&grid);
            let second = build(&grid);
            prop_assert_eq!(first, second);
        }
    }
}

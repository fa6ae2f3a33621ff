//! Per-particle capped neighbor lists.
//!
//! Index and distance live in parallel flat arrays (stride
//! `NEIGHBOR_CAPACITY` per particle) so the density kernel can stream
//! distances contiguously. Lists are rebuilt from scratch every tick
//! and are only approximately symmetric: a full list can make "A lists
//! B" true without the converse, which downstream stages tolerate.

use std::sync::atomic::{AtomicU32, Ordering};

use glam::IVec3;

use crate::constants::capacity::NEIGHBOR_CAPACITY;
use crate::particles::Soa3;
use crate::spatial::SpatialGrid;

pub struct NeighborTable {
    pub counts: Vec<u32>,
    pub indices: Vec<u32>,
    pub dists: Vec<f32>,
    pub dropped: AtomicU32,
}

impl NeighborTable {
    pub fn new(particles: usize) -> Self {
        Self {
            counts: vec![0; particles],
            indices: vec![0; particles * NEIGHBOR_CAPACITY],
            dists: vec![0.0; particles * NEIGHBOR_CAPACITY],
            dropped: AtomicU32::new(0),
        }
    }

    /// The neighbor indices and matching distances recorded for a
    /// particle this tick.
    #[inline]
    pub fn neighbors(&self, i: usize) -> (&[u32], &[f32]) {
        let len = self.counts[i] as usize;
        let base = i * NEIGHBOR_CAPACITY;
        (&self.indices[base..base + len], &self.dists[base..base + len])
    }

    pub fn take_dropped(&self) -> u32 {
        self.dropped.swap(0, Ordering::Relaxed)
    }
}

/// Fill the lists for the particles in one worker slice. `counts`,
/// `indices` and `dists` are the chunks covering exactly
/// `start..start + counts.len()`.
#[allow(clippy::too_many_arguments)]
pub(crate) fn fill_slice(
    grid: &SpatialGrid,
    pos: &Soa3,
    start: usize,
    counts: &mut [u32],
    indices: &mut [u32],
    dists: &mut [f32],
    radius: f32,
    dropped: &AtomicU32,
) {
    let radius_sq = radius * radius;
    for li in 0..counts.len() {
        let i = start + li;
        let p = pos.get(i);
        let base = li * NEIGHBOR_CAPACITY;
        let mut len = 0usize;
        let mut dropped_here = 0u32;
        let home = grid.cell_coord(p);
        for dz in -1..=1 {
            for dy in -1..=1 {
                for dx in -1..=1 {
                    let c = home + IVec3::new(dx, dy, dz);
                    if !grid.in_bounds(c) {
                        continue;
                    }
                    grid.for_each_in_cell(grid.fold_index(c), |j| {
                        let j = j as usize;
                        if j == i {
                            return;
                        }
                        let dxp = pos.x[j] - p.x;
                        let dyp = pos.y[j] - p.y;
                        let dzp = pos.z[j] - p.z;
                        let d_sq = dxp * dxp + dyp * dyp + dzp * dzp;
                        if d_sq >= radius_sq {
                            return;
                        }
                        if len < NEIGHBOR_CAPACITY {
                            indices[base + len] = j as u32;
                            dists[base + len] = d_sq.sqrt();
                            len += 1;
                        } else {
                            dropped_here += 1;
                        }
                    });
                }
            }
        }
        counts[li] = len as u32;
        if dropped_here > 0 {
            dropped.fetch_add(dropped_here, Ordering::Relaxed);
        }
    }
}

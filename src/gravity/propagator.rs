//! Flood-fill gravity redirection.
//!
//! A request flips (or merely highlights) the whole connected body of
//! water around the particle nearest the request point. Traversal runs
//! over the current tick's neighbor graph with no depth limit: cost is
//! proportional to the component, not the query radius, which is the
//! point - a connected body flips together.

use glam::Vec3;

use crate::gravity::GravityChange;
use crate::particles::ParticleStore;
use crate::spatial::NeighborTable;

/// Apply one request. Returns true when directions actually changed
/// (the caller bumps its version counter on that). `visited` and
/// `stack` are engine-owned scratch reused across calls.
pub(crate) fn propagate(
    store: &mut ParticleStore,
    neighbors: &NeighborTable,
    change: &GravityChange,
    glow_duration: f32,
    visited: &mut [bool],
    stack: &mut Vec<u32>,
) -> bool {
    let Some(seed) = nearest_particle(store, change.point) else {
        // no particles at all: guarded no-op
        return false;
    };
    visited.fill(false);
    stack.clear();
    stack.push(seed as u32);
    visited[seed] = true;
    while let Some(i) = stack.pop() {
        let i = i as usize;
        store.glow[i] = glow_duration;
        if !change.highlight_only {
            store.pending_gravity[i] = change.direction;
        }
        let (indices, _) = neighbors.neighbors(i);
        for &j in indices {
            let j = j as usize;
            if !visited[j] {
                visited[j] = true;
                stack.push(j as u32);
            }
        }
    }
    !change.highlight_only
}

fn nearest_particle(store: &ParticleStore, point: Vec3) -> Option<usize> {
    let mut best_d_sq = f32::INFINITY;
    let mut best = None;
    for i in 0..store.len() {
        let d_sq = store.position(i).distance_squared(point);
        if d_sq < best_d_sq {
            best_d_sq = d_sq;
            best = Some(i);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gravity::GravityDir;
    use crate::spatial::{neighbors, SpatialGrid};
    use glam::IVec3;

    /// Two 2-particle clusters farther apart than the interaction
    /// radius, neighbor lists built for all of them.
    fn two_clusters() -> (ParticleStore, NeighborTable) {
        let radius = 1.25;
        let points = vec![
            Vec3::new(2.0, 2.0, 2.0),
            Vec3::new(2.5, 2.0, 2.0),
            Vec3::new(10.0, 2.0, 2.0),
            Vec3::new(10.5, 2.0, 2.0),
            // padding to satisfy alignment, far from everything
            Vec3::new(20.0, 2.0, 2.0),
            Vec3::new(24.0, 2.0, 2.0),
            Vec3::new(28.0, 2.0, 2.0),
            Vec3::new(32.0, 2.0, 2.0),
            Vec3::new(36.0, 2.0, 2.0),
            Vec3::new(40.0, 2.0, 2.0),
            Vec3::new(44.0, 2.0, 2.0),
            Vec3::new(48.0, 2.0, 2.0),
            Vec3::new(52.0, 2.0, 2.0),
            Vec3::new(56.0, 2.0, 2.0),
            Vec3::new(60.0, 2.0, 2.0),
            Vec3::new(64.0, 2.0, 2.0),
        ];
        let store = ParticleStore::new(&points, 0, 0.5).expect("aligned");
        let grid = SpatialGrid::new(IVec3::ZERO, IVec3::new(70, 6, 6), radius).expect("bounds");
        for i in 0..store.len() {
            grid.insert(i as u32, store.position(i));
        }
        let mut table = NeighborTable::new(store.len());
        {
            let NeighborTable { counts, indices, dists, dropped } = &mut table;
            neighbors::fill_slice(&grid, store.positions(), 0, counts, indices, dists, radius, dropped);
        }
        (store, table)
    }

    #[test]
    fn flips_only_the_connected_cluster() {
        let (mut store, table) = two_clusters();
        let mut visited = vec![false; store.len()];
        let mut stack = Vec::new();
        let change = GravityChange {
            point: Vec3::new(2.1, 2.0, 2.0),
            direction: GravityDir::PosX,
            highlight_only: false,
        };
        let bumped = propagate(&mut store, &table, &change, 1.5, &mut visited, &mut stack);
        assert!(bumped);
        assert_eq!(store.pending_gravity[0], GravityDir::PosX);
        assert_eq!(store.pending_gravity[1], GravityDir::PosX);
        // the disjoint cluster keeps its direction
        assert_eq!(store.pending_gravity[2], GravityDir::NegY);
        assert_eq!(store.pending_gravity[3], GravityDir::NegY);
        // glow only where the fill walked
        assert_eq!(store.glow[0], 1.5);
        assert_eq!(store.glow[2], 0.0);
    }

    #[test]
    fn highlight_only_touches_glow() {
        let (mut store, table) = two_clusters();
        let mut visited = vec![false; store.len()];
        let mut stack = Vec::new();
        let change = GravityChange {
            point: Vec3::new(10.2, 2.0, 2.0),
            direction: GravityDir::PosZ,
            highlight_only: true,
        };
        let bumped = propagate(&mut store, &table, &change, 2.0, &mut visited, &mut stack);
        assert!(!bumped);
        assert_eq!(store.pending_gravity[2], GravityDir::NegY);
        assert_eq!(store.glow[2], 2.0);
        assert_eq!(store.glow[3], 2.0);
        assert_eq!(store.glow[0], 0.0);
    }

    #[test]
    fn empty_store_is_a_noop() {
        let mut store = ParticleStore::new(&[], 0, 0.5).expect("aligned");
        let table = NeighborTable::new(0);
        let change = GravityChange {
            point: Vec3::ZERO,
            direction: GravityDir::PosY,
            highlight_only: false,
        };
        let bumped = propagate(&mut store, &table, &change, 1.0, &mut [], &mut Vec::new());
        assert!(!bumped);
    }
}

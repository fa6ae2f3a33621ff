//! Read-only spatial queries over the post-swap state.
//!
//! Gameplay calls these between ticks: buoyancy probes for floating
//! entities, and aim picking that feeds the gravity-change entry
//! point.

use glam::{IVec3, Vec3};

use crate::particles::ParticleId;

use super::engine::SimulationEngine;

/// Aggregate over an axis-aligned box.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct RegionQuery {
    pub intersecting_count: u32,
    pub summed_velocity: Vec3,
    /// Sum of each intersecting particle's up vector (opposite of its
    /// active gravity direction); feeds buoyancy on floating entities.
    pub summed_buoyancy_dir: Vec3,
}

/// Nearest particle along an aim ray.
#[derive(Debug, Clone, Copy)]
pub struct RayPick {
    pub particle: ParticleId,
    pub position: Vec3,
    /// Distance along the ray.
    pub t: f32,
}

impl SimulationEngine {
    /// Count and aggregate the particles inside `[min, max]`.
    ///
    /// Walks the grid cells overlapping the box, expanded by one cell
    /// because the grid was built from last tick's positions, then
    /// verifies each candidate against its live position.
    pub fn query_region(&self, min: Vec3, max: Vec3) -> RegionQuery {
        let mut result = RegionQuery::default();
        if self.store.is_empty() {
            return result;
        }
        let radius = self.config.interaction_radius;
        let lo = self.grid.cell_coord(min - Vec3::splat(radius));
        let hi = self.grid.cell_coord(max + Vec3::splat(radius));
        for z in lo.z..=hi.z {
            for y in lo.y..=hi.y {
                for x in lo.x..=hi.x {
                    let cell = self.grid.fold_index(IVec3::new(x, y, z));
                    self.grid.for_each_in_cell(cell, |i| {
                        let i = i as usize;
                        let p = self.store.position(i);
                        if p.cmpge(min).all() && p.cmple(max).all() {
                            result.intersecting_count += 1;
                            result.summed_velocity += self.store.velocity(i);
                            result.summed_buoyancy_dir +=
                                self.store.gravity[i].opposite().vector();
                        }
                    });
                }
            }
        }
        result
    }

    /// Smallest-t particle whose perpendicular distance to the ray is
    /// below `pick_radius`. `direction` need not be normalized.
    pub fn pick_along_ray(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_dist: f32,
        pick_radius: f32,
    ) -> Option<RayPick> {
        let dir = direction.normalize_or_zero();
        if dir == Vec3::ZERO {
            return None;
        }
        let pick_sq = pick_radius * pick_radius;
        let mut best: Option<RayPick> = None;
        for i in 0..self.store.len() {
            let p = self.store.position(i);
            let w = p - origin;
            let t = w.dot(dir);
            if t < 0.0 || t > max_dist {
                continue;
            }
            let perp_sq = w.length_squared() - t * t;
            if perp_sq > pick_sq {
                continue;
            }
            if best.map_or(true, |b| t < b.t) {
                best = Some(RayPick { particle: ParticleId(i as u32), position: p, t });
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::VoxelField;
    use crate::config::SimConfig;
    use crate::engine::TickInput;
    use crate::gravity::{GravityChange, GravityDir};

    /// Static scene: gravity off, spacing beyond the interaction
    /// radius. Three particles sit inside the [3, 7]^3 probe box, one
    /// just outside it, the rest parked far away. One tick populates
    /// the grid the region query walks.
    fn static_engine() -> SimulationEngine {
        let field = VoxelField::air(IVec3::ZERO, IVec3::splat(32)).expect("bounds");
        let mut points = vec![
            Vec3::new(4.0, 4.0, 4.0),
            Vec3::new(6.0, 4.0, 4.0),
            Vec3::new(4.0, 6.0, 4.0),
            Vec3::new(7.5, 4.0, 4.0),
        ];
        points.extend((4..16).map(|i| Vec3::new(2.0 * i as f32, 20.0, 20.0)));
        let config = SimConfig {
            gravity_accel: 0.0,
            worker_threads: Some(2),
            ..SimConfig::default()
        };
        let mut sim = SimulationEngine::new(field, &points, 0, config).expect("constructs");
        sim.tick(&TickInput::step(1.0 / 60.0));
        sim.swap_buffers();
        sim
    }

    #[test]
    fn region_query_counts_only_particles_inside_the_box() {
        let sim = static_engine();
        let q = sim.query_region(Vec3::splat(3.0), Vec3::splat(7.0));
        // the particle at x = 7.5 shares an overlapped cell but fails
        // the exact point-in-box check
        assert_eq!(q.intersecting_count, 3);
        assert_eq!(q.summed_velocity, Vec3::ZERO);
        // everything still points down NegY, so up sums to +3y
        assert_eq!(q.summed_buoyancy_dir, Vec3::new(0.0, 3.0, 0.0));
    }

    #[test]
    fn region_query_misses_an_empty_box() {
        let sim = static_engine();
        let q = sim.query_region(Vec3::splat(10.0), Vec3::splat(14.0));
        assert_eq!(q, RegionQuery::default());
    }

    #[test]
    fn region_query_reflects_redirected_gravity() {
        let mut sim = static_engine();
        // the seed particle is isolated, so only it flips
        sim.change_particle_gravity(&GravityChange {
            point: Vec3::new(4.0, 4.0, 4.0),
            direction: GravityDir::PosX,
            highlight_only: false,
        });
        sim.swap_buffers();
        let q = sim.query_region(Vec3::splat(3.0), Vec3::splat(5.0));
        assert_eq!(q.intersecting_count, 1);
        assert_eq!(q.summed_buoyancy_dir, Vec3::NEG_X);
    }

    #[test]
    fn ray_pick_selects_the_smallest_t_hit() {
        let sim = static_engine();
        // passes through the particles at x = 4 and x = 6; the one at
        // (4, 6, 4) is 2 units off axis, beyond the pick radius
        let pick = sim
            .pick_along_ray(Vec3::new(0.0, 4.0, 4.0), Vec3::new(2.0, 0.0, 0.0), 20.0, 1.0)
            .expect("hit");
        assert_eq!(pick.particle, ParticleId(0));
        assert!((pick.t - 4.0).abs() < 1e-5);
        assert_eq!(pick.position, Vec3::new(4.0, 4.0, 4.0));
    }

    #[test]
    fn ray_pick_ignores_particles_behind_the_origin() {
        let sim = static_engine();
        // looking back down -x from between the two on-axis particles:
        // x = 6 sits behind the origin and must not win on distance
        let pick = sim
            .pick_along_ray(Vec3::new(5.0, 4.0, 4.0), Vec3::NEG_X, 20.0, 1.0)
            .expect("hit");
        assert_eq!(pick.particle, ParticleId(0));
        assert!((pick.t - 1.0).abs() < 1e-5);
    }

    #[test]
    fn ray_pick_respects_range_and_degenerate_directions() {
        let sim = static_engine();
        let origin = Vec3::new(0.0, 4.0, 4.0);
        // nearest hit is at t = 4, out of a 2-unit range
        assert!(sim.pick_along_ray(origin, Vec3::X, 2.0, 1.0).is_none());
        assert!(sim.pick_along_ray(origin, Vec3::ZERO, 20.0, 1.0).is_none());
    }
}

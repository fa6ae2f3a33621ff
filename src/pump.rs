//! Water pumps: teleport-based transport between two points.
//!
//! Runs after the four pipeline stages, on the control thread. Each
//! pump captures its nearest eligible particles and releases them at
//! the destination with jitter and zeroed velocity; writes land in the
//! next bank so they become visible at swap like every other result
//! of the tick.

use glam::Vec3;

use crate::constants::capacity::MAX_PUMP_MOVES;
use crate::particles::ParticleStore;
use crate::rng::RandomSource;

#[derive(Debug, Clone, Copy)]
pub struct WaterPump {
    pub source: Vec3,
    pub destination: Vec3,
    pub particles_per_second: f32,
    /// Particles within this distance of the source are eligible.
    pub capture_radius: f32,
    /// Release scatter radius around the destination.
    pub release_jitter: f32,
}

impl WaterPump {
    /// Per-tick quota: at least one particle whenever any is eligible,
    /// capped by the fixed candidate array.
    fn quota(&self, dt: f32) -> usize {
        ((self.particles_per_second * dt).round() as usize).clamp(1, MAX_PUMP_MOVES)
    }
}

/// Returns how many particles moved this tick, for stats.
pub(crate) fn move_across_pumps(
    store: &mut ParticleStore,
    pumps: &[WaterPump],
    dt: f32,
    rng: &mut RandomSource,
) -> u32 {
    let mut moved = 0;
    for pump in pumps {
        let want = pump.quota(dt);
        let capture_sq = pump.capture_radius * pump.capture_radius;
        // insertion-sorted fixed array of the nearest candidates
        let mut best = [(f32::INFINITY, u32::MAX); MAX_PUMP_MOVES];
        for i in 0..store.len() {
            let d_sq = store.position(i).distance_squared(pump.source);
            if d_sq >= capture_sq || d_sq >= best[want - 1].0 {
                continue;
            }
            let mut slot = want - 1;
            while slot > 0 && best[slot - 1].0 > d_sq {
                best[slot] = best[slot - 1];
                slot -= 1;
            }
            best[slot] = (d_sq, i as u32);
        }
        for &(d_sq, index) in best.iter().take(want) {
            if !d_sq.is_finite() {
                break;
            }
            let target = pump.destination + rng.jitter_in_sphere(pump.release_jitter);
            store.set_next_position(index as usize, target);
            store.set_next_velocity(index as usize, Vec3::ZERO);
            moved += 1;
        }
    }
    moved
}

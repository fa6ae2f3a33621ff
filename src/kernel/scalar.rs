//! Baseline stage implementations. Also the fallback for neighbor
//! blocks the SIMD paths cannot handle (degenerate pairs) and for
//! remainder lanes.

use std::ops::Range;

use glam::Vec3;

use crate::constants::capacity::NEIGHBOR_CAPACITY;
use crate::constants::step::{CORE_RADIUS, DISTANCE_EPSILON};
use crate::rng::RandomSource;

use super::{AccelJob, DensityJob};

pub(super) fn density_range(
    job: &DensityJob<'_>,
    range: Range<usize>,
    density: &mut [f32],
    near: &mut [f32],
) {
    for i in range.clone() {
        let li = i - range.start;
        let len = job.nbr_counts[i] as usize;
        let base = i * NEIGHBOR_CAPACITY;
        let (mut sum3, mut sum4) = (0.0f32, 0.0f32);
        for k in 0..len {
            // entries only exist below the interaction radius, so q > 0
            let q = 1.0 - job.nbr_dists[base + k] * job.inv_radius;
            let q2 = q * q;
            sum3 += q2 * q;
            sum4 += q2 * q2;
        }
        density[li] = 1.0 + sum3;
        near[li] = 1.0 + sum4;
    }
}

/// Shared per-particle setup for both code paths.
#[inline]
pub(super) fn particle_pressures(job: &AccelJob<'_>, i: usize) -> (f32, f32) {
    let p = &job.params;
    (
        p.stiffness * (job.density[i] - p.ambient_density),
        p.near_stiffness * job.near_density[i],
    )
}

/// Gravity seed: ambient-relative weight times the particle's own down
/// vector.
#[inline]
pub(super) fn gravity_seed(job: &AccelJob<'_>, i: usize) -> Vec3 {
    let p = &job.params;
    let rho = job.density[i];
    job.gravity[i].vector() * (p.gravity_accel * (rho - p.ambient_density) / rho)
}

/// One neighbor's contribution to a particle's acceleration.
#[inline]
pub(super) fn pair_accel(
    job: &AccelJob<'_>,
    pi: Vec3,
    press_i: f32,
    near_i: f32,
    base: usize,
    k: usize,
    rng: &mut RandomSource,
) -> Vec3 {
    let p = &job.params;
    let j = job.nbr_indices[base + k] as usize;
    let dist = job.nbr_dists[base + k];
    let q = 1.0 - dist * p.inv_radius;
    let q2 = q * q;
    let press_j = p.stiffness * (job.density[j] - p.ambient_density);
    let near_j = p.near_stiffness * job.near_density[j];
    let coeff = (press_i + press_j) * q2 + (near_i + near_j) * q2 * q;
    let axis = if dist < CORE_RADIUS {
        // coincident pair: no usable separation direction, pick one
        rng.separation_axis()
    } else {
        let pj = Vec3::new(job.pos_x[j], job.pos_y[j], job.pos_z[j]);
        (pi - pj) / (dist + DISTANCE_EPSILON)
    };
    axis * coeff
}

pub(super) fn accelerate_range(
    job: &AccelJob<'_>,
    range: Range<usize>,
    vel_x: &mut [f32],
    vel_y: &mut [f32],
    vel_z: &mut [f32],
    rng: &mut RandomSource,
) {
    let dt = job.params.dt;
    for i in range.clone() {
        let li = i - range.start;
        let pi = Vec3::new(job.pos_x[i], job.pos_y[i], job.pos_z[i]);
        let (press_i, near_i) = particle_pressures(job, i);
        let mut acc = gravity_seed(job, i);
        let len = job.nbr_counts[i] as usize;
        let base = i * NEIGHBOR_CAPACITY;
        for k in 0..len {
            acc += pair_accel(job, pi, press_i, near_i, base, k, rng);
        }
        vel_x[li] += acc.x * dt;
        vel_y[li] += acc.y * dt;
        vel_z[li] += acc.z * dt;
    }
}

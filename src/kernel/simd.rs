//! AVX2 stage variants.
//!
//! Neighbor distances stream contiguously from the neighbor table;
//! neighbor positions and densities are index gathers. Blocks that
//! contain a degenerate (near-coincident) pair fall back to the scalar
//! path so the deterministic RNG perturbation stays identical to the
//! baseline's.
//!
//! Callers guarantee the matching CPU features are present: the
//! backend is only selected after `is_x86_feature_detected!`.

use std::arch::x86_64::*;
use std::ops::Range;

use glam::Vec3;

use crate::constants::capacity::NEIGHBOR_CAPACITY;
use crate::constants::step::{CORE_RADIUS, DISTANCE_EPSILON};
use crate::rng::RandomSource;

use super::{scalar, AccelJob, DensityJob};

const LANES: usize = 8;

#[target_feature(enable = "avx2")]
#[inline]
unsafe fn hsum(v: __m256) -> f32 {
    let hi = _mm256_extractf128_ps::<1>(v);
    let lo = _mm256_castps256_ps128(v);
    let s = _mm_add_ps(lo, hi);
    let s = _mm_add_ps(s, _mm_movehl_ps(s, s));
    let s = _mm_add_ss(s, _mm_shuffle_ps::<1>(s, s));
    _mm_cvtss_f32(s)
}

#[target_feature(enable = "avx2")]
pub(super) unsafe fn density_range_w8(
    job: &DensityJob<'_>,
    range: Range<usize>,
    density: &mut [f32],
    near: &mut [f32],
) {
    let one = _mm256_set1_ps(1.0);
    let inv_r = _mm256_set1_ps(job.inv_radius);
    for i in range.clone() {
        let li = i - range.start;
        let len = job.nbr_counts[i] as usize;
        let base = i * NEIGHBOR_CAPACITY;
        let mut acc3 = _mm256_setzero_ps();
        let mut acc4 = _mm256_setzero_ps();
        let mut k = 0;
        while k + LANES <= len {
            let d = _mm256_loadu_ps(job.nbr_dists.as_ptr().add(base + k));
            let q = _mm256_sub_ps(one, _mm256_mul_ps(d, inv_r));
            let q2 = _mm256_mul_ps(q, q);
            acc3 = _mm256_add_ps(acc3, _mm256_mul_ps(q2, q));
            acc4 = _mm256_add_ps(acc4, _mm256_mul_ps(q2, q2));
            k += LANES;
        }
        let mut sum3 = hsum(acc3);
        let mut sum4 = hsum(acc4);
        while k < len {
            let q = 1.0 - job.nbr_dists[base + k] * job.inv_radius;
            let q2 = q * q;
            sum3 += q2 * q;
            sum4 += q2 * q2;
            k += 1;
        }
        density[li] = 1.0 + sum3;
        near[li] = 1.0 + sum4;
    }
}

#[target_feature(enable = "avx2,fma")]
pub(super) unsafe fn density_range_w16(
    job: &DensityJob<'_>,
    range: Range<usize>,
    density: &mut [f32],
    near: &mut [f32],
) {
    let one = _mm256_set1_ps(1.0);
    let inv_r = _mm256_set1_ps(job.inv_radius);
    for i in range.clone() {
        let li = i - range.start;
        let len = job.nbr_counts[i] as usize;
        let base = i * NEIGHBOR_CAPACITY;
        // two accumulator pairs so the fused chains stay independent
        let mut acc3_a = _mm256_setzero_ps();
        let mut acc4_a = _mm256_setzero_ps();
        let mut acc3_b = _mm256_setzero_ps();
        let mut acc4_b = _mm256_setzero_ps();
        let mut k = 0;
        while k + 2 * LANES <= len {
            let da = _mm256_loadu_ps(job.nbr_dists.as_ptr().add(base + k));
            let db = _mm256_loadu_ps(job.nbr_dists.as_ptr().add(base + k + LANES));
            let qa = _mm256_sub_ps(one, _mm256_mul_ps(da, inv_r));
            let qb = _mm256_sub_ps(one, _mm256_mul_ps(db, inv_r));
            let qa2 = _mm256_mul_ps(qa, qa);
            let qb2 = _mm256_mul_ps(qb, qb);
            acc3_a = _mm256_fmadd_ps(qa2, qa, acc3_a);
            acc4_a = _mm256_fmadd_ps(qa2, qa2, acc4_a);
            acc3_b = _mm256_fmadd_ps(qb2, qb, acc3_b);
            acc4_b = _mm256_fmadd_ps(qb2, qb2, acc4_b);
            k += 2 * LANES;
        }
        let mut sum3 = hsum(_mm256_add_ps(acc3_a, acc3_b));
        let mut sum4 = hsum(_mm256_add_ps(acc4_a, acc4_b));
        while k < len {
            let q = 1.0 - job.nbr_dists[base + k] * job.inv_radius;
            let q2 = q * q;
            sum3 += q2 * q;
            sum4 += q2 * q2;
            k += 1;
        }
        density[li] = 1.0 + sum3;
        near[li] = 1.0 + sum4;
    }
}

/// One 8-lane block of pair-pressure accumulation. Returns `None` when
/// the block holds a degenerate pair and must be redone by the scalar
/// path.
#[target_feature(enable = "avx2")]
#[inline]
#[allow(clippy::too_many_arguments)]
unsafe fn accel_block(
    job: &AccelJob<'_>,
    base: usize,
    k: usize,
    pix: __m256,
    piy: __m256,
    piz: __m256,
    press_i: __m256,
    near_i: __m256,
) -> Option<(__m256, __m256, __m256)> {
    let p = &job.params;
    let d = _mm256_loadu_ps(job.nbr_dists.as_ptr().add(base + k));
    let core = _mm256_set1_ps(CORE_RADIUS);
    if _mm256_movemask_ps(_mm256_cmp_ps::<_CMP_LT_OQ>(d, core)) != 0 {
        return None;
    }
    let idx = _mm256_loadu_si256(job.nbr_indices.as_ptr().add(base + k) as *const __m256i);
    let xj = _mm256_i32gather_ps::<4>(job.pos_x.as_ptr(), idx);
    let yj = _mm256_i32gather_ps::<4>(job.pos_y.as_ptr(), idx);
    let zj = _mm256_i32gather_ps::<4>(job.pos_z.as_ptr(), idx);
    let rho_j = _mm256_i32gather_ps::<4>(job.density.as_ptr(), idx);
    let near_rho_j = _mm256_i32gather_ps::<4>(job.near_density.as_ptr(), idx);

    let one = _mm256_set1_ps(1.0);
    let q = _mm256_sub_ps(one, _mm256_mul_ps(d, _mm256_set1_ps(p.inv_radius)));
    let q2 = _mm256_mul_ps(q, q);
    let press_j = _mm256_mul_ps(
        _mm256_set1_ps(p.stiffness),
        _mm256_sub_ps(rho_j, _mm256_set1_ps(p.ambient_density)),
    );
    let near_j = _mm256_mul_ps(_mm256_set1_ps(p.near_stiffness), near_rho_j);
    let coeff = _mm256_add_ps(
        _mm256_mul_ps(_mm256_add_ps(press_i, press_j), q2),
        _mm256_mul_ps(_mm256_add_ps(near_i, near_j), _mm256_mul_ps(q2, q)),
    );
    let scale = _mm256_div_ps(coeff, _mm256_add_ps(d, _mm256_set1_ps(DISTANCE_EPSILON)));
    Some((
        _mm256_mul_ps(_mm256_sub_ps(pix, xj), scale),
        _mm256_mul_ps(_mm256_sub_ps(piy, yj), scale),
        _mm256_mul_ps(_mm256_sub_ps(piz, zj), scale),
    ))
}

#[target_feature(enable = "avx2")]
pub(super) unsafe fn accelerate_range_w8(
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
        let (press_i, near_i) = scalar::particle_pressures(job, i);
        let pix = _mm256_set1_ps(pi.x);
        let piy = _mm256_set1_ps(pi.y);
        let piz = _mm256_set1_ps(pi.z);
        let press_i_v = _mm256_set1_ps(press_i);
        let near_i_v = _mm256_set1_ps(near_i);

        let len = job.nbr_counts[i] as usize;
        let base = i * NEIGHBOR_CAPACITY;
        let mut ax = _mm256_setzero_ps();
        let mut ay = _mm256_setzero_ps();
        let mut az = _mm256_setzero_ps();
        let mut extra = Vec3::ZERO;
        let mut k = 0;
        while k + LANES <= len {
            match accel_block(job, base, k, pix, piy, piz, press_i_v, near_i_v) {
                Some((bx, by, bz)) => {
                    ax = _mm256_add_ps(ax, bx);
                    ay = _mm256_add_ps(ay, by);
                    az = _mm256_add_ps(az, bz);
                }
                None => {
                    for t in k..k + LANES {
                        extra += scalar::pair_accel(job, pi, press_i, near_i, base, t, rng);
                    }
                }
            }
            k += LANES;
        }
        let mut acc = scalar::gravity_seed(job, i)
            + Vec3::new(hsum(ax), hsum(ay), hsum(az))
            + extra;
        while k < len {
            acc += scalar::pair_accel(job, pi, press_i, near_i, base, k, rng);
            k += 1;
        }
        vel_x[li] += acc.x * dt;
        vel_y[li] += acc.y * dt;
        vel_z[li] += acc.z * dt;
    }
}

#[target_feature(enable = "avx2,fma")]
pub(super) unsafe fn accelerate_range_w16(
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
        let (press_i, near_i) = scalar::particle_pressures(job, i);
        let pix = _mm256_set1_ps(pi.x);
        let piy = _mm256_set1_ps(pi.y);
        let piz = _mm256_set1_ps(pi.z);
        let press_i_v = _mm256_set1_ps(press_i);
        let near_i_v = _mm256_set1_ps(near_i);

        let len = job.nbr_counts[i] as usize;
        let base = i * NEIGHBOR_CAPACITY;
        let mut ax = _mm256_setzero_ps();
        let mut ay = _mm256_setzero_ps();
        let mut az = _mm256_setzero_ps();
        let mut extra = Vec3::ZERO;
        let mut k = 0;
        // 16 lanes per iteration as two independent 8-lane blocks
        while k + 2 * LANES <= len {
            for half in [k, k + LANES] {
                match accel_block(job, base, half, pix, piy, piz, press_i_v, near_i_v) {
                    Some((bx, by, bz)) => {
                        ax = _mm256_add_ps(ax, bx);
                        ay = _mm256_add_ps(ay, by);
                        az = _mm256_add_ps(az, bz);
                    }
                    None => {
                        for t in half..half + LANES {
                            extra += scalar::pair_accel(job, pi, press_i, near_i, base, t, rng);
                        }
                    }
                }
            }
            k += 2 * LANES;
        }
        while k + LANES <= len {
            match accel_block(job, base, k, pix, piy, piz, press_i_v, near_i_v) {
                Some((bx, by, bz)) => {
                    ax = _mm256_add_ps(ax, bx);
                    ay = _mm256_add_ps(ay, by);
                    az = _mm256_add_ps(az, bz);
                }
                None => {
                    for t in k..k + LANES {
                        extra += scalar::pair_accel(job, pi, press_i, near_i, base, t, rng);
                    }
                }
            }
            k += LANES;
        }
        let mut acc = scalar::gravity_seed(job, i)
            + Vec3::new(hsum(ax), hsum(ay), hsum(az))
            + extra;
        while k < len {
            acc += scalar::pair_accel(job, pi, press_i, near_i, base, k, rng);
            k += 1;
        }
        vel_x[li] += acc.x * dt;
        vel_y[li] += acc.y * dt;
        vel_z[li] += acc.z * dt;
    }
}

//! Numerically hot stage kernels.
//!
//! The density and acceleration stages dominate the tick, so they come
//! in scalar and vectorized variants. The backend is probed once at
//! engine construction and dispatched per worker slice, never inside
//! the inner loop.

mod scalar;
#[cfg(target_arch = "x86_64")]
mod simd;

use std::ops::Range;

use crate::gravity::GravityDir;
use crate::rng::RandomSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Scalar,
    /// 8 neighbor lanes per iteration (AVX2).
    Wide8,
    /// 16 neighbor lanes per iteration, two fused-multiply-add blocks
    /// (AVX2 + FMA).
    Wide16,
}

/// Inputs for the density stage. Neighbor arrays are the full flat
/// tables; per-particle stride is `NEIGHBOR_CAPACITY`.
pub struct DensityJob<'a> {
    pub nbr_counts: &'a [u32],
    pub nbr_dists: &'a [f32],
    pub inv_radius: f32,
}

/// Scale-free parameters of the acceleration stage, captured once per
/// tick.
#[derive(Debug, Clone, Copy)]
pub struct AccelParams {
    pub inv_radius: f32,
    pub stiffness: f32,
    pub near_stiffness: f32,
    pub ambient_density: f32,
    pub gravity_accel: f32,
    pub dt: f32,
}

/// Inputs for the acceleration stage. Positions and densities are read
/// for arbitrary neighbor indices; velocity chunks are written only
/// for the worker's own slice.
pub struct AccelJob<'a> {
    pub pos_x: &'a [f32],
    pub pos_y: &'a [f32],
    pub pos_z: &'a [f32],
    pub density: &'a [f32],
    pub near_density: &'a [f32],
    pub gravity: &'a [GravityDir],
    pub nbr_counts: &'a [u32],
    pub nbr_indices: &'a [u32],
    pub nbr_dists: &'a [f32],
    pub params: AccelParams,
}

pub struct Kernels {
    backend: Backend,
}

impl Kernels {
    /// Probe hardware capability once at startup.
    pub fn detect() -> Self {
        let kernels = Self { backend: Self::probe() };
        log::info!("fluid kernels: {:?} backend selected", kernels.backend);
        kernels
    }

    /// Force a specific backend (tests and benchmarks).
    pub fn with_backend(backend: Backend) -> Self {
        Self { backend }
    }

    #[cfg(target_arch = "x86_64")]
    fn probe() -> Backend {
        if is_x86_feature_detected!("avx2") && is_x86_feature_detected!("fma") {
            Backend::Wide16
        } else if is_x86_feature_detected!("avx2") {
            Backend::Wide8
        } else {
            Backend::Scalar
        }
    }

    #[cfg(not(target_arch = "x86_64"))]
    fn probe() -> Backend {
        Backend::Scalar
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Density stage over `range`; `density` and `near` are the output
    /// chunks covering exactly that range.
    pub fn density_range(
        &self,
        job: &DensityJob<'_>,
        range: Range<usize>,
        density: &mut [f32],
        near: &mut [f32],
    ) {
        match self.backend {
            Backend::Scalar => scalar::density_range(job, range, density, near),
            #[cfg(target_arch = "x86_64")]
            Backend::Wide8 => unsafe { simd::density_range_w8(job, range, density, near) },
            #[cfg(target_arch = "x86_64")]
            Backend::Wide16 => unsafe { simd::density_range_w16(job, range, density, near) },
            #[cfg(not(target_arch = "x86_64"))]
            _ => scalar::density_range(job, range, density, near),
        }
    }

    /// Acceleration stage over `range`, integrating into the velocity
    /// chunks for that range.
    #[allow(clippy::too_many_arguments)]
    pub fn accelerate_range(
        &self,
        job: &AccelJob<'_>,
        range: Range<usize>,
        vel_x: &mut [f32],
        vel_y: &mut [f32],
        vel_z: &mut [f32],
        rng: &mut RandomSource,
    ) {
        match self.backend {
            Backend::Scalar => scalar::accelerate_range(job, range, vel_x, vel_y, vel_z, rng),
            #[cfg(target_arch = "x86_64")]
            Backend::Wide8 => unsafe {
                simd::accelerate_range_w8(job, range, vel_x, vel_y, vel_z, rng)
            },
            #[cfg(target_arch = "x86_64")]
            Backend::Wide16 => unsafe {
                simd::accelerate_range_w16(job, range, vel_x, vel_y, vel_z, rng)
            },
            #[cfg(not(target_arch = "x86_64"))]
            _ => scalar::accelerate_range(job, range, vel_x, vel_y, vel_z, rng),
        }
    }
}

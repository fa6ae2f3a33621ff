//! Simulation orchestration: the four-stage tick pipeline.
//!
//! Stage order per tick, with a full barrier between stages:
//!   1. DetectClose   - rebuild the grid, refill neighbor lists
//!   2. ComputeDensity - kernel density pass
//!   3. ComputeAcceleration - kernel pressure pass, integrates velocity
//!   4. DiffuseAndMove - viscosity, damping, displacement clamp,
//!      collision correction, next-bank write
//! followed by the optional gravity-change request and the pump pass.
//!
//! Buffers are NOT swapped by the tick: `swap_buffers` is a distinct
//! caller step, which also commits pending gravity directions when the
//! internal version counter advanced.

use std::time::Instant;

use glam::Vec3;
use rayon::prelude::*;

use crate::collision::{self, VoxelField, WaterBlocker};
use crate::config::SimConfig;
use crate::constants::capacity::NEIGHBOR_CAPACITY;
use crate::constants::step::{DISTANCE_EPSILON, MAX_DT};
use crate::error::SimResult;
use crate::gravity::{propagator, GravityChange};
use crate::kernel::{AccelJob, AccelParams, DensityJob, Kernels};
use crate::particles::{ParticleStore, ParticleVertex};
use crate::pump::{self, WaterPump};
use crate::rng::RandomSource;
use crate::spatial::{neighbors, NeighborTable, SpatialGrid};

use super::stats::TickStats;
use super::worker::StagePool;

/// Plain per-tick input; the engine owns none of it.
pub struct TickInput<'a> {
    pub dt: f32,
    /// Current game time, seconds. Carried for gameplay-side phasing;
    /// the core itself is time-origin agnostic.
    pub time: f64,
    pub gravity_change: Option<GravityChange>,
    pub blockers: &'a [WaterBlocker],
    pub pumps: &'a [WaterPump],
}

impl<'a> TickInput<'a> {
    pub fn step(dt: f32) -> Self {
        Self { dt, time: 0.0, gravity_change: None, blockers: &[], pumps: &[] }
    }
}

pub struct SimulationEngine {
    pub(super) config: SimConfig,
    pub(super) store: ParticleStore,
    pub(super) grid: SpatialGrid,
    pub(super) neighbors: NeighborTable,
    pub(super) field: VoxelField,
    kernels: Kernels,
    pool: StagePool,
    worker_rngs: Vec<RandomSource>,
    control_rng: RandomSource,
    // propagation scratch, reused across requests
    visited: Vec<bool>,
    visit_stack: Vec<u32>,
    // internal gravity epoch vs. the one already committed at swap
    gravity_version: u64,
    committed_version: u64,
    gravity_bytes: Vec<u8>,
    gravity_bytes_version: u64,
    stats: TickStats,
}

impl SimulationEngine {
    /// Build a simulator over a voxel field snapshot. `initial` must be
    /// alignment-rounded by the caller; `extra` reserves teleport slack
    /// and is rounded up internally.
    pub fn new(
        field: VoxelField,
        initial: &[Vec3],
        extra: usize,
        config: SimConfig,
    ) -> SimResult<Self> {
        config.validate()?;
        let store = ParticleStore::new(initial, extra, config.particle_radius)?;
        let grid = SpatialGrid::new(field.min(), field.size(), config.interaction_radius)?;
        let neighbors = NeighborTable::new(store.len());
        let pool = StagePool::new(store.len(), config.worker_threads)?;
        let worker_rngs = (0..pool.slice_count())
            .map(|w| RandomSource::new(config.seed ^ (w as u64 + 1)))
            .collect();
        let kernels = Kernels::detect();
        let gravity_bytes = store.gravity[..store.len()]
            .iter()
            .map(|&d| d as u8)
            .collect();
        log::info!(
            "fluid sim: {} particles ({} slots), grid {} cells",
            store.len(),
            store.capacity(),
            grid.cell_count(),
        );
        Ok(Self {
            visited: vec![false; store.len()],
            visit_stack: Vec::new(),
            control_rng: RandomSource::new(config.seed),
            worker_rngs,
            config,
            store,
            grid,
            neighbors,
            field,
            kernels,
            pool,
            gravity_version: 0,
            committed_version: 0,
            gravity_bytes,
            gravity_bytes_version: 0,
            stats: TickStats::default(),
        })
    }

    /// Advance one tick. Never fails: every internal condition resolves
    /// by clamping, truncation or skip.
    pub fn tick(&mut self, input: &TickInput<'_>) {
        self.stats.reset();
        let dt = input.dt.clamp(0.0, MAX_DT);

        self.stage_detect_close();
        self.stage_density();
        self.stage_acceleration(dt);
        self.stage_diffuse_move(dt, input.blockers);

        if let Some(change) = input.gravity_change {
            self.change_particle_gravity(&change);
        }
        self.stats.pump_moves =
            pump::move_across_pumps(&mut self.store, input.pumps, dt, &mut self.control_rng);

        self.stats.cell_drops = self.grid.take_dropped();
        self.stats.neighbor_drops = self.neighbors.take_dropped();
    }

    /// Flip current/next banks and, when a gravity request landed since
    /// the last swap, commit pending directions and republish the
    /// external gravity buffer.
    pub fn swap_buffers(&mut self) {
        self.store.swap_buffers();
        if self.gravity_version != self.committed_version {
            let n = self.store.len();
            self.store.gravity[..n].copy_from_slice(&self.store.pending_gravity[..n]);
            for i in 0..n {
                self.gravity_bytes[i] = self.store.gravity[i] as u8;
            }
            self.gravity_bytes_version = self.gravity_bytes_version.wrapping_add(1);
            self.committed_version = self.gravity_version;
        }
    }

    /// Redirect (or highlight) the connected body of water nearest a
    /// point. Exposed for gameplay that resolves its own aim; `tick`
    /// calls it for the per-tick request.
    pub fn change_particle_gravity(&mut self, change: &GravityChange) {
        let changed = propagator::propagate(
            &mut self.store,
            &self.neighbors,
            change,
            self.config.glow_duration,
            &mut self.visited,
            &mut self.visit_stack,
        );
        if changed {
            self.gravity_version = self.gravity_version.wrapping_add(1);
        }
    }

    /// Flat `(x, y, z, glow)` buffer of the current bank.
    pub fn copy_to_output(&self, out: &mut Vec<ParticleVertex>) {
        self.store.copy_to_output(out);
    }

    /// Per-particle gravity byte buffer plus its version; consumers
    /// re-upload only when the version moved.
    pub fn gravity_buffer(&self) -> (&[u8], u64) {
        (&self.gravity_bytes, self.gravity_bytes_version)
    }

    pub fn particles(&self) -> &ParticleStore {
        &self.store
    }

    pub fn stats(&self) -> &TickStats {
        &self.stats
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    fn stage_detect_close(&mut self) {
        let start = Instant::now();
        let n = self.store.len();
        let slice = self.pool.slice_len();
        let grid = &self.grid;
        let pos = self.store.positions();
        let radius = self.config.interaction_radius;

        self.pool.run(|| {
            grid.clear_parallel();
            pos.x[..n]
                .par_chunks(slice)
                .enumerate()
                .for_each(|(w, xs)| {
                    let base = w * slice;
                    for (k, &x) in xs.iter().enumerate() {
                        let i = base + k;
                        grid.insert(i as u32, Vec3::new(x, pos.y[i], pos.z[i]));
                    }
                });
        });

        let NeighborTable { counts, indices, dists, dropped } = &mut self.neighbors;
        let dropped = &*dropped;
        self.pool.run(|| {
            counts[..n]
                .par_chunks_mut(slice)
                .zip(indices[..n * NEIGHBOR_CAPACITY].par_chunks_mut(slice * NEIGHBOR_CAPACITY))
                .zip(dists[..n * NEIGHBOR_CAPACITY].par_chunks_mut(slice * NEIGHBOR_CAPACITY))
                .enumerate()
                .for_each(|(w, ((counts, indices), dists))| {
                    neighbors::fill_slice(
                        grid,
                        pos,
                        w * slice,
                        counts,
                        indices,
                        dists,
                        radius,
                        dropped,
                    );
                });
        });
        self.stats.detect_close_us = start.elapsed().as_micros() as u64;
    }

    fn stage_density(&mut self) {
        let start = Instant::now();
        let n = self.store.len();
        let slice = self.pool.slice_len();
        let kernels = &self.kernels;
        let job = DensityJob {
            nbr_counts: &self.neighbors.counts,
            nbr_dists: &self.neighbors.dists,
            inv_radius: 1.0 / self.config.interaction_radius,
        };
        let (density, near) = self.store.density_views();
        self.pool.run(|| {
            density[..n]
                .par_chunks_mut(slice)
                .zip(near[..n].par_chunks_mut(slice))
                .enumerate()
                .for_each(|(w, (density, near))| {
                    let base = w * slice;
                    kernels.density_range(&job, base..base + density.len(), density, near);
                });
        });
        self.stats.density_us = start.elapsed().as_micros() as u64;
    }

    fn stage_acceleration(&mut self, dt: f32) {
        let start = Instant::now();
        let n = self.store.len();
        let slice = self.pool.slice_len();
        let kernels = &self.kernels;
        let params = AccelParams {
            inv_radius: 1.0 / self.config.interaction_radius,
            stiffness: self.config.stiffness,
            near_stiffness: self.config.near_stiffness,
            ambient_density: self.config.ambient_density,
            gravity_accel: self.config.gravity_accel,
            dt,
        };
        let views = self.store.accel_views();
        let job = AccelJob {
            pos_x: &views.pos.x,
            pos_y: &views.pos.y,
            pos_z: &views.pos.z,
            density: views.density,
            near_density: views.near_density,
            gravity: views.gravity,
            nbr_counts: &self.neighbors.counts,
            nbr_indices: &self.neighbors.indices,
            nbr_dists: &self.neighbors.dists,
            params,
        };
        let vel = views.vel;
        let rngs = &mut self.worker_rngs;
        self.pool.run(|| {
            vel.x[..n]
                .par_chunks_mut(slice)
                .zip(vel.y[..n].par_chunks_mut(slice))
                .zip(vel.z[..n].par_chunks_mut(slice))
                .zip(rngs.par_iter_mut())
                .enumerate()
                .for_each(|(w, (((vx, vy), vz), rng))| {
                    let base = w * slice;
                    kernels.accelerate_range(&job, base..base + vx.len(), vx, vy, vz, rng);
                });
        });
        self.stats.acceleration_us = start.elapsed().as_micros() as u64;
    }

    fn stage_diffuse_move(&mut self, dt: f32, blockers: &[WaterBlocker]) {
        let start = Instant::now();
        let n = self.store.len();
        let slice = self.pool.slice_len();
        let config = &self.config;
        let field = &self.field;
        let table = &self.neighbors;
        let inv_radius = 1.0 / config.interaction_radius;
        let damping = (1.0 - config.damping * dt).max(0.0);

        let views = self.store.move_views();
        let pos_cur = views.pos_cur;
        let vel_cur = views.vel_cur;
        let radius = views.radius;
        let gravity = views.gravity;
        let glow = views.glow;
        let pos_next = views.pos_next;
        let vel_next = views.vel_next;

        self.pool.run(|| {
            pos_next.x[..n]
                .par_chunks_mut(slice)
                .zip(pos_next.y[..n].par_chunks_mut(slice))
                .zip(pos_next.z[..n].par_chunks_mut(slice))
                .zip(vel_next.x[..n].par_chunks_mut(slice))
                .zip(vel_next.y[..n].par_chunks_mut(slice))
                .zip(vel_next.z[..n].par_chunks_mut(slice))
                .zip(glow[..n].par_chunks_mut(slice))
                .enumerate()
                .for_each(|(w, ((((((nx, ny), nz), nvx), nvy), nvz), glow))| {
                    let base = w * slice;
                    for li in 0..nx.len() {
                        let i = base + li;
                        let p = pos_cur.get(i);
                        let mut v = vel_cur.get(i);

                        // nudge toward the neighbor-weighted average
                        // velocity along each separation axis
                        let (nbr_idx, nbr_dist) = table.neighbors(i);
                        for (&j, &d) in nbr_idx.iter().zip(nbr_dist) {
                            let j = j as usize;
                            let q = 1.0 - d * inv_radius;
                            let axis = (pos_cur.get(j) - p) / (d + DISTANCE_EPSILON);
                            let closing = (vel_cur.get(j) - v).dot(axis);
                            v += axis * (config.viscosity_gain * q * closing * dt);
                        }

                        v *= damping;
                        let step = v.length() * dt;
                        if step > config.max_displacement {
                            v *= config.max_displacement / step;
                        }

                        let (p, v) = collision::resolve(
                            field,
                            blockers,
                            gravity[i],
                            p + v * dt,
                            v,
                            radius[i],
                            config.restitution,
                        );
                        nx[li] = p.x;
                        ny[li] = p.y;
                        nz[li] = p.z;
                        nvx[li] = v.x;
                        nvy[li] = v.y;
                        nvz[li] = v.z;
                        glow[li] = (glow[li] - dt).max(0.0);
                    }
                });
        });
        self.stats.diffuse_move_us = start.elapsed().as_micros() as u64;
    }
}

//! Double-buffered Structure-of-Arrays particle storage.
//!
//! Position and velocity exist twice: stages read the "current" bank
//! and write the "next" bank, and an explicit `swap_buffers` flips the
//! two in O(1). All other per-particle state is single-buffered.
//!
//! The particle population is fixed at construction. Pumps teleport
//! particles; nothing creates or destroys them mid-run.

use glam::Vec3;

use crate::constants::alignment::PARTICLE_ALIGNMENT;
use crate::error::{SimError, SimResult};
use crate::gravity::GravityDir;

/// Index-identified particle handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParticleId(pub u32);

impl ParticleId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One bank of xyz component arrays.
#[derive(Debug, Clone)]
pub struct Soa3 {
    pub x: Vec<f32>,
    pub y: Vec<f32>,
    pub z: Vec<f32>,
}

impl Soa3 {
    fn zeroed(len: usize) -> Self {
        Self { x: vec![0.0; len], y: vec![0.0; len], z: vec![0.0; len] }
    }

    #[inline]
    pub fn get(&self, i: usize) -> Vec3 {
        Vec3::new(self.x[i], self.y[i], self.z[i])
    }

    #[inline]
    pub fn set(&mut self, i: usize, v: Vec3) {
        self.x[i] = v.x;
        self.y[i] = v.y;
        self.z[i] = v.z;
    }
}

/// Flat `(x, y, z, glow)` entry handed to the renderer.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ParticleVertex {
    pub position: [f32; 3],
    pub glow: f32,
}

/// Mutable views for the diffuse/move stage: read the current bank,
/// write the next one.
pub struct MoveViews<'a> {
    pub pos_cur: &'a Soa3,
    pub vel_cur: &'a Soa3,
    pub pos_next: &'a mut Soa3,
    pub vel_next: &'a mut Soa3,
    pub glow: &'a mut [f32],
    pub radius: &'a [f32],
    pub gravity: &'a [GravityDir],
}

/// Views for the acceleration stage, which integrates velocity in
/// place in the current bank (it is that bank's licensed writer).
pub struct AccelViews<'a> {
    pub pos: &'a Soa3,
    pub vel: &'a mut Soa3,
    pub density: &'a [f32],
    pub near_density: &'a [f32],
    pub gravity: &'a [GravityDir],
}

pub struct ParticleStore {
    count: usize,
    cur: usize,
    position: [Soa3; 2],
    velocity: [Soa3; 2],
    pub radius: Vec<f32>,
    pub gravity: Vec<GravityDir>,
    pub pending_gravity: Vec<GravityDir>,
    pub glow: Vec<f32>,
    pub density: Vec<f32>,
    pub near_density: Vec<f32>,
}

impl ParticleStore {
    /// Allocates `ceil(initial.len() + extra, alignment)` slots; only
    /// the first `initial.len()` are live. The live count itself must
    /// already be aligned (the caller rounds) so worker slices never
    /// straddle a cache line.
    pub fn new(initial: &[Vec3], extra: usize, default_radius: f32) -> SimResult<Self> {
        let count = initial.len();
        if count % PARTICLE_ALIGNMENT != 0 {
            return Err(SimError::MisalignedParticleCount {
                count,
                alignment: PARTICLE_ALIGNMENT,
            });
        }
        let capacity = (count + extra).div_ceil(PARTICLE_ALIGNMENT) * PARTICLE_ALIGNMENT;

        let mut bank = Soa3::zeroed(capacity);
        for (i, p) in initial.iter().enumerate() {
            bank.set(i, *p);
        }
        // both banks start from the initial positions so the first tick
        // reads valid state whichever bank is current
        let position = [bank.clone(), bank];

        Ok(Self {
            count,
            cur: 0,
            position,
            velocity: [Soa3::zeroed(capacity), Soa3::zeroed(capacity)],
            radius: vec![default_radius; capacity],
            gravity: vec![GravityDir::default(); capacity],
            pending_gravity: vec![GravityDir::default(); capacity],
            glow: vec![0.0; capacity],
            density: vec![1.0; capacity],
            near_density: vec![1.0; capacity],
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.radius.len()
    }

    /// Current-bank position. Valid for every index below `len()`.
    #[inline]
    pub fn position(&self, i: usize) -> Vec3 {
        self.position[self.cur].get(i)
    }

    /// Current-bank velocity.
    #[inline]
    pub fn velocity(&self, i: usize) -> Vec3 {
        self.velocity[self.cur].get(i)
    }

    #[inline]
    pub fn positions(&self) -> &Soa3 {
        &self.position[self.cur]
    }

    #[inline]
    pub fn velocities(&self) -> &Soa3 {
        &self.velocity[self.cur]
    }

    pub fn set_next_position(&mut self, i: usize, v: Vec3) {
        let next = self.cur ^ 1;
        self.position[next].set(i, v);
    }

    pub fn set_next_velocity(&mut self, i: usize, v: Vec3) {
        let next = self.cur ^ 1;
        self.velocity[next].set(i, v);
    }

    /// O(1) bank flip. Distinct from the tick so callers control when
    /// integration results (and committed gravity) become visible.
    pub fn swap_buffers(&mut self) {
        self.cur ^= 1;
    }

    /// O(n) flat output production for draw submission.
    pub fn copy_to_output(&self, out: &mut Vec<ParticleVertex>) {
        out.clear();
        out.reserve(self.count);
        let pos = &self.position[self.cur];
        for i in 0..self.count {
            out.push(ParticleVertex {
                position: [pos.x[i], pos.y[i], pos.z[i]],
                glow: self.glow[i],
            });
        }
    }

    pub fn density_views(&mut self) -> (&mut [f32], &mut [f32]) {
        (&mut self.density, &mut self.near_density)
    }

    pub fn accel_views(&mut self) -> AccelViews<'_> {
        let cur = self.cur;
        AccelViews {
            pos: &self.position[cur],
            vel: &mut self.velocity[cur],
            density: &self.density,
            near_density: &self.near_density,
            gravity: &self.gravity,
        }
    }

    pub fn move_views(&mut self) -> MoveViews<'_> {
        let cur = self.cur;
        let (p0, p1) = self.position.split_at_mut(1);
        let (pos_cur, pos_next) = if cur == 0 {
            (&p0[0], &mut p1[0])
        } else {
            (&p1[0], &mut p0[0])
        };
        let (v0, v1) = self.velocity.split_at_mut(1);
        let (vel_cur, vel_next) = if cur == 0 {
            (&v0[0], &mut v1[0])
        } else {
            (&v1[0], &mut v0[0])
        };
        MoveViews {
            pos_cur,
            vel_cur,
            pos_next,
            vel_next,
            glow: &mut self.glow,
            radius: &self.radius,
            gravity: &self.gravity,
        }
    }
}

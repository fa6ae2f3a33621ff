//! Bit-per-voxel solid storage.
//!
//! Read-only during simulation: the level hands the engine a snapshot
//! of which voxels are solid and queries it every tick. Indexing is
//! `x + y * size_x + z * size_x * size_y` over bounds-relative
//! coordinates. Everything outside the bounds reads as solid, so the
//! world border contains fluid without a shell of solid voxels.

use bit_vec::BitVec;
use glam::IVec3;

use crate::error::{SimError, SimResult};

pub struct VoxelField {
    min: IVec3,
    size: IVec3,
    solid: BitVec,
}

impl VoxelField {
    pub fn new(min: IVec3, size: IVec3, solid: BitVec) -> SimResult<Self> {
        if size.cmple(IVec3::ZERO).any() {
            return Err(SimError::EmptyBounds(format!("voxel field size {size}")));
        }
        let expected = (size.x as usize) * (size.y as usize) * (size.z as usize);
        if solid.len() != expected {
            return Err(SimError::VoxelFieldSize { expected, actual: solid.len() });
        }
        Ok(Self { min, size, solid })
    }

    /// All-air field over the given bounds.
    pub fn air(min: IVec3, size: IVec3) -> SimResult<Self> {
        let volume = (size.x.max(0) as usize) * (size.y.max(0) as usize) * (size.z.max(0) as usize);
        Self::new(min, size, BitVec::from_elem(volume, false))
    }

    #[inline]
    pub fn min(&self) -> IVec3 {
        self.min
    }

    #[inline]
    pub fn size(&self) -> IVec3 {
        self.size
    }

    #[inline]
    pub fn contains(&self, v: IVec3) -> bool {
        let l = v - self.min;
        l.cmpge(IVec3::ZERO).all() && l.cmplt(self.size).all()
    }

    #[inline]
    pub fn is_solid(&self, v: IVec3) -> bool {
        if !self.contains(v) {
            return true;
        }
        let l = v - self.min;
        let idx = l.x + l.y * self.size.x + l.z * self.size.x * self.size.y;
        self.solid[idx as usize]
    }

    #[inline]
    pub fn is_air(&self, v: IVec3) -> bool {
        !self.is_solid(v)
    }

    /// Construction-time mutation; the running simulation never writes.
    pub fn set_solid(&mut self, v: IVec3, solid: bool) {
        if self.contains(v) {
            let l = v - self.min;
            let idx = l.x + l.y * self.size.x + l.z * self.size.x * self.size.y;
            self.solid.set(idx as usize, solid);
        }
    }
}

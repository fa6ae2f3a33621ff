//! Oriented rectangular water blockers.
//!
//! A blocker is an invisible pane the level editor derives each tick
//! from gameplay state. It is selectively opaque: only particles whose
//! active gravity direction is in its mask collide with it, which lets
//! redirected water pass barriers that normal water cannot.

use glam::{Vec2, Vec3};

use crate::gravity::GravityDir;

use super::Contact;

#[derive(Debug, Clone, Copy)]
pub struct WaterBlocker {
    pub center: Vec3,
    pub normal: Vec3,
    pub tangent: Vec3,
    pub bitangent: Vec3,
    pub half_extents: Vec2,
    /// Or of `GravityDir::bit()` values this pane blocks.
    pub blocked_dirs: u8,
}

impl WaterBlocker {
    /// Pane facing `normal`, blocking the given directions.
    pub fn new(
        center: Vec3,
        normal: Vec3,
        tangent: Vec3,
        half_extents: Vec2,
        blocked_dirs: u8,
    ) -> Self {
        Self {
            center,
            normal,
            tangent,
            bitangent: normal.cross(tangent),
            half_extents,
            blocked_dirs,
        }
    }

    #[inline]
    pub fn blocks(&self, dir: GravityDir) -> bool {
        self.blocked_dirs & dir.bit() != 0
    }

    /// Radius-inflated contact against the pane, two-sided: the normal
    /// faces whichever side the particle is on. `None` when the
    /// particle projects outside the rectangle or the math degenerates.
    pub(crate) fn contact(&self, p: Vec3, radius: f32) -> Option<Contact> {
        let d = p - self.center;
        let along_normal = d.dot(self.normal);
        if !along_normal.is_finite() {
            return None;
        }
        if d.dot(self.tangent).abs() > self.half_extents.x
            || d.dot(self.bitangent).abs() > self.half_extents.y
        {
            return None;
        }
        let penetration = along_normal.abs() - radius;
        if penetration >= 0.0 {
            return None;
        }
        let side = if along_normal >= 0.0 { 1.0 } else { -1.0 };
        Some(Contact { penetration, normal: self.normal * side })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pane() -> WaterBlocker {
        WaterBlocker::new(
            Vec3::new(2.0, 2.0, 2.0),
            Vec3::Y,
            Vec3::X,
            Vec2::new(1.0, 1.0),
            GravityDir::NegY.bit(),
        )
    }

    #[test]
    fn mask_gates_directions() {
        let b = pane();
        assert!(b.blocks(GravityDir::NegY));
        assert!(!b.blocks(GravityDir::PosY));
        assert!(!b.blocks(GravityDir::NegX));
    }

    #[test]
    fn overlapping_particle_contacts_from_either_side() {
        let b = pane();
        let above = b.contact(Vec3::new(2.0, 2.3, 2.0), 0.5).expect("overlap");
        assert!(above.penetration < 0.0);
        assert_eq!(above.normal, Vec3::Y);

        let below = b.contact(Vec3::new(2.0, 1.7, 2.0), 0.5).expect("overlap");
        assert_eq!(below.normal, Vec3::NEG_Y);
    }

    #[test]
    fn lateral_miss_and_clearance_return_none() {
        let b = pane();
        assert!(b.contact(Vec3::new(3.5, 2.1, 2.0), 0.5).is_none());
        assert!(b.contact(Vec3::new(2.0, 3.0, 2.0), 0.5).is_none());
    }
}

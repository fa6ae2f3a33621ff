//! Collision against solid voxel geometry and blocker panes.
//!
//! The move stage calls [`resolve`] on every particle's tentative
//! position: up to four correction passes, each taking the single
//! least-negative (shallowest) penetration among all candidate
//! contacts and resolving it with an inelastic-plus-restitution
//! impulse. Multiple passes let corner and trench cases converge
//! without a constraint solver.

pub mod blocker;
pub mod voxel_field;

pub use blocker::WaterBlocker;
pub use voxel_field::VoxelField;

use glam::{IVec3, Vec3};

use crate::constants::step::COLLISION_PASSES;
use crate::gravity::GravityDir;

/// Candidate hit: `penetration` is negative while overlapping.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Contact {
    pub penetration: f32,
    pub normal: Vec3,
}

const FACE_NORMALS: [IVec3; 6] = [
    IVec3::new(1, 0, 0),
    IVec3::new(-1, 0, 0),
    IVec3::new(0, 1, 0),
    IVec3::new(0, -1, 0),
    IVec3::new(0, 0, 1),
    IVec3::new(0, 0, -1),
];

/// Radius-inflated contact between a particle and one voxel face.
///
/// The face only owns contacts whose center projects inside its
/// footprint; edge approaches are caught by the neighboring voxel's
/// perpendicular face. Penetrations deeper than the voxel midplane
/// belong to the opposite face and are rejected.
fn face_contact(voxel: IVec3, face_normal: IVec3, p: Vec3, radius: f32) -> Option<Contact> {
    let n = face_normal.as_vec3();
    let face_center = voxel.as_vec3() + Vec3::splat(0.5) + n * 0.5;
    let d = p - face_center;
    let along_normal = d.dot(n);
    if !along_normal.is_finite() {
        return None;
    }
    let lateral = d - n * along_normal;
    if lateral.abs().max_element() > 0.5 {
        return None;
    }
    if along_normal >= radius || along_normal <= -0.5 {
        return None;
    }
    Some(Contact { penetration: along_normal - radius, normal: n })
}

fn keep_least_negative(best: &mut Option<Contact>, candidate: Contact) {
    if !candidate.penetration.is_finite() {
        return;
    }
    match best {
        Some(current) if candidate.penetration <= current.penetration => {}
        _ => *best = Some(candidate),
    }
}

/// Correct one particle's tentative position and velocity against the
/// voxel field and every blocker opaque to its gravity direction.
pub(crate) fn resolve(
    field: &VoxelField,
    blockers: &[WaterBlocker],
    dir: GravityDir,
    mut pos: Vec3,
    mut vel: Vec3,
    radius: f32,
    restitution: f32,
) -> (Vec3, Vec3) {
    for _ in 0..COLLISION_PASSES {
        let mut best: Option<Contact> = None;

        for pane in blockers {
            if !pane.blocks(dir) {
                continue;
            }
            if let Some(c) = pane.contact(pos, radius) {
                keep_least_negative(&mut best, c);
            }
        }

        // every solid voxel face with air across it, within one voxel
        let home = pos.floor().as_ivec3();
        for dz in -1..=1 {
            for dy in -1..=1 {
                for dx in -1..=1 {
                    let v = home + IVec3::new(dx, dy, dz);
                    if !field.is_solid(v) {
                        continue;
                    }
                    for n in FACE_NORMALS {
                        if field.is_solid(v + n) {
                            continue;
                        }
                        if let Some(c) = face_contact(v, n, pos, radius) {
                            keep_least_negative(&mut best, c);
                        }
                    }
                }
            }
        }

        let Some(hit) = best else { break };
        // penetration is negative: this pushes out along the normal
        pos -= hit.normal * hit.penetration;
        let along = vel.dot(hit.normal);
        if along < 0.0 {
            vel -= hit.normal * ((1.0 + restitution) * along);
        }
    }
    (pos, vel)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 8^3 air box with one solid voxel at (4, 4, 4).
    fn one_block() -> VoxelField {
        let mut field = VoxelField::air(IVec3::ZERO, IVec3::splat(8)).expect("bounds");
        field.set_solid(IVec3::splat(4), true);
        field
    }

    #[test]
    fn face_contact_reports_shallow_overlap() {
        // particle overlapping the +y face of the voxel at (4,4,4)
        let c = face_contact(IVec3::splat(4), IVec3::Y, Vec3::new(4.5, 5.3, 4.5), 0.5)
            .expect("overlap");
        assert!((c.penetration - (-0.2)).abs() < 1e-5);
        assert_eq!(c.normal, Vec3::Y);
    }

    #[test]
    fn face_contact_rejects_lateral_miss_and_depth() {
        assert!(face_contact(IVec3::splat(4), IVec3::Y, Vec3::new(6.0, 5.2, 4.5), 0.5).is_none());
        // deeper than the midplane: the -y face owns this one
        assert!(face_contact(IVec3::splat(4), IVec3::Y, Vec3::new(4.5, 4.3, 4.5), 0.5).is_none());
    }

    #[test]
    fn resolve_pushes_out_of_every_face() {
        let field = one_block();
        for n in FACE_NORMALS {
            let face_plane = Vec3::splat(4.5) + n.as_vec3() * 0.5;
            // start overlapping by 0.3, moving inward
            let start = face_plane + n.as_vec3() * 0.2;
            let vel = n.as_vec3() * -2.0;
            let (pos, vel) =
                resolve(&field, &[], GravityDir::NegY, start, vel, 0.5, 0.0);
            let clearance = (pos - face_plane).dot(n.as_vec3());
            assert!(clearance >= 0.5 - 1e-4, "face {n}: clearance {clearance}");
            assert!(vel.dot(n.as_vec3()) >= 0.0, "face {n}: still approaching");
        }
    }

    #[test]
    fn blocker_only_stops_masked_directions() {
        let field = VoxelField::air(IVec3::ZERO, IVec3::splat(8)).expect("bounds");
        let pane = WaterBlocker::new(
            Vec3::new(4.0, 4.0, 4.0),
            Vec3::Y,
            Vec3::X,
            glam::Vec2::splat(2.0),
            GravityDir::NegY.bit(),
        );
        let start = Vec3::new(4.0, 4.2, 4.0);
        let vel = Vec3::new(0.0, -1.0, 0.0);

        let (blocked_pos, _) =
            resolve(&field, &[pane], GravityDir::NegY, start, vel, 0.5, 0.0);
        assert!(blocked_pos.y >= 4.5 - 1e-4);

        let (free_pos, free_vel) =
            resolve(&field, &[pane], GravityDir::PosX, start, vel, 0.5, 0.0);
        assert_eq!(free_pos, start);
        assert_eq!(free_vel, vel);
    }

    #[test]
    fn trench_corner_converges_within_four_passes() {
        // solid floor and wall meeting at a corner
        let mut field = VoxelField::air(IVec3::ZERO, IVec3::splat(8)).expect("bounds");
        for a in 0..8 {
            for b in 0..8 {
                field.set_solid(IVec3::new(a, 0, b), true);
                field.set_solid(IVec3::new(0, a, b), true);
            }
        }
        // overlapping both the floor (y = 1) and the wall (x = 1)
        let start = Vec3::new(1.3, 1.3, 4.0);
        let (pos, _) = resolve(
            &field,
            &[],
            GravityDir::NegY,
            start,
            Vec3::new(-1.0, -1.0, 0.0),
            0.5,
            0.0,
        );
        assert!(pos.x >= 1.5 - 1e-4);
        assert!(pos.y >= 1.5 - 1e-4);
    }
}

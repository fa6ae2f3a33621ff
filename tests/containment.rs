//! A particle driven straight at a solid voxel face must stay on the
//! air side, for every face orientation.

use glam::{IVec3, Vec3};
use tide_engine::{GravityChange, GravityDir, SimConfig, SimulationEngine, TickInput, VoxelField};

const FACES: [(IVec3, GravityDir); 6] = [
    // face normal, gravity direction that drives a particle into it
    (IVec3::new(1, 0, 0), GravityDir::NegX),
    (IVec3::new(-1, 0, 0), GravityDir::PosX),
    (IVec3::new(0, 1, 0), GravityDir::NegY),
    (IVec3::new(0, -1, 0), GravityDir::PosY),
    (IVec3::new(0, 0, 1), GravityDir::NegZ),
    (IVec3::new(0, 0, -1), GravityDir::PosZ),
];

/// 16^3 air field with a single solid voxel in the middle.
fn one_block_field() -> VoxelField {
    let mut field = VoxelField::air(IVec3::ZERO, IVec3::splat(16)).expect("bounds");
    field.set_solid(IVec3::splat(8), true);
    field
}

#[test]
fn approaching_particle_never_crosses_a_solid_face() {
    let _ = env_logger::builder().is_test(true).try_init();
    let config = SimConfig {
        worker_threads: Some(2),
        ..SimConfig::default()
    };
    let radius = config.particle_radius;
    let block_center = Vec3::splat(8.5);

    for (n, down) in FACES {
        let normal = n.as_vec3();
        let face_center = block_center + normal * 0.5;
        // just outside the face; its gravity will drive it inward
        let start = face_center + normal * (radius + 0.05);

        // the particle under test plus alignment padding parked out of
        // interaction range near a far corner
        let mut points = vec![start];
        points.extend((1..16).map(|i| Vec3::new(1.0 + i as f32 * 0.9, 1.0, 1.0)));

        let mut sim = SimulationEngine::new(one_block_field(), &points, 0, config.clone())
            .expect("constructs");
        // redirect only the test particle (its neighbor list is empty,
        // so the flood fill stops at the seed)
        sim.change_particle_gravity(&GravityChange {
            point: start,
            direction: down,
            highlight_only: false,
        });
        sim.swap_buffers();

        for tick in 0..60 {
            sim.tick(&TickInput::step(1.0 / 60.0));
            sim.swap_buffers();
            let p = sim.particles().position(0);
            let clearance = (p - face_center).dot(normal);
            assert!(
                clearance >= 0.0,
                "face {n}, tick {tick}: crossed to the solid side (clearance {clearance})"
            );
        }
    }
}

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use phys2d::*;

const DT: f32 = 1.0 / 60.0;

fn ground(world: &mut World) {
    let ground = world.create_body(&BodyDef::fixed(Vec2::new(0.0, -1.0))).unwrap();
    world
        .create_fixture(ground, &FixtureDef::new(PolygonShape::new_box(40.0, 1.0).unwrap()))
        .unwrap();
}

fn pyramid(rows: usize) -> World {
    let mut world = World::new(Vec2::new(0.0, -10.0));
    ground(&mut world);

    let shape = PolygonShape::new_box(0.5, 0.5).unwrap();
    for row in 0..rows {
        let count = rows - row;
        for i in 0..count {
            let x = (i as f32 - count as f32 * 0.5) * 1.125;
            let y = 0.5 + row as f32 * 1.0;
            let body = world.create_body(&BodyDef::dynamic(Vec2::new(x, y))).unwrap();
            world
                .create_fixture(body, &FixtureDef::new(shape.clone()).with_density(1.0).with_friction(0.6))
                .unwrap();
        }
    }
    world
}

fn bench_pyramid(c: &mut Criterion) {
    c.bench_function("pyramid_20_rows_60_steps", |b| {
        b.iter(|| {
            let mut world = pyramid(20);
            for _ in 0..60 {
                world.step(DT, 8, 3).unwrap();
            }
            black_box(world.contact_count())
        });
    });
}

fn bench_particle_block(c: &mut Criterion) {
    c.bench_function("particle_block_60_steps", |b| {
        b.iter(|| {
            let mut world = World::new(Vec2::new(0.0, -10.0));
            ground(&mut world);
            let handle = world
                .create_particle_system(&ParticleSystemDef::default().with_radius(0.05))
                .unwrap();
            world
                .particle_system_mut(handle)
                .unwrap()
                .create_particle_group(
                    &ParticleGroupDef::new(PolygonShape::new_box(1.0, 1.0).unwrap())
                        .with_position(Vec2::new(0.0, 2.0)),
                )
                .unwrap();

            let iterations = world.calculate_reasonable_particle_iterations(DT);
            for _ in 0..60 {
                world.step_with_particles(DT, 8, 3, iterations).unwrap();
            }
            black_box(world.particle_system(handle).unwrap().particle_count())
        });
    });
}

criterion_group!(benches, bench_pyramid, bench_particle_block);
criterion_main!(benches);

use phys2d::{
    BodyDef, BodyHandle, BodyType, CircleShape, FixtureDef, FixtureHandle, PolygonShape, SimulationConfig, Vec2,
    World,
};
use phys2d::error::PhysicsError;
use approx::assert_relative_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const DT: f32 = 1.0 / 60.0;

fn ground(world: &mut World) -> BodyHandle {
    let ground = world.create_body(&BodyDef::fixed(Vec2::new(0.0, -10.0))).unwrap();
    world
        .create_fixture(ground, &FixtureDef::new(PolygonShape::new_box(50.0, 10.0).unwrap()))
        .unwrap();
    ground
}

fn ball(world: &mut World, position: Vec2, radius: f32) -> BodyHandle {
    let body = world.create_body(&BodyDef::dynamic(position)).unwrap();
    world
        .create_fixture(body, &FixtureDef::new(CircleShape::new(radius).unwrap()).with_density(1.0))
        .unwrap();
    body
}

#[test]
fn test_world_creation() {
    let world = World::new(Vec2::new(0.0, -10.0));
    assert_eq!(world.body_count(), 0);
    assert_eq!(world.contact_count(), 0);
    assert_eq!(world.gravity(), Vec2::new(0.0, -10.0));

    let config = SimulationConfig { linear_slop: 0.0, ..SimulationConfig::default() };
    assert!(matches!(World::with_config(config), Err(PhysicsError::InvalidParameter(_))));
}

#[test]
fn test_body_definition_validation() {
    let mut world = World::default();

    let def = BodyDef { position: Vec2::new(f32::NAN, 0.0), ..BodyDef::dynamic(Vec2::zero()) };
    assert!(matches!(world.create_body(&def), Err(PhysicsError::InvalidParameter(_))));

    let body = world.create_body(&BodyDef::dynamic(Vec2::zero())).unwrap();
    let def = FixtureDef::new(CircleShape::new(1.0).unwrap()).with_density(-1.0);
    assert!(matches!(world.create_fixture(body, &def), Err(PhysicsError::InvalidParameter(_))));
    assert_eq!(world.fixture_count(), 0);
}

#[test]
fn test_stale_handles_are_reported() {
    let mut world = World::default();
    let body = world.create_body(&BodyDef::dynamic(Vec2::zero())).unwrap();
    world.destroy_body(body).unwrap();

    assert!(matches!(world.body(body), Err(PhysicsError::ResourceNotFound(_))));
    assert!(matches!(world.destroy_body(body), Err(PhysicsError::ResourceNotFound(_))));

    // A new body in the same slot gets a new generation
    let other = world.create_body(&BodyDef::dynamic(Vec2::zero())).unwrap();
    assert_ne!(body, other);
    assert!(world.body(body).is_err());
}

#[test]
fn test_free_fall_matches_integration() {
    let mut world = World::new(Vec2::new(0.0, -10.0));
    let body = ball(&mut world, Vec2::new(0.0, 100.0), 0.5);

    let mut expected_velocity = 0.0;
    let mut expected_position = 100.0;
    for _ in 0..60 {
        world.step(DT, 8, 3).unwrap();
        expected_velocity -= 10.0 * DT;
        expected_position += expected_velocity * DT;
    }

    let body = world.body(body).unwrap();
    assert_relative_eq!(body.linear_velocity().y, -10.0, epsilon = 1e-3);
    assert_relative_eq!(body.position().y, expected_position, epsilon = 1e-3);
}

#[test]
fn test_bullet_steps_like_plain_body() {
    let mut world = World::new(Vec2::new(0.0, -10.0));
    let plain = ball(&mut world, Vec2::new(0.0, 100.0), 0.5);
    let bullet = ball(&mut world, Vec2::new(10.0, 100.0), 0.5);
    world.body_mut(bullet).unwrap().set_bullet(true);
    assert!(world.body(bullet).unwrap().is_bullet());

    for _ in 0..60 {
        world.step(DT, 8, 3).unwrap();
    }

    let plain = world.body(plain).unwrap();
    let bullet = world.body(bullet).unwrap();
    assert_eq!(bullet.linear_velocity(), plain.linear_velocity());
    assert_eq!(bullet.position().y, plain.position().y);
}

#[test]
fn test_static_and_kinematic_bodies_ignore_gravity() {
    let mut world = World::new(Vec2::new(0.0, -10.0));
    let fixed = world.create_body(&BodyDef::fixed(Vec2::new(0.0, 5.0))).unwrap();
    let kinematic = world
        .create_body(&BodyDef { linear_velocity: Vec2::new(1.0, 0.0), ..BodyDef::kinematic(Vec2::zero()) })
        .unwrap();

    for _ in 0..60 {
        world.step(DT, 8, 3).unwrap();
    }

    assert_eq!(world.body(fixed).unwrap().position(), Vec2::new(0.0, 5.0));
    let kinematic = world.body(kinematic).unwrap();
    assert_relative_eq!(kinematic.position(), Vec2::new(1.0, 0.0), epsilon = 1e-4);
    assert_relative_eq!(kinematic.linear_velocity(), Vec2::new(1.0, 0.0));
}

#[test]
fn test_ball_comes_to_rest_and_sleeps() {
    let mut world = World::new(Vec2::new(0.0, -10.0));
    ground(&mut world);
    let body = ball(&mut world, Vec2::new(0.0, 10.0), 0.5);

    for _ in 0..300 {
        world.step(DT, 8, 3).unwrap();
    }

    let body = world.body(body).unwrap();
    assert_relative_eq!(body.position().y, 0.5, epsilon = 0.02);
    assert!(body.linear_velocity().length() < 0.01);
    assert!(!body.is_awake());
}

#[test]
fn test_sleeping_disabled_keeps_bodies_awake() {
    let mut world = World::new(Vec2::new(0.0, -10.0));
    world.set_allow_sleeping(false);
    ground(&mut world);
    let body = ball(&mut world, Vec2::new(0.0, 0.5), 0.5);

    for _ in 0..120 {
        world.step(DT, 8, 3).unwrap();
    }

    assert!(world.body(body).unwrap().is_awake());
}

#[test]
fn test_auto_clear_forces() {
    let mut world = World::new(Vec2::zero());
    let body = ball(&mut world, Vec2::zero(), 0.5);

    world.body_mut(body).unwrap().apply_force_to_center(Vec2::new(10.0, 0.0), true);
    world.step(DT, 8, 3).unwrap();
    assert_eq!(world.body(body).unwrap().force(), Vec2::zero());
    let v1 = world.body(body).unwrap().linear_velocity();
    assert!(v1.x > 0.0);

    // The force does not act again
    world.step(DT, 8, 3).unwrap();
    assert_relative_eq!(world.body(body).unwrap().linear_velocity(), v1);

    world.set_auto_clear_forces(false);
    world.body_mut(body).unwrap().apply_force_to_center(Vec2::new(10.0, 0.0), true);
    world.step(DT, 8, 3).unwrap();
    assert_eq!(world.body(body).unwrap().force(), Vec2::new(10.0, 0.0));
}

#[test]
fn test_set_body_type_resets_mass() {
    let mut world = World::new(Vec2::new(0.0, -10.0));
    let body = ball(&mut world, Vec2::new(0.0, 5.0), 1.0);
    assert!(world.body(body).unwrap().mass() > 0.0);

    world.set_body_type(body, BodyType::Static).unwrap();
    let fixed = world.body(body).unwrap();
    assert_eq!(fixed.mass(), 0.0);
    assert_eq!(fixed.inv_mass(), 0.0);

    world.step(DT, 8, 3).unwrap();
    assert_eq!(world.body(body).unwrap().position(), Vec2::new(0.0, 5.0));

    world.set_body_type(body, BodyType::Dynamic).unwrap();
    assert_relative_eq!(world.body(body).unwrap().mass(), std::f32::consts::PI, epsilon = 1e-5);
}

#[test]
fn test_fixed_rotation_has_no_rotational_inertia() {
    let mut world = World::default();
    let body = world.create_body(&BodyDef::dynamic(Vec2::zero())).unwrap();
    world
        .create_fixture(body, &FixtureDef::new(PolygonShape::new_box(1.0, 0.5).unwrap()).with_density(1.0))
        .unwrap();
    assert!(world.body(body).unwrap().inertia() > 0.0);

    world.set_fixed_rotation(body, true).unwrap();
    let body = world.body_mut(body).unwrap();
    body.apply_angular_impulse(1.0, true);
    assert_eq!(body.angular_velocity(), 0.0);
}

#[test]
fn test_destroy_body_removes_fixtures_and_proxies() {
    let mut world = World::new(Vec2::new(0.0, -10.0));
    ground(&mut world);
    let body = ball(&mut world, Vec2::new(0.0, 0.45), 0.5);
    world.step(DT, 8, 3).unwrap();
    assert_eq!(world.contact_count(), 1);

    let fixture: FixtureHandle = world.body(body).unwrap().fixtures()[0];
    world.destroy_body(body).unwrap();

    assert_eq!(world.body_count(), 1);
    assert_eq!(world.contact_count(), 0);
    assert_eq!(world.proxy_count(), 1);
    assert!(world.fixture(fixture).is_err());
}

#[test]
fn test_rejects_invalid_time_step() {
    let mut world = World::default();
    assert!(matches!(world.step(-DT, 8, 3), Err(PhysicsError::InvalidParameter(_))));
    assert!(matches!(world.step(f32::INFINITY, 8, 3), Err(PhysicsError::InvalidParameter(_))));
    assert!(world.step(0.0, 8, 3).is_ok());
}

#[test]
fn test_simulation_is_deterministic() {
    fn run(seed: u64) -> Vec<(Vec2, f32)> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut world = World::new(Vec2::new(0.0, -10.0));
        ground(&mut world);

        let mut bodies = Vec::new();
        for _ in 0..20 {
            let position = Vec2::new(rng.gen_range(-5.0..5.0), rng.gen_range(1.0..15.0));
            let body = world.create_body(&BodyDef::dynamic(position)).unwrap();
            let shape = PolygonShape::new_box(rng.gen_range(0.2..0.6), rng.gen_range(0.2..0.6)).unwrap();
            world.create_fixture(body, &FixtureDef::new(shape).with_density(1.0)).unwrap();
            bodies.push(body);
        }

        for _ in 0..120 {
            world.step(DT, 8, 3).unwrap();
        }

        bodies
            .iter()
            .map(|&body| {
                let body = world.body(body).unwrap();
                (body.position(), body.angle())
            })
            .collect()
    }

    assert_eq!(run(7), run(7));
}

#[test]
fn test_shift_origin_preserves_relative_layout() {
    let mut world = World::new(Vec2::new(0.0, -10.0));
    ground(&mut world);
    let body = ball(&mut world, Vec2::new(3.0, 0.5), 0.5);
    world.step(DT, 8, 3).unwrap();
    let before = world.body(body).unwrap().position();

    world.shift_origin(Vec2::new(100.0, 0.0));
    assert_relative_eq!(world.body(body).unwrap().position(), before - Vec2::new(100.0, 0.0));

    // The ground proxy moved with the origin, so the ball keeps resting on it
    world.step(DT, 8, 3).unwrap();
    assert_eq!(world.contact_count(), 1);
}

#[test]
fn test_bodies_at_rest_stay_at_rest() {
    let mut world = World::new(Vec2::zero());
    let mut rng = StdRng::seed_from_u64(3);
    let bodies: Vec<(BodyHandle, Vec2)> = (0..10)
        .map(|i| {
            let position = Vec2::new(i as f32 * 4.0, rng.gen_range(-10.0..10.0));
            (ball(&mut world, position, 0.5), position)
        })
        .collect();

    for _ in 0..100 {
        world.step(DT, 8, 3).unwrap();
    }

    for (handle, position) in bodies {
        let body = world.body(handle).unwrap();
        assert_eq!(body.position(), position);
        assert_eq!(body.linear_velocity(), Vec2::zero());
        assert_eq!(body.angular_velocity(), 0.0);
    }
}

use phys2d::error::PhysicsError;
use phys2d::{
    BodyDef, ContactListener, FixtureDef, FixtureHandle, ParticleDef, ParticleFlags, ParticleGroupDef,
    ParticleSystemDef, ParticleSystemHandle, PolygonShape, CircleShape, QueryCallback, RayCastCallback, Shape, Transform,
    Vec2, World,
};
use phys2d::particles::{ParticleBodyContact, ParticleContact};
use approx::assert_relative_eq;
use std::cell::RefCell;
use std::rc::Rc;

const DT: f32 = 1.0 / 60.0;

fn world_with_floor() -> World {
    let mut world = World::new(Vec2::new(0.0, -10.0));
    let ground = world.create_body(&BodyDef::fixed(Vec2::new(0.0, -1.0))).unwrap();
    world
        .create_fixture(ground, &FixtureDef::new(PolygonShape::new_box(10.0, 1.0).unwrap()))
        .unwrap();
    world
}

#[test]
fn test_invalid_system_definition() {
    let mut world = World::default();
    let result = world.create_particle_system(&ParticleSystemDef::default().with_radius(0.0));
    assert!(matches!(result, Err(PhysicsError::DegenerateGeometry(_))));
    assert_eq!(world.particle_system_count(), 0);
}

#[test]
fn test_group_fills_shape() {
    let mut world = World::default();
    let handle = world
        .create_particle_system(&ParticleSystemDef::default().with_radius(0.1))
        .unwrap();
    let system = world.particle_system_mut(handle).unwrap();

    let group = system
        .create_particle_group(&ParticleGroupDef::new(PolygonShape::new_box(0.5, 0.5).unwrap()))
        .unwrap();

    let count = system.particle_count();
    assert!(count > 0);
    assert_eq!(system.particle_group(group).unwrap().particle_count(), count);
    assert_eq!(system.positions().len(), count);
    assert_eq!(system.velocities().len(), count);
    assert_eq!(system.flags().len(), count);

    // Every particle lies inside the box
    for p in system.positions() {
        assert!(p.x.abs() <= 0.5 && p.y.abs() <= 0.5);
    }
}

#[test]
fn test_particles_rest_on_floor() {
    let mut world = world_with_floor();
    let handle = world
        .create_particle_system(&ParticleSystemDef::default().with_radius(0.05))
        .unwrap();
    world
        .particle_system_mut(handle)
        .unwrap()
        .create_particle_group(&ParticleGroupDef::new(PolygonShape::new_box(0.3, 0.3).unwrap()).with_position(Vec2::new(0.0, 1.0)))
        .unwrap();

    let iterations = world.calculate_reasonable_particle_iterations(DT);
    for _ in 0..180 {
        world.step_with_particles(DT, 8, 3, iterations).unwrap();
    }

    let system = world.particle_system(handle).unwrap();
    assert!(system.particle_count() > 0);
    for p in system.positions() {
        assert!(p.is_valid());
        assert!(p.y > -0.05, "particle fell through the floor: {p:?}");
    }
}

#[test]
fn test_wall_particles_do_not_move() {
    let mut world = World::new(Vec2::new(0.0, -10.0));
    let handle = world.create_particle_system(&ParticleSystemDef::default()).unwrap();
    let system = world.particle_system_mut(handle).unwrap();
    let index = system
        .create_particle(&ParticleDef::new(Vec2::new(1.0, 2.0)).with_flags(ParticleFlags::WALL))
        .unwrap();

    for _ in 0..30 {
        world.step(DT, 8, 3).unwrap();
    }

    let system = world.particle_system(handle).unwrap();
    assert_eq!(system.positions()[index], Vec2::new(1.0, 2.0));
    assert_eq!(system.velocities()[index], Vec2::zero());
}

#[test]
fn test_expired_particles_are_removed() {
    let mut world = World::new(Vec2::zero());
    let handle = world.create_particle_system(&ParticleSystemDef::default()).unwrap();
    let system = world.particle_system_mut(handle).unwrap();
    system.create_particle(&ParticleDef::new(Vec2::zero()).with_lifetime(0.05)).unwrap();
    system.create_particle(&ParticleDef::new(Vec2::new(5.0, 0.0))).unwrap();

    for _ in 0..10 {
        world.step(DT, 8, 3).unwrap();
    }

    let system = world.particle_system(handle).unwrap();
    assert_eq!(system.particle_count(), 1);
    assert_eq!(system.positions()[0], Vec2::new(5.0, 0.0));
}

#[test]
fn test_destroy_particles_in_shape() {
    let mut world = World::new(Vec2::zero());
    let handle = world.create_particle_system(&ParticleSystemDef::default()).unwrap();
    let system = world.particle_system_mut(handle).unwrap();
    for i in 0..10 {
        system.create_particle(&ParticleDef::new(Vec2::new(i as f32 * 3.0, 0.0))).unwrap();
    }

    let shape: Shape = CircleShape::new(4.0).unwrap().into();
    assert_eq!(system.destroy_particles_in_shape(&shape, &Transform::identity()), 2);

    world.step(DT, 8, 3).unwrap();
    assert_eq!(world.particle_system(handle).unwrap().particle_count(), 8);
}

#[test]
fn test_capacity_limit() {
    let mut world = World::new(Vec2::zero());
    let def = ParticleSystemDef { destroy_by_age: false, ..ParticleSystemDef::default().with_max_count(2) };
    let handle = world.create_particle_system(&def).unwrap();
    let system = world.particle_system_mut(handle).unwrap();

    system.create_particle(&ParticleDef::new(Vec2::zero())).unwrap();
    system.create_particle(&ParticleDef::new(Vec2::new(3.0, 0.0))).unwrap();
    let third = system.create_particle(&ParticleDef::new(Vec2::new(6.0, 0.0)));
    assert!(matches!(third, Err(PhysicsError::CapacityExceeded(_))));
    assert_eq!(system.particle_count(), 2);
}

#[derive(Default)]
struct BodyContacts {
    begin: usize,
    end: usize,
}

struct Recorder(Rc<RefCell<BodyContacts>>);

impl ContactListener for Recorder {
    fn begin_particle_body_contact(&mut self, _system: ParticleSystemHandle, _contact: &ParticleBodyContact) {
        self.0.borrow_mut().begin += 1;
    }

    fn end_particle_body_contact(&mut self, _system: ParticleSystemHandle, _fixture: FixtureHandle, _index: usize) {
        self.0.borrow_mut().end += 1;
    }
}

#[test]
fn test_fixture_contact_events() {
    let events = Rc::new(RefCell::new(BodyContacts::default()));
    let mut world = world_with_floor();
    world.set_contact_listener(Box::new(Recorder(events.clone())));

    let handle = world
        .create_particle_system(&ParticleSystemDef::default().with_radius(0.1))
        .unwrap();
    let flags = ParticleFlags::FIXTURE_CONTACT_LISTENER;
    let index = world
        .particle_system_mut(handle)
        .unwrap()
        .create_particle(&ParticleDef::new(Vec2::new(0.0, 0.05)).with_flags(flags))
        .unwrap();

    world.step(DT, 8, 3).unwrap();
    assert_eq!(events.borrow().begin, 1);

    world.particle_system_mut(handle).unwrap().positions_mut()[index] = Vec2::new(0.0, 5.0);
    world.step(DT, 8, 3).unwrap();
    assert_eq!(events.borrow().end, 1);
}

struct Hits {
    fixtures: usize,
    particles: usize,
}

impl RayCastCallback for Hits {
    fn report_fixture(&mut self, _fixture: FixtureHandle, _point: Vec2, _normal: Vec2, _fraction: f32) -> f32 {
        self.fixtures += 1;
        -1.0
    }

    fn report_particle(&mut self, _system: ParticleSystemHandle, _index: usize, _point: Vec2, _normal: Vec2, _fraction: f32) -> f32 {
        self.particles += 1;
        -1.0
    }
}

impl QueryCallback for Hits {
    fn report_fixture(&mut self, _fixture: FixtureHandle) -> bool {
        self.fixtures += 1;
        true
    }

    fn report_particle(&mut self, _system: ParticleSystemHandle, _index: usize) -> bool {
        self.particles += 1;
        true
    }
}

#[test]
fn test_queries_report_particles() {
    let mut world = World::new(Vec2::zero());
    let handle = world.create_particle_system(&ParticleSystemDef::default().with_radius(0.1)).unwrap();
    let system = world.particle_system_mut(handle).unwrap();
    for i in 0..4 {
        system.create_particle(&ParticleDef::new(Vec2::new(i as f32, 0.0))).unwrap();
    }

    let mut hits = Hits { fixtures: 0, particles: 0 };
    world.ray_cast(&mut hits, Vec2::new(-1.0, 0.0), Vec2::new(10.0, 0.0));
    assert_eq!(hits.particles, 4);

    let mut hits = Hits { fixtures: 0, particles: 0 };
    let aabb = phys2d::Aabb::new(Vec2::new(-0.5, -0.5), Vec2::new(1.5, 0.5));
    world.query_aabb(&mut hits, &aabb);
    assert_eq!(hits.particles, 2);
    assert_eq!(hits.fixtures, 0);
}

fn width(world: &World, handle: ParticleSystemHandle) -> f32 {
    let positions = world.particle_system(handle).unwrap().positions();
    let min = positions.iter().map(|p| p.x).fold(f32::INFINITY, f32::min);
    let max = positions.iter().map(|p| p.x).fold(f32::NEG_INFINITY, f32::max);
    max - min
}

fn stretched_block(flags: ParticleFlags) -> (World, ParticleSystemHandle, f32) {
    let mut world = World::new(Vec2::zero());
    let handle = world
        .create_particle_system(&ParticleSystemDef::default().with_radius(0.1))
        .unwrap();
    world
        .particle_system_mut(handle)
        .unwrap()
        .create_particle_group(&ParticleGroupDef::new(PolygonShape::new_box(0.5, 0.5).unwrap()).with_flags(flags))
        .unwrap();

    let rest_width = width(&world, handle);
    for p in world.particle_system_mut(handle).unwrap().positions_mut() {
        p.x *= 1.5;
    }
    (world, handle, rest_width)
}

#[test]
fn test_elastic_group_recovers_rest_shape() {
    let (mut world, handle, rest_width) = stretched_block(ParticleFlags::ELASTIC);
    assert!(!world.particle_system(handle).unwrap().triads().is_empty());

    for _ in 0..180 {
        world.step(DT, 8, 3).unwrap();
    }

    assert_relative_eq!(width(&world, handle), rest_width, epsilon = 0.05 * rest_width);
    for p in world.particle_system(handle).unwrap().positions() {
        assert!(p.is_valid());
    }
}

#[test]
fn test_water_group_keeps_its_deformation() {
    let (mut world, handle, rest_width) = stretched_block(ParticleFlags::WATER);
    assert!(world.particle_system(handle).unwrap().triads().is_empty());

    for _ in 0..180 {
        world.step(DT, 8, 3).unwrap();
    }

    assert!(width(&world, handle) > 1.4 * rest_width);
}

#[derive(Default)]
struct ParticleEvents {
    begin: Vec<(usize, usize)>,
    end: Vec<(usize, usize)>,
}

struct ParticleRecorder(Rc<RefCell<ParticleEvents>>);

impl ContactListener for ParticleRecorder {
    fn begin_particle_contact(&mut self, _system: ParticleSystemHandle, contact: &ParticleContact) {
        self.0.borrow_mut().begin.push((contact.index_a, contact.index_b));
    }

    fn end_particle_contact(&mut self, _system: ParticleSystemHandle, index_a: usize, index_b: usize) {
        self.0.borrow_mut().end.push((index_a, index_b));
    }
}

#[test]
fn test_particle_contact_events_follow_compaction() {
    let events = Rc::new(RefCell::new(ParticleEvents::default()));
    let mut world = World::new(Vec2::zero());
    world.set_contact_listener(Box::new(ParticleRecorder(events.clone())));

    let handle = world
        .create_particle_system(&ParticleSystemDef::default().with_radius(0.1))
        .unwrap();
    let flags = ParticleFlags::PARTICLE_CONTACT_LISTENER;
    let system = world.particle_system_mut(handle).unwrap();
    let lone = system.create_particle(&ParticleDef::new(Vec2::new(10.0, 0.0)).with_flags(flags)).unwrap();
    system.create_particle(&ParticleDef::new(Vec2::zero()).with_flags(flags)).unwrap();
    system.create_particle(&ParticleDef::new(Vec2::new(0.15, 0.0)).with_flags(flags)).unwrap();

    world.step(DT, 8, 3).unwrap();
    assert_eq!(events.borrow().begin, vec![(1, 2)]);

    // Removing the first particle shifts the touching pair to (0, 1)
    world.particle_system_mut(handle).unwrap().destroy_particle(lone).unwrap();
    world.step(DT, 8, 3).unwrap();
    assert_eq!(world.particle_system(handle).unwrap().particle_count(), 2);
    world.step(DT, 8, 3).unwrap();
    assert_eq!(events.borrow().begin.len(), 1);
    assert!(events.borrow().end.is_empty());

    world.particle_system_mut(handle).unwrap().positions_mut()[1] = Vec2::new(5.0, 0.0);
    world.step(DT, 8, 3).unwrap();
    assert_eq!(events.borrow().end, vec![(0, 1)]);
}

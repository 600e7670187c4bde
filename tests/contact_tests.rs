use phys2d::collision::CollisionCategory;
use phys2d::math::Aabb;
use phys2d::{
    BodyDef, BodyHandle, CircleShape, Contact, ContactImpulse, ContactListener, Filter, FixtureDef, FixtureHandle,
    PolygonShape, Vec2, World,
};
use std::cell::RefCell;
use std::rc::Rc;
use approx::assert_relative_eq;

const DT: f32 = 1.0 / 60.0;

#[derive(Debug, Default)]
struct Events {
    begin: usize,
    end: usize,
    post_solve: usize,
}

struct Recorder(Rc<RefCell<Events>>);

impl ContactListener for Recorder {
    fn begin_contact(&mut self, _contact: &Contact) {
        self.0.borrow_mut().begin += 1;
    }

    fn end_contact(&mut self, _contact: &Contact) {
        self.0.borrow_mut().end += 1;
    }

    fn post_solve(&mut self, _contact: &Contact, impulse: &ContactImpulse) {
        assert!(impulse.count > 0);
        self.0.borrow_mut().post_solve += 1;
    }
}

fn world_with_ground() -> World {
    let mut world = World::new(Vec2::new(0.0, -10.0));
    let ground = world.create_body(&BodyDef::fixed(Vec2::new(0.0, -10.0))).unwrap();
    world
        .create_fixture(ground, &FixtureDef::new(PolygonShape::new_box(50.0, 10.0).unwrap()))
        .unwrap();
    world
}

fn ball(world: &mut World, position: Vec2, def: FixtureDef) -> BodyHandle {
    let body = world.create_body(&BodyDef::dynamic(position)).unwrap();
    world.create_fixture(body, &def).unwrap();
    body
}

fn circle(radius: f32) -> FixtureDef {
    FixtureDef::new(CircleShape::new(radius).unwrap()).with_density(1.0)
}

#[test]
fn test_bounds_overlap_without_touching() {
    let mut world = World::new(Vec2::zero());
    ball(&mut world, Vec2::new(0.0, 0.0), circle(0.5));
    ball(&mut world, Vec2::new(1.05, 0.0), circle(0.5));

    world.step(DT, 8, 3).unwrap();

    // The enlarged proxies overlap, the shapes do not
    assert_eq!(world.contact_count(), 1);
    let (_, contact) = world.contacts().next().unwrap();
    assert!(!contact.is_touching());
}

#[test]
fn test_begin_and_end_contact_events() {
    let events = Rc::new(RefCell::new(Events::default()));
    let mut world = world_with_ground();
    world.set_contact_listener(Box::new(Recorder(events.clone())));

    let body = ball(&mut world, Vec2::new(0.0, 2.0), circle(0.5));
    for _ in 0..60 {
        world.step(DT, 8, 3).unwrap();
    }
    assert_eq!(events.borrow().begin, 1);
    assert_eq!(events.borrow().end, 0);
    assert!(events.borrow().post_solve > 0);

    // Teleporting does not wake a resting body
    world.set_transform(body, Vec2::new(0.0, 20.0), 0.0).unwrap();
    world.body_mut(body).unwrap().set_awake(true);
    world.step(DT, 8, 3).unwrap();
    assert_eq!(events.borrow().end, 1);
    assert_eq!(world.contact_count(), 0);
}

#[test]
fn test_destroying_touching_body_ends_contact() {
    let events = Rc::new(RefCell::new(Events::default()));
    let mut world = world_with_ground();
    world.set_contact_listener(Box::new(Recorder(events.clone())));

    let body = ball(&mut world, Vec2::new(0.0, 0.45), circle(0.5));
    world.step(DT, 8, 3).unwrap();
    assert_eq!(events.borrow().begin, 1);

    world.destroy_body(body).unwrap();
    assert_eq!(events.borrow().end, 1);
}

#[test]
fn test_sensor_reports_without_response() {
    let events = Rc::new(RefCell::new(Events::default()));
    let mut world = world_with_ground();
    world.set_contact_listener(Box::new(Recorder(events.clone())));

    let body = ball(&mut world, Vec2::new(0.0, 0.6), circle(0.5).with_sensor(true));
    for _ in 0..30 {
        world.step(DT, 8, 3).unwrap();
    }

    assert_eq!(events.borrow().begin, 1);
    assert_eq!(events.borrow().post_solve, 0);
    // The sensor fell into the ground
    assert!(world.body(body).unwrap().position().y < 0.0);
}

#[test]
fn test_negative_group_never_collides() {
    let mut world = World::new(Vec2::zero());
    let filter = Filter { group_index: -1, ..Filter::default() };
    ball(&mut world, Vec2::zero(), circle(0.5).with_filter(filter));
    ball(&mut world, Vec2::new(0.5, 0.0), circle(0.5).with_filter(filter));

    world.step(DT, 8, 3).unwrap();
    assert_eq!(world.contact_count(), 0);
}

#[test]
fn test_set_filter_removes_contact() {
    let mut world = World::new(Vec2::zero());
    ball(&mut world, Vec2::zero(), circle(0.5));
    let other = ball(&mut world, Vec2::new(0.5, 0.0), circle(0.5));
    world.step(DT, 8, 3).unwrap();
    assert_eq!(world.contact_count(), 1);

    let fixture = world.body(other).unwrap().fixtures()[0];
    let filter = Filter { mask_bits: CollisionCategory::CATEGORY2, ..Filter::default() };
    world.set_filter(fixture, filter).unwrap();
    world.step(DT, 8, 3).unwrap();
    assert_eq!(world.contact_count(), 0);
}

#[test]
fn test_ray_cast_reports_closest_fixture() {
    let mut world = World::new(Vec2::zero());
    let near = ball(&mut world, Vec2::new(3.0, 0.0), circle(0.5));
    ball(&mut world, Vec2::new(6.0, 0.0), circle(0.5));
    world.step(0.0, 8, 3).unwrap();

    let mut closest: Option<(FixtureHandle, Vec2, f32)> = None;
    let mut callback = |fixture: FixtureHandle, point: Vec2, _normal: Vec2, fraction: f32| {
        closest = Some((fixture, point, fraction));
        fraction
    };
    world.ray_cast(&mut callback, Vec2::zero(), Vec2::new(10.0, 0.0));

    let (fixture, point, fraction) = closest.unwrap();
    assert_eq!(fixture, world.body(near).unwrap().fixtures()[0]);
    assert_relative_eq!(point, Vec2::new(2.5, 0.0), epsilon = 1e-5);
    assert_relative_eq!(fraction, 0.25, epsilon = 1e-6);
}

#[test]
fn test_query_aabb_reports_overlapping_fixtures() {
    let mut world = World::new(Vec2::zero());
    for i in 0..5 {
        ball(&mut world, Vec2::new(i as f32 * 3.0, 0.0), circle(0.5));
    }

    let mut found = Vec::new();
    let mut callback = |fixture: FixtureHandle| {
        found.push(fixture);
        true
    };
    world.query_aabb(&mut callback, &Aabb::new(Vec2::new(-1.0, -1.0), Vec2::new(4.0, 1.0)));

    assert_eq!(found.len(), 2);
}

#[test]
fn test_begin_and_end_fire_once_per_transition() {
    let events = Rc::new(RefCell::new(Events::default()));
    let mut world = World::new(Vec2::zero());
    world.set_contact_listener(Box::new(Recorder(events.clone())));
    let wall = world.create_body(&BodyDef::fixed(Vec2::zero())).unwrap();
    world
        .create_fixture(wall, &FixtureDef::new(PolygonShape::new_box(1.0, 1.0).unwrap()))
        .unwrap();
    let scanner = ball(&mut world, Vec2::new(5.0, 0.0), circle(0.5).with_sensor(true));

    for pass in 1..=3 {
        for x in [3.0, 1.8, 1.2, 1.0] {
            world.set_transform(scanner, Vec2::new(x, 0.0), 0.0).unwrap();
            world.body_mut(scanner).unwrap().set_awake(true);
            world.step(DT, 8, 3).unwrap();
        }
        assert_eq!(events.borrow().begin, pass);
        assert_eq!(events.borrow().end, pass - 1);

        for x in [1.2, 1.8, 3.0, 5.0] {
            world.set_transform(scanner, Vec2::new(x, 0.0), 0.0).unwrap();
            world.body_mut(scanner).unwrap().set_awake(true);
            world.step(DT, 8, 3).unwrap();
        }
        assert_eq!(events.borrow().end, pass);
    }
}

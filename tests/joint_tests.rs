use phys2d::constraints::{
    DistanceJointDef, FrictionJointDef, GearJointDef, MotorJointDef, MouseJointDef, PrismaticJointDef, PulleyJointDef,
    RevoluteJointDef, RopeJointDef, WeldJointDef, WheelJointDef,
};
use phys2d::error::PhysicsError;
use phys2d::{BodyDef, BodyHandle, CircleShape, FixtureDef, JointDef, JointType, PolygonShape, Vec2, World};
use approx::assert_relative_eq;

const DT: f32 = 1.0 / 60.0;

fn anchor(world: &mut World, position: Vec2) -> BodyHandle {
    world.create_body(&BodyDef::fixed(position)).unwrap()
}

fn weight(world: &mut World, position: Vec2) -> BodyHandle {
    let body = world.create_body(&BodyDef::dynamic(position)).unwrap();
    world
        .create_fixture(body, &FixtureDef::new(PolygonShape::new_box(0.25, 0.25).unwrap()).with_density(1.0))
        .unwrap();
    body
}

#[test]
fn test_distance_joint_holds_length() {
    let mut world = World::new(Vec2::new(0.0, -10.0));
    let ground = anchor(&mut world, Vec2::new(0.0, 10.0));
    let bob = weight(&mut world, Vec2::new(2.0, 10.0));

    let def = DistanceJointDef::new(
        world.body(ground).unwrap(),
        world.body(bob).unwrap(),
        Vec2::new(0.0, 10.0),
        Vec2::new(2.0, 10.0),
    );
    let joint = world.create_joint(&JointDef::new(ground, bob, def)).unwrap();
    assert_eq!(world.joint(joint).unwrap().joint_type(), JointType::Distance);

    for _ in 0..120 {
        world.step(DT, 8, 3).unwrap();
    }

    let a = world.joint_anchor_a(joint).unwrap();
    let b = world.joint_anchor_b(joint).unwrap();
    assert_relative_eq!(a.distance(&b), 2.0, epsilon = 0.02);
    // The pendulum swung down
    assert!(world.body(bob).unwrap().position().y < 10.0);
}

#[test]
fn test_revolute_joint_keeps_anchors_together() {
    let mut world = World::new(Vec2::new(0.0, -10.0));
    let ground = anchor(&mut world, Vec2::zero());
    let arm = weight(&mut world, Vec2::new(1.0, 0.0));

    let def = RevoluteJointDef::new(world.body(ground).unwrap(), world.body(arm).unwrap(), Vec2::zero());
    let joint = world.create_joint(&JointDef::new(ground, arm, def)).unwrap();

    for _ in 0..90 {
        world.step(DT, 8, 3).unwrap();
    }

    let a = world.joint_anchor_a(joint).unwrap();
    let b = world.joint_anchor_b(joint).unwrap();
    assert!(a.distance(&b) < 0.01);
}

#[test]
fn test_revolute_motor_drives_speed() {
    let mut world = World::new(Vec2::zero());
    let ground = anchor(&mut world, Vec2::zero());
    let wheel = world.create_body(&BodyDef::dynamic(Vec2::zero())).unwrap();
    world
        .create_fixture(wheel, &FixtureDef::new(CircleShape::new(0.5).unwrap()).with_density(1.0))
        .unwrap();

    let def = RevoluteJointDef {
        enable_motor: true,
        motor_speed: 2.0,
        max_motor_torque: 1000.0,
        ..RevoluteJointDef::new(world.body(ground).unwrap(), world.body(wheel).unwrap(), Vec2::zero())
    };
    world.create_joint(&JointDef::new(ground, wheel, def)).unwrap();

    for _ in 0..30 {
        world.step(DT, 8, 3).unwrap();
    }

    assert_relative_eq!(world.body(wheel).unwrap().angular_velocity(), 2.0, epsilon = 1e-3);
}

#[test]
fn test_connected_bodies_do_not_collide() {
    let mut world = World::new(Vec2::zero());
    let a = weight(&mut world, Vec2::zero());
    let b = weight(&mut world, Vec2::new(0.25, 0.0));
    world.step(DT, 8, 3).unwrap();
    assert_eq!(world.contact_count(), 1);

    let def = WeldJointDef::new(world.body(a).unwrap(), world.body(b).unwrap(), Vec2::zero());
    world.create_joint(&JointDef::new(a, b, def)).unwrap();
    world.step(DT, 8, 3).unwrap();
    assert_eq!(world.contact_count(), 0);
}

#[test]
fn test_destroy_body_destroys_its_joints() {
    let mut world = World::new(Vec2::new(0.0, -10.0));
    let ground = anchor(&mut world, Vec2::zero());
    let a = weight(&mut world, Vec2::new(1.0, 0.0));
    let b = weight(&mut world, Vec2::new(2.0, 0.0));

    let def = RevoluteJointDef::new(world.body(ground).unwrap(), world.body(a).unwrap(), Vec2::zero());
    let j1 = world.create_joint(&JointDef::new(ground, a, def)).unwrap();
    let def = RevoluteJointDef::new(world.body(a).unwrap(), world.body(b).unwrap(), Vec2::new(1.5, 0.0));
    let j2 = world.create_joint(&JointDef::new(a, b, def)).unwrap();

    world.destroy_body(a).unwrap();

    assert_eq!(world.joint_count(), 0);
    assert!(matches!(world.joint(j1), Err(PhysicsError::ResourceNotFound(_))));
    assert!(world.joint(j2).is_err());
    assert!(world.body(ground).unwrap().joint_edges().is_empty());
    assert!(world.body(b).unwrap().joint_edges().is_empty());
}

#[test]
fn test_gear_joint_goes_with_its_joints() {
    let mut world = World::new(Vec2::zero());
    let ground = anchor(&mut world, Vec2::zero());
    let wheel = weight(&mut world, Vec2::new(0.0, 0.0));
    let slider = weight(&mut world, Vec2::new(2.0, 0.0));

    let def = RevoluteJointDef::new(world.body(ground).unwrap(), world.body(wheel).unwrap(), Vec2::zero());
    let revolute = world.create_joint(&JointDef::new(ground, wheel, def)).unwrap();
    let def = PrismaticJointDef::new(
        world.body(ground).unwrap(),
        world.body(slider).unwrap(),
        Vec2::new(2.0, 0.0),
        Vec2::new(1.0, 0.0),
    );
    let prismatic = world.create_joint(&JointDef::new(ground, slider, def)).unwrap();

    let gear = world
        .create_joint(&JointDef::new(wheel, slider, GearJointDef::new(revolute, prismatic, 1.0)))
        .unwrap();
    assert_eq!(world.joint_count(), 3);

    // Pushing the slider turns the wheel
    world.body_mut(slider).unwrap().set_linear_velocity(Vec2::new(1.0, 0.0));
    for _ in 0..10 {
        world.step(DT, 8, 3).unwrap();
    }
    assert!(world.body(wheel).unwrap().angular_velocity().abs() > 0.5);

    world.destroy_joint(revolute).unwrap();
    assert!(world.joint(gear).is_err());
    assert_eq!(world.joint_count(), 1);
}

#[test]
fn test_gear_requires_revolute_or_prismatic() {
    let mut world = World::new(Vec2::zero());
    let ground = anchor(&mut world, Vec2::zero());
    let a = weight(&mut world, Vec2::new(1.0, 0.0));
    let b = weight(&mut world, Vec2::new(3.0, 0.0));

    let def = DistanceJointDef::new(world.body(ground).unwrap(), world.body(a).unwrap(), Vec2::zero(), Vec2::new(1.0, 0.0));
    let distance = world.create_joint(&JointDef::new(ground, a, def)).unwrap();
    let def = RevoluteJointDef::new(world.body(ground).unwrap(), world.body(b).unwrap(), Vec2::new(3.0, 0.0));
    let revolute = world.create_joint(&JointDef::new(ground, b, def)).unwrap();

    let result = world.create_joint(&JointDef::new(a, b, GearJointDef::new(distance, revolute, 1.0)));
    assert!(matches!(result, Err(PhysicsError::InvalidState(_))));
}

#[test]
fn test_rope_joint_limits_distance() {
    let mut world = World::new(Vec2::new(0.0, -10.0));
    let ground = anchor(&mut world, Vec2::new(0.0, 10.0));
    let bob = weight(&mut world, Vec2::new(1.0, 10.0));

    let def = RopeJointDef {
        local_anchor_a: Vec2::zero(),
        local_anchor_b: Vec2::zero(),
        max_length: 3.0,
    };
    let joint = world.create_joint(&JointDef::new(ground, bob, def)).unwrap();

    for _ in 0..120 {
        world.step(DT, 8, 3).unwrap();
        let a = world.joint_anchor_a(joint).unwrap();
        let b = world.joint_anchor_b(joint).unwrap();
        assert!(a.distance(&b) < 3.02);
    }

    // Caught by the rope and swinging on it
    let a = world.joint_anchor_a(joint).unwrap();
    let b = world.joint_anchor_b(joint).unwrap();
    assert!(a.distance(&b) > 2.9);
}

#[test]
fn test_pulley_heavier_side_descends() {
    let mut world = World::new(Vec2::new(0.0, -10.0));
    let light = weight(&mut world, Vec2::new(-2.0, 5.0));
    let heavy = world.create_body(&BodyDef::dynamic(Vec2::new(2.0, 5.0))).unwrap();
    world
        .create_fixture(heavy, &FixtureDef::new(PolygonShape::new_box(0.5, 0.5).unwrap()).with_density(1.0))
        .unwrap();

    let def = PulleyJointDef::new(
        world.body(light).unwrap(),
        world.body(heavy).unwrap(),
        Vec2::new(-2.0, 10.0),
        Vec2::new(2.0, 10.0),
        Vec2::new(-2.0, 5.0),
        Vec2::new(2.0, 5.0),
        1.0,
    );
    let joint = world.create_joint(&JointDef::new(light, heavy, def)).unwrap();

    for _ in 0..60 {
        world.step(DT, 8, 3).unwrap();
    }

    assert!(world.body(heavy).unwrap().position().y < 4.5);
    assert!(world.body(light).unwrap().position().y > 5.5);

    let pulley = world.joint(joint).unwrap().as_pulley().unwrap();
    let total = pulley.current_length_a(world.body(light).unwrap())
        + pulley.ratio() * pulley.current_length_b(world.body(heavy).unwrap());
    assert_relative_eq!(total, 10.0, epsilon = 0.05);
}

#[test]
fn test_mouse_joint_drags_body_to_target() {
    let mut world = World::new(Vec2::zero());
    let ground = anchor(&mut world, Vec2::new(0.0, -5.0));
    let body = weight(&mut world, Vec2::zero());

    let mass = world.body(body).unwrap().mass();
    let def = MouseJointDef {
        target: Vec2::zero(),
        max_force: 1000.0 * mass,
        ..MouseJointDef::default()
    };
    let joint = world.create_joint(&JointDef::new(ground, body, def)).unwrap();
    world
        .joint_mut(joint)
        .unwrap()
        .as_mouse_mut()
        .unwrap()
        .set_target(Vec2::new(3.0, 2.0));

    for _ in 0..120 {
        world.step(DT, 8, 3).unwrap();
    }

    let position = world.body(body).unwrap().position();
    assert_relative_eq!(position.x, 3.0, epsilon = 0.05);
    assert_relative_eq!(position.y, 2.0, epsilon = 0.05);
}

#[test]
fn test_wheel_joint_stays_on_axis_and_sags() {
    let mut world = World::new(Vec2::new(0.0, -10.0));
    let chassis = anchor(&mut world, Vec2::zero());
    let wheel = world.create_body(&BodyDef::dynamic(Vec2::zero())).unwrap();
    world
        .create_fixture(wheel, &FixtureDef::new(CircleShape::new(0.4).unwrap()).with_density(1.0))
        .unwrap();

    let def = WheelJointDef::new(
        world.body(chassis).unwrap(),
        world.body(wheel).unwrap(),
        Vec2::zero(),
        Vec2::new(0.0, 1.0),
    );
    let joint = world.create_joint(&JointDef::new(chassis, wheel, def)).unwrap();
    world.body_mut(wheel).unwrap().set_linear_velocity(Vec2::new(1.0, 0.0));

    for _ in 0..120 {
        world.step(DT, 8, 3).unwrap();
    }

    let body = world.body(wheel).unwrap();
    assert!(body.position().x.abs() < 0.01);

    // The suspension spring carries the weight a little below the anchor
    let translation = world
        .joint(joint)
        .unwrap()
        .as_wheel()
        .unwrap()
        .joint_translation(world.body(chassis).unwrap(), body);
    assert!(translation < -0.02 && translation > -0.15, "translation {translation}");
}

#[test]
fn test_friction_joint_stops_sliding_body() {
    let mut world = World::new(Vec2::zero());
    let ground = anchor(&mut world, Vec2::zero());
    let body = weight(&mut world, Vec2::zero());

    let def = FrictionJointDef {
        max_force: 1.0,
        max_torque: 1.0,
        ..FrictionJointDef::new(world.body(ground).unwrap(), world.body(body).unwrap(), Vec2::zero())
    };
    world.create_joint(&JointDef::new(ground, body, def)).unwrap();
    {
        let body = world.body_mut(body).unwrap();
        body.set_linear_velocity(Vec2::new(4.0, 0.0));
        body.set_angular_velocity(2.0);
    }

    for _ in 0..120 {
        world.step(DT, 8, 3).unwrap();
    }

    // A 0.25 kg body against 1 N decelerates at 4 m/s^2 and stops after 2 m
    let body = world.body(body).unwrap();
    assert!(body.linear_velocity().length() < 1e-3);
    assert!(body.angular_velocity().abs() < 1e-3);
    assert_relative_eq!(body.position().x, 2.0, epsilon = 0.1);
}

#[test]
fn test_motor_joint_reaches_offset() {
    let mut world = World::new(Vec2::zero());
    let ground = anchor(&mut world, Vec2::zero());
    let body = weight(&mut world, Vec2::zero());

    let def = MotorJointDef {
        linear_offset: Vec2::new(2.0, 1.0),
        angular_offset: 0.5,
        max_force: 100.0,
        max_torque: 100.0,
        ..MotorJointDef::new(world.body(ground).unwrap(), world.body(body).unwrap())
    };
    let joint = world.create_joint(&JointDef::new(ground, body, def)).unwrap();
    assert_eq!(world.joint(joint).unwrap().joint_type(), JointType::Motor);

    for _ in 0..240 {
        world.step(DT, 8, 3).unwrap();
    }

    let body = world.body(body).unwrap();
    assert_relative_eq!(body.position().x, 2.0, epsilon = 0.05);
    assert_relative_eq!(body.position().y, 1.0, epsilon = 0.05);
    assert_relative_eq!(body.angle(), 0.5, epsilon = 0.05);
}

#[test]
fn test_prismatic_limit_stops_motor() {
    let mut world = World::new(Vec2::zero());
    let ground = anchor(&mut world, Vec2::zero());
    let slider = weight(&mut world, Vec2::zero());

    let def = PrismaticJointDef {
        enable_limit: true,
        lower_translation: -1.0,
        upper_translation: 1.0,
        enable_motor: true,
        motor_speed: 2.0,
        max_motor_force: 100.0,
        ..PrismaticJointDef::new(
            world.body(ground).unwrap(),
            world.body(slider).unwrap(),
            Vec2::zero(),
            Vec2::new(1.0, 0.0),
        )
    };
    let joint = world.create_joint(&JointDef::new(ground, slider, def)).unwrap();

    for _ in 0..120 {
        world.step(DT, 8, 3).unwrap();
    }

    let translation = world
        .joint(joint)
        .unwrap()
        .as_prismatic()
        .unwrap()
        .joint_translation(world.body(ground).unwrap(), world.body(slider).unwrap());
    assert_relative_eq!(translation, 1.0, epsilon = 0.02);
    assert!(world.body(slider).unwrap().position().y.abs() < 0.01);
}

#[test]
fn test_weld_joint_holds_cantilever() {
    let mut world = World::new(Vec2::new(0.0, -10.0));
    let wall = anchor(&mut world, Vec2::zero());
    let beam = world.create_body(&BodyDef::dynamic(Vec2::new(1.0, 0.0))).unwrap();
    world
        .create_fixture(beam, &FixtureDef::new(PolygonShape::new_box(1.0, 0.1).unwrap()).with_density(1.0))
        .unwrap();

    let def = WeldJointDef::new(world.body(wall).unwrap(), world.body(beam).unwrap(), Vec2::zero());
    world.create_joint(&JointDef::new(wall, beam, def)).unwrap();

    for _ in 0..120 {
        world.step(DT, 8, 3).unwrap();
    }

    let body = world.body(beam).unwrap();
    assert_relative_eq!(body.position().x, 1.0, epsilon = 0.02);
    assert_relative_eq!(body.position().y, 0.0, epsilon = 0.02);
    assert!(body.angle().abs() < 0.02);
}

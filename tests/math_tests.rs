use phys2d::math::{Aabb, RayCastInput, Rot, Transform, Vec2};
use phys2d::shapes::{CircleShape, EdgeShape, PolygonShape, Shape};
use phys2d::collision::{collide_circles, collide_edge_and_polygon, collide_polygons};
use std::f32::consts::PI;
use approx::assert_relative_eq;

#[test]
fn test_vec2_operations() {
    let v1 = Vec2::new(1.0, 2.0);
    let v2 = Vec2::new(3.0, 4.0);

    assert_eq!(v1 + v2, Vec2::new(4.0, 6.0));
    assert_eq!(v2 - v1, Vec2::new(2.0, 2.0));
    assert_eq!(v1 * 2.0, Vec2::new(2.0, 4.0));
    assert_eq!(-v1, Vec2::new(-1.0, -2.0));

    assert_eq!(v1.dot(&v2), 11.0);
    assert_eq!(v1.cross(&v2), -2.0);
    assert_relative_eq!(v2.length(), 5.0);
    assert_relative_eq!(v2.normalize().length(), 1.0);

    // Cross with a scalar rotates by -90 degrees, scalar first by +90
    assert_eq!(Vec2::unit_x().cross_scalar(1.0), Vec2::new(0.0, -1.0));
    assert_eq!(Vec2::scalar_cross(1.0, Vec2::unit_x()), Vec2::new(0.0, 1.0));
}

#[test]
fn test_transform_round_trip() {
    let xf = Transform::from_position_angle(Vec2::new(1.0, 2.0), PI / 2.0);

    let world = xf.apply(Vec2::new(1.0, 0.0));
    assert_relative_eq!(world, Vec2::new(1.0, 3.0), epsilon = 1e-6);
    assert_relative_eq!(xf.apply_inverse(world), Vec2::new(1.0, 0.0), epsilon = 1e-6);

    let q = Rot::new(PI / 4.0);
    assert_relative_eq!(q.angle(), PI / 4.0, epsilon = 1e-6);
    assert_relative_eq!(q.inv_rotate(q.rotate(Vec2::new(3.0, -1.0))), Vec2::new(3.0, -1.0), epsilon = 1e-5);
}

#[test]
fn test_aabb_queries() {
    let a = Aabb::new(Vec2::new(0.0, 0.0), Vec2::new(2.0, 2.0));
    let b = Aabb::new(Vec2::new(1.0, 1.0), Vec2::new(3.0, 3.0));
    let c = Aabb::new(Vec2::new(5.0, 5.0), Vec2::new(6.0, 6.0));

    assert!(a.overlaps(&b));
    assert!(!a.overlaps(&c));
    assert!(a.contains_point(Vec2::new(1.0, 1.0)));
    assert_eq!(a.union(&c), Aabb::new(Vec2::new(0.0, 0.0), Vec2::new(6.0, 6.0)));
    assert_eq!(a.center(), Vec2::new(1.0, 1.0));

    let hit = a.ray_cast(&RayCastInput::new(Vec2::new(-2.0, 1.0), Vec2::new(2.0, 1.0))).unwrap();
    assert_relative_eq!(hit.fraction, 0.5);
    assert_eq!(hit.normal, Vec2::new(-1.0, 0.0));
}

#[test]
fn test_invalid_shapes_are_rejected() {
    assert!(CircleShape::new(0.0).is_err());
    assert!(CircleShape::new(f32::NAN).is_err());
    assert!(PolygonShape::new_box(-1.0, 1.0).is_err());
    assert!(EdgeShape::new(Vec2::zero(), Vec2::zero()).is_err());

    // Collinear points have no hull
    let line = [Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(2.0, 0.0)];
    assert!(PolygonShape::new(&line).is_err());
}

#[test]
fn test_polygon_hull_and_mass() {
    // Interior and duplicate points are dropped
    let points = [
        Vec2::new(-1.0, -1.0),
        Vec2::new(1.0, -1.0),
        Vec2::new(0.0, 0.0),
        Vec2::new(1.0, 1.0),
        Vec2::new(-1.0, 1.0),
        Vec2::new(1.0, 1.0),
    ];
    let polygon = PolygonShape::new(&points).unwrap();
    assert_eq!(polygon.vertex_count(), 4);

    let mass = Shape::from(polygon).compute_mass(2.0);
    assert_relative_eq!(mass.mass, 8.0, epsilon = 1e-5);
    assert_relative_eq!(mass.center, Vec2::zero(), epsilon = 1e-6);
    // m * (w^2 + h^2) / 12 for a 2x2 box
    assert_relative_eq!(mass.inertia, 8.0 * 8.0 / 12.0, epsilon = 1e-4);
}

#[test]
fn test_shape_point_and_ray_queries() {
    let circle = Shape::from(CircleShape::new(1.0).unwrap());
    let xf = Transform::from_position(Vec2::new(5.0, 0.0));

    assert!(circle.test_point(&xf, Vec2::new(5.5, 0.5)));
    assert!(!circle.test_point(&xf, Vec2::new(6.5, 0.0)));

    let output = circle
        .ray_cast(&RayCastInput::new(Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0)), &xf)
        .unwrap();
    assert_relative_eq!(output.fraction, 0.4, epsilon = 1e-6);
    assert_relative_eq!(output.normal, Vec2::new(-1.0, 0.0), epsilon = 1e-6);

    let (distance, direction) = circle.compute_distance(&xf, Vec2::new(8.0, 0.0));
    assert_relative_eq!(distance, 2.0, epsilon = 1e-6);
    assert_relative_eq!(direction, Vec2::new(1.0, 0.0), epsilon = 1e-6);
}

#[test]
fn test_circle_manifold() {
    let circle = CircleShape::new(0.5).unwrap();
    let xf_a = Transform::identity();

    let touching = collide_circles(&circle, &xf_a, &circle, &Transform::from_position(Vec2::new(0.9, 0.0)));
    assert_eq!(touching.point_count, 1);

    let apart = collide_circles(&circle, &xf_a, &circle, &Transform::from_position(Vec2::new(1.1, 0.0)));
    assert_eq!(apart.point_count, 0);
}

#[test]
fn test_stacked_boxes_manifold_has_two_points() {
    let square = PolygonShape::new_box(0.5, 0.5).unwrap();
    let xf_a = Transform::identity();
    let xf_b = Transform::from_position(Vec2::new(0.0, 0.99));

    let manifold = collide_polygons(&square, &xf_a, &square, &xf_b);
    assert_eq!(manifold.point_count, 2);
}

#[test]
fn test_edge_ghost_vertex_drops_inner_corner_contact() {
    let square = PolygonShape::new_box(0.5, 0.5).unwrap();
    let xf_edge = Transform::identity();
    // The box overlaps the start of the edge from the left
    let xf_box = Transform::from_position(Vec2::new(0.505, 0.45));

    let lone = EdgeShape::new(Vec2::new(1.0, 0.0), Vec2::new(2.0, 0.0)).unwrap();
    let manifold = collide_edge_and_polygon(&lone, &xf_edge, &square, &xf_box);
    assert_eq!(manifold.point_count, 1);

    let chained = lone.clone().with_ghosts(Some(Vec2::new(0.0, 0.0)), None);
    let manifold = collide_edge_and_polygon(&chained, &xf_edge, &square, &xf_box);
    assert_eq!(manifold.point_count, 0);
}

#[test]
fn test_edge_with_ghosts_keeps_face_contact() {
    let square = PolygonShape::new_box(0.5, 0.5).unwrap();
    let edge = EdgeShape::new(Vec2::new(1.0, 0.0), Vec2::new(2.0, 0.0))
        .unwrap()
        .with_ghosts(Some(Vec2::new(0.0, 0.0)), Some(Vec2::new(3.0, 0.0)));

    let manifold = collide_edge_and_polygon(
        &edge,
        &Transform::identity(),
        &square,
        &Transform::from_position(Vec2::new(1.5, 0.49)),
    );
    assert_eq!(manifold.point_count, 2);
    assert_relative_eq!(manifold.local_normal, Vec2::new(0.0, 1.0), epsilon = 1e-6);
}

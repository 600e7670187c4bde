use crate::collision::manifold::{ContactFeature, Manifold, ManifoldType};
use crate::math::{Vec2, Transform};
use crate::shapes::{CircleShape, PolygonShape};

/// Computes the manifold between two circles
pub fn collide_circles(
    circle_a: &CircleShape,
    xf_a: &Transform,
    circle_b: &CircleShape,
    xf_b: &Transform,
) -> Manifold {
    let mut manifold = Manifold::default();

    let p_a = xf_a.apply(circle_a.position);
    let p_b = xf_b.apply(circle_b.position);

    let dist_sqr = p_a.distance_squared(&p_b);
    let radius = circle_a.radius + circle_b.radius;
    if dist_sqr > radius * radius {
        return manifold;
    }

    manifold.kind = ManifoldType::Circles;
    manifold.local_point = circle_a.position;
    manifold.local_normal = Vec2::zero();
    manifold.point_count = 1;
    manifold.points[0].local_point = circle_b.position;
    manifold.points[0].id = ContactFeature::default();
    manifold
}

/// Computes the manifold between a polygon and a circle
pub fn collide_polygon_and_circle(
    polygon_a: &PolygonShape,
    xf_a: &Transform,
    circle_b: &CircleShape,
    xf_b: &Transform,
) -> Manifold {
    let mut manifold = Manifold::default();

    // Compute circle position in the frame of the polygon
    let c = xf_b.apply(circle_b.position);
    let c_local = xf_a.apply_inverse(c);

    let vertices = polygon_a.vertices();
    let normals = polygon_a.normals();
    let count = vertices.len();
    let radius = polygon_a.radius + circle_b.radius;

    // Find the min separating edge
    let mut normal_index = 0;
    let mut separation = f32::MIN;
    for i in 0..count {
        let s = normals[i].dot(&(c_local - vertices[i]));
        if s > radius {
            // Early out
            return manifold;
        }
        if s > separation {
            separation = s;
            normal_index = i;
        }
    }

    let vert_index1 = normal_index;
    let vert_index2 = if vert_index1 + 1 < count { vert_index1 + 1 } else { 0 };
    let v1 = vertices[vert_index1];
    let v2 = vertices[vert_index2];

    manifold.kind = ManifoldType::FaceA;
    manifold.point_count = 1;
    manifold.points[0].local_point = circle_b.position;
    manifold.points[0].id = ContactFeature::default();

    // Center is inside the polygon
    if separation < f32::EPSILON {
        manifold.local_normal = normals[normal_index];
        manifold.local_point = (v1 + v2) * 0.5;
        return manifold;
    }

    // Compute barycentric coordinates
    let u1 = (c_local - v1).dot(&(v2 - v1));
    let u2 = (c_local - v2).dot(&(v1 - v2));

    if u1 <= 0.0 {
        if c_local.distance_squared(&v1) > radius * radius {
            return Manifold::default();
        }
        manifold.local_normal = (c_local - v1).normalize();
        manifold.local_point = v1;
    } else if u2 <= 0.0 {
        if c_local.distance_squared(&v2) > radius * radius {
            return Manifold::default();
        }
        manifold.local_normal = (c_local - v2).normalize();
        manifold.local_point = v2;
    } else {
        let face_center = (v1 + v2) * 0.5;
        let s = (c_local - face_center).dot(&normals[vert_index1]);
        if s > radius {
            return Manifold::default();
        }
        manifold.local_normal = normals[vert_index1];
        manifold.local_point = face_center;
    }

    manifold
}

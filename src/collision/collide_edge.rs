use crate::collision::collide_polygon::{clip_to_reference_face, collide_convex, EdgeLoop};
use crate::collision::manifold::{ContactFeature, FeatureType, Manifold, ManifoldType};
use crate::math::{Vec2, Transform};
use crate::shapes::{CircleShape, EdgeShape, PolygonShape};

/// Computes the manifold between an edge and a circle.
///
/// The circle is tested against the three Voronoi regions of the segment.
/// Ghost vertices suppress vertex contacts that belong to an adjacent edge.
pub fn collide_edge_and_circle(
    edge_a: &EdgeShape,
    xf_a: &Transform,
    circle_b: &CircleShape,
    xf_b: &Transform,
) -> Manifold {
    let mut manifold = Manifold::default();

    // Compute circle in frame of edge
    let q = xf_a.apply_inverse(xf_b.apply(circle_b.position));

    let a = edge_a.v1;
    let b = edge_a.v2;
    let e = b - a;

    // Barycentric coordinates
    let u = e.dot(&(b - q));
    let v = e.dot(&(q - a));

    let radius = edge_a.radius + circle_b.radius;

    let mut feature = ContactFeature {
        index_a: 0,
        index_b: 0,
        type_a: FeatureType::Vertex,
        type_b: FeatureType::Vertex,
    };

    // Region A
    if v <= 0.0 {
        if q.distance_squared(&a) > radius * radius {
            return manifold;
        }

        // Is there an edge connected to A?
        if let Some(a1) = edge_a.v0 {
            let e1 = a - a1;
            let u1 = e1.dot(&(a - q));

            // Is the circle in Region AB of the previous edge?
            if u1 > 0.0 {
                return manifold;
            }
        }

        manifold.point_count = 1;
        manifold.kind = ManifoldType::Circles;
        manifold.local_normal = Vec2::zero();
        manifold.local_point = a;
        manifold.points[0].id = feature;
        manifold.points[0].local_point = circle_b.position;
        return manifold;
    }

    // Region B
    if u <= 0.0 {
        if q.distance_squared(&b) > radius * radius {
            return manifold;
        }

        // Is there an edge connected to B?
        if let Some(b2) = edge_a.v3 {
            let e2 = b2 - b;
            let v2 = e2.dot(&(q - b));

            // Is the circle in Region AB of the next edge?
            if v2 > 0.0 {
                return manifold;
            }
        }

        feature.index_a = 1;
        manifold.point_count = 1;
        manifold.kind = ManifoldType::Circles;
        manifold.local_normal = Vec2::zero();
        manifold.local_point = b;
        manifold.points[0].id = feature;
        manifold.points[0].local_point = circle_b.position;
        return manifold;
    }

    // Region AB
    let den = e.dot(&e);
    if den <= 0.0 {
        return manifold;
    }
    let p = (a * u + b * v) * (1.0 / den);
    if q.distance_squared(&p) > radius * radius {
        return manifold;
    }

    let mut n = Vec2::new(-e.y, e.x);
    if n.dot(&(q - a)) < 0.0 {
        n = -n;
    }

    feature.type_a = FeatureType::Face;
    manifold.point_count = 1;
    manifold.kind = ManifoldType::FaceA;
    manifold.local_normal = n.normalize();
    manifold.local_point = a;
    manifold.points[0].id = feature;
    manifold.points[0].local_point = circle_b.position;
    manifold
}

/// Sine of the angle by which a contact normal may lean into the region of
/// an adjacent edge before the contact is left to that edge
const GHOST_SIN_TOLERANCE: f32 = 0.1;

/// Computes the manifold between an edge and a polygon. The edge is
/// treated as a two-sided, two-vertex polygon.
///
/// With ghost vertices the contact normal is checked against the
/// neighbouring edges. A normal pointing into the region of a convex
/// neighbour drops the contact, which the neighbour reports instead. At a
/// concave corner the edge face becomes the reference face. Polygons
/// sliding along a chain then do not catch on the inner vertices.
pub fn collide_edge_and_polygon(
    edge_a: &EdgeShape,
    xf_a: &Transform,
    polygon_b: &PolygonShape,
    xf_b: &Transform,
) -> Manifold {
    let edge = EdgeLoop::new(edge_a);
    let manifold = collide_convex(edge.view(), xf_a, polygon_b.into(), xf_b);
    if manifold.point_count == 0 || (edge_a.v0.is_none() && edge_a.v3.is_none()) {
        return manifold;
    }

    // Orient the edge so that the polygon lies on its right
    let centroid = xf_a.apply_inverse(xf_b.apply(polygon_b.centroid));
    let right = (edge_a.v2 - edge_a.v1).cross_scalar(1.0);
    let front = right.dot(&(centroid - edge_a.v1)) >= 0.0;
    let (v0, v1, v2, v3) = if front {
        (edge_a.v0, edge_a.v1, edge_a.v2, edge_a.v3)
    } else {
        (edge_a.v3, edge_a.v2, edge_a.v1, edge_a.v0)
    };
    let edge1 = (v2 - v1).normalize();

    // Contact normal from the edge to the polygon, in edge coordinates
    let normal = match manifold.kind {
        ManifoldType::FaceB => -xf_a.q.inv_rotate(xf_b.q.rotate(manifold.local_normal)),
        _ => manifold.local_normal,
    };

    let snap = if normal.dot(&edge1) <= 0.0 {
        match v0 {
            Some(v0) => {
                let edge0 = (v1 - v0).normalize();
                if edge0.cross(&edge1) >= 0.0 {
                    if normal.cross(&edge0.cross_scalar(1.0)) > GHOST_SIN_TOLERANCE {
                        return Manifold::default();
                    }
                    false
                } else {
                    true
                }
            }
            None => false,
        }
    } else {
        match v3 {
            Some(v3) => {
                let edge2 = (v3 - v2).normalize();
                if edge1.cross(&edge2) >= 0.0 {
                    if edge2.cross_scalar(1.0).cross(&normal) > GHOST_SIN_TOLERANCE {
                        return Manifold::default();
                    }
                    false
                } else {
                    true
                }
            }
            None => false,
        }
    };

    if snap {
        // Face 0 runs from v1 to v2, face 1 back
        let face = if front { 0 } else { 1 };
        clip_to_reference_face(edge.view(), xf_a, face, polygon_b.into(), xf_b, false)
    } else {
        manifold
    }
}

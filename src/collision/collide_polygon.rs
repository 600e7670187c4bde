use crate::collision::manifold::{
    clip_segment_to_line, ClipVertex, ContactFeature, FeatureType, Manifold, ManifoldType,
};
use crate::core::config::DEFAULT_LINEAR_SLOP;
use crate::math::{Vec2, Transform};
use crate::shapes::{PolygonShape, EdgeShape};

/// Borrowed view of a convex vertex loop. Edges are viewed as a two-vertex
/// loop with opposing normals.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ConvexView<'a> {
    pub vertices: &'a [Vec2],
    pub normals: &'a [Vec2],
    pub radius: f32,
}

impl<'a> From<&'a PolygonShape> for ConvexView<'a> {
    fn from(polygon: &'a PolygonShape) -> Self {
        Self {
            vertices: polygon.vertices(),
            normals: polygon.normals(),
            radius: polygon.radius,
        }
    }
}

/// Owned storage backing a [`ConvexView`] of an edge
pub(crate) struct EdgeLoop {
    vertices: [Vec2; 2],
    normals: [Vec2; 2],
    radius: f32,
}

impl EdgeLoop {
    /// Two-vertex loop with normals on both sides of the edge
    pub fn new(edge: &EdgeShape) -> Self {
        let n = (edge.v2 - edge.v1).cross_scalar(1.0).normalize();
        Self {
            vertices: [edge.v1, edge.v2],
            normals: [n, -n],
            radius: edge.radius,
        }
    }

    /// Borrows the edge as a convex loop
    pub fn view(&self) -> ConvexView<'_> {
        ConvexView {
            vertices: &self.vertices,
            normals: &self.normals,
            radius: self.radius,
        }
    }
}

/// Finds the max separation between `poly1` and `poly2` using edge normals
/// from `poly1`.
fn find_max_separation(
    poly1: ConvexView<'_>,
    xf1: &Transform,
    poly2: ConvexView<'_>,
    xf2: &Transform,
) -> (usize, f32) {
    let xf = xf2.mul_t(xf1);

    let mut best_index = 0;
    let mut max_separation = f32::MIN;
    for (i, (n1, v1)) in poly1.normals.iter().zip(poly1.vertices).enumerate() {
        // Get poly1 normal in frame2
        let n = xf.q.rotate(*n1);
        let v1 = xf.apply(*v1);

        // Find deepest point for normal i
        let si = poly2
            .vertices
            .iter()
            .map(|v2| n.dot(&(*v2 - v1)))
            .fold(f32::MAX, f32::min);

        if si > max_separation {
            max_separation = si;
            best_index = i;
        }
    }

    (best_index, max_separation)
}

fn find_incident_edge(
    poly1: ConvexView<'_>,
    xf1: &Transform,
    edge1: usize,
    poly2: ConvexView<'_>,
    xf2: &Transform,
) -> [ClipVertex; 2] {
    // Get the normal of the reference edge in poly2's frame
    let normal1 = xf2.q.inv_rotate(xf1.q.rotate(poly1.normals[edge1]));

    // Find the incident edge on poly2
    let mut index = 0;
    let mut min_dot = f32::MAX;
    for (i, n2) in poly2.normals.iter().enumerate() {
        let dot = normal1.dot(n2);
        if dot < min_dot {
            min_dot = dot;
            index = i;
        }
    }

    let count2 = poly2.vertices.len();
    let i1 = index;
    let i2 = if i1 + 1 < count2 { i1 + 1 } else { 0 };

    let feature = |index_b: usize| ContactFeature {
        index_a: edge1 as u8,
        index_b: index_b as u8,
        type_a: FeatureType::Face,
        type_b: FeatureType::Vertex,
    };

    [
        ClipVertex { v: xf2.apply(poly2.vertices[i1]), id: feature(i1) },
        ClipVertex { v: xf2.apply(poly2.vertices[i2]), id: feature(i2) },
    ]
}

/// Separating-axis collision between two convex loops.
///
/// Find edge normal of max separation on A, then on B. If either separates
/// the shapes, there is no contact. Otherwise the face with the larger
/// separation (with a slight bias toward A) becomes the reference face and
/// the most anti-parallel edge of the other shape is clipped against its
/// side planes.
pub(crate) fn collide_convex(
    poly_a: ConvexView<'_>,
    xf_a: &Transform,
    poly_b: ConvexView<'_>,
    xf_b: &Transform,
) -> Manifold {
    let total_radius = poly_a.radius + poly_b.radius;

    let (edge_a, separation_a) = find_max_separation(poly_a, xf_a, poly_b, xf_b);
    if separation_a > total_radius {
        return Manifold::default();
    }

    let (edge_b, separation_b) = find_max_separation(poly_b, xf_b, poly_a, xf_a);
    if separation_b > total_radius {
        return Manifold::default();
    }

    const TOLERANCE: f32 = 0.1 * DEFAULT_LINEAR_SLOP;

    if separation_b > separation_a + TOLERANCE {
        clip_to_reference_face(poly_b, xf_b, edge_b, poly_a, xf_a, true)
    } else {
        clip_to_reference_face(poly_a, xf_a, edge_a, poly_b, xf_b, false)
    }
}

/// Clips the most anti-parallel edge of `poly2` against the side planes of
/// face `edge1` of `poly1`. With `flip` the manifold is expressed with
/// `poly2` as shape A.
pub(crate) fn clip_to_reference_face(
    poly1: ConvexView<'_>,
    xf1: &Transform,
    edge1: usize,
    poly2: ConvexView<'_>,
    xf2: &Transform,
    flip: bool,
) -> Manifold {
    let mut manifold = Manifold {
        kind: if flip { ManifoldType::FaceB } else { ManifoldType::FaceA },
        ..Manifold::default()
    };
    let total_radius = poly1.radius + poly2.radius;

    let incident_edge = find_incident_edge(poly1, xf1, edge1, poly2, xf2);

    let count1 = poly1.vertices.len();
    let iv1 = edge1;
    let iv2 = if edge1 + 1 < count1 { edge1 + 1 } else { 0 };

    let mut v11 = poly1.vertices[iv1];
    let mut v12 = poly1.vertices[iv2];

    let local_tangent = (v12 - v11).normalize();
    let local_normal = local_tangent.cross_scalar(1.0);
    let plane_point = (v11 + v12) * 0.5;

    let tangent = xf1.q.rotate(local_tangent);
    let normal = tangent.cross_scalar(1.0);

    v11 = xf1.apply(v11);
    v12 = xf1.apply(v12);

    // Face offset
    let front_offset = normal.dot(&v11);

    // Side offsets, extended by polytope skin thickness
    let side_offset1 = -tangent.dot(&v11) + total_radius;
    let side_offset2 = tangent.dot(&v12) + total_radius;

    // Clip incident edge against extruded edge1 side edges
    let mut clip_points1 = [ClipVertex::default(); 2];
    let mut clip_points2 = [ClipVertex::default(); 2];

    let np = clip_segment_to_line(&mut clip_points1, &incident_edge, -tangent, side_offset1, iv1);
    if np < 2 {
        return manifold;
    }

    let np = clip_segment_to_line(&mut clip_points2, &clip_points1, tangent, side_offset2, iv2);
    if np < 2 {
        return manifold;
    }

    manifold.local_normal = local_normal;
    manifold.local_point = plane_point;

    let mut point_count = 0;
    for clip in &clip_points2 {
        let separation = normal.dot(&clip.v) - front_offset;
        if separation <= total_radius {
            let cp = &mut manifold.points[point_count];
            cp.local_point = xf2.apply_inverse(clip.v);
            cp.id = if flip { clip.id.swapped() } else { clip.id };
            point_count += 1;
        }
    }

    manifold.point_count = point_count;
    manifold
}

/// Computes the manifold between two polygons
pub fn collide_polygons(
    poly_a: &PolygonShape,
    xf_a: &Transform,
    poly_b: &PolygonShape,
    xf_b: &Transform,
) -> Manifold {
    collide_convex(poly_a.into(), xf_a, poly_b.into(), xf_b)
}

use crate::core::config::MAX_MANIFOLD_POINTS;
use crate::math::{Vec2, Transform};

/// Kind of feature a contact point lies on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FeatureType {
    #[default]
    Vertex,
    Face,
}

/// Identifies the features of the two shapes that produced a contact point,
/// so that impulses can be matched across steps for warm starting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ContactFeature {
    /// Feature index on shape A
    pub index_a: u8,

    /// Feature index on shape B
    pub index_b: u8,

    /// Feature type on shape A
    pub type_a: FeatureType,

    /// Feature type on shape B
    pub type_b: FeatureType,
}

impl ContactFeature {
    /// Packs the feature into a single comparable key
    #[inline]
    pub fn key(&self) -> u32 {
        u32::from(self.index_a)
            | u32::from(self.index_b) << 8
            | (self.type_a as u32) << 16
            | (self.type_b as u32) << 24
    }

    /// The same feature with shapes A and B exchanged
    pub(crate) fn swapped(&self) -> Self {
        Self {
            index_a: self.index_b,
            index_b: self.index_a,
            type_a: self.type_b,
            type_b: self.type_a,
        }
    }
}

/// A manifold point is a contact point belonging to a contact manifold.
///
/// The local point usage depends on the manifold type:
/// - `Circles`: the local center of circle B
/// - `FaceA`: the local center of circle B or the clip point of polygon B
/// - `FaceB`: the clip point of polygon A
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ManifoldPoint {
    pub local_point: Vec2,

    /// The non-penetration impulse
    pub normal_impulse: f32,

    /// The friction impulse
    pub tangent_impulse: f32,

    /// Uniquely identifies a contact point between two shapes
    pub id: ContactFeature,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ManifoldType {
    #[default]
    Circles,
    FaceA,
    FaceB,
}

/// Contact points for two touching convex shapes, stored in local
/// coordinates so that they stay valid while the bodies move.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Manifold {
    pub points: [ManifoldPoint; MAX_MANIFOLD_POINTS],

    /// Not used for `Circles`
    pub local_normal: Vec2,

    /// Usage depends on the manifold type
    pub local_point: Vec2,

    pub kind: ManifoldType,

    /// The number of valid points
    pub point_count: usize,
}

impl Manifold {
    /// The valid points of this manifold
    #[inline]
    pub fn points(&self) -> &[ManifoldPoint] {
        &self.points[..self.point_count]
    }
}

/// A manifold expressed in world coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WorldManifold {
    /// World vector pointing from A to B
    pub normal: Vec2,

    /// World contact points, midway between the two surfaces
    pub points: [Vec2; MAX_MANIFOLD_POINTS],

    /// Negative value indicates overlap
    pub separations: [f32; MAX_MANIFOLD_POINTS],
}

impl WorldManifold {
    /// Evaluates the manifold with the supplied transforms and radii
    pub fn new(manifold: &Manifold, xf_a: &Transform, radius_a: f32, xf_b: &Transform, radius_b: f32) -> Self {
        let mut wm = Self::default();
        if manifold.point_count == 0 {
            return wm;
        }

        match manifold.kind {
            ManifoldType::Circles => {
                wm.normal = Vec2::new(1.0, 0.0);
                let point_a = xf_a.apply(manifold.local_point);
                let point_b = xf_b.apply(manifold.points[0].local_point);
                if point_a.distance_squared(&point_b) > f32::EPSILON * f32::EPSILON {
                    wm.normal = (point_b - point_a).normalize();
                }

                let c_a = point_a + wm.normal * radius_a;
                let c_b = point_b - wm.normal * radius_b;
                wm.points[0] = (c_a + c_b) * 0.5;
                wm.separations[0] = (c_b - c_a).dot(&wm.normal);
            }
            ManifoldType::FaceA => {
                wm.normal = xf_a.q.rotate(manifold.local_normal);
                let plane_point = xf_a.apply(manifold.local_point);

                for i in 0..manifold.point_count {
                    let clip_point = xf_b.apply(manifold.points[i].local_point);
                    let c_a = clip_point
                        + wm.normal * (radius_a - (clip_point - plane_point).dot(&wm.normal));
                    let c_b = clip_point - wm.normal * radius_b;
                    wm.points[i] = (c_a + c_b) * 0.5;
                    wm.separations[i] = (c_b - c_a).dot(&wm.normal);
                }
            }
            ManifoldType::FaceB => {
                wm.normal = xf_b.q.rotate(manifold.local_normal);
                let plane_point = xf_b.apply(manifold.local_point);

                for i in 0..manifold.point_count {
                    let clip_point = xf_a.apply(manifold.points[i].local_point);
                    let c_b = clip_point
                        + wm.normal * (radius_b - (clip_point - plane_point).dot(&wm.normal));
                    let c_a = clip_point - wm.normal * radius_a;
                    wm.points[i] = (c_a + c_b) * 0.5;
                    wm.separations[i] = (c_a - c_b).dot(&wm.normal);
                }

                // Ensure normal points from A to B
                wm.normal = -wm.normal;
            }
        }

        wm
    }
}

/// Used for computing contact manifolds
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ClipVertex {
    pub v: Vec2,
    pub id: ContactFeature,
}

/// Sutherland-Hodgman clipping of a segment against the half-space
/// `dot(normal, x) <= offset`. Returns the number of output points.
pub(crate) fn clip_segment_to_line(
    v_out: &mut [ClipVertex; 2],
    v_in: &[ClipVertex; 2],
    normal: Vec2,
    offset: f32,
    vertex_index_a: usize,
) -> usize {
    let mut count = 0;

    // Calculate the distance of end points to the line
    let distance0 = normal.dot(&v_in[0].v) - offset;
    let distance1 = normal.dot(&v_in[1].v) - offset;

    // If the points are behind the plane
    if distance0 <= 0.0 {
        v_out[count] = v_in[0];
        count += 1;
    }
    if distance1 <= 0.0 {
        v_out[count] = v_in[1];
        count += 1;
    }

    // If the points are on different sides of the plane
    if distance0 * distance1 < 0.0 && count < 2 {
        let interp = distance0 / (distance0 - distance1);
        v_out[count].v = v_in[0].v + (v_in[1].v - v_in[0].v) * interp;

        // VertexA is hitting edgeB
        v_out[count].id = ContactFeature {
            index_a: vertex_index_a as u8,
            index_b: v_in[0].id.index_b,
            type_a: FeatureType::Vertex,
            type_b: FeatureType::Face,
        };
        count += 1;
    }

    count
}

use crate::core::config::POLYGON_RADIUS;
use crate::error::PhysicsError;
use crate::math::{Vec2, Aabb, Transform, RayCastInput, RayCastOutput};
use crate::shapes::MassData;
use crate::Result;

/// A line segment. Edges can be chained by supplying ghost vertices, which
/// let circles slide across the joins without catching on internal corners.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeShape {
    /// First core vertex
    pub v1: Vec2,

    /// Second core vertex
    pub v2: Vec2,

    /// Ghost vertex preceding `v1`
    pub v0: Option<Vec2>,

    /// Ghost vertex following `v2`
    pub v3: Option<Vec2>,

    /// Skin radius
    pub radius: f32,
}

impl EdgeShape {
    /// Creates a segment between two local points
    pub fn new(v1: Vec2, v2: Vec2) -> Result<Self> {
        if !v1.is_valid() || !v2.is_valid() {
            return Err(PhysicsError::InvalidParameter("Edge vertices must be finite".to_string()));
        }
        if v1.distance_squared(&v2) <= f32::EPSILON * f32::EPSILON {
            tracing::warn!("rejected zero-length edge");
            return Err(PhysicsError::DegenerateGeometry(format!(
                "Edge from {} to {} has zero length", v1, v2
            )));
        }
        Ok(Self { v1, v2, v0: None, v3: None, radius: POLYGON_RADIUS })
    }

    /// Sets the ghost vertices used to smooth collisions at chain joins
    pub fn with_ghosts(mut self, v0: Option<Vec2>, v3: Option<Vec2>) -> Self {
        self.v0 = v0;
        self.v3 = v3;
        self
    }

    /// Bounds of the shape under the transform
    pub(crate) fn compute_aabb(&self, xf: &Transform) -> Aabb {
        let v1 = xf.apply(self.v1);
        let v2 = xf.apply(self.v2);
        let r = Vec2::new(self.radius, self.radius);
        Aabb::new(v1.min(&v2) - r, v1.max(&v2) + r)
    }

    /// Edges have no area and no mass
    pub(crate) fn compute_mass(&self) -> MassData {
        MassData {
            mass: 0.0,
            center: (self.v1 + self.v2) * 0.5,
            inertia: 0.0,
        }
    }

    /// Casts a ray against the shape under the transform
    pub(crate) fn ray_cast(&self, input: &RayCastInput, xf: &Transform) -> Option<RayCastOutput> {
        // Put the ray into the edge's frame of reference
        let p1 = xf.apply_inverse(input.p1);
        let p2 = xf.apply_inverse(input.p2);
        let d = p2 - p1;

        let e = self.v2 - self.v1;
        let normal = Vec2::new(e.y, -e.x).normalize();

        // q = p1 + t * d
        // dot(normal, q - v1) = 0
        let numerator = normal.dot(&(self.v1 - p1));
        let denominator = normal.dot(&d);
        if denominator == 0.0 {
            return None;
        }

        let t = numerator / denominator;
        if t < 0.0 || input.max_fraction < t {
            return None;
        }

        let q = p1 + d * t;

        // q = v1 + s * r
        let rr = e.dot(&e);
        if rr == 0.0 {
            return None;
        }
        let s = (q - self.v1).dot(&e) / rr;
        if !(0.0..=1.0).contains(&s) {
            return None;
        }

        let normal = xf.q.rotate(normal);
        Some(RayCastOutput {
            normal: if numerator > 0.0 { -normal } else { normal },
            fraction: t,
        })
    }

    /// Distance from a world point to the shape and the unit direction away from it
    pub(crate) fn compute_distance(&self, xf: &Transform, p: Vec2) -> (f32, Vec2) {
        let v1 = xf.apply(self.v1);
        let v2 = xf.apply(self.v2);

        let mut d = p - v1;
        let s = v2 - v1;
        let ds = d.dot(&s);
        if ds > 0.0 {
            let s2 = s.dot(&s);
            if ds > s2 {
                d = p - v2;
            } else {
                d -= s * (ds / s2);
            }
        }

        let distance = d.normalize_mut();
        (distance, d)
    }
}

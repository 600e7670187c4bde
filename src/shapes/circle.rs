use crate::error::PhysicsError;
use crate::math::{Vec2, Aabb, Transform, RayCastInput, RayCastOutput};
use crate::shapes::MassData;
use crate::Result;

/// A solid circle, optionally offset from the body origin
#[derive(Debug, Clone, PartialEq)]
pub struct CircleShape {
    /// Center in body-local coordinates
    pub position: Vec2,

    /// The radius of the circle
    pub radius: f32,
}

impl CircleShape {
    /// Creates a new circle centered on the body origin
    pub fn new(radius: f32) -> Result<Self> {
        Self::with_position(Vec2::zero(), radius)
    }

    /// Creates a new circle at the given local position
    pub fn with_position(position: Vec2, radius: f32) -> Result<Self> {
        if radius <= 0.0 || !radius.is_finite() {
            tracing::warn!(radius, "rejected circle with non-positive radius");
            return Err(PhysicsError::DegenerateGeometry(format!(
                "Circle radius must be positive, got {}", radius
            )));
        }
        if !position.is_valid() {
            return Err(PhysicsError::InvalidParameter(format!(
                "Circle position must be finite, got {}", position
            )));
        }
        Ok(Self { position, radius })
    }

    /// Bounds of the shape under the transform
    pub(crate) fn compute_aabb(&self, xf: &Transform) -> Aabb {
        let p = xf.apply(self.position);
        Aabb::new(
            Vec2::new(p.x - self.radius, p.y - self.radius),
            Vec2::new(p.x + self.radius, p.y + self.radius),
        )
    }

    /// Mass, centroid and rotational inertia at the given density
    pub(crate) fn compute_mass(&self, density: f32) -> MassData {
        let r2 = self.radius * self.radius;
        let mass = density * std::f32::consts::PI * r2;
        MassData {
            mass,
            center: self.position,
            // Inertia about the local origin
            inertia: mass * (0.5 * r2 + self.position.dot(&self.position)),
        }
    }

    /// Whether a world point lies inside the shape
    pub(crate) fn test_point(&self, xf: &Transform, p: Vec2) -> bool {
        let center = xf.apply(self.position);
        (p - center).length_squared() <= self.radius * self.radius
    }

    /// Casts a ray against the shape under the transform
    pub(crate) fn ray_cast(&self, input: &RayCastInput, xf: &Transform) -> Option<RayCastOutput> {
        let position = xf.apply(self.position);
        let s = input.p1 - position;
        let b = s.dot(&s) - self.radius * self.radius;

        // Solve quadratic equation
        let r = input.p2 - input.p1;
        let c = s.dot(&r);
        let rr = r.dot(&r);
        let sigma = c * c - rr * b;

        if sigma < 0.0 || rr < f32::EPSILON {
            return None;
        }

        let a = -(c + sigma.sqrt());
        if 0.0 <= a && a <= input.max_fraction * rr {
            let a = a / rr;
            Some(RayCastOutput {
                normal: (s + r * a).normalize(),
                fraction: a,
            })
        } else {
            None
        }
    }

    /// Distance from a world point to the shape and the unit direction away from it
    pub(crate) fn compute_distance(&self, xf: &Transform, p: Vec2) -> (f32, Vec2) {
        let center = xf.apply(self.position);
        let mut d = p - center;
        let length = d.normalize_mut();
        (length - self.radius, d)
    }
}

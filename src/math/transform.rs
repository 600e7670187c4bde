use crate::math::{Vec2, Rot};

#[cfg(feature = "serialize")]
use serde::{Serialize, Deserialize};

/// A rigid transformation in 2D space (translation and rotation)
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Transform {
    /// Translation
    pub p: Vec2,

    /// Rotation
    pub q: Rot,
}

impl Transform {
    /// Creates a new transform from a position and a rotation
    #[inline]
    pub fn new(p: Vec2, q: Rot) -> Self {
        Self { p, q }
    }

    /// Creates a new identity transform
    #[inline]
    pub const fn identity() -> Self {
        Self {
            p: Vec2::zero(),
            q: Rot::identity(),
        }
    }

    /// Creates a new transform from a position and an angle in radians
    #[inline]
    pub fn from_position_angle(p: Vec2, angle: f32) -> Self {
        Self { p, q: Rot::new(angle) }
    }

    /// Creates a new transform from just a position
    #[inline]
    pub fn from_position(p: Vec2) -> Self {
        Self { p, q: Rot::identity() }
    }

    /// Sets position and angle
    #[inline]
    pub fn set(&mut self, p: Vec2, angle: f32) {
        self.p = p;
        self.q.set(angle);
    }

    /// Transforms a point from local space to world space
    #[inline]
    pub fn apply(&self, v: Vec2) -> Vec2 {
        self.q.rotate(v) + self.p
    }

    /// Transforms a point from world space to local space
    #[inline]
    pub fn apply_inverse(&self, v: Vec2) -> Vec2 {
        self.q.inv_rotate(v - self.p)
    }

    /// Composes two transforms: `self * other`
    #[inline]
    pub fn mul(&self, other: &Transform) -> Transform {
        Transform {
            q: self.q.mul(&other.q),
            p: self.q.rotate(other.p) + self.p,
        }
    }

    /// Relative transform: `self^-1 * other`
    #[inline]
    pub fn mul_t(&self, other: &Transform) -> Transform {
        Transform {
            q: self.q.mul_t(&other.q),
            p: self.q.inv_rotate(other.p - self.p),
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Describes the motion of a body for one step. Shapes are defined with
/// respect to the body origin, which may not coincide with the center of
/// mass; the sweep tracks the center of mass so that rotation happens
/// about it.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Sweep {
    /// Local center of mass position
    pub local_center: Vec2,

    /// World center position at the start of the step
    pub c0: Vec2,

    /// World center position at the end of the step
    pub c: Vec2,

    /// World angle at the start of the step
    pub a0: f32,

    /// World angle at the end of the step
    pub a: f32,
}

impl Sweep {
    /// Gets the interpolated transform at a specific time in [0, 1]
    pub fn transform_at(&self, beta: f32) -> Transform {
        let c = self.c0 * (1.0 - beta) + self.c * beta;
        let angle = (1.0 - beta) * self.a0 + beta * self.a;
        let q = Rot::new(angle);
        Transform {
            p: c - q.rotate(self.local_center),
            q,
        }
    }
}

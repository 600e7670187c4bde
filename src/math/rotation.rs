use crate::math::Vec2;

#[cfg(feature = "serialize")]
use serde::{Serialize, Deserialize};

/// A 2D rotation stored as the sine and cosine of its angle
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Rot {
    /// Sine of the angle
    pub s: f32,

    /// Cosine of the angle
    pub c: f32,
}

impl Rot {
    /// Creates a rotation from an angle in radians
    #[inline]
    pub fn new(angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        Self { s, c }
    }

    /// The identity rotation
    #[inline]
    pub const fn identity() -> Self {
        Self { s: 0.0, c: 1.0 }
    }

    /// Sets the rotation from an angle in radians
    #[inline]
    pub fn set(&mut self, angle: f32) {
        let (s, c) = angle.sin_cos();
        self.s = s;
        self.c = c;
    }

    /// Returns the angle in radians, in the range [-pi, pi]
    #[inline]
    pub fn angle(&self) -> f32 {
        self.s.atan2(self.c)
    }

    /// Returns the rotated x-axis
    #[inline]
    pub fn x_axis(&self) -> Vec2 {
        Vec2::new(self.c, self.s)
    }

    /// Returns the rotated y-axis
    #[inline]
    pub fn y_axis(&self) -> Vec2 {
        Vec2::new(-self.s, self.c)
    }

    /// Rotates a vector
    #[inline]
    pub fn rotate(&self, v: Vec2) -> Vec2 {
        Vec2::new(self.c * v.x - self.s * v.y, self.s * v.x + self.c * v.y)
    }

    /// Applies the inverse rotation to a vector
    #[inline]
    pub fn inv_rotate(&self, v: Vec2) -> Vec2 {
        Vec2::new(self.c * v.x + self.s * v.y, -self.s * v.x + self.c * v.y)
    }

    /// Composes two rotations: `self * other`
    #[inline]
    pub fn mul(&self, other: &Rot) -> Rot {
        Rot {
            s: self.s * other.c + self.c * other.s,
            c: self.c * other.c - self.s * other.s,
        }
    }

    /// Composes the inverse of this rotation with another: `self^T * other`
    #[inline]
    pub fn mul_t(&self, other: &Rot) -> Rot {
        Rot {
            s: self.c * other.s - self.s * other.c,
            c: self.c * other.c + self.s * other.s,
        }
    }
}

impl Default for Rot {
    fn default() -> Self {
        Self::identity()
    }
}

use nalgebra as na;
use crate::math::Vec2;
use std::ops::{Add, Sub, Mul, Neg, AddAssign, SubAssign};

#[cfg(feature = "serialize")]
use serde::{Serialize, Deserialize};

/// A 3-component vector, used by solvers that couple linear and angular rows
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    #[inline]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub const fn zero() -> Self {
        Self { x: 0.0, y: 0.0, z: 0.0 }
    }

    #[inline]
    pub fn dot(&self, other: &Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    #[inline]
    pub fn cross(&self, other: &Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// The first two components as a 2D vector
    #[inline]
    pub fn xy(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

impl Add for Vec3 {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Self;

    #[inline]
    fn mul(self, s: f32) -> Self {
        Self::new(self.x * s, self.y * s, self.z * s)
    }
}

impl Neg for Vec3 {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

impl AddAssign for Vec3 {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.x += other.x;
        self.y += other.y;
        self.z += other.z;
    }
}

impl SubAssign for Vec3 {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.x -= other.x;
        self.y -= other.y;
        self.z -= other.z;
    }
}

/// A 2x2 matrix stored as two column vectors
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Mat22 {
    pub ex: Vec2,
    pub ey: Vec2,
}

impl Mat22 {
    /// Creates a new matrix from its columns
    #[inline]
    pub const fn new(ex: Vec2, ey: Vec2) -> Self {
        Self { ex, ey }
    }

    #[inline]
    pub const fn zero() -> Self {
        Self { ex: Vec2::zero(), ey: Vec2::zero() }
    }

    #[inline]
    pub const fn identity() -> Self {
        Self { ex: Vec2::unit_x(), ey: Vec2::unit_y() }
    }

    #[inline]
    pub fn determinant(&self) -> f32 {
        self.ex.x * self.ey.y - self.ey.x * self.ex.y
    }

    /// Returns the inverse, or the zero matrix when singular
    pub fn inverse(&self) -> Self {
        let det = self.determinant();
        let det = if det != 0.0 { 1.0 / det } else { det };
        Self {
            ex: Vec2::new(det * self.ey.y, -det * self.ex.y),
            ey: Vec2::new(-det * self.ey.x, det * self.ex.x),
        }
    }

    /// Solves `A * x = b`. A singular matrix yields the zero vector.
    pub fn solve(&self, b: Vec2) -> Vec2 {
        let det = self.determinant();
        let det = if det != 0.0 { 1.0 / det } else { det };
        Vec2::new(
            det * (self.ey.y * b.x - self.ey.x * b.y),
            det * (self.ex.x * b.y - self.ex.y * b.x),
        )
    }

    /// Multiplies a vector by this matrix
    #[inline]
    pub fn mul_vec(&self, v: Vec2) -> Vec2 {
        Vec2::new(
            self.ex.x * v.x + self.ey.x * v.y,
            self.ex.y * v.x + self.ey.y * v.y,
        )
    }

    /// Convert to nalgebra Matrix2
    pub fn to_nalgebra(&self) -> na::Matrix2<f32> {
        na::Matrix2::new(self.ex.x, self.ey.x, self.ex.y, self.ey.y)
    }
}

/// A 3x3 matrix stored as three column vectors
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Mat33 {
    pub ex: Vec3,
    pub ey: Vec3,
    pub ez: Vec3,
}

impl Mat33 {
    #[inline]
    pub const fn new(ex: Vec3, ey: Vec3, ez: Vec3) -> Self {
        Self { ex, ey, ez }
    }

    #[inline]
    pub const fn zero() -> Self {
        Self { ex: Vec3::zero(), ey: Vec3::zero(), ez: Vec3::zero() }
    }

    /// Solves `A * x = b`. A singular matrix yields the zero vector.
    pub fn solve33(&self, b: Vec3) -> Vec3 {
        let det = self.ex.dot(&self.ey.cross(&self.ez));
        let det = if det != 0.0 { 1.0 / det } else { det };
        Vec3::new(
            det * b.dot(&self.ey.cross(&self.ez)),
            det * self.ex.dot(&b.cross(&self.ez)),
            det * self.ex.dot(&self.ey.cross(&b)),
        )
    }

    /// Solves the upper 2x2 block `A * x = b`, ignoring the third row and column
    pub fn solve22(&self, b: Vec2) -> Vec2 {
        let (a11, a12, a21, a22) = (self.ex.x, self.ey.x, self.ex.y, self.ey.y);
        let det = a11 * a22 - a12 * a21;
        let det = if det != 0.0 { 1.0 / det } else { det };
        Vec2::new(det * (a22 * b.x - a12 * b.y), det * (a11 * b.y - a21 * b.x))
    }

    /// Inverse of the upper 2x2 block, embedded in a 3x3 matrix with zeros elsewhere
    pub fn inverse22(&self) -> Mat33 {
        let inv = Mat22::new(self.ex.xy(), self.ey.xy()).inverse();
        Mat33 {
            ex: Vec3::new(inv.ex.x, inv.ex.y, 0.0),
            ey: Vec3::new(inv.ey.x, inv.ey.y, 0.0),
            ez: Vec3::zero(),
        }
    }

    /// Symmetric inverse. Returns the zero matrix when singular.
    pub fn sym_inverse33(&self) -> Mat33 {
        match self.to_nalgebra().try_inverse() {
            Some(m) => {
                // Symmetrize to discard round-off in the off-diagonal terms
                let s = (m + m.transpose()) * 0.5;
                Mat33::from_nalgebra(&s)
            }
            None => Mat33::zero(),
        }
    }

    /// Multiplies a vector by this matrix
    #[inline]
    pub fn mul_vec3(&self, v: Vec3) -> Vec3 {
        self.ex * v.x + self.ey * v.y + self.ez * v.z
    }

    /// Multiplies a 2D vector by the upper 2x2 block
    #[inline]
    pub fn mul_vec2(&self, v: Vec2) -> Vec2 {
        Vec2::new(
            self.ex.x * v.x + self.ey.x * v.y,
            self.ex.y * v.x + self.ey.y * v.y,
        )
    }

    /// Convert to nalgebra Matrix3
    pub fn to_nalgebra(&self) -> na::Matrix3<f32> {
        na::Matrix3::new(
            self.ex.x, self.ey.x, self.ez.x,
            self.ex.y, self.ey.y, self.ez.y,
            self.ex.z, self.ey.z, self.ez.z,
        )
    }

    /// Convert from nalgebra Matrix3
    pub fn from_nalgebra(m: &na::Matrix3<f32>) -> Self {
        Self {
            ex: Vec3::new(m[(0, 0)], m[(1, 0)], m[(2, 0)]),
            ey: Vec3::new(m[(0, 1)], m[(1, 1)], m[(2, 1)]),
            ez: Vec3::new(m[(0, 2)], m[(1, 2)], m[(2, 2)]),
        }
    }
}

mod vector;
mod matrix;
mod transform;
mod rotation;
mod aabb;
mod ray;

pub use vector::Vec2;
pub use matrix::{Mat22, Mat33, Vec3};
pub use transform::{Transform, Sweep};
pub use rotation::Rot;
pub use aabb::Aabb;
pub use ray::{RayCastInput, RayCastOutput};

/// Lengths and squared lengths below this are treated as zero
pub const EPSILON: f32 = 1.0e-6;

/// Returns true if the value is approximately zero
#[inline]
pub fn approx_zero(a: f32) -> bool {
    a.abs() < EPSILON
}

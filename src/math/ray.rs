use crate::math::Vec2;

/// Segment cast input. The ray extends from `p1` to `p1 + max_fraction * (p2 - p1)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayCastInput {
    pub p1: Vec2,
    pub p2: Vec2,
    pub max_fraction: f32,
}

impl RayCastInput {
    /// Creates a cast covering the full segment `p1 -> p2`
    pub fn new(p1: Vec2, p2: Vec2) -> Self {
        Self { p1, p2, max_fraction: 1.0 }
    }

    /// Point along the segment at the given fraction
    #[inline]
    pub fn point_at(&self, fraction: f32) -> Vec2 {
        self.p1 + (self.p2 - self.p1) * fraction
    }
}

/// Segment cast result: the surface normal and the hit fraction along the input segment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayCastOutput {
    pub normal: Vec2,
    pub fraction: f32,
}

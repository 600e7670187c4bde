use crate::math::{Vec2, RayCastInput, RayCastOutput};

#[cfg(feature = "serialize")]
use serde::{Serialize, Deserialize};

/// Axis-Aligned Bounding Box (AABB) used by the broadphase and queries
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Aabb {
    /// Lower corner of the AABB
    pub lower: Vec2,

    /// Upper corner of the AABB
    pub upper: Vec2,
}

impl Aabb {
    /// Creates a new AABB from its lower and upper corners
    #[inline]
    pub fn new(lower: Vec2, upper: Vec2) -> Self {
        Self { lower, upper }
    }

    /// Creates an AABB centered at a position with the given half extents
    #[inline]
    pub fn from_center_half_extents(center: Vec2, half_extents: Vec2) -> Self {
        Self {
            lower: center - half_extents,
            upper: center + half_extents,
        }
    }

    /// Creates an AABB from a set of points
    pub fn from_points(points: &[Vec2]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let mut aabb = Self::new(*first, *first);
        for point in rest {
            aabb.lower = aabb.lower.min(point);
            aabb.upper = aabb.upper.max(point);
        }
        Some(aabb)
    }

    /// Returns true if the bounds are sorted and finite
    pub fn is_valid(&self) -> bool {
        let d = self.upper - self.lower;
        d.x >= 0.0 && d.y >= 0.0 && self.lower.is_valid() && self.upper.is_valid()
    }

    /// Returns the center of the AABB
    #[inline]
    pub fn center(&self) -> Vec2 {
        (self.lower + self.upper) * 0.5
    }

    /// Returns the half extents of the AABB
    #[inline]
    pub fn extents(&self) -> Vec2 {
        (self.upper - self.lower) * 0.5
    }

    /// Returns the perimeter length
    #[inline]
    pub fn perimeter(&self) -> f32 {
        2.0 * ((self.upper.x - self.lower.x) + (self.upper.y - self.lower.y))
    }

    /// Checks if this AABB contains a point
    #[inline]
    pub fn contains_point(&self, point: Vec2) -> bool {
        point.x >= self.lower.x && point.x <= self.upper.x
            && point.y >= self.lower.y && point.y <= self.upper.y
    }

    /// Checks if this AABB fully contains another AABB
    #[inline]
    pub fn contains(&self, other: &Self) -> bool {
        self.lower.x <= other.lower.x && self.lower.y <= other.lower.y
            && other.upper.x <= self.upper.x && other.upper.y <= self.upper.y
    }

    /// Checks if this AABB overlaps another AABB
    #[inline]
    pub fn overlaps(&self, other: &Self) -> bool {
        !(other.lower.x > self.upper.x || other.lower.y > self.upper.y
            || self.lower.x > other.upper.x || self.lower.y > other.upper.y)
    }

    /// Returns the smallest AABB containing both
    #[inline]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            lower: self.lower.min(&other.lower),
            upper: self.upper.max(&other.upper),
        }
    }

    /// Returns an expanded AABB by the given margin on every side
    #[inline]
    pub fn expand(&self, margin: f32) -> Self {
        let r = Vec2::new(margin, margin);
        Self {
            lower: self.lower - r,
            upper: self.upper + r,
        }
    }

    /// Translates the AABB
    #[inline]
    pub fn translate(&mut self, offset: Vec2) {
        self.lower += offset;
        self.upper += offset;
    }

    /// Slab test against a segment. Returns the entry fraction and the face
    /// normal, or `None` when the segment misses or starts inside.
    pub fn ray_cast(&self, input: &RayCastInput) -> Option<RayCastOutput> {
        let mut tmin = f32::MIN;
        let mut tmax = f32::MAX;

        let p = input.p1;
        let d = input.p2 - input.p1;
        let abs_d = d.abs();
        let mut normal = Vec2::zero();

        for i in 0..2 {
            if abs_d[i] < f32::EPSILON {
                // Parallel
                if p[i] < self.lower[i] || self.upper[i] < p[i] {
                    return None;
                }
            } else {
                let inv_d = 1.0 / d[i];
                let mut t1 = (self.lower[i] - p[i]) * inv_d;
                let mut t2 = (self.upper[i] - p[i]) * inv_d;

                let mut s = -1.0;
                if t1 > t2 {
                    std::mem::swap(&mut t1, &mut t2);
                    s = 1.0;
                }

                if t1 > tmin {
                    normal = Vec2::zero();
                    normal[i] = s;
                    tmin = t1;
                }

                tmax = tmax.min(t2);
                if tmin > tmax {
                    return None;
                }
            }
        }

        if tmin < 0.0 || input.max_fraction < tmin {
            return None;
        }

        Some(RayCastOutput { normal, fraction: tmin })
    }
}

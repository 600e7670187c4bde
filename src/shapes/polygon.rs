use crate::core::config::{MAX_POLYGON_VERTICES, POLYGON_RADIUS, DEFAULT_LINEAR_SLOP};
use crate::error::PhysicsError;
use crate::math::{Vec2, Aabb, Rot, Transform, RayCastInput, RayCastOutput};
use crate::shapes::MassData;
use crate::Result;

/// A solid convex polygon with counter-clockwise winding.
///
/// Polygons carry a small skin radius (`POLYGON_RADIUS`) so that the
/// narrow phase keeps them slightly apart, which keeps stacking stable.
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonShape {
    vertices: [Vec2; MAX_POLYGON_VERTICES],
    normals: [Vec2; MAX_POLYGON_VERTICES],
    count: usize,

    /// Area centroid in body-local coordinates
    pub centroid: Vec2,

    /// Skin radius
    pub radius: f32,
}

impl PolygonShape {
    /// Builds a convex polygon from the hull of the given points.
    ///
    /// Points closer than half the linear slop are welded together. Fails
    /// when fewer than three distinct hull points remain or when more than
    /// `MAX_POLYGON_VERTICES` points are supplied.
    pub fn new(points: &[Vec2]) -> Result<Self> {
        if points.len() < 3 {
            tracing::warn!(count = points.len(), "rejected polygon with too few vertices");
            return Err(PhysicsError::DegenerateGeometry(format!(
                "Polygon needs at least 3 vertices, got {}", points.len()
            )));
        }
        if points.len() > MAX_POLYGON_VERTICES {
            tracing::warn!(count = points.len(), "rejected polygon with too many vertices");
            return Err(PhysicsError::DegenerateGeometry(format!(
                "Polygon supports at most {} vertices, got {}", MAX_POLYGON_VERTICES, points.len()
            )));
        }
        if points.iter().any(|p| !p.is_valid()) {
            return Err(PhysicsError::InvalidParameter("Polygon vertices must be finite".to_string()));
        }

        let hull = compute_hull(points);
        if hull.len() < 3 {
            tracing::warn!("rejected collinear or welded polygon");
            return Err(PhysicsError::DegenerateGeometry(
                "Polygon hull has fewer than 3 distinct vertices".to_string(),
            ));
        }

        let count = hull.len();
        let mut vertices = [Vec2::zero(); MAX_POLYGON_VERTICES];
        let mut normals = [Vec2::zero(); MAX_POLYGON_VERTICES];
        vertices[..count].copy_from_slice(&hull);

        for i in 0..count {
            let next = if i + 1 < count { i + 1 } else { 0 };
            let edge = vertices[next] - vertices[i];
            if edge.length_squared() <= f32::EPSILON * f32::EPSILON {
                return Err(PhysicsError::DegenerateGeometry(
                    "Polygon has a zero-length edge".to_string(),
                ));
            }
            normals[i] = edge.cross_scalar(1.0).normalize();
        }

        let centroid = compute_centroid(&vertices[..count]);

        Ok(Self {
            vertices,
            normals,
            count,
            centroid,
            radius: POLYGON_RADIUS,
        })
    }

    /// Creates an axis-aligned box centered on the body origin
    pub fn new_box(half_width: f32, half_height: f32) -> Result<Self> {
        Self::new_oriented_box(half_width, half_height, Vec2::zero(), 0.0)
    }

    /// Creates a box with the given local center and rotation
    pub fn new_oriented_box(half_width: f32, half_height: f32, center: Vec2, angle: f32) -> Result<Self> {
        if half_width <= 0.0 || half_height <= 0.0 || !half_width.is_finite() || !half_height.is_finite() {
            tracing::warn!(half_width, half_height, "rejected box with non-positive extents");
            return Err(PhysicsError::DegenerateGeometry(format!(
                "Box extents must be positive, got {} x {}", half_width, half_height
            )));
        }

        let xf = Transform::new(center, Rot::new(angle));
        let corners = [
            Vec2::new(-half_width, -half_height),
            Vec2::new(half_width, -half_height),
            Vec2::new(half_width, half_height),
            Vec2::new(-half_width, half_height),
        ];
        let local_normals = [
            Vec2::new(0.0, -1.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 1.0),
            Vec2::new(-1.0, 0.0),
        ];

        let mut vertices = [Vec2::zero(); MAX_POLYGON_VERTICES];
        let mut normals = [Vec2::zero(); MAX_POLYGON_VERTICES];
        for i in 0..4 {
            vertices[i] = xf.apply(corners[i]);
            normals[i] = xf.q.rotate(local_normals[i]);
        }

        Ok(Self {
            vertices,
            normals,
            count: 4,
            centroid: center,
            radius: POLYGON_RADIUS,
        })
    }

    /// Returns the hull vertices in counter-clockwise order
    #[inline]
    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices[..self.count]
    }

    /// Returns the outward edge normals; normal `i` belongs to edge `i -> i+1`
    #[inline]
    pub fn normals(&self) -> &[Vec2] {
        &self.normals[..self.count]
    }

    /// Returns the number of vertices
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.count
    }

    /// Bounds of the shape under the transform
    pub(crate) fn compute_aabb(&self, xf: &Transform) -> Aabb {
        let mut lower = xf.apply(self.vertices[0]);
        let mut upper = lower;
        for v in &self.vertices[1..self.count] {
            let p = xf.apply(*v);
            lower = lower.min(&p);
            upper = upper.max(&p);
        }
        let r = Vec2::new(self.radius, self.radius);
        Aabb::new(lower - r, upper + r)
    }

    /// Mass, centroid and rotational inertia at the given density
    pub(crate) fn compute_mass(&self, density: f32) -> MassData {
        // Triangle fan from a reference point inside the polygon. The
        // polygon skin is ignored.
        let vertices = self.vertices();
        let s = vertices.iter().fold(Vec2::zero(), |acc, v| acc + *v) * (1.0 / self.count as f32);

        const INV3: f32 = 1.0 / 3.0;
        let mut center = Vec2::zero();
        let mut area = 0.0;
        let mut inertia = 0.0;

        for i in 0..self.count {
            let e1 = vertices[i] - s;
            let e2 = if i + 1 < self.count { vertices[i + 1] - s } else { vertices[0] - s };

            let d = e1.cross(&e2);
            let triangle_area = 0.5 * d;
            area += triangle_area;
            center += (e1 + e2) * (triangle_area * INV3);

            let int_x2 = e1.x * e1.x + e2.x * e1.x + e2.x * e2.x;
            let int_y2 = e1.y * e1.y + e2.y * e1.y + e2.y * e2.y;
            inertia += (0.25 * INV3 * d) * (int_x2 + int_y2);
        }

        let mass = density * area;
        let center = if area > f32::EPSILON { center * (1.0 / area) } else { Vec2::zero() };
        let world_center = center + s;

        // Shift inertia from the reference point to the body origin
        let inertia = density * inertia
            + mass * (world_center.dot(&world_center) - center.dot(&center));

        MassData { mass, center: world_center, inertia }
    }

    /// Whether a world point lies inside the shape
    pub(crate) fn test_point(&self, xf: &Transform, p: Vec2) -> bool {
        let local = xf.apply_inverse(p);
        self.vertices()
            .iter()
            .zip(self.normals())
            .all(|(v, n)| n.dot(&(local - *v)) <= 0.0)
    }

    /// Casts a ray against the shape under the transform
    pub(crate) fn ray_cast(&self, input: &RayCastInput, xf: &Transform) -> Option<RayCastOutput> {
        // Put the ray into the polygon's frame of reference
        let p1 = xf.apply_inverse(input.p1);
        let p2 = xf.apply_inverse(input.p2);
        let d = p2 - p1;

        let mut lower = 0.0f32;
        let mut upper = input.max_fraction;
        let mut index = None;

        for i in 0..self.count {
            // p = p1 + a * d
            // dot(normal, p - v) = 0
            // dot(normal, p1 - v) + a * dot(normal, d) = 0
            let numerator = self.normals[i].dot(&(self.vertices[i] - p1));
            let denominator = self.normals[i].dot(&d);

            if denominator == 0.0 {
                if numerator < 0.0 {
                    return None;
                }
            } else if denominator < 0.0 && numerator < lower * denominator {
                // Entering this half-space
                lower = numerator / denominator;
                index = Some(i);
            } else if denominator > 0.0 && numerator < upper * denominator {
                // Leaving this half-space
                upper = numerator / denominator;
            }

            if upper < lower {
                return None;
            }
        }

        index.map(|i| RayCastOutput {
            normal: xf.q.rotate(self.normals[i]),
            fraction: lower,
        })
    }

    /// Distance from a world point to the shape and the unit direction away from it
    pub(crate) fn compute_distance(&self, xf: &Transform, p: Vec2) -> (f32, Vec2) {
        let local = xf.apply_inverse(p);
        let mut max_distance = f32::MIN;
        let mut normal_for_max = local;

        for i in 0..self.count {
            let dot = self.normals[i].dot(&(local - self.vertices[i]));
            if dot > max_distance {
                max_distance = dot;
                normal_for_max = self.normals[i];
            }
        }

        if max_distance > 0.0 {
            // Outside: the closest feature may be a vertex
            let mut min_distance = normal_for_max;
            let mut min_distance2 = max_distance * max_distance;
            for v in self.vertices() {
                let distance = local - *v;
                let distance2 = distance.length_squared();
                if min_distance2 > distance2 {
                    min_distance = distance;
                    min_distance2 = distance2;
                }
            }
            (min_distance2.sqrt(), xf.q.rotate(min_distance).normalize())
        } else {
            (max_distance, xf.q.rotate(normal_for_max))
        }
    }
}

/// Gift-wrapping hull over the welded input points, counter-clockwise,
/// starting from the right-most (then lowest) point.
fn compute_hull(points: &[Vec2]) -> Vec<Vec2> {
    let weld_tolerance = 0.5 * DEFAULT_LINEAR_SLOP;
    let mut ps: Vec<Vec2> = Vec::with_capacity(points.len());
    for p in points {
        if ps.iter().all(|q| p.distance_squared(q) >= weld_tolerance * weld_tolerance) {
            ps.push(*p);
        }
    }

    let n = ps.len();
    if n < 3 {
        return ps;
    }

    let mut i0 = 0;
    let mut x0 = ps[0].x;
    for (i, p) in ps.iter().enumerate().skip(1) {
        if p.x > x0 || (p.x == x0 && p.y < ps[i0].y) {
            i0 = i;
            x0 = p.x;
        }
    }

    let mut hull: Vec<usize> = Vec::with_capacity(n);
    let mut ih = i0;
    loop {
        hull.push(ih);

        let mut ie = 0;
        for j in 1..n {
            if ie == ih {
                ie = j;
                continue;
            }

            let r = ps[ie] - ps[ih];
            let v = ps[j] - ps[ih];
            let c = r.cross(&v);
            if c < 0.0 {
                ie = j;
            }

            // Collinearity check
            if c == 0.0 && v.length_squared() > r.length_squared() {
                ie = j;
            }
        }

        ih = ie;
        if ie == i0 || hull.len() > n {
            break;
        }
    }

    hull.into_iter().map(|i| ps[i]).collect()
}

fn compute_centroid(vertices: &[Vec2]) -> Vec2 {
    const INV3: f32 = 1.0 / 3.0;
    let reference = vertices[0];
    let mut c = Vec2::zero();
    let mut area = 0.0;

    for i in 0..vertices.len() {
        let p1 = reference;
        let p2 = vertices[i];
        let p3 = if i + 1 < vertices.len() { vertices[i + 1] } else { vertices[0] };

        let e1 = p2 - p1;
        let e2 = p3 - p1;
        let triangle_area = 0.5 * e1.cross(&e2);
        area += triangle_area;
        c += (p1 + p2 + p3) * (triangle_area * INV3);
    }

    if area > f32::EPSILON {
        c * (1.0 / area)
    } else {
        reference
    }
}

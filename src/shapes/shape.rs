use crate::math::{Vec2, Aabb, Transform, RayCastInput, RayCastOutput};
use crate::shapes::{CircleShape, PolygonShape, EdgeShape};

#[cfg(feature = "serialize")]
use serde::{Serialize, Deserialize};

/// Discriminant of a [`Shape`], ordered so that it can index the
/// collision dispatch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum ShapeType {
    Circle,
    Edge,
    Polygon,
}

/// Mass properties computed from a shape and a density
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MassData {
    /// The mass of the shape, usually in kilograms
    pub mass: f32,

    /// The position of the shape's centroid relative to the shape's origin
    pub center: Vec2,

    /// The rotational inertia of the shape about the local origin
    pub inertia: f32,
}

/// A collision shape attached to a fixture
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Circle(CircleShape),
    Edge(EdgeShape),
    Polygon(PolygonShape),
}

impl Shape {
    /// Returns the type tag of the shape
    pub fn shape_type(&self) -> ShapeType {
        match self {
            Shape::Circle(_) => ShapeType::Circle,
            Shape::Edge(_) => ShapeType::Edge,
            Shape::Polygon(_) => ShapeType::Polygon,
        }
    }

    /// Returns the radius used by the narrow phase: the full radius for
    /// circles and the skin radius for polygons and edges
    pub fn radius(&self) -> f32 {
        match self {
            Shape::Circle(c) => c.radius,
            Shape::Edge(e) => e.radius,
            Shape::Polygon(p) => p.radius,
        }
    }

    /// Computes the world-space bounding box for the given transform
    pub fn compute_aabb(&self, xf: &Transform) -> Aabb {
        match self {
            Shape::Circle(c) => c.compute_aabb(xf),
            Shape::Edge(e) => e.compute_aabb(xf),
            Shape::Polygon(p) => p.compute_aabb(xf),
        }
    }

    /// Computes mass, centroid and rotational inertia about the shape origin
    pub fn compute_mass(&self, density: f32) -> MassData {
        match self {
            Shape::Circle(c) => c.compute_mass(density),
            Shape::Edge(e) => e.compute_mass(),
            Shape::Polygon(p) => p.compute_mass(density),
        }
    }

    /// Tests a world-space point for containment. Edges contain nothing.
    pub fn test_point(&self, xf: &Transform, p: Vec2) -> bool {
        match self {
            Shape::Circle(c) => c.test_point(xf, p),
            Shape::Edge(_) => false,
            Shape::Polygon(poly) => poly.test_point(xf, p),
        }
    }

    /// Casts a world-space segment against the shape
    pub fn ray_cast(&self, input: &RayCastInput, xf: &Transform) -> Option<RayCastOutput> {
        match self {
            Shape::Circle(c) => c.ray_cast(input, xf),
            Shape::Edge(e) => e.ray_cast(input, xf),
            Shape::Polygon(p) => p.ray_cast(input, xf),
        }
    }

    /// Signed distance from a world-space point to the shape surface and
    /// the direction pointing away from the shape
    pub fn compute_distance(&self, xf: &Transform, p: Vec2) -> (f32, Vec2) {
        match self {
            Shape::Circle(c) => c.compute_distance(xf, p),
            Shape::Edge(e) => e.compute_distance(xf, p),
            Shape::Polygon(poly) => poly.compute_distance(xf, p),
        }
    }
}

impl From<CircleShape> for Shape {
    fn from(shape: CircleShape) -> Self {
        Shape::Circle(shape)
    }
}

impl From<PolygonShape> for Shape {
    fn from(shape: PolygonShape) -> Self {
        Shape::Polygon(shape)
    }
}

impl From<EdgeShape> for Shape {
    fn from(shape: EdgeShape) -> Self {
        Shape::Edge(shape)
    }
}

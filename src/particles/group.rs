use std::ops::Range;

use crate::math::Vec2;
use crate::particles::{ParticleColor, ParticleFlags};
use crate::shapes::Shape;

/// Parameters used to fill a shape with particles
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleGroupDef {
    /// Flags given to every particle of the group
    pub flags: ParticleFlags,

    /// The shape to fill, in group coordinates. Circles and polygons are
    /// filled on a grid; edges are stroked.
    pub shape: Shape,

    /// The world position of the group origin
    pub position: Vec2,

    /// The world angle of the group in radians
    pub angle: f32,

    /// The linear velocity of the group origin in world coordinates
    pub linear_velocity: Vec2,

    /// The angular velocity of the group
    pub angular_velocity: f32,

    pub color: ParticleColor,

    /// Spring strength of the group, scales the system spring strength
    pub strength: f32,

    /// Lifetime of every particle in seconds, zero or less for infinite
    pub lifetime: f32,

    /// Application specific data
    pub user_data: u64,
}

impl ParticleGroupDef {
    /// Group definition filling the shape with water
    pub fn new(shape: impl Into<Shape>) -> Self {
        Self {
            flags: ParticleFlags::WATER,
            shape: shape.into(),
            position: Vec2::zero(),
            angle: 0.0,
            linear_velocity: Vec2::zero(),
            angular_velocity: 0.0,
            color: ParticleColor::default(),
            strength: 1.0,
            lifetime: 0.0,
            user_data: 0,
        }
    }

    /// Sets the flags of every particle of the group
    pub fn with_flags(mut self, flags: ParticleFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Sets the world position of the group origin
    pub fn with_position(mut self, position: Vec2) -> Self {
        self.position = position;
        self
    }
}

/// A block of particles created together. Group particles occupy a
/// contiguous index range which is kept up to date across compaction.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleGroup {
    pub(crate) first_index: usize,
    pub(crate) count: usize,
    pub(crate) strength: f32,

    /// Application specific data
    pub user_data: u64,
}

impl ParticleGroup {
    /// Group over particles starting at the given index
    pub(crate) fn new(first_index: usize, strength: f32, user_data: u64) -> Self {
        Self { first_index, count: 0, strength, user_data }
    }

    /// Index of the first particle of the group
    pub fn first_index(&self) -> usize {
        self.first_index
    }

    /// Number of particles in the group
    pub fn particle_count(&self) -> usize {
        self.count
    }

    /// Indices of the group particles
    pub fn range(&self) -> Range<usize> {
        self.first_index..self.first_index + self.count
    }

    /// Whether a particle index belongs to the group
    pub fn contains(&self, index: usize) -> bool {
        self.range().contains(&index)
    }

    /// Spring and elastic strength of the group
    pub fn strength(&self) -> f32 {
        self.strength
    }
}

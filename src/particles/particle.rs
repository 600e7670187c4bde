use bitflags::bitflags;
use crate::core::{FixtureHandle, ParticleGroupHandle, BodyHandle};
use crate::math::Vec2;

#[cfg(feature = "serialize")]
use serde::{Serialize, Deserialize};

bitflags! {
    /// Per-particle behaviour flags. A particle without flags is plain water.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
    pub struct ParticleFlags: u32 {
        /// Removed at the end of the current step
        const ZOMBIE = 1 << 1;

        /// Zero velocity, never moves
        const WALL = 1 << 2;

        /// Keeps its distance to the particles it was created next to
        const SPRING = 1 << 3;

        /// Returns to the shape it was created with after deformation
        const ELASTIC = 1 << 4;

        /// Exchanges velocity with its neighbours
        const VISCOUS = 1 << 5;

        /// Without isotropic pressure
        const POWDER = 1 << 6;

        /// With surface tension
        const TENSILE = 1 << 7;

        /// Pushes particles of other groups away
        const REPULSIVE = 1 << 13;

        /// Reports begin and end of fixture contacts to the listener
        const FIXTURE_CONTACT_LISTENER = 1 << 14;

        /// Reports begin and end of particle contacts to the listener
        const PARTICLE_CONTACT_LISTENER = 1 << 15;
    }
}

impl ParticleFlags {
    /// Plain fluid particle
    pub const WATER: ParticleFlags = ParticleFlags::empty();
}

/// An 8-bit RGBA particle colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct ParticleColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl ParticleColor {
    /// Colour from its channels
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Whether every channel is zero
    pub fn is_zero(&self) -> bool {
        self.r == 0 && self.g == 0 && self.b == 0 && self.a == 0
    }
}

/// Parameters used to create a single particle
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParticleDef {
    pub flags: ParticleFlags,

    /// The world position of the particle
    pub position: Vec2,

    /// The linear velocity of the particle in world coordinates
    pub velocity: Vec2,

    pub color: ParticleColor,

    /// Lifetime in seconds. Zero or less means the particle lives forever.
    pub lifetime: f32,

    /// Group to append the particle to
    pub group: Option<ParticleGroupHandle>,
}

impl ParticleDef {
    /// Particle definition at a world position
    pub fn new(position: Vec2) -> Self {
        Self { position, ..Self::default() }
    }

    /// Sets the particle flags
    pub fn with_flags(mut self, flags: ParticleFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Sets the initial velocity
    pub fn with_velocity(mut self, velocity: Vec2) -> Self {
        self.velocity = velocity;
        self
    }

    /// Sets the lifetime in seconds
    pub fn with_lifetime(mut self, lifetime: f32) -> Self {
        self.lifetime = lifetime;
        self
    }
}

/// Two particles closer than one particle diameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleContact {
    pub index_a: usize,
    pub index_b: usize,

    /// `1 - distance / diameter`, in (0, 1]
    pub weight: f32,

    /// Unit direction from particle A to particle B
    pub normal: Vec2,

    /// Union of the two particles' flags
    pub flags: ParticleFlags,
}

/// A particle closer than one particle diameter to a fixture
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleBodyContact {
    pub index: usize,
    pub body: BodyHandle,
    pub fixture: FixtureHandle,

    /// `1 - distance / diameter`
    pub weight: f32,

    /// Unit direction from the particle towards the fixture surface
    pub normal: Vec2,

    /// Effective mass of the particle-body pair along the normal
    pub mass: f32,
}

/// Spring connection between two SPRING particles of one group
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticlePair {
    pub index_a: usize,
    pub index_b: usize,

    /// Rest distance
    pub distance: f32,

    /// Scales the system spring strength
    pub strength: f32,
}

/// Three neighbouring ELASTIC particles of one group and their rest shape
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleTriad {
    pub index_a: usize,
    pub index_b: usize,
    pub index_c: usize,

    /// Rest positions relative to the triad centroid
    pub pa: Vec2,
    pub pb: Vec2,
    pub pc: Vec2,

    /// Scales the system elastic strength
    pub strength: f32,
}

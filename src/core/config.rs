use crate::error::PhysicsError;
use crate::math::Vec2;
use crate::Result;

#[cfg(feature = "serialize")]
use serde::{Serialize, Deserialize};

/// Maximum number of vertices of a polygon shape
pub const MAX_POLYGON_VERTICES: usize = 8;

/// Maximum number of contact points between two convex shapes
pub const MAX_MANIFOLD_POINTS: usize = 2;

/// Default collision tolerance, also used to weld polygon vertices
pub const DEFAULT_LINEAR_SLOP: f32 = 0.005;

/// Skin radius of polygons and edges
pub const POLYGON_RADIUS: f32 = 2.0 * DEFAULT_LINEAR_SLOP;

/// Longest edge of an elastic particle triad, in particle strides. Covers
/// the diagonal of a fill grid cell but not two cells along an axis.
pub const MAX_TRIAD_DISTANCE: f32 = 1.5;

/// Configuration parameters for the physics simulation
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct SimulationConfig {
    /// World gravity
    pub gravity: Vec2,

    /// Default number of velocity iterations used by `step_default`
    pub velocity_iterations: u32,

    /// Default number of position iterations used by `step_default`
    pub position_iterations: u32,

    /// Default number of particle iterations used by `step_default`
    pub particle_iterations: u32,

    /// Margin added around fixture bounds in the broadphase
    pub aabb_extension: f32,

    /// Scales the displacement used to predict fat AABB movement
    pub aabb_multiplier: f32,

    /// Cell size of the broadphase grid
    pub broad_phase_cell_size: f32,

    /// Collision and constraint tolerance
    pub linear_slop: f32,

    /// Angular collision and constraint tolerance, in radians
    pub angular_slop: f32,

    /// Relative normal velocity below which collisions are inelastic
    pub velocity_threshold: f32,

    /// Largest position correction applied per position iteration
    pub max_linear_correction: f32,

    /// Largest angular correction applied per position iteration
    pub max_angular_correction: f32,

    /// Largest translation of a body per step
    pub max_translation: f32,

    /// Largest rotation of a body per step
    pub max_rotation: f32,

    /// Fraction of the overlap resolved per position iteration
    pub baumgarte: f32,

    /// Time an island must rest before it falls asleep
    pub time_to_sleep: f32,

    /// Linear speed below which a body counts as resting
    pub linear_sleep_tolerance: f32,

    /// Angular speed below which a body counts as resting
    pub angular_sleep_tolerance: f32,

    /// Whether resting islands may fall asleep
    pub allow_sleeping: bool,

    /// Whether contact and joint impulses are carried between steps
    pub warm_starting: bool,

    /// Particle spacing inside groups, as a fraction of the particle diameter
    pub particle_stride: f32,

    /// Weight below which particles feel no pressure
    pub min_particle_weight: f32,

    /// Upper limit of particle pressure, as a fraction of the critical pressure
    pub max_particle_pressure: f32,

    /// Upper limit of particle pair forces, as a fraction of the critical velocity
    pub max_particle_force: f32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            gravity: Vec2::new(0.0, -10.0),
            velocity_iterations: 8,
            position_iterations: 3,
            particle_iterations: 1,
            aabb_extension: 0.1,
            aabb_multiplier: 2.0,
            broad_phase_cell_size: 4.0,
            linear_slop: DEFAULT_LINEAR_SLOP,
            angular_slop: 2.0_f32.to_radians(),
            velocity_threshold: 1.0,
            max_linear_correction: 0.2,
            max_angular_correction: 8.0_f32.to_radians(),
            max_translation: 2.0,
            max_rotation: 0.5 * std::f32::consts::PI,
            baumgarte: 0.2,
            time_to_sleep: 0.5,
            linear_sleep_tolerance: 0.01,
            angular_sleep_tolerance: 2.0_f32.to_radians(),
            allow_sleeping: true,
            warm_starting: true,
            particle_stride: 0.75,
            min_particle_weight: 1.0,
            max_particle_pressure: 0.25,
            max_particle_force: 0.5,
        }
    }
}

impl SimulationConfig {
    /// Default configuration with the given gravity
    pub fn with_gravity(gravity: Vec2) -> Self {
        Self { gravity, ..Self::default() }
    }

    /// Checks that every tolerance is finite and in range
    pub fn validate(&self) -> Result<()> {
        if !self.gravity.is_valid() {
            return Err(PhysicsError::InvalidParameter("gravity must be finite".to_string()));
        }

        let positive = [
            ("aabb_extension", self.aabb_extension),
            ("broad_phase_cell_size", self.broad_phase_cell_size),
            ("linear_slop", self.linear_slop),
            ("angular_slop", self.angular_slop),
            ("max_linear_correction", self.max_linear_correction),
            ("max_angular_correction", self.max_angular_correction),
            ("max_translation", self.max_translation),
            ("max_rotation", self.max_rotation),
            ("particle_stride", self.particle_stride),
        ];
        for (name, value) in positive {
            if value <= 0.0 || !value.is_finite() {
                return Err(PhysicsError::InvalidParameter(format!(
                    "{} must be positive, got {}", name, value
                )));
            }
        }

        let non_negative = [
            ("aabb_multiplier", self.aabb_multiplier),
            ("velocity_threshold", self.velocity_threshold),
            ("time_to_sleep", self.time_to_sleep),
            ("linear_sleep_tolerance", self.linear_sleep_tolerance),
            ("angular_sleep_tolerance", self.angular_sleep_tolerance),
            ("min_particle_weight", self.min_particle_weight),
            ("max_particle_pressure", self.max_particle_pressure),
            ("max_particle_force", self.max_particle_force),
        ];
        for (name, value) in non_negative {
            if value < 0.0 || !value.is_finite() {
                return Err(PhysicsError::InvalidParameter(format!(
                    "{} must be non-negative, got {}", name, value
                )));
            }
        }

        if !(0.0..=1.0).contains(&self.baumgarte) {
            return Err(PhysicsError::InvalidParameter(format!(
                "baumgarte must be in [0, 1], got {}", self.baumgarte
            )));
        }

        Ok(())
    }
}

pub mod math;
pub mod core;
pub mod bodies;
pub mod shapes;
pub mod collision;
pub mod constraints;
pub mod particles;

/// Re-export common types for easier usage
pub use crate::core::{
    BodyHandle, ContactHandle, ContactImpulse, ContactListener, FixtureHandle, JointHandle, ParticleGroupHandle,
    ParticleSystemHandle, QueryCallback, RayCastCallback, SimulationConfig, World,
};
pub use crate::bodies::{Body, BodyDef, BodyType, Fixture, FixtureDef};
pub use crate::shapes::{CircleShape, EdgeShape, PolygonShape, Shape, ShapeType};
pub use crate::collision::{Contact, ContactFilter, Filter};
pub use crate::constraints::{Joint, JointDef, JointType};
pub use crate::particles::{
    ParticleColor, ParticleDef, ParticleFlags, ParticleGroupDef, ParticleSystem, ParticleSystemDef,
};
pub use crate::math::{Aabb, Rot, Transform, Vec2};

/// Error types for the physics engine
pub mod error {
    use thiserror::Error;

    #[derive(Error, Debug, Clone, PartialEq)]
    pub enum PhysicsError {
        #[error("Invalid parameter: {0}")]
        InvalidParameter(String),

        #[error("Degenerate geometry: {0}")]
        DegenerateGeometry(String),

        #[error("Resource not found: {0}")]
        ResourceNotFound(String),

        #[error("Invalid state: {0}")]
        InvalidState(String),

        #[error("Capacity exceeded: {0}")]
        CapacityExceeded(String),
    }
}

/// Result type for physics engine operations
pub type Result<T> = std::result::Result<T, error::PhysicsError>;

/// Engine version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

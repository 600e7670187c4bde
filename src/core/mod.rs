pub mod world;
pub mod config;
pub mod storage;
pub mod events;
pub(crate) mod island;
pub(crate) mod time_step;

pub use self::world::World;
pub use self::config::{SimulationConfig, MAX_POLYGON_VERTICES, MAX_MANIFOLD_POINTS, MAX_TRIAD_DISTANCE, POLYGON_RADIUS};
pub use self::storage::{Arena, ArenaHandle};
pub use self::events::{ContactListener, ContactImpulse, RayCastCallback, QueryCallback};
pub use self::time_step::TimeStep;

use self::storage::define_handle;

define_handle!(
    /// A unique identifier for a body in the physics world
    BodyHandle, "Body"
);

define_handle!(
    /// A unique identifier for a fixture attached to a body
    FixtureHandle, "Fixture"
);

define_handle!(
    /// A unique identifier for a joint in the physics world
    JointHandle, "Joint"
);

define_handle!(
    /// A unique identifier for a contact managed by the world
    ContactHandle, "Contact"
);

define_handle!(
    /// A unique identifier for a particle system in the physics world
    ParticleSystemHandle, "Particle system"
);

define_handle!(
    /// A unique identifier for a particle group inside a particle system
    ParticleGroupHandle, "Particle group"
);

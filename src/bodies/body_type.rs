#[cfg(feature = "serialize")]
use serde::{Serialize, Deserialize};

/// Type of body, determining how it behaves in the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum BodyType {
    /// Static bodies have zero mass and zero velocity, and are only moved manually
    #[default]
    Static,

    /// Kinematic bodies have zero mass and move with their set velocity
    Kinematic,

    /// Dynamic bodies are fully simulated (affected by forces, collisions, etc.)
    Dynamic,
}

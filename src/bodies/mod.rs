mod body;
mod fixture;
mod body_type;

pub use self::body::{Body, BodyDef};
pub use self::fixture::{Fixture, FixtureDef};
pub(crate) use self::fixture::FixtureProxy;
pub use self::body_type::BodyType;

use crate::core::{BodyHandle, ContactHandle, JointHandle};

/// Flags for controlling body behavior
pub mod body_flags {
    use bitflags::bitflags;

    bitflags! {
        /// Flags for controlling the behavior of bodies
        #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
        pub struct BodyFlags: u16 {
            /// Body was visited by the current island search
            const ISLAND = 0x0001;

            /// Body is awake and simulated
            const AWAKE = 0x0002;

            /// Body may fall asleep when resting
            const AUTO_SLEEP = 0x0004;

            /// Body is a fast moving object
            const BULLET = 0x0008;

            /// Body does not rotate
            const FIXED_ROTATION = 0x0010;

            /// Body takes part in collision and simulation
            const ACTIVE = 0x0020;
        }
    }
}

/// Connects a body to a joint and to the other body of that joint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JointEdge {
    /// The other body attached to the joint
    pub other: BodyHandle,

    /// The joint
    pub joint: JointHandle,

    /// Whether the joint lets its two bodies collide
    pub collide_connected: bool,
}

/// Connects a body to a contact and to the other body of that contact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactEdge {
    /// The other body in the contact
    pub other: BodyHandle,

    /// The contact
    pub contact: ContactHandle,
}

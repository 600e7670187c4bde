mod joint;
mod distance;
mod revolute;
mod prismatic;
mod pulley;
mod gear;
mod weld;
mod wheel;
mod rope;
mod motor;
mod mouse;
mod friction;

pub use self::joint::{Joint, JointDef, JointDefKind, JointKind, JointType, LimitState};
pub use self::distance::{DistanceJoint, DistanceJointDef};
pub use self::revolute::{RevoluteJoint, RevoluteJointDef};
pub use self::prismatic::{PrismaticJoint, PrismaticJointDef};
pub use self::pulley::{PulleyJoint, PulleyJointDef};
pub use self::gear::{GearJoint, GearJointDef};
pub use self::weld::{WeldJoint, WeldJointDef};
pub use self::wheel::{WheelJoint, WheelJointDef};
pub use self::rope::{RopeJoint, RopeJointDef};
pub use self::motor::{MotorJoint, MotorJointDef};
pub use self::mouse::{MouseJoint, MouseJointDef};
pub use self::friction::{FrictionJoint, FrictionJointDef};

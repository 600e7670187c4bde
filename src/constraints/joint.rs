use crate::bodies::Body;
use crate::constraints::{
    DistanceJoint, DistanceJointDef, FrictionJoint, FrictionJointDef, GearJoint, GearJointDef, MotorJoint,
    MotorJointDef, MouseJoint, MouseJointDef, PrismaticJoint, PrismaticJointDef, PulleyJoint, PulleyJointDef,
    RevoluteJoint, RevoluteJointDef, RopeJoint, RopeJointDef, WeldJoint, WeldJointDef, WheelJoint, WheelJointDef,
};
use crate::core::time_step::SolverData;
use crate::core::{Arena, BodyHandle, JointHandle};
use crate::error::PhysicsError;
use crate::math::Vec2;
use crate::Result;

/// Solver view of one joint body, captured at the start of each island solve
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub(crate) struct SolverBody {
    /// Index into the island position and velocity arrays
    pub index: usize,
    pub local_center: Vec2,
    pub inv_mass: f32,
    pub inv_i: f32,
}

impl SolverBody {
    /// Copies the solver data of a body
    pub fn new(body: &Body) -> Self {
        Self {
            index: body.island_index,
            local_center: body.sweep.local_center,
            inv_mass: body.inv_mass,
            inv_i: body.inv_inertia,
        }
    }
}

/// State of a joint limit during the current solve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LimitState {
    #[default]
    Inactive,
    AtLower,
    AtUpper,
    Equal,
}

/// Joint variant tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JointType {
    Distance,
    Revolute,
    Prismatic,
    Pulley,
    Gear,
    Weld,
    Wheel,
    Rope,
    Motor,
    Mouse,
    Friction,
}

/// Variant-specific joint data
#[derive(Debug, Clone, PartialEq)]
pub enum JointKind {
    Distance(DistanceJoint),
    Revolute(RevoluteJoint),
    Prismatic(PrismaticJoint),
    Pulley(PulleyJoint),
    Gear(GearJoint),
    Weld(WeldJoint),
    Wheel(WheelJoint),
    Rope(RopeJoint),
    Motor(MotorJoint),
    Mouse(MouseJoint),
    Friction(FrictionJoint),
}

impl JointKind {
    /// Variant of the joint
    pub fn joint_type(&self) -> JointType {
        match self {
            JointKind::Distance(_) => JointType::Distance,
            JointKind::Revolute(_) => JointType::Revolute,
            JointKind::Prismatic(_) => JointType::Prismatic,
            JointKind::Pulley(_) => JointType::Pulley,
            JointKind::Gear(_) => JointType::Gear,
            JointKind::Weld(_) => JointType::Weld,
            JointKind::Wheel(_) => JointType::Wheel,
            JointKind::Rope(_) => JointType::Rope,
            JointKind::Motor(_) => JointType::Motor,
            JointKind::Mouse(_) => JointType::Mouse,
            JointKind::Friction(_) => JointType::Friction,
        }
    }
}

/// Variant-specific part of a joint definition
#[derive(Debug, Clone, PartialEq)]
pub enum JointDefKind {
    Distance(DistanceJointDef),
    Revolute(RevoluteJointDef),
    Prismatic(PrismaticJointDef),
    Pulley(PulleyJointDef),
    Gear(GearJointDef),
    Weld(WeldJointDef),
    Wheel(WheelJointDef),
    Rope(RopeJointDef),
    Motor(MotorJointDef),
    Mouse(MouseJointDef),
    Friction(FrictionJointDef),
}

macro_rules! impl_joint_def_from {
    ($($variant:ident => $def:ty),* $(,)?) => {
        $(
            impl From<$def> for JointDefKind {
                fn from(def: $def) -> Self {
                    JointDefKind::$variant(def)
                }
            }
        )*
    };
}

impl_joint_def_from!(
    Distance => DistanceJointDef,
    Revolute => RevoluteJointDef,
    Prismatic => PrismaticJointDef,
    Pulley => PulleyJointDef,
    Gear => GearJointDef,
    Weld => WeldJointDef,
    Wheel => WheelJointDef,
    Rope => RopeJointDef,
    Motor => MotorJointDef,
    Mouse => MouseJointDef,
    Friction => FrictionJointDef,
);

/// Parameters used to create a joint.
///
/// For gear joints `body_a` and `body_b` are ignored: the gear connects
/// the second bodies of its two underlying joints.
#[derive(Debug, Clone, PartialEq)]
pub struct JointDef {
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,

    /// Set this flag to true if the attached bodies should collide
    pub collide_connected: bool,

    /// Application specific data
    pub user_data: u64,

    pub kind: JointDefKind,
}

impl JointDef {
    /// Joint definition between two bodies
    pub fn new(body_a: BodyHandle, body_b: BodyHandle, kind: impl Into<JointDefKind>) -> Self {
        Self {
            body_a,
            body_b,
            collide_connected: false,
            user_data: 0,
            kind: kind.into(),
        }
    }

    /// Lets the two bodies collide with each other
    pub fn with_collide_connected(mut self, flag: bool) -> Self {
        self.collide_connected = flag;
        self
    }

    /// Attaches application data
    pub fn with_user_data(mut self, user_data: u64) -> Self {
        self.user_data = user_data;
        self
    }
}

/// A constraint between two bodies, owned by the world
#[derive(Debug, Clone, PartialEq)]
pub struct Joint {
    pub(crate) body_a: BodyHandle,
    pub(crate) body_b: BodyHandle,
    pub(crate) collide_connected: bool,

    /// Visited by the current island search
    pub(crate) island: bool,

    pub(crate) kind: JointKind,

    /// Application specific data
    pub user_data: u64,
}

macro_rules! variant_accessors {
    ($($get:ident, $get_mut:ident => $variant:ident($ty:ty)),* $(,)?) => {
        $(
            /// The variant data, if the joint is of this variant
            pub fn $get(&self) -> Option<&$ty> {
                match &self.kind {
                    JointKind::$variant(j) => Some(j),
                    _ => None,
                }
            }

            /// Mutable variant data, if the joint is of this variant
            pub fn $get_mut(&mut self) -> Option<&mut $ty> {
                match &mut self.kind {
                    JointKind::$variant(j) => Some(j),
                    _ => None,
                }
            }
        )*
    };
}

impl Joint {
    /// Builds a joint from its definition. Gear joints read the geometry
    /// of their two underlying joints.
    pub(crate) fn new(
        def: &JointDef,
        bodies: &Arena<BodyHandle, Body>,
        joints: &Arena<JointHandle, Joint>,
    ) -> Result<Self> {
        let (body_a, body_b, kind) = match &def.kind {
            JointDefKind::Gear(gear) => {
                let joint1 = joints.fetch(gear.joint1)?;
                let joint2 = joints.fetch(gear.joint2)?;
                let gear = GearJoint::new(gear, joint1, joint2, bodies)?;
                let (a, b) = gear.bodies();
                (a, b, JointKind::Gear(gear))
            }
            JointDefKind::Mouse(mouse) => {
                let b = bodies.fetch(def.body_b)?;
                (def.body_a, def.body_b, JointKind::Mouse(MouseJoint::new(mouse, b)))
            }
            JointDefKind::Distance(d) => (def.body_a, def.body_b, JointKind::Distance(DistanceJoint::new(d))),
            JointDefKind::Revolute(d) => (def.body_a, def.body_b, JointKind::Revolute(RevoluteJoint::new(d))),
            JointDefKind::Prismatic(d) => (def.body_a, def.body_b, JointKind::Prismatic(PrismaticJoint::new(d))),
            JointDefKind::Pulley(d) => (def.body_a, def.body_b, JointKind::Pulley(PulleyJoint::new(d))),
            JointDefKind::Weld(d) => (def.body_a, def.body_b, JointKind::Weld(WeldJoint::new(d))),
            JointDefKind::Wheel(d) => (def.body_a, def.body_b, JointKind::Wheel(WheelJoint::new(d))),
            JointDefKind::Rope(d) => (def.body_a, def.body_b, JointKind::Rope(RopeJoint::new(d))),
            JointDefKind::Motor(d) => (def.body_a, def.body_b, JointKind::Motor(MotorJoint::new(d))),
            JointDefKind::Friction(d) => (def.body_a, def.body_b, JointKind::Friction(FrictionJoint::new(d))),
        };

        bodies.fetch(body_a)?;
        bodies.fetch(body_b)?;
        if body_a == body_b {
            return Err(PhysicsError::InvalidState(format!(
                "{:?} joint cannot connect body {:?} to itself",
                kind.joint_type(),
                body_a
            )));
        }

        Ok(Self {
            body_a,
            body_b,
            collide_connected: def.collide_connected,
            island: false,
            kind,
            user_data: def.user_data,
        })
    }

    /// Variant of the joint
    pub fn joint_type(&self) -> JointType {
        self.kind.joint_type()
    }

    /// First body
    pub fn body_a(&self) -> BodyHandle {
        self.body_a
    }

    /// Second body
    pub fn body_b(&self) -> BodyHandle {
        self.body_b
    }

    /// Whether the two bodies may still collide with each other
    pub fn collide_connected(&self) -> bool {
        self.collide_connected
    }

    /// Variant data
    pub fn kind(&self) -> &JointKind {
        &self.kind
    }

    /// Mutable variant data
    pub fn kind_mut(&mut self) -> &mut JointKind {
        &mut self.kind
    }

    variant_accessors!(
        as_distance, as_distance_mut => Distance(DistanceJoint),
        as_revolute, as_revolute_mut => Revolute(RevoluteJoint),
        as_prismatic, as_prismatic_mut => Prismatic(PrismaticJoint),
        as_pulley, as_pulley_mut => Pulley(PulleyJoint),
        as_gear, as_gear_mut => Gear(GearJoint),
        as_weld, as_weld_mut => Weld(WeldJoint),
        as_wheel, as_wheel_mut => Wheel(WheelJoint),
        as_rope, as_rope_mut => Rope(RopeJoint),
        as_motor, as_motor_mut => Motor(MotorJoint),
        as_mouse, as_mouse_mut => Mouse(MouseJoint),
        as_friction, as_friction_mut => Friction(FrictionJoint),
    );

    /// World anchor on body A. `body_a` must be the body returned by
    /// [`Joint::body_a`].
    pub fn anchor_a(&self, body_a: &Body) -> Vec2 {
        match &self.kind {
            JointKind::Distance(j) => body_a.world_point(j.local_anchor_a()),
            JointKind::Revolute(j) => body_a.world_point(j.local_anchor_a()),
            JointKind::Prismatic(j) => body_a.world_point(j.local_anchor_a()),
            JointKind::Pulley(j) => body_a.world_point(j.local_anchor_a()),
            JointKind::Gear(j) => body_a.world_point(j.local_anchor_a()),
            JointKind::Weld(j) => body_a.world_point(j.local_anchor_a()),
            JointKind::Wheel(j) => body_a.world_point(j.local_anchor_a()),
            JointKind::Rope(j) => body_a.world_point(j.local_anchor_a()),
            JointKind::Motor(_) => body_a.position(),
            JointKind::Mouse(j) => j.target(),
            JointKind::Friction(j) => body_a.world_point(j.local_anchor_a()),
        }
    }

    /// World anchor on body B. `body_b` must be the body returned by
    /// [`Joint::body_b`].
    pub fn anchor_b(&self, body_b: &Body) -> Vec2 {
        match &self.kind {
            JointKind::Distance(j) => body_b.world_point(j.local_anchor_b()),
            JointKind::Revolute(j) => body_b.world_point(j.local_anchor_b()),
            JointKind::Prismatic(j) => body_b.world_point(j.local_anchor_b()),
            JointKind::Pulley(j) => body_b.world_point(j.local_anchor_b()),
            JointKind::Gear(j) => body_b.world_point(j.local_anchor_b()),
            JointKind::Weld(j) => body_b.world_point(j.local_anchor_b()),
            JointKind::Wheel(j) => body_b.world_point(j.local_anchor_b()),
            JointKind::Rope(j) => body_b.world_point(j.local_anchor_b()),
            JointKind::Motor(_) => body_b.position(),
            JointKind::Mouse(j) => body_b.world_point(j.local_anchor_b()),
            JointKind::Friction(j) => body_b.world_point(j.local_anchor_b()),
        }
    }

    /// Reaction force on body B at the joint anchor in Newtons
    pub fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        match &self.kind {
            JointKind::Distance(j) => j.reaction_force(inv_dt),
            JointKind::Revolute(j) => j.reaction_force(inv_dt),
            JointKind::Prismatic(j) => j.reaction_force(inv_dt),
            JointKind::Pulley(j) => j.reaction_force(inv_dt),
            JointKind::Gear(j) => j.reaction_force(inv_dt),
            JointKind::Weld(j) => j.reaction_force(inv_dt),
            JointKind::Wheel(j) => j.reaction_force(inv_dt),
            JointKind::Rope(j) => j.reaction_force(inv_dt),
            JointKind::Motor(j) => j.reaction_force(inv_dt),
            JointKind::Mouse(j) => j.reaction_force(inv_dt),
            JointKind::Friction(j) => j.reaction_force(inv_dt),
        }
    }

    /// Reaction torque on body B in N*m
    pub fn reaction_torque(&self, inv_dt: f32) -> f32 {
        match &self.kind {
            JointKind::Revolute(j) => j.reaction_torque(inv_dt),
            JointKind::Prismatic(j) => j.reaction_torque(inv_dt),
            JointKind::Gear(j) => j.reaction_torque(inv_dt),
            JointKind::Weld(j) => j.reaction_torque(inv_dt),
            JointKind::Wheel(j) => j.reaction_torque(inv_dt),
            JointKind::Motor(j) => j.reaction_torque(inv_dt),
            JointKind::Friction(j) => j.reaction_torque(inv_dt),
            JointKind::Distance(_) | JointKind::Pulley(_) | JointKind::Rope(_) | JointKind::Mouse(_) => 0.0,
        }
    }

    /// Bodies other than A and B whose solver state the joint reads
    pub(crate) fn extra_bodies(&self) -> Option<(BodyHandle, BodyHandle)> {
        match &self.kind {
            JointKind::Gear(j) => Some(j.ground_bodies()),
            _ => None,
        }
    }

    /// Moves the world-space data of the joint for a new world origin
    pub(crate) fn shift_origin(&mut self, new_origin: Vec2) {
        match &mut self.kind {
            JointKind::Pulley(j) => j.shift_origin(new_origin),
            JointKind::Mouse(j) => j.shift_origin(new_origin),
            _ => {}
        }
    }

    /// Computes anchors and effective masses and applies the warm-start impulses
    pub(crate) fn init_velocity_constraints(&mut self, bodies: &Arena<BodyHandle, Body>, data: &mut SolverData) {
        let solver_body = |handle: BodyHandle| bodies.get(handle).map(SolverBody::new).unwrap_or_default();
        let a = solver_body(self.body_a);
        let b = solver_body(self.body_b);

        match &mut self.kind {
            JointKind::Distance(j) => j.init_velocity_constraints(a, b, data),
            JointKind::Revolute(j) => j.init_velocity_constraints(a, b, data),
            JointKind::Prismatic(j) => j.init_velocity_constraints(a, b, data),
            JointKind::Pulley(j) => j.init_velocity_constraints(a, b, data),
            JointKind::Gear(j) => {
                let (c, d) = j.ground_bodies();
                j.init_velocity_constraints(a, b, solver_body(c), solver_body(d), data)
            }
            JointKind::Weld(j) => j.init_velocity_constraints(a, b, data),
            JointKind::Wheel(j) => j.init_velocity_constraints(a, b, data),
            JointKind::Rope(j) => j.init_velocity_constraints(a, b, data),
            JointKind::Motor(j) => j.init_velocity_constraints(a, b, data),
            JointKind::Mouse(j) => j.init_velocity_constraints(b, data),
            JointKind::Friction(j) => j.init_velocity_constraints(a, b, data),
        }
    }

    /// Applies one sequential-impulse pass to the velocities
    pub(crate) fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        match &mut self.kind {
            JointKind::Distance(j) => j.solve_velocity_constraints(data),
            JointKind::Revolute(j) => j.solve_velocity_constraints(data),
            JointKind::Prismatic(j) => j.solve_velocity_constraints(data),
            JointKind::Pulley(j) => j.solve_velocity_constraints(data),
            JointKind::Gear(j) => j.solve_velocity_constraints(data),
            JointKind::Weld(j) => j.solve_velocity_constraints(data),
            JointKind::Wheel(j) => j.solve_velocity_constraints(data),
            JointKind::Rope(j) => j.solve_velocity_constraints(data),
            JointKind::Motor(j) => j.solve_velocity_constraints(data),
            JointKind::Mouse(j) => j.solve_velocity_constraints(data),
            JointKind::Friction(j) => j.solve_velocity_constraints(data),
        }
    }

    /// Returns true when the position error is within tolerance
    pub(crate) fn solve_position_constraints(&mut self, data: &mut SolverData) -> bool {
        match &mut self.kind {
            JointKind::Distance(j) => j.solve_position_constraints(data),
            JointKind::Revolute(j) => j.solve_position_constraints(data),
            JointKind::Prismatic(j) => j.solve_position_constraints(data),
            JointKind::Pulley(j) => j.solve_position_constraints(data),
            JointKind::Gear(j) => j.solve_position_constraints(data),
            JointKind::Weld(j) => j.solve_position_constraints(data),
            JointKind::Wheel(j) => j.solve_position_constraints(data),
            JointKind::Rope(j) => j.solve_position_constraints(data),
            JointKind::Motor(j) => j.solve_position_constraints(data),
            JointKind::Mouse(j) => j.solve_position_constraints(data),
            JointKind::Friction(j) => j.solve_position_constraints(data),
        }
    }
}

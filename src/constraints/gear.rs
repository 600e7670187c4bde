use crate::bodies::Body;
use crate::constraints::joint::{Joint, JointKind, JointType, SolverBody};
use crate::core::time_step::{Position, SolverData, Velocity};
use crate::core::{Arena, BodyHandle, JointHandle};
use crate::error::PhysicsError;
use crate::math::{Rot, Vec2};
use crate::Result;

/// Gear joint definition. Both referenced joints must be revolute or
/// prismatic and attached to a dynamic body as their second body.
#[derive(Debug, Clone, PartialEq)]
pub struct GearJointDef {
    pub joint1: JointHandle,
    pub joint2: JointHandle,

    /// The gear ratio
    pub ratio: f32,
}

impl GearJointDef {
    /// Couples two revolute or prismatic joints with the given ratio
    pub fn new(joint1: JointHandle, joint2: JointHandle, ratio: f32) -> Self {
        Self { joint1, joint2, ratio }
    }
}

/// Geometry of one side of the gear, captured from a revolute or
/// prismatic joint
#[derive(Debug, Clone, Copy, PartialEq)]
struct GearSide {
    kind: JointType,
    ground: BodyHandle,
    body: BodyHandle,
    local_anchor_ground: Vec2,
    local_anchor_body: Vec2,
    local_axis_ground: Vec2,
    reference_angle: f32,
}

impl GearSide {
    fn capture(joint: &Joint) -> Result<Self> {
        let (local_anchor_ground, local_anchor_body, local_axis_ground, reference_angle) = match &joint.kind {
            JointKind::Revolute(j) => (j.local_anchor_a, j.local_anchor_b, Vec2::zero(), j.reference_angle),
            JointKind::Prismatic(j) => (j.local_anchor_a, j.local_anchor_b, j.local_x_axis_a, j.reference_angle),
            other => {
                return Err(PhysicsError::InvalidState(format!(
                    "gear joints connect revolute or prismatic joints, got {:?}",
                    other.joint_type()
                )))
            }
        };

        Ok(Self {
            kind: joint.joint_type(),
            ground: joint.body_a,
            body: joint.body_b,
            local_anchor_ground,
            local_anchor_body,
            local_axis_ground,
            reference_angle,
        })
    }

    /// Current joint coordinate: an angle for revolute joints, a
    /// translation along the axis for prismatic joints
    fn coordinate(&self, ground: &Body, body: &Body) -> f32 {
        match self.kind {
            JointType::Revolute => body.sweep.a - ground.sweep.a - self.reference_angle,
            _ => {
                let q_ground = ground.xf.q;
                let p_ground = self.local_anchor_ground;
                let p_body = q_ground.inv_rotate(body.xf.q.rotate(self.local_anchor_body) + (body.xf.p - ground.xf.p));
                (p_body - p_ground).dot(&self.local_axis_ground)
            }
        }
    }

    /// Joint coordinate evaluated on solver positions of the centers of mass
    fn solver_coordinate(&self, body: &SolverBody, ground: &SolverBody, body_pos: Position, ground_pos: Position) -> f32 {
        match self.kind {
            JointType::Revolute => body_pos.a - ground_pos.a - self.reference_angle,
            _ => {
                let q_ground = Rot::new(ground_pos.a);
                let r_body = Rot::new(body_pos.a).rotate(self.local_anchor_body - body.local_center);
                let p_ground = self.local_anchor_ground - ground.local_center;
                let p_body = q_ground.inv_rotate(r_body + (body_pos.c - ground_pos.c));
                (p_body - p_ground).dot(&self.local_axis_ground)
            }
        }
    }
}

/// Jacobian terms for one side of the gear
#[derive(Debug, Clone, Copy, Default)]
struct SideJacobian {
    jv: Vec2,
    jw_body: f32,
    jw_ground: f32,
    inv_mass: f32,
}

/// Connects two revolute or prismatic joints so that
/// coordinate1 + ratio * coordinate2 = constant.
///
/// Gear Joint:
/// C0 = (coordinate1 + ratio * coordinate2)_initial
/// C = (coordinate1 + ratio * coordinate2) - C0 = 0
/// J = [J1 ratio * J2]
/// K = J * invM * JT
///   = J1 * invM1 * J1T + ratio * ratio * J2 * invM2 * J2T
///
/// Revolute:
/// coordinate = rotation
/// Cdot = angularVelocity
/// J = [0 0 1]
/// K = J * invM * JT = invI
///
/// Prismatic:
/// coordinate = dot(p - pg, ug)
/// Cdot = dot(v + cross(w, r), ug)
/// J = [ug cross(r, ug)]
/// K = J * invM * JT = invMass + invI * cross(r, ug)^2
///
/// Body A and C belong to the first joint, B and D to the second.
#[derive(Debug, Clone, PartialEq)]
pub struct GearJoint {
    joint1: JointHandle,
    joint2: JointHandle,
    side_a: GearSide,
    side_b: GearSide,
    constant: f32,
    ratio: f32,
    impulse: f32,

    a: SolverBody,
    b: SolverBody,
    c: SolverBody,
    d: SolverBody,
    jv_ac: Vec2,
    jv_bd: Vec2,
    jw_a: f32,
    jw_b: f32,
    jw_c: f32,
    jw_d: f32,
    mass: f32,
}

impl GearJoint {
    /// Captures the geometry of the two joints and the current joint
    /// coordinates
    pub(crate) fn new(def: &GearJointDef, joint1: &Joint, joint2: &Joint, bodies: &Arena<BodyHandle, Body>) -> Result<Self> {
        let side_a = GearSide::capture(joint1)?;
        let side_b = GearSide::capture(joint2)?;

        let coordinate_a = side_a.coordinate(bodies.fetch(side_a.ground)?, bodies.fetch(side_a.body)?);
        let coordinate_b = side_b.coordinate(bodies.fetch(side_b.ground)?, bodies.fetch(side_b.body)?);

        Ok(Self {
            joint1: def.joint1,
            joint2: def.joint2,
            side_a,
            side_b,
            constant: coordinate_a + def.ratio * coordinate_b,
            ratio: def.ratio,
            impulse: 0.0,
            a: SolverBody::default(),
            b: SolverBody::default(),
            c: SolverBody::default(),
            d: SolverBody::default(),
            jv_ac: Vec2::zero(),
            jv_bd: Vec2::zero(),
            jw_a: 0.0,
            jw_b: 0.0,
            jw_c: 0.0,
            jw_d: 0.0,
            mass: 0.0,
        })
    }

    /// The gear's own bodies: the second bodies of the two joints
    pub(crate) fn bodies(&self) -> (BodyHandle, BodyHandle) {
        (self.side_a.body, self.side_b.body)
    }

    /// The first bodies of the two joints
    pub(crate) fn ground_bodies(&self) -> (BodyHandle, BodyHandle) {
        (self.side_a.ground, self.side_b.ground)
    }

    /// First driven joint
    pub fn joint1(&self) -> JointHandle {
        self.joint1
    }

    /// Second driven joint
    pub fn joint2(&self) -> JointHandle {
        self.joint2
    }

    /// Gear ratio between the two joint coordinates
    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    /// Sets the gear ratio
    pub fn set_ratio(&mut self, ratio: f32) {
        self.ratio = ratio;
    }

    /// Anchor point relative to the origin of body A
    pub fn local_anchor_a(&self) -> Vec2 {
        self.side_a.local_anchor_body
    }

    /// Anchor point relative to the origin of body B
    pub fn local_anchor_b(&self) -> Vec2 {
        self.side_b.local_anchor_body
    }

    /// Reaction force on body B at the anchor, in newtons
    pub(crate) fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        self.jv_ac * (inv_dt * self.impulse)
    }

    /// Reaction torque on body B, in newton meters
    pub(crate) fn reaction_torque(&self, inv_dt: f32) -> f32 {
        inv_dt * self.impulse * self.jw_a
    }

    /// Jacobian of one side given the body and ground solver positions
    fn side_jacobian(
        side: &GearSide,
        body: &SolverBody,
        ground: &SolverBody,
        q_body: Rot,
        q_ground: Rot,
        scale: f32,
    ) -> SideJacobian {
        match side.kind {
            JointType::Revolute => SideJacobian {
                jv: Vec2::zero(),
                jw_body: scale,
                jw_ground: scale,
                inv_mass: scale * scale * (body.inv_i + ground.inv_i),
            },
            _ => {
                let u = q_ground.rotate(side.local_axis_ground);
                let r_ground = q_ground.rotate(side.local_anchor_ground - ground.local_center);
                let r_body = q_body.rotate(side.local_anchor_body - body.local_center);
                let jw_ground = scale * r_ground.cross(&u);
                let jw_body = scale * r_body.cross(&u);
                SideJacobian {
                    jv: u * scale,
                    jw_body,
                    jw_ground,
                    inv_mass: scale * scale * (ground.inv_mass + body.inv_mass)
                        + ground.inv_i * jw_ground * jw_ground
                        + body.inv_i * jw_body * jw_body,
                }
            }
        }
    }

    /// Computes anchors and effective masses and applies the warm-start impulses
    pub(crate) fn init_velocity_constraints(
        &mut self,
        a: SolverBody,
        b: SolverBody,
        c: SolverBody,
        d: SolverBody,
        data: &mut SolverData,
    ) {
        self.a = a;
        self.b = b;
        self.c = c;
        self.d = d;

        let q_a = Rot::new(data.positions[a.index].a);
        let q_b = Rot::new(data.positions[b.index].a);
        let q_c = Rot::new(data.positions[c.index].a);
        let q_d = Rot::new(data.positions[d.index].a);

        let jac_a = Self::side_jacobian(&self.side_a, &a, &c, q_a, q_c, 1.0);
        let jac_b = Self::side_jacobian(&self.side_b, &b, &d, q_b, q_d, self.ratio);

        self.jv_ac = jac_a.jv;
        self.jw_a = jac_a.jw_body;
        self.jw_c = jac_a.jw_ground;
        self.jv_bd = jac_b.jv;
        self.jw_b = jac_b.jw_body;
        self.jw_d = jac_b.jw_ground;

        let mass = jac_a.inv_mass + jac_b.inv_mass;
        self.mass = if mass > 0.0 { 1.0 / mass } else { 0.0 };

        if data.step.warm_starting {
            self.apply_impulse(data.velocities, self.impulse);
        } else {
            self.impulse = 0.0;
        }
    }

    fn apply_impulse(&self, velocities: &mut [Velocity], impulse: f32) {
        let Velocity { v: mut v_a, w: mut w_a } = velocities[self.a.index];
        let Velocity { v: mut v_b, w: mut w_b } = velocities[self.b.index];
        let Velocity { v: mut v_c, w: mut w_c } = velocities[self.c.index];
        let Velocity { v: mut v_d, w: mut w_d } = velocities[self.d.index];

        v_a += self.jv_ac * (self.a.inv_mass * impulse);
        w_a += self.a.inv_i * impulse * self.jw_a;
        v_b += self.jv_bd * (self.b.inv_mass * impulse);
        w_b += self.b.inv_i * impulse * self.jw_b;
        v_c -= self.jv_ac * (self.c.inv_mass * impulse);
        w_c -= self.c.inv_i * impulse * self.jw_c;
        v_d -= self.jv_bd * (self.d.inv_mass * impulse);
        w_d -= self.d.inv_i * impulse * self.jw_d;

        velocities[self.a.index] = Velocity { v: v_a, w: w_a };
        velocities[self.b.index] = Velocity { v: v_b, w: w_b };
        velocities[self.c.index] = Velocity { v: v_c, w: w_c };
        velocities[self.d.index] = Velocity { v: v_d, w: w_d };
    }

    /// Applies one sequential-impulse pass to the velocities
    pub(crate) fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        let Velocity { v: v_a, w: w_a } = data.velocities[self.a.index];
        let Velocity { v: v_b, w: w_b } = data.velocities[self.b.index];
        let Velocity { v: v_c, w: w_c } = data.velocities[self.c.index];
        let Velocity { v: v_d, w: w_d } = data.velocities[self.d.index];

        let mut cdot = self.jv_ac.dot(&(v_a - v_c)) + self.jv_bd.dot(&(v_b - v_d));
        cdot += (self.jw_a * w_a - self.jw_c * w_c) + (self.jw_b * w_b - self.jw_d * w_d);

        let impulse = -self.mass * cdot;
        self.impulse += impulse;

        self.apply_impulse(data.velocities, impulse);
    }

    /// Corrects position drift. Returns true when the error is within tolerance.
    pub(crate) fn solve_position_constraints(&mut self, data: &mut SolverData) -> bool {
        let Position { c: mut c_a, a: mut a_a } = data.positions[self.a.index];
        let Position { c: mut c_b, a: mut a_b } = data.positions[self.b.index];
        let Position { c: mut c_c, a: mut a_c } = data.positions[self.c.index];
        let Position { c: mut c_d, a: mut a_d } = data.positions[self.d.index];

        let q_a = Rot::new(a_a);
        let q_b = Rot::new(a_b);
        let q_c = Rot::new(a_c);
        let q_d = Rot::new(a_d);

        let jac_a = Self::side_jacobian(&self.side_a, &self.a, &self.c, q_a, q_c, 1.0);
        let jac_b = Self::side_jacobian(&self.side_b, &self.b, &self.d, q_b, q_d, self.ratio);

        let coordinate_a = self.side_a.solver_coordinate(
            &self.a,
            &self.c,
            Position { c: c_a, a: a_a },
            Position { c: c_c, a: a_c },
        );
        let coordinate_b = self.side_b.solver_coordinate(
            &self.b,
            &self.d,
            Position { c: c_b, a: a_b },
            Position { c: c_d, a: a_d },
        );

        let mass = jac_a.inv_mass + jac_b.inv_mass;
        let c = (coordinate_a + self.ratio * coordinate_b) - self.constant;

        let impulse = if mass > 0.0 { -c / mass } else { 0.0 };

        c_a += jac_a.jv * (self.a.inv_mass * impulse);
        a_a += self.a.inv_i * impulse * jac_a.jw_body;
        c_b += jac_b.jv * (self.b.inv_mass * impulse);
        a_b += self.b.inv_i * impulse * jac_b.jw_body;
        c_c -= jac_a.jv * (self.c.inv_mass * impulse);
        a_c -= self.c.inv_i * impulse * jac_a.jw_ground;
        c_d -= jac_b.jv * (self.d.inv_mass * impulse);
        a_d -= self.d.inv_i * impulse * jac_b.jw_ground;

        data.positions[self.a.index] = Position { c: c_a, a: a_a };
        data.positions[self.b.index] = Position { c: c_b, a: a_b };
        data.positions[self.c.index] = Position { c: c_c, a: a_c };
        data.positions[self.d.index] = Position { c: c_d, a: a_d };

        // Gear drift is not measured
        true
    }
}

use crate::bodies::Body;
use crate::constraints::joint::SolverBody;
use crate::core::time_step::{SolverData, Velocity};
use crate::math::{Mat22, Rot, Vec2};

/// Friction joint definition
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FrictionJointDef {
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,

    /// The maximum friction force in N
    pub max_force: f32,

    /// The maximum friction torque in N-m
    pub max_torque: f32,
}

impl FrictionJointDef {
    /// Uses a world anchor point
    pub fn new(body_a: &Body, body_b: &Body, anchor: Vec2) -> Self {
        Self {
            local_anchor_a: body_a.local_point(anchor),
            local_anchor_b: body_b.local_point(anchor),
            ..Self::default()
        }
    }
}

/// Top-down friction: resists relative translation and rotation with
/// bounded force and torque.
///
/// Point-to-point constraint
/// Cdot = v2 - v1
///      = v2 + cross(w2, r2) - v1 - cross(w1, r1)
/// J = [-I -r1_skew I r2_skew ]
///
/// Angle constraint
/// Cdot = w2 - w1
/// J = [0 0 -1 0 0 1]
#[derive(Debug, Clone, PartialEq)]
pub struct FrictionJoint {
    local_anchor_a: Vec2,
    local_anchor_b: Vec2,
    linear_impulse: Vec2,
    angular_impulse: f32,
    max_force: f32,
    max_torque: f32,

    a: SolverBody,
    b: SolverBody,
    r_a: Vec2,
    r_b: Vec2,
    linear_mass: Mat22,
    angular_mass: f32,
}

impl FrictionJoint {
    /// Builds the joint from its definition
    pub(crate) fn new(def: &FrictionJointDef) -> Self {
        Self {
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            linear_impulse: Vec2::zero(),
            angular_impulse: 0.0,
            max_force: def.max_force,
            max_torque: def.max_torque,
            a: SolverBody::default(),
            b: SolverBody::default(),
            r_a: Vec2::zero(),
            r_b: Vec2::zero(),
            linear_mass: Mat22::zero(),
            angular_mass: 0.0,
        }
    }

    /// Anchor point relative to the origin of body A
    pub fn local_anchor_a(&self) -> Vec2 {
        self.local_anchor_a
    }

    /// Anchor point relative to the origin of body B
    pub fn local_anchor_b(&self) -> Vec2 {
        self.local_anchor_b
    }

    /// Maximum force in newtons
    pub fn max_force(&self) -> f32 {
        self.max_force
    }

    /// Sets the maximum force in newtons
    pub fn set_max_force(&mut self, force: f32) {
        self.max_force = force.max(0.0);
    }

    /// Maximum torque in newton meters
    pub fn max_torque(&self) -> f32 {
        self.max_torque
    }

    /// Sets the maximum torque in newton meters
    pub fn set_max_torque(&mut self, torque: f32) {
        self.max_torque = torque.max(0.0);
    }

    /// Reaction force on body B at the anchor, in newtons
    pub(crate) fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        self.linear_impulse * inv_dt
    }

    /// Reaction torque on body B, in newton meters
    pub(crate) fn reaction_torque(&self, inv_dt: f32) -> f32 {
        inv_dt * self.angular_impulse
    }

    /// Computes anchors and effective masses and applies the warm-start impulses
    pub(crate) fn init_velocity_constraints(&mut self, a: SolverBody, b: SolverBody, data: &mut SolverData) {
        self.a = a;
        self.b = b;
        let (m_a, m_b, i_a, i_b) = (a.inv_mass, b.inv_mass, a.inv_i, b.inv_i);

        let a_a = data.positions[a.index].a;
        let Velocity { v: mut v_a, w: mut w_a } = data.velocities[a.index];
        let a_b = data.positions[b.index].a;
        let Velocity { v: mut v_b, w: mut w_b } = data.velocities[b.index];

        let q_a = Rot::new(a_a);
        let q_b = Rot::new(a_b);

        // Compute the effective mass matrix
        self.r_a = q_a.rotate(self.local_anchor_a - a.local_center);
        self.r_b = q_b.rotate(self.local_anchor_b - b.local_center);
        let (r_a, r_b) = (self.r_a, self.r_b);

        let k11 = m_a + m_b + i_a * r_a.y * r_a.y + i_b * r_b.y * r_b.y;
        let k12 = -i_a * r_a.x * r_a.y - i_b * r_b.x * r_b.y;
        let k22 = m_a + m_b + i_a * r_a.x * r_a.x + i_b * r_b.x * r_b.x;
        self.linear_mass = Mat22::new(Vec2::new(k11, k12), Vec2::new(k12, k22)).inverse();

        self.angular_mass = i_a + i_b;
        if self.angular_mass > 0.0 {
            self.angular_mass = 1.0 / self.angular_mass;
        }

        if data.step.warm_starting {
            // Scale impulses to support a variable time step
            self.linear_impulse *= data.step.dt_ratio;
            self.angular_impulse *= data.step.dt_ratio;

            let p = self.linear_impulse;
            v_a -= p * m_a;
            w_a -= i_a * (r_a.cross(&p) + self.angular_impulse);
            v_b += p * m_b;
            w_b += i_b * (r_b.cross(&p) + self.angular_impulse);
        } else {
            self.linear_impulse = Vec2::zero();
            self.angular_impulse = 0.0;
        }

        data.velocities[a.index] = Velocity { v: v_a, w: w_a };
        data.velocities[b.index] = Velocity { v: v_b, w: w_b };
    }

    /// Applies one sequential-impulse pass to the velocities
    pub(crate) fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        let (m_a, m_b, i_a, i_b) = (self.a.inv_mass, self.b.inv_mass, self.a.inv_i, self.b.inv_i);
        let Velocity { v: mut v_a, w: mut w_a } = data.velocities[self.a.index];
        let Velocity { v: mut v_b, w: mut w_b } = data.velocities[self.b.index];
        let (r_a, r_b) = (self.r_a, self.r_b);

        let h = data.step.dt;

        // Solve angular friction
        {
            let cdot = w_b - w_a;
            let impulse = -self.angular_mass * cdot;

            let old_impulse = self.angular_impulse;
            let max_impulse = h * self.max_torque;
            self.angular_impulse = (self.angular_impulse + impulse).clamp(-max_impulse, max_impulse);
            let impulse = self.angular_impulse - old_impulse;

            w_a -= i_a * impulse;
            w_b += i_b * impulse;
        }

        // Solve linear friction
        {
            let cdot = v_b + Vec2::scalar_cross(w_b, r_b) - v_a - Vec2::scalar_cross(w_a, r_a);

            let impulse = -self.linear_mass.mul_vec(cdot);
            let old_impulse = self.linear_impulse;
            self.linear_impulse += impulse;

            let max_impulse = h * self.max_force;

            if self.linear_impulse.length_squared() > max_impulse * max_impulse {
                self.linear_impulse = self.linear_impulse.normalize() * max_impulse;
            }

            let impulse = self.linear_impulse - old_impulse;

            v_a -= impulse * m_a;
            w_a -= i_a * r_a.cross(&impulse);

            v_b += impulse * m_b;
            w_b += i_b * r_b.cross(&impulse);
        }

        data.velocities[self.a.index] = Velocity { v: v_a, w: w_a };
        data.velocities[self.b.index] = Velocity { v: v_b, w: w_b };
    }

    /// Corrects position drift. Returns true when the error is within tolerance.
    pub(crate) fn solve_position_constraints(&mut self, _data: &mut SolverData) -> bool {
        true
    }
}

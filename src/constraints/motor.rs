use crate::bodies::Body;
use crate::constraints::joint::SolverBody;
use crate::core::time_step::{Position, SolverData, Velocity};
use crate::math::{Mat22, Rot, Vec2};

/// Motor joint definition
#[derive(Debug, Clone, PartialEq)]
pub struct MotorJointDef {
    /// Position of body B minus the position of body A, in body A's frame
    pub linear_offset: Vec2,

    /// The body B angle minus body A angle in radians
    pub angular_offset: f32,

    /// The maximum motor force in N
    pub max_force: f32,

    /// The maximum motor torque in N-m
    pub max_torque: f32,

    /// Position correction factor in the range [0,1]
    pub correction_factor: f32,
}

impl Default for MotorJointDef {
    fn default() -> Self {
        Self {
            linear_offset: Vec2::zero(),
            angular_offset: 0.0,
            max_force: 1.0,
            max_torque: 1.0,
            correction_factor: 0.3,
        }
    }
}

impl MotorJointDef {
    /// Uses the current relative pose of the bodies as the target offset
    pub fn new(body_a: &Body, body_b: &Body) -> Self {
        Self {
            linear_offset: body_a.local_point(body_b.position()),
            angular_offset: body_b.angle() - body_a.angle(),
            ..Self::default()
        }
    }
}

/// Drives the relative pose of two bodies towards a target offset with
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
pub struct MotorJoint {
    linear_offset: Vec2,
    angular_offset: f32,
    linear_impulse: Vec2,
    angular_impulse: f32,
    max_force: f32,
    max_torque: f32,
    correction_factor: f32,

    a: SolverBody,
    b: SolverBody,
    r_a: Vec2,
    r_b: Vec2,
    linear_error: Vec2,
    angular_error: f32,
    linear_mass: Mat22,
    angular_mass: f32,
}

impl MotorJoint {
    /// Builds the joint from its definition
    pub(crate) fn new(def: &MotorJointDef) -> Self {
        Self {
            linear_offset: def.linear_offset,
            angular_offset: def.angular_offset,
            linear_impulse: Vec2::zero(),
            angular_impulse: 0.0,
            max_force: def.max_force,
            max_torque: def.max_torque,
            correction_factor: def.correction_factor,
            a: SolverBody::default(),
            b: SolverBody::default(),
            r_a: Vec2::zero(),
            r_b: Vec2::zero(),
            linear_error: Vec2::zero(),
            angular_error: 0.0,
            linear_mass: Mat22::zero(),
            angular_mass: 0.0,
        }
    }

    /// Target position of body B in the frame of body A
    pub fn linear_offset(&self) -> Vec2 {
        self.linear_offset
    }

    /// Sets the target position of body B in the frame of body A
    pub fn set_linear_offset(&mut self, offset: Vec2) {
        self.linear_offset = offset;
    }

    /// Target angle of body B relative to body A
    pub fn angular_offset(&self) -> f32 {
        self.angular_offset
    }

    /// Sets the target angle of body B relative to body A
    pub fn set_angular_offset(&mut self, offset: f32) {
        self.angular_offset = offset;
    }

    /// Maximum force used to reach the linear offset
    pub fn max_force(&self) -> f32 {
        self.max_force
    }

    /// Sets the maximum friction force in N
    pub fn set_max_force(&mut self, force: f32) {
        self.max_force = force.max(0.0);
    }

    /// Maximum torque used to reach the angular offset
    pub fn max_torque(&self) -> f32 {
        self.max_torque
    }

    /// Sets the maximum friction torque in N*m
    pub fn set_max_torque(&mut self, torque: f32) {
        self.max_torque = torque.max(0.0);
    }

    /// Position correction factor in [0, 1]
    pub fn correction_factor(&self) -> f32 {
        self.correction_factor
    }

    /// Sets the position correction factor, clamped to [0, 1]
    pub fn set_correction_factor(&mut self, factor: f32) {
        self.correction_factor = factor.clamp(0.0, 1.0);
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

        let Position { c: c_a, a: a_a } = data.positions[a.index];
        let Velocity { v: mut v_a, w: mut w_a } = data.velocities[a.index];
        let Position { c: c_b, a: a_b } = data.positions[b.index];
        let Velocity { v: mut v_b, w: mut w_b } = data.velocities[b.index];

        let q_a = Rot::new(a_a);
        let q_b = Rot::new(a_b);

        // Compute the effective mass matrix
        self.r_a = q_a.rotate(-a.local_center);
        self.r_b = q_b.rotate(-b.local_center);
        let (r_a, r_b) = (self.r_a, self.r_b);

        let k11 = m_a + m_b + i_a * r_a.y * r_a.y + i_b * r_b.y * r_b.y;
        let k12 = -i_a * r_a.x * r_a.y - i_b * r_b.x * r_b.y;
        let k22 = m_a + m_b + i_a * r_a.x * r_a.x + i_b * r_b.x * r_b.x;
        self.linear_mass = Mat22::new(Vec2::new(k11, k12), Vec2::new(k12, k22)).inverse();

        self.angular_mass = i_a + i_b;
        if self.angular_mass > 0.0 {
            self.angular_mass = 1.0 / self.angular_mass;
        }

        self.linear_error = c_b + r_b - c_a - r_a - q_a.rotate(self.linear_offset);
        self.angular_error = a_b - a_a - self.angular_offset;

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
        let inv_h = data.step.inv_dt;

        // Solve angular friction
        {
            let cdot = w_b - w_a + inv_h * self.correction_factor * self.angular_error;
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
            let cdot = v_b + Vec2::scalar_cross(w_b, r_b) - v_a - Vec2::scalar_cross(w_a, r_a)
                + self.linear_error * (inv_h * self.correction_factor);

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

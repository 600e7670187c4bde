use std::f32::consts::PI;

use crate::bodies::Body;
use crate::constraints::joint::SolverBody;
use crate::core::time_step::{Position, SolverData, Velocity};
use crate::math::{Mat33, Rot, Vec2, Vec3};

/// Weld joint definition. A frequency of zero makes the angular part rigid.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WeldJointDef {
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,

    /// The body B angle minus body A angle in the reference state (radians)
    pub reference_angle: f32,

    /// The mass-spring-damper frequency in Hertz. Rotation only.
    pub frequency_hz: f32,

    /// The damping ratio. 0 = no damping, 1 = critical damping.
    pub damping_ratio: f32,
}

impl WeldJointDef {
    /// Uses a world anchor point and the current body angles as reference
    pub fn new(body_a: &Body, body_b: &Body, anchor: Vec2) -> Self {
        Self {
            local_anchor_a: body_a.local_point(anchor),
            local_anchor_b: body_b.local_point(anchor),
            reference_angle: body_b.angle() - body_a.angle(),
            ..Self::default()
        }
    }
}

/// Glues two bodies together, optionally with a soft angular spring.
///
/// Point-to-point constraint
/// C = p2 - p1
/// Cdot = v2 - v1 = v2 + cross(w2, r2) - v1 - cross(w1, r1)
/// J = [-I -r1_skew I r2_skew ]
///
/// Angle constraint
/// C = angle2 - angle1 - referenceAngle
/// Cdot = w2 - w1
/// J = [0 0 -1 0 0 1]
#[derive(Debug, Clone, PartialEq)]
pub struct WeldJoint {
    local_anchor_a: Vec2,
    local_anchor_b: Vec2,
    reference_angle: f32,
    frequency_hz: f32,
    damping_ratio: f32,
    bias: f32,
    gamma: f32,
    impulse: Vec3,

    a: SolverBody,
    b: SolverBody,
    r_a: Vec2,
    r_b: Vec2,
    mass: Mat33,
}

impl WeldJoint {
    /// Builds the joint from its definition
    pub(crate) fn new(def: &WeldJointDef) -> Self {
        Self {
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            reference_angle: def.reference_angle,
            frequency_hz: def.frequency_hz,
            damping_ratio: def.damping_ratio,
            bias: 0.0,
            gamma: 0.0,
            impulse: Vec3::zero(),
            a: SolverBody::default(),
            b: SolverBody::default(),
            r_a: Vec2::zero(),
            r_b: Vec2::zero(),
            mass: Mat33::zero(),
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

    /// Angle of body B relative to body A in the reference state
    pub fn reference_angle(&self) -> f32 {
        self.reference_angle
    }

    /// Mass-spring frequency in hertz
    pub fn frequency(&self) -> f32 {
        self.frequency_hz
    }

    /// Sets the mass-spring frequency in hertz, 0 for a rigid constraint
    pub fn set_frequency(&mut self, hz: f32) {
        self.frequency_hz = hz;
    }

    /// Damping ratio of the spring
    pub fn damping_ratio(&self) -> f32 {
        self.damping_ratio
    }

    /// Sets the damping ratio, 0 for none and 1 for critical damping
    pub fn set_damping_ratio(&mut self, ratio: f32) {
        self.damping_ratio = ratio;
    }

    /// Reaction force on body B at the anchor, in newtons
    pub(crate) fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        Vec2::new(self.impulse.x, self.impulse.y) * inv_dt
    }

    /// Reaction torque on body B, in newton meters
    pub(crate) fn reaction_torque(&self, inv_dt: f32) -> f32 {
        inv_dt * self.impulse.z
    }

    fn effective_mass(r_a: Vec2, r_b: Vec2, m_a: f32, m_b: f32, i_a: f32, i_b: f32) -> Mat33 {
        let mut k = Mat33::zero();
        k.ex.x = m_a + m_b + r_a.y * r_a.y * i_a + r_b.y * r_b.y * i_b;
        k.ey.x = -r_a.y * r_a.x * i_a - r_b.y * r_b.x * i_b;
        k.ez.x = -r_a.y * i_a - r_b.y * i_b;
        k.ex.y = k.ey.x;
        k.ey.y = m_a + m_b + r_a.x * r_a.x * i_a + r_b.x * r_b.x * i_b;
        k.ez.y = r_a.x * i_a + r_b.x * i_b;
        k.ex.z = k.ez.x;
        k.ey.z = k.ez.y;
        k.ez.z = i_a + i_b;
        k
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

        self.r_a = q_a.rotate(self.local_anchor_a - a.local_center);
        self.r_b = q_b.rotate(self.local_anchor_b - b.local_center);

        let k = Self::effective_mass(self.r_a, self.r_b, m_a, m_b, i_a, i_b);

        if self.frequency_hz > 0.0 {
            self.mass = k.inverse22();

            let mut inv_m = i_a + i_b;
            let m = if inv_m > 0.0 { 1.0 / inv_m } else { 0.0 };

            let c = a_b - a_a - self.reference_angle;

            let omega = 2.0 * PI * self.frequency_hz;
            let d = 2.0 * m * self.damping_ratio * omega;
            let k_spring = m * omega * omega;

            // magic formulas
            let h = data.step.dt;
            self.gamma = h * (d + h * k_spring);
            self.gamma = if self.gamma != 0.0 { 1.0 / self.gamma } else { 0.0 };
            self.bias = c * h * k_spring * self.gamma;

            inv_m += self.gamma;
            self.mass.ez.z = if inv_m != 0.0 { 1.0 / inv_m } else { 0.0 };
        } else if k.ez.z == 0.0 {
            self.mass = k.inverse22();
            self.gamma = 0.0;
            self.bias = 0.0;
        } else {
            self.mass = k.sym_inverse33();
            self.gamma = 0.0;
            self.bias = 0.0;
        }

        if data.step.warm_starting {
            // Scale impulses to support a variable time step
            self.impulse = self.impulse * data.step.dt_ratio;

            let p = Vec2::new(self.impulse.x, self.impulse.y);

            v_a -= p * m_a;
            w_a -= i_a * (self.r_a.cross(&p) + self.impulse.z);

            v_b += p * m_b;
            w_b += i_b * (self.r_b.cross(&p) + self.impulse.z);
        } else {
            self.impulse = Vec3::zero();
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

        if self.frequency_hz > 0.0 {
            let cdot2 = w_b - w_a;

            let impulse2 = -self.mass.ez.z * (cdot2 + self.bias + self.gamma * self.impulse.z);
            self.impulse.z += impulse2;

            w_a -= i_a * impulse2;
            w_b += i_b * impulse2;

            let cdot1 = v_b + Vec2::scalar_cross(w_b, r_b) - v_a - Vec2::scalar_cross(w_a, r_a);

            let impulse1 = -self.mass.mul_vec2(cdot1);
            self.impulse.x += impulse1.x;
            self.impulse.y += impulse1.y;

            let p = impulse1;

            v_a -= p * m_a;
            w_a -= i_a * r_a.cross(&p);

            v_b += p * m_b;
            w_b += i_b * r_b.cross(&p);
        } else {
            let cdot1 = v_b + Vec2::scalar_cross(w_b, r_b) - v_a - Vec2::scalar_cross(w_a, r_a);
            let cdot2 = w_b - w_a;
            let cdot = Vec3::new(cdot1.x, cdot1.y, cdot2);

            let impulse = -self.mass.mul_vec3(cdot);
            self.impulse += impulse;

            let p = Vec2::new(impulse.x, impulse.y);

            v_a -= p * m_a;
            w_a -= i_a * (r_a.cross(&p) + impulse.z);

            v_b += p * m_b;
            w_b += i_b * (r_b.cross(&p) + impulse.z);
        }

        data.velocities[self.a.index] = Velocity { v: v_a, w: w_a };
        data.velocities[self.b.index] = Velocity { v: v_b, w: w_b };
    }

    /// Corrects position drift. Returns true when the error is within tolerance.
    pub(crate) fn solve_position_constraints(&mut self, data: &mut SolverData) -> bool {
        let (m_a, m_b, i_a, i_b) = (self.a.inv_mass, self.b.inv_mass, self.a.inv_i, self.b.inv_i);
        let Position { c: mut c_a, a: mut a_a } = data.positions[self.a.index];
        let Position { c: mut c_b, a: mut a_b } = data.positions[self.b.index];

        let q_a = Rot::new(a_a);
        let q_b = Rot::new(a_b);

        let r_a = q_a.rotate(self.local_anchor_a - self.a.local_center);
        let r_b = q_b.rotate(self.local_anchor_b - self.b.local_center);

        let k = Self::effective_mass(r_a, r_b, m_a, m_b, i_a, i_b);

        let position_error;
        let angular_error;

        if self.frequency_hz > 0.0 {
            let c1 = c_b + r_b - c_a - r_a;

            position_error = c1.length();
            angular_error = 0.0;

            let p = -k.solve22(c1);

            c_a -= p * m_a;
            a_a -= i_a * r_a.cross(&p);

            c_b += p * m_b;
            a_b += i_b * r_b.cross(&p);
        } else {
            let c1 = c_b + r_b - c_a - r_a;
            let c2 = a_b - a_a - self.reference_angle;

            position_error = c1.length();
            angular_error = c2.abs();

            let c = Vec3::new(c1.x, c1.y, c2);

            let impulse = if k.ez.z > 0.0 {
                -k.solve33(c)
            } else {
                let impulse2 = -k.solve22(c1);
                Vec3::new(impulse2.x, impulse2.y, 0.0)
            };

            let p = Vec2::new(impulse.x, impulse.y);

            c_a -= p * m_a;
            a_a -= i_a * (r_a.cross(&p) + impulse.z);

            c_b += p * m_b;
            a_b += i_b * (r_b.cross(&p) + impulse.z);
        }

        data.positions[self.a.index] = Position { c: c_a, a: a_a };
        data.positions[self.b.index] = Position { c: c_b, a: a_b };

        position_error <= data.config.linear_slop && angular_error <= data.config.angular_slop
    }
}

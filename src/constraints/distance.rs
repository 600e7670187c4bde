use std::f32::consts::PI;

use crate::bodies::Body;
use crate::constraints::joint::SolverBody;
use crate::core::time_step::{Position, SolverData, Velocity};
use crate::math::{Rot, Vec2};

/// Distance joint definition. The anchor points are given in body-local
/// coordinates; a frequency of zero makes the joint rigid.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceJointDef {
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,

    /// The natural length between the anchor points
    pub length: f32,

    /// The mass-spring-damper frequency in Hertz. 0 disables softness.
    pub frequency_hz: f32,

    /// The damping ratio. 0 = no damping, 1 = critical damping.
    pub damping_ratio: f32,
}

impl Default for DistanceJointDef {
    fn default() -> Self {
        Self {
            local_anchor_a: Vec2::zero(),
            local_anchor_b: Vec2::zero(),
            length: 1.0,
            frequency_hz: 0.0,
            damping_ratio: 0.0,
        }
    }
}

impl DistanceJointDef {
    /// Uses two world anchors; the rest length is their current distance
    pub fn new(body_a: &Body, body_b: &Body, anchor_a: Vec2, anchor_b: Vec2) -> Self {
        Self {
            local_anchor_a: body_a.local_point(anchor_a),
            local_anchor_b: body_b.local_point(anchor_b),
            length: (anchor_b - anchor_a).length(),
            ..Self::default()
        }
    }
}

/// Keeps two anchor points at a fixed distance, optionally as a soft spring.
///
/// C = norm(p2 - p1) - L
/// u = (p2 - p1) / norm(p2 - p1)
/// Cdot = dot(u, v2 + cross(w2, r2) - v1 - cross(w1, r1))
/// J = [-u -cross(r1, u) u cross(r2, u)]
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceJoint {
    local_anchor_a: Vec2,
    local_anchor_b: Vec2,
    length: f32,
    frequency_hz: f32,
    damping_ratio: f32,

    impulse: f32,
    bias: f32,
    gamma: f32,

    a: SolverBody,
    b: SolverBody,
    u: Vec2,
    r_a: Vec2,
    r_b: Vec2,
    mass: f32,
}

impl DistanceJoint {
    /// Builds the joint from its definition
    pub(crate) fn new(def: &DistanceJointDef) -> Self {
        Self {
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            length: def.length,
            frequency_hz: def.frequency_hz,
            damping_ratio: def.damping_ratio,
            impulse: 0.0,
            bias: 0.0,
            gamma: 0.0,
            a: SolverBody::default(),
            b: SolverBody::default(),
            u: Vec2::zero(),
            r_a: Vec2::zero(),
            r_b: Vec2::zero(),
            mass: 0.0,
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

    /// Rest length between the anchors
    pub fn length(&self) -> f32 {
        self.length
    }

    /// Sets the rest length
    pub fn set_length(&mut self, length: f32) {
        self.length = length;
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
        self.u * (inv_dt * self.impulse)
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

        self.r_a = q_a.rotate(self.local_anchor_a - a.local_center);
        self.r_b = q_b.rotate(self.local_anchor_b - b.local_center);
        self.u = c_b + self.r_b - c_a - self.r_a;

        // Handle singularity
        let length = self.u.length();
        if length > data.config.linear_slop {
            self.u *= 1.0 / length;
        } else {
            self.u = Vec2::zero();
        }

        let cr_au = self.r_a.cross(&self.u);
        let cr_bu = self.r_b.cross(&self.u);
        let mut inv_mass = m_a + i_a * cr_au * cr_au + m_b + i_b * cr_bu * cr_bu;

        self.mass = if inv_mass != 0.0 { 1.0 / inv_mass } else { 0.0 };

        if self.frequency_hz > 0.0 {
            let c = length - self.length;

            let omega = 2.0 * PI * self.frequency_hz;
            let d = 2.0 * self.mass * self.damping_ratio * omega;
            let k = self.mass * omega * omega;

            // magic formulas
            let h = data.step.dt;
            self.gamma = h * (d + h * k);
            self.gamma = if self.gamma != 0.0 { 1.0 / self.gamma } else { 0.0 };
            self.bias = c * h * k * self.gamma;

            inv_mass += self.gamma;
            self.mass = if inv_mass != 0.0 { 1.0 / inv_mass } else { 0.0 };
        } else {
            self.gamma = 0.0;
            self.bias = 0.0;
        }

        if data.step.warm_starting {
            // Scale the impulse to support a variable time step
            self.impulse *= data.step.dt_ratio;

            let p = self.u * self.impulse;
            v_a -= p * m_a;
            w_a -= i_a * self.r_a.cross(&p);
            v_b += p * m_b;
            w_b += i_b * self.r_b.cross(&p);
        } else {
            self.impulse = 0.0;
        }

        data.velocities[a.index] = Velocity { v: v_a, w: w_a };
        data.velocities[b.index] = Velocity { v: v_b, w: w_b };
    }

    /// Applies one sequential-impulse pass to the velocities
    pub(crate) fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        let (m_a, m_b, i_a, i_b) = (self.a.inv_mass, self.b.inv_mass, self.a.inv_i, self.b.inv_i);
        let Velocity { v: mut v_a, w: mut w_a } = data.velocities[self.a.index];
        let Velocity { v: mut v_b, w: mut w_b } = data.velocities[self.b.index];

        // Cdot = dot(u, v + cross(w, r))
        let vp_a = v_a + Vec2::scalar_cross(w_a, self.r_a);
        let vp_b = v_b + Vec2::scalar_cross(w_b, self.r_b);
        let cdot = self.u.dot(&(vp_b - vp_a));

        let impulse = -self.mass * (cdot + self.bias + self.gamma * self.impulse);
        self.impulse += impulse;

        let p = self.u * impulse;
        v_a -= p * m_a;
        w_a -= i_a * self.r_a.cross(&p);
        v_b += p * m_b;
        w_b += i_b * self.r_b.cross(&p);

        data.velocities[self.a.index] = Velocity { v: v_a, w: w_a };
        data.velocities[self.b.index] = Velocity { v: v_b, w: w_b };
    }

    /// Corrects position drift. Returns true when the error is within tolerance.
    pub(crate) fn solve_position_constraints(&mut self, data: &mut SolverData) -> bool {
        if self.frequency_hz > 0.0 {
            // There is no position correction for soft distance constraints
            return true;
        }

        let (m_a, m_b, i_a, i_b) = (self.a.inv_mass, self.b.inv_mass, self.a.inv_i, self.b.inv_i);
        let Position { c: mut c_a, a: mut a_a } = data.positions[self.a.index];
        let Position { c: mut c_b, a: mut a_b } = data.positions[self.b.index];

        let q_a = Rot::new(a_a);
        let q_b = Rot::new(a_b);

        let r_a = q_a.rotate(self.local_anchor_a - self.a.local_center);
        let r_b = q_b.rotate(self.local_anchor_b - self.b.local_center);
        let mut u = c_b + r_b - c_a - r_a;

        let length = u.normalize_mut();
        let max_correction = data.config.max_linear_correction;
        let c = (length - self.length).clamp(-max_correction, max_correction);

        let impulse = -self.mass * c;
        let p = u * impulse;

        c_a -= p * m_a;
        a_a -= i_a * r_a.cross(&p);
        c_b += p * m_b;
        a_b += i_b * r_b.cross(&p);

        data.positions[self.a.index] = Position { c: c_a, a: a_a };
        data.positions[self.b.index] = Position { c: c_b, a: a_b };

        c.abs() < data.config.linear_slop
    }
}

use std::f32::consts::PI;

use crate::bodies::Body;
use crate::constraints::joint::SolverBody;
use crate::core::time_step::{Position, SolverData, Velocity};
use crate::math::{Mat22, Rot, Vec2};

/// Mouse joint definition. Body A is ignored by the solver; it is usually
/// a static ground body.
#[derive(Debug, Clone, PartialEq)]
pub struct MouseJointDef {
    /// The initial world target point. This is assumed to coincide with
    /// the body anchor initially.
    pub target: Vec2,

    /// The maximum constraint force that can be exerted to move the
    /// candidate body. Usually a multiple of the body weight.
    pub max_force: f32,

    /// The response speed
    pub frequency_hz: f32,

    /// The damping ratio. 0 = no damping, 1 = critical damping.
    pub damping_ratio: f32,
}

impl Default for MouseJointDef {
    fn default() -> Self {
        Self {
            target: Vec2::zero(),
            max_force: 0.0,
            frequency_hz: 5.0,
            damping_ratio: 0.7,
        }
    }
}

/// Pulls a point on body B towards a world target with a soft,
/// force-limited spring.
///
/// p = attached point, m = mouse point
/// C = p - m
/// Cdot = v
///      = v + cross(w, r)
/// J = [I r_skew]
/// Identity used:
/// w k % (rx i + ry j) = w * (-ry i + rx j)
#[derive(Debug, Clone, PartialEq)]
pub struct MouseJoint {
    local_anchor_b: Vec2,
    target_a: Vec2,
    frequency_hz: f32,
    damping_ratio: f32,
    beta: f32,

    impulse: Vec2,
    max_force: f32,
    gamma: f32,

    b: SolverBody,
    r_b: Vec2,
    mass: Mat22,
    c: Vec2,
}

impl MouseJoint {
    /// Builds the joint from its definition
    pub(crate) fn new(def: &MouseJointDef, body_b: &Body) -> Self {
        Self {
            local_anchor_b: body_b.local_point(def.target),
            target_a: def.target,
            frequency_hz: def.frequency_hz,
            damping_ratio: def.damping_ratio,
            beta: 0.0,
            impulse: Vec2::zero(),
            max_force: def.max_force,
            gamma: 0.0,
            b: SolverBody::default(),
            r_b: Vec2::zero(),
            mass: Mat22::zero(),
            c: Vec2::zero(),
        }
    }

    /// Anchor point relative to the origin of body B
    pub fn local_anchor_b(&self) -> Vec2 {
        self.local_anchor_b
    }

    /// World point the mouse joint pulls body B towards
    pub fn target(&self) -> Vec2 {
        self.target_a
    }

    /// Moves the target point. The body is woken by `World::joint_mut`.
    pub fn set_target(&mut self, target: Vec2) {
        self.target_a = target;
    }

    /// Maximum pulling force in newtons
    pub fn max_force(&self) -> f32 {
        self.max_force
    }

    /// Sets the maximum pulling force in newtons
    pub fn set_max_force(&mut self, force: f32) {
        self.max_force = force;
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

    /// Moves the target for a new world origin
    pub(crate) fn shift_origin(&mut self, new_origin: Vec2) {
        self.target_a -= new_origin;
    }

    /// Reaction force on body B at the anchor, in newtons
    pub(crate) fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        self.impulse * inv_dt
    }

    /// Computes anchors and effective masses and applies the warm-start impulses
    pub(crate) fn init_velocity_constraints(&mut self, b: SolverBody, data: &mut SolverData) {
        self.b = b;
        let (m_b, i_b) = (b.inv_mass, b.inv_i);

        let Position { c: c_b, a: a_b } = data.positions[b.index];
        let Velocity { v: mut v_b, w: mut w_b } = data.velocities[b.index];

        let q_b = Rot::new(a_b);

        let mass = if m_b > 0.0 { 1.0 / m_b } else { 0.0 };

        // Frequency
        let omega = 2.0 * PI * self.frequency_hz;

        // Damping coefficient
        let d = 2.0 * mass * self.damping_ratio * omega;

        // Spring stiffness
        let k = mass * (omega * omega);

        // magic formulas
        // gamma has units of inverse mass.
        // beta has units of inverse time.
        let h = data.step.dt;
        self.gamma = h * (d + h * k);
        if self.gamma != 0.0 {
            self.gamma = 1.0 / self.gamma;
        }
        self.beta = h * k * self.gamma;

        // Compute the effective mass matrix
        self.r_b = q_b.rotate(self.local_anchor_b - b.local_center);
        let r_b = self.r_b;

        // K = [(1/m1 + 1/m2) * eye(2) - skew(r1) * invI1 * skew(r1) - skew(r2) * invI2 * skew(r2)]
        //   = [1/m1+1/m2     0    ] + invI1 * [r1.y*r1.y -r1.x*r1.y] + invI2 * [r1.y*r1.y -r1.x*r1.y]
        //     [    0     1/m1+1/m2]           [-r1.x*r1.y r1.x*r1.x]           [-r1.x*r1.y r1.x*r1.x]
        let k11 = m_b + i_b * r_b.y * r_b.y + self.gamma;
        let k12 = -i_b * r_b.x * r_b.y;
        let k22 = m_b + i_b * r_b.x * r_b.x + self.gamma;

        self.mass = Mat22::new(Vec2::new(k11, k12), Vec2::new(k12, k22)).inverse();

        self.c = (c_b + r_b - self.target_a) * self.beta;

        // Cheat with some damping
        w_b *= 0.98;

        if data.step.warm_starting {
            self.impulse *= data.step.dt_ratio;
            v_b += self.impulse * m_b;
            w_b += i_b * r_b.cross(&self.impulse);
        } else {
            self.impulse = Vec2::zero();
        }

        data.velocities[b.index] = Velocity { v: v_b, w: w_b };
    }

    /// Applies one sequential-impulse pass to the velocities
    pub(crate) fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        let (m_b, i_b) = (self.b.inv_mass, self.b.inv_i);
        let Velocity { v: mut v_b, w: mut w_b } = data.velocities[self.b.index];

        // Cdot = v + cross(w, r)
        let cdot = v_b + Vec2::scalar_cross(w_b, self.r_b);
        let impulse = self.mass.mul_vec(-(cdot + self.c + self.impulse * self.gamma));

        let old_impulse = self.impulse;
        self.impulse += impulse;
        let max_impulse = data.step.dt * self.max_force;
        if self.impulse.length_squared() > max_impulse * max_impulse {
            self.impulse *= max_impulse / self.impulse.length();
        }
        let impulse = self.impulse - old_impulse;

        v_b += impulse * m_b;
        w_b += i_b * self.r_b.cross(&impulse);

        data.velocities[self.b.index] = Velocity { v: v_b, w: w_b };
    }

    /// Corrects position drift. Returns true when the error is within tolerance.
    pub(crate) fn solve_position_constraints(&mut self, _data: &mut SolverData) -> bool {
        true
    }
}

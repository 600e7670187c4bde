use crate::constraints::joint::{LimitState, SolverBody};
use crate::core::time_step::{Position, SolverData, Velocity};
use crate::math::{Rot, Vec2};

/// Rope joint definition
#[derive(Debug, Clone, PartialEq)]
pub struct RopeJointDef {
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,

    /// The maximum length of the rope
    pub max_length: f32,
}

impl Default for RopeJointDef {
    fn default() -> Self {
        Self {
            local_anchor_a: Vec2::new(-1.0, 0.0),
            local_anchor_b: Vec2::new(1.0, 0.0),
            max_length: 0.0,
        }
    }
}

/// Enforces a maximum distance between two anchor points. The rope goes
/// slack below that distance.
///
/// Limit:
/// C = norm(pB - pA) - L
/// u = (pB - pA) / norm(pB - pA)
/// Cdot = dot(u, vB + cross(wB, rB) - vA - cross(wA, rA))
/// J = [-u -cross(rA, u) u cross(rB, u)]
/// K = J * invM * JT
///   = invMassA + invIA * cross(rA, u)^2 + invMassB + invIB * cross(rB, u)^2
#[derive(Debug, Clone, PartialEq)]
pub struct RopeJoint {
    local_anchor_a: Vec2,
    local_anchor_b: Vec2,
    max_length: f32,
    length: f32,
    impulse: f32,

    a: SolverBody,
    b: SolverBody,
    u: Vec2,
    r_a: Vec2,
    r_b: Vec2,
    mass: f32,
    state: LimitState,
}

impl RopeJoint {
    /// Builds the joint from its definition
    pub(crate) fn new(def: &RopeJointDef) -> Self {
        Self {
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            max_length: def.max_length,
            length: 0.0,
            impulse: 0.0,
            a: SolverBody::default(),
            b: SolverBody::default(),
            u: Vec2::zero(),
            r_a: Vec2::zero(),
            r_b: Vec2::zero(),
            mass: 0.0,
            state: LimitState::Inactive,
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

    /// Maximum distance between the anchors
    pub fn max_length(&self) -> f32 {
        self.max_length
    }

    /// Sets the maximum rope length
    pub fn set_max_length(&mut self, length: f32) {
        self.max_length = length;
    }

    /// `AtUpper` while the rope is taut
    pub fn limit_state(&self) -> LimitState {
        self.state
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

        self.length = self.u.length();

        let c = self.length - self.max_length;
        self.state = if c > 0.0 { LimitState::AtUpper } else { LimitState::Inactive };

        if self.length > data.config.linear_slop {
            self.u *= 1.0 / self.length;
        } else {
            self.u = Vec2::zero();
            self.mass = 0.0;
            self.impulse = 0.0;
            return;
        }

        // Compute effective mass
        let cr_a = self.r_a.cross(&self.u);
        let cr_b = self.r_b.cross(&self.u);
        let inv_mass = m_a + i_a * cr_a * cr_a + m_b + i_b * cr_b * cr_b;

        self.mass = if inv_mass != 0.0 { 1.0 / inv_mass } else { 0.0 };

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
        let c = self.length - self.max_length;
        let mut cdot = self.u.dot(&(vp_b - vp_a));

        // Predictive constraint
        if c < 0.0 {
            cdot += data.step.inv_dt * c;
        }

        let impulse = -self.mass * cdot;
        let old_impulse = self.impulse;
        self.impulse = (self.impulse + impulse).min(0.0);
        let impulse = self.impulse - old_impulse;

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
        let (m_a, m_b, i_a, i_b) = (self.a.inv_mass, self.b.inv_mass, self.a.inv_i, self.b.inv_i);
        let Position { c: mut c_a, a: mut a_a } = data.positions[self.a.index];
        let Position { c: mut c_b, a: mut a_b } = data.positions[self.b.index];

        let q_a = Rot::new(a_a);
        let q_b = Rot::new(a_b);

        let r_a = q_a.rotate(self.local_anchor_a - self.a.local_center);
        let r_b = q_b.rotate(self.local_anchor_b - self.b.local_center);
        let mut u = c_b + r_b - c_a - r_a;

        let length = u.normalize_mut();
        let c = (length - self.max_length).clamp(0.0, data.config.max_linear_correction);

        let impulse = -self.mass * c;
        let p = u * impulse;

        c_a -= p * m_a;
        a_a -= i_a * r_a.cross(&p);
        c_b += p * m_b;
        a_b += i_b * r_b.cross(&p);

        data.positions[self.a.index] = Position { c: c_a, a: a_a };
        data.positions[self.b.index] = Position { c: c_b, a: a_b };

        length - self.max_length < data.config.linear_slop
    }
}

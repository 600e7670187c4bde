use crate::bodies::Body;
use crate::constraints::joint::SolverBody;
use crate::core::time_step::{Position, SolverData, Velocity};
use crate::math::{Rot, Vec2};

/// Pulley joint definition. Each body hangs from a fixed ground anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct PulleyJointDef {
    /// The first ground anchor in world coordinates. This point never moves.
    pub ground_anchor_a: Vec2,

    /// The second ground anchor in world coordinates. This point never moves.
    pub ground_anchor_b: Vec2,

    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,

    /// The reference length for the segment attached to body A
    pub length_a: f32,

    /// The reference length for the segment attached to body B
    pub length_b: f32,

    /// The pulley ratio, used to simulate a block-and-tackle
    pub ratio: f32,
}

impl Default for PulleyJointDef {
    fn default() -> Self {
        Self {
            ground_anchor_a: Vec2::new(-1.0, 1.0),
            ground_anchor_b: Vec2::new(1.0, 1.0),
            local_anchor_a: Vec2::new(-1.0, 0.0),
            local_anchor_b: Vec2::new(1.0, 0.0),
            length_a: 0.0,
            length_b: 0.0,
            ratio: 1.0,
        }
    }
}

impl PulleyJointDef {
    /// Uses ground anchors, world body anchors and a ratio; the reference
    /// lengths are the current segment lengths
    pub fn new(
        body_a: &Body,
        body_b: &Body,
        ground_anchor_a: Vec2,
        ground_anchor_b: Vec2,
        anchor_a: Vec2,
        anchor_b: Vec2,
        ratio: f32,
    ) -> Self {
        Self {
            ground_anchor_a,
            ground_anchor_b,
            local_anchor_a: body_a.local_point(anchor_a),
            local_anchor_b: body_b.local_point(anchor_b),
            length_a: (anchor_a - ground_anchor_a).length(),
            length_b: (anchor_b - ground_anchor_b).length(),
            ratio,
        }
    }
}

/// Connects two bodies to ground and to each other so that
/// length_a + ratio * length_b stays constant.
///
/// Pulley:
/// length1 = norm(p1 - s1)
/// length2 = norm(p2 - s2)
/// C0 = (length1 + ratio * length2)_initial
/// C = C0 - (length1 + ratio * length2)
/// u1 = (p1 - s1) / norm(p1 - s1)
/// u2 = (p2 - s2) / norm(p2 - s2)
/// Cdot = -dot(u1, v1 + cross(w1, r1)) - ratio * dot(u2, v2 + cross(w2, r2))
/// J = -[u1 cross(r1, u1) ratio * u2  ratio * cross(r2, u2)]
#[derive(Debug, Clone, PartialEq)]
pub struct PulleyJoint {
    ground_anchor_a: Vec2,
    ground_anchor_b: Vec2,
    length_a: f32,
    length_b: f32,
    local_anchor_a: Vec2,
    local_anchor_b: Vec2,
    constant: f32,
    ratio: f32,
    impulse: f32,

    a: SolverBody,
    b: SolverBody,
    u_a: Vec2,
    u_b: Vec2,
    r_a: Vec2,
    r_b: Vec2,
    mass: f32,
}

impl PulleyJoint {
    /// Builds the joint from its definition
    pub(crate) fn new(def: &PulleyJointDef) -> Self {
        Self {
            ground_anchor_a: def.ground_anchor_a,
            ground_anchor_b: def.ground_anchor_b,
            length_a: def.length_a,
            length_b: def.length_b,
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            constant: def.length_a + def.ratio * def.length_b,
            ratio: def.ratio,
            impulse: 0.0,
            a: SolverBody::default(),
            b: SolverBody::default(),
            u_a: Vec2::zero(),
            u_b: Vec2::zero(),
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

    /// World anchor of the rope on the side of body A
    pub fn ground_anchor_a(&self) -> Vec2 {
        self.ground_anchor_a
    }

    /// World anchor of the rope on the side of body B
    pub fn ground_anchor_b(&self) -> Vec2 {
        self.ground_anchor_b
    }

    /// The reference length of the segment attached to body A
    pub fn length_a(&self) -> f32 {
        self.length_a
    }

    /// The reference length of the segment attached to body B
    pub fn length_b(&self) -> f32 {
        self.length_b
    }

    /// Pulley ratio, the rope on side B counts this many times
    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    /// The current length of the segment attached to body A
    pub fn current_length_a(&self, body_a: &Body) -> f32 {
        (body_a.world_point(self.local_anchor_a) - self.ground_anchor_a).length()
    }

    /// The current length of the segment attached to body B
    pub fn current_length_b(&self, body_b: &Body) -> f32 {
        (body_b.world_point(self.local_anchor_b) - self.ground_anchor_b).length()
    }

    /// Moves the ground anchors for a new world origin
    pub(crate) fn shift_origin(&mut self, new_origin: Vec2) {
        self.ground_anchor_a -= new_origin;
        self.ground_anchor_b -= new_origin;
    }

    /// Reaction force on body B at the anchor, in newtons
    pub(crate) fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        self.u_b * (inv_dt * self.impulse)
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

        // Get the pulley axes
        self.u_a = c_a + self.r_a - self.ground_anchor_a;
        self.u_b = c_b + self.r_b - self.ground_anchor_b;

        let threshold = 10.0 * data.config.linear_slop;
        self.u_a = unit_or_zero(self.u_a, threshold);
        self.u_b = unit_or_zero(self.u_b, threshold);

        // Compute effective mass
        let ru_a = self.r_a.cross(&self.u_a);
        let ru_b = self.r_b.cross(&self.u_b);

        let m_a_eff = m_a + i_a * ru_a * ru_a;
        let m_b_eff = m_b + i_b * ru_b * ru_b;

        self.mass = m_a_eff + self.ratio * self.ratio * m_b_eff;
        if self.mass > 0.0 {
            self.mass = 1.0 / self.mass;
        }

        if data.step.warm_starting {
            // Scale impulses to support variable time steps
            self.impulse *= data.step.dt_ratio;

            // Warm starting
            let p_a = self.u_a * -self.impulse;
            let p_b = self.u_b * (-self.ratio * self.impulse);

            v_a += p_a * m_a;
            w_a += i_a * self.r_a.cross(&p_a);
            v_b += p_b * m_b;
            w_b += i_b * self.r_b.cross(&p_b);
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

        let vp_a = v_a + Vec2::scalar_cross(w_a, self.r_a);
        let vp_b = v_b + Vec2::scalar_cross(w_b, self.r_b);

        let cdot = -self.u_a.dot(&vp_a) - self.ratio * self.u_b.dot(&vp_b);
        let impulse = -self.mass * cdot;
        self.impulse += impulse;

        let p_a = self.u_a * -impulse;
        let p_b = self.u_b * (-self.ratio * impulse);
        v_a += p_a * m_a;
        w_a += i_a * self.r_a.cross(&p_a);
        v_b += p_b * m_b;
        w_b += i_b * self.r_b.cross(&p_b);

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

        // Get the pulley axes
        let u_a = c_a + r_a - self.ground_anchor_a;
        let u_b = c_b + r_b - self.ground_anchor_b;

        let length_a = u_a.length();
        let length_b = u_b.length();

        let threshold = 10.0 * data.config.linear_slop;
        let u_a = unit_or_zero(u_a, threshold);
        let u_b = unit_or_zero(u_b, threshold);

        // Compute effective mass
        let ru_a = r_a.cross(&u_a);
        let ru_b = r_b.cross(&u_b);

        let m_a_eff = m_a + i_a * ru_a * ru_a;
        let m_b_eff = m_b + i_b * ru_b * ru_b;

        let mut mass = m_a_eff + self.ratio * self.ratio * m_b_eff;
        if mass > 0.0 {
            mass = 1.0 / mass;
        }

        let c = self.constant - length_a - self.ratio * length_b;
        let linear_error = c.abs();

        let impulse = -mass * c;

        let p_a = u_a * -impulse;
        let p_b = u_b * (-self.ratio * impulse);

        c_a += p_a * m_a;
        a_a += i_a * r_a.cross(&p_a);
        c_b += p_b * m_b;
        a_b += i_b * r_b.cross(&p_b);

        data.positions[self.a.index] = Position { c: c_a, a: a_a };
        data.positions[self.b.index] = Position { c: c_b, a: a_b };

        linear_error < data.config.linear_slop
    }
}

fn unit_or_zero(v: Vec2, threshold: f32) -> Vec2 {
    let length = v.length();
    if length > threshold {
        v * (1.0 / length)
    } else {
        Vec2::zero()
    }
}

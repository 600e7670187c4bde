use crate::bodies::Body;
use crate::constraints::joint::{LimitState, SolverBody};
use crate::core::time_step::{Position, SolverData, Velocity};
use crate::math::{Mat22, Mat33, Rot, Vec2, Vec3};

/// Prismatic joint definition. The local axis is given in body A
/// coordinates and is normalized on construction.
#[derive(Debug, Clone, PartialEq)]
pub struct PrismaticJointDef {
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,

    /// The translation unit axis in body A
    pub local_axis_a: Vec2,

    /// The constrained angle between the bodies: body B angle minus body A angle
    pub reference_angle: f32,

    pub enable_limit: bool,

    /// The lower translation limit, usually in meters
    pub lower_translation: f32,

    /// The upper translation limit, usually in meters
    pub upper_translation: f32,

    pub enable_motor: bool,

    /// The maximum motor force, usually in N
    pub max_motor_force: f32,

    /// The desired motor speed in meters per second
    pub motor_speed: f32,
}

impl Default for PrismaticJointDef {
    fn default() -> Self {
        Self {
            local_anchor_a: Vec2::zero(),
            local_anchor_b: Vec2::zero(),
            local_axis_a: Vec2::unit_x(),
            reference_angle: 0.0,
            enable_limit: false,
            lower_translation: 0.0,
            upper_translation: 0.0,
            enable_motor: false,
            max_motor_force: 0.0,
            motor_speed: 0.0,
        }
    }
}

impl PrismaticJointDef {
    /// Uses a world anchor point and a world unit axis
    pub fn new(body_a: &Body, body_b: &Body, anchor: Vec2, axis: Vec2) -> Self {
        Self {
            local_anchor_a: body_a.local_point(anchor),
            local_anchor_b: body_b.local_point(anchor),
            local_axis_a: body_a.local_vector(axis),
            reference_angle: body_b.angle() - body_a.angle(),
            ..Self::default()
        }
    }
}

/// Allows relative translation of two bodies along an axis fixed in body A
/// while preventing relative rotation.
///
/// Linear constraint (point-to-line)
/// d = p2 - p1 = x2 + r2 - x1 - r1
/// C = dot(perp, d)
/// Cdot = dot(d, cross(w1, perp)) + dot(perp, v2 + cross(w2, r2) - v1 - cross(w1, r1))
/// J = [-perp, -cross(d + r1, perp), perp, cross(r2,perp)]
///
/// Angular constraint
/// C = a2 - a1 + a_initial
/// Cdot = w2 - w1
/// J = [0 0 -1 0 0 1]
#[derive(Debug, Clone, PartialEq)]
pub struct PrismaticJoint {
    pub(crate) local_anchor_a: Vec2,
    pub(crate) local_anchor_b: Vec2,
    pub(crate) local_x_axis_a: Vec2,
    local_y_axis_a: Vec2,
    pub(crate) reference_angle: f32,

    impulse: Vec3,
    motor_impulse: f32,
    lower_translation: f32,
    upper_translation: f32,
    max_motor_force: f32,
    motor_speed: f32,
    enable_limit: bool,
    enable_motor: bool,
    limit_state: LimitState,

    a: SolverBody,
    b: SolverBody,
    axis: Vec2,
    perp: Vec2,
    s1: f32,
    s2: f32,
    a1: f32,
    a2: f32,
    k: Mat33,
    motor_mass: f32,
}

impl PrismaticJoint {
    /// Builds the joint from its definition
    pub(crate) fn new(def: &PrismaticJointDef) -> Self {
        let local_x_axis_a = def.local_axis_a.normalize();
        Self {
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            local_x_axis_a,
            local_y_axis_a: Vec2::scalar_cross(1.0, local_x_axis_a),
            reference_angle: def.reference_angle,
            impulse: Vec3::zero(),
            motor_impulse: 0.0,
            lower_translation: def.lower_translation,
            upper_translation: def.upper_translation,
            max_motor_force: def.max_motor_force,
            motor_speed: def.motor_speed,
            enable_limit: def.enable_limit,
            enable_motor: def.enable_motor,
            limit_state: LimitState::Inactive,
            a: SolverBody::default(),
            b: SolverBody::default(),
            axis: Vec2::zero(),
            perp: Vec2::zero(),
            s1: 0.0,
            s2: 0.0,
            a1: 0.0,
            a2: 0.0,
            k: Mat33::zero(),
            motor_mass: 0.0,
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

    /// The local joint axis relative to body A
    pub fn local_axis_a(&self) -> Vec2 {
        self.local_x_axis_a
    }

    /// Angle of body B relative to body A in the reference state
    pub fn reference_angle(&self) -> f32 {
        self.reference_angle
    }

    /// The current joint translation, usually in meters
    pub fn joint_translation(&self, body_a: &Body, body_b: &Body) -> f32 {
        let p_a = body_a.world_point(self.local_anchor_a);
        let p_b = body_b.world_point(self.local_anchor_b);
        let axis = body_a.world_vector(self.local_x_axis_a);
        (p_b - p_a).dot(&axis)
    }

    /// The current joint translation speed, usually in meters per second
    pub fn joint_speed(&self, body_a: &Body, body_b: &Body) -> f32 {
        let r_a = body_a.xf.q.rotate(self.local_anchor_a - body_a.sweep.local_center);
        let r_b = body_b.xf.q.rotate(self.local_anchor_b - body_b.sweep.local_center);
        let p1 = body_a.sweep.c + r_a;
        let p2 = body_b.sweep.c + r_b;
        let d = p2 - p1;
        let axis = body_a.xf.q.rotate(self.local_x_axis_a);

        let (v_a, v_b) = (body_a.linear_velocity, body_b.linear_velocity);
        let (w_a, w_b) = (body_a.angular_velocity, body_b.angular_velocity);

        d.dot(&Vec2::scalar_cross(w_a, axis))
            + axis.dot(&(v_b + Vec2::scalar_cross(w_b, r_b) - v_a - Vec2::scalar_cross(w_a, r_a)))
    }

    /// Whether the joint limit is active
    pub fn is_limit_enabled(&self) -> bool {
        self.enable_limit
    }

    /// Turns the joint limit on or off
    pub fn enable_limit(&mut self, flag: bool) {
        if flag != self.enable_limit {
            self.enable_limit = flag;
            self.impulse.z = 0.0;
        }
    }

    /// Lower translation limit
    pub fn lower_limit(&self) -> f32 {
        self.lower_translation
    }

    /// Upper translation limit
    pub fn upper_limit(&self) -> f32 {
        self.upper_translation
    }

    /// Sets the lower and upper translation limits
    pub fn set_limits(&mut self, lower: f32, upper: f32) {
        if lower != self.lower_translation || upper != self.upper_translation {
            self.lower_translation = lower;
            self.upper_translation = upper;
            self.impulse.z = 0.0;
        }
    }

    /// Whether the motor is active
    pub fn is_motor_enabled(&self) -> bool {
        self.enable_motor
    }

    /// Turns the motor on or off
    pub fn enable_motor(&mut self, flag: bool) {
        self.enable_motor = flag;
    }

    /// Target motor speed in meters per second
    pub fn motor_speed(&self) -> f32 {
        self.motor_speed
    }

    /// Sets the target motor speed in meters per second
    pub fn set_motor_speed(&mut self, speed: f32) {
        self.motor_speed = speed;
    }

    /// Maximum motor force in newtons
    pub fn max_motor_force(&self) -> f32 {
        self.max_motor_force
    }

    /// Sets the maximum motor force in newtons
    pub fn set_max_motor_force(&mut self, force: f32) {
        self.max_motor_force = force;
    }

    /// The motor force applied during the last step, given the inverse time step
    pub fn motor_force(&self, inv_dt: f32) -> f32 {
        inv_dt * self.motor_impulse
    }

    /// Reaction force on body B at the anchor, in newtons
    pub(crate) fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        (self.perp * self.impulse.x + self.axis * (self.motor_impulse + self.impulse.z)) * inv_dt
    }

    /// Reaction torque on body B, in newton meters
    pub(crate) fn reaction_torque(&self, inv_dt: f32) -> f32 {
        inv_dt * self.impulse.y
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

        // Compute the effective masses
        let r_a = q_a.rotate(self.local_anchor_a - a.local_center);
        let r_b = q_b.rotate(self.local_anchor_b - b.local_center);
        let d = (c_b - c_a) + r_b - r_a;

        // Compute motor Jacobian and effective mass
        self.axis = q_a.rotate(self.local_x_axis_a);
        self.a1 = (d + r_a).cross(&self.axis);
        self.a2 = r_b.cross(&self.axis);

        self.motor_mass = m_a + m_b + i_a * self.a1 * self.a1 + i_b * self.a2 * self.a2;
        if self.motor_mass > 0.0 {
            self.motor_mass = 1.0 / self.motor_mass;
        }

        // Prismatic constraint
        self.perp = q_a.rotate(self.local_y_axis_a);
        self.s1 = (d + r_a).cross(&self.perp);
        self.s2 = r_b.cross(&self.perp);

        self.k = self.effective_mass(m_a, m_b, i_a, i_b);

        // Compute motor and limit terms
        if self.enable_limit {
            let joint_translation = self.axis.dot(&d);
            if (self.upper_translation - self.lower_translation).abs() < 2.0 * data.config.linear_slop {
                self.limit_state = LimitState::Equal;
            } else if joint_translation <= self.lower_translation {
                if self.limit_state != LimitState::AtLower {
                    self.limit_state = LimitState::AtLower;
                    self.impulse.z = 0.0;
                }
            } else if joint_translation >= self.upper_translation {
                if self.limit_state != LimitState::AtUpper {
                    self.limit_state = LimitState::AtUpper;
                    self.impulse.z = 0.0;
                }
            } else {
                self.limit_state = LimitState::Inactive;
                self.impulse.z = 0.0;
            }
        } else {
            self.limit_state = LimitState::Inactive;
            self.impulse.z = 0.0;
        }

        if !self.enable_motor {
            self.motor_impulse = 0.0;
        }

        if data.step.warm_starting {
            // Account for variable time step
            self.impulse = self.impulse * data.step.dt_ratio;
            self.motor_impulse *= data.step.dt_ratio;

            let axial = self.motor_impulse + self.impulse.z;
            let p = self.perp * self.impulse.x + self.axis * axial;
            let l_a = self.impulse.x * self.s1 + self.impulse.y + axial * self.a1;
            let l_b = self.impulse.x * self.s2 + self.impulse.y + axial * self.a2;

            v_a -= p * m_a;
            w_a -= i_a * l_a;

            v_b += p * m_b;
            w_b += i_b * l_b;
        } else {
            self.impulse = Vec3::zero();
            self.motor_impulse = 0.0;
        }

        data.velocities[a.index] = Velocity { v: v_a, w: w_a };
        data.velocities[b.index] = Velocity { v: v_b, w: w_b };
    }

    /// The 3x3 effective mass of the perpendicular, angular and axial rows
    fn effective_mass(&self, m_a: f32, m_b: f32, i_a: f32, i_b: f32) -> Mat33 {
        let (s1, s2, a1, a2) = (self.s1, self.s2, self.a1, self.a2);

        let k11 = m_a + m_b + i_a * s1 * s1 + i_b * s2 * s2;
        let k12 = i_a * s1 + i_b * s2;
        let k13 = i_a * s1 * a1 + i_b * s2 * a2;
        let mut k22 = i_a + i_b;
        if k22 == 0.0 {
            // For bodies with fixed rotation
            k22 = 1.0;
        }
        let k23 = i_a * a1 + i_b * a2;
        let k33 = m_a + m_b + i_a * a1 * a1 + i_b * a2 * a2;

        Mat33::new(
            Vec3::new(k11, k12, k13),
            Vec3::new(k12, k22, k23),
            Vec3::new(k13, k23, k33),
        )
    }

    /// Applies one sequential-impulse pass to the velocities
    pub(crate) fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        let (m_a, m_b, i_a, i_b) = (self.a.inv_mass, self.b.inv_mass, self.a.inv_i, self.b.inv_i);
        let Velocity { v: mut v_a, w: mut w_a } = data.velocities[self.a.index];
        let Velocity { v: mut v_b, w: mut w_b } = data.velocities[self.b.index];

        // Solve linear motor constraint
        if self.enable_motor && self.limit_state != LimitState::Equal {
            let cdot = self.axis.dot(&(v_b - v_a)) + self.a2 * w_b - self.a1 * w_a;
            let impulse = self.motor_mass * (self.motor_speed - cdot);
            let old_impulse = self.motor_impulse;
            let max_impulse = data.step.dt * self.max_motor_force;
            self.motor_impulse = (self.motor_impulse + impulse).clamp(-max_impulse, max_impulse);
            let impulse = self.motor_impulse - old_impulse;

            let p = self.axis * impulse;
            let l_a = impulse * self.a1;
            let l_b = impulse * self.a2;

            v_a -= p * m_a;
            w_a -= i_a * l_a;

            v_b += p * m_b;
            w_b += i_b * l_b;
        }

        let cdot1 = Vec2::new(
            self.perp.dot(&(v_b - v_a)) + self.s2 * w_b - self.s1 * w_a,
            w_b - w_a,
        );

        if self.enable_limit && self.limit_state != LimitState::Inactive {
            // Solve prismatic and limit constraint in block form
            let cdot2 = self.axis.dot(&(v_b - v_a)) + self.a2 * w_b - self.a1 * w_a;
            let cdot = Vec3::new(cdot1.x, cdot1.y, cdot2);

            let f1 = self.impulse;
            let df = self.k.solve33(-cdot);
            self.impulse += df;

            if self.limit_state == LimitState::AtLower {
                self.impulse.z = self.impulse.z.max(0.0);
            } else if self.limit_state == LimitState::AtUpper {
                self.impulse.z = self.impulse.z.min(0.0);
            }

            // f2(1:2) = invK(1:2,1:2) * (-Cdot(1:2) - K(1:2,3) * (f2(3) - f1(3))) + f1(1:2)
            let b = -cdot1 - Vec2::new(self.k.ez.x, self.k.ez.y) * (self.impulse.z - f1.z);
            let f2r = self.k.solve22(b) + Vec2::new(f1.x, f1.y);
            self.impulse.x = f2r.x;
            self.impulse.y = f2r.y;

            let df = self.impulse - f1;

            let p = self.perp * df.x + self.axis * df.z;
            let l_a = df.x * self.s1 + df.y + df.z * self.a1;
            let l_b = df.x * self.s2 + df.y + df.z * self.a2;

            v_a -= p * m_a;
            w_a -= i_a * l_a;

            v_b += p * m_b;
            w_b += i_b * l_b;
        } else {
            // Limit is inactive, just solve the prismatic constraint in block form
            let df = self.k.solve22(-cdot1);
            self.impulse.x += df.x;
            self.impulse.y += df.y;

            let p = self.perp * df.x;
            let l_a = df.x * self.s1 + df.y;
            let l_b = df.x * self.s2 + df.y;

            v_a -= p * m_a;
            w_a -= i_a * l_a;

            v_b += p * m_b;
            w_b += i_b * l_b;
        }

        data.velocities[self.a.index] = Velocity { v: v_a, w: w_a };
        data.velocities[self.b.index] = Velocity { v: v_b, w: w_b };
    }

    /// Corrects position drift. Returns true when the error is within tolerance.
    pub(crate) fn solve_position_constraints(&mut self, data: &mut SolverData) -> bool {
        let (m_a, m_b, i_a, i_b) = (self.a.inv_mass, self.b.inv_mass, self.a.inv_i, self.b.inv_i);
        let Position { c: mut c_a, a: mut a_a } = data.positions[self.a.index];
        let Position { c: mut c_b, a: mut a_b } = data.positions[self.b.index];
        let config = data.config;

        let q_a = Rot::new(a_a);
        let q_b = Rot::new(a_b);

        // Compute fresh Jacobians
        let r_a = q_a.rotate(self.local_anchor_a - self.a.local_center);
        let r_b = q_b.rotate(self.local_anchor_b - self.b.local_center);
        let d = c_b + r_b - c_a - r_a;

        let axis = q_a.rotate(self.local_x_axis_a);
        let a1 = (d + r_a).cross(&axis);
        let a2 = r_b.cross(&axis);
        let perp = q_a.rotate(self.local_y_axis_a);

        let s1 = (d + r_a).cross(&perp);
        let s2 = r_b.cross(&perp);

        let c1 = Vec2::new(perp.dot(&d), a_b - a_a - self.reference_angle);

        let mut linear_error = c1.x.abs();
        let angular_error = c1.y.abs();

        let mut active = false;
        let mut c2 = 0.0;
        if self.enable_limit {
            let translation = axis.dot(&d);
            let max_correction = config.max_linear_correction;
            if (self.upper_translation - self.lower_translation).abs() < 2.0 * config.linear_slop {
                // Prevent large angular corrections
                c2 = translation.clamp(-max_correction, max_correction);
                linear_error = linear_error.max(translation.abs());
                active = true;
            } else if translation <= self.lower_translation {
                // Prevent large linear corrections and allow some slop
                c2 = (translation - self.lower_translation + config.linear_slop).clamp(-max_correction, 0.0);
                linear_error = linear_error.max(self.lower_translation - translation);
                active = true;
            } else if translation >= self.upper_translation {
                // Prevent large linear corrections and allow some slop
                c2 = (translation - self.upper_translation - config.linear_slop).clamp(0.0, max_correction);
                linear_error = linear_error.max(translation - self.upper_translation);
                active = true;
            }
        }

        let k11 = m_a + m_b + i_a * s1 * s1 + i_b * s2 * s2;
        let k12 = i_a * s1 + i_b * s2;
        let mut k22 = i_a + i_b;
        if k22 == 0.0 {
            // For fixed rotation
            k22 = 1.0;
        }

        let impulse = if active {
            let k13 = i_a * s1 * a1 + i_b * s2 * a2;
            let k23 = i_a * a1 + i_b * a2;
            let k33 = m_a + m_b + i_a * a1 * a1 + i_b * a2 * a2;

            let k = Mat33::new(
                Vec3::new(k11, k12, k13),
                Vec3::new(k12, k22, k23),
                Vec3::new(k13, k23, k33),
            );

            let c = Vec3::new(c1.x, c1.y, c2);
            k.solve33(-c)
        } else {
            let k = Mat22::new(Vec2::new(k11, k12), Vec2::new(k12, k22));
            let impulse1 = k.solve(-c1);
            Vec3::new(impulse1.x, impulse1.y, 0.0)
        };

        let p = perp * impulse.x + axis * impulse.z;
        let l_a = impulse.x * s1 + impulse.y + impulse.z * a1;
        let l_b = impulse.x * s2 + impulse.y + impulse.z * a2;

        c_a -= p * m_a;
        a_a -= i_a * l_a;
        c_b += p * m_b;
        a_b += i_b * l_b;

        data.positions[self.a.index] = Position { c: c_a, a: a_a };
        data.positions[self.b.index] = Position { c: c_b, a: a_b };

        linear_error <= config.linear_slop && angular_error <= config.angular_slop
    }
}

use crate::bodies::Body;
use crate::constraints::joint::{LimitState, SolverBody};
use crate::core::time_step::{Position, SolverData, Velocity};
use crate::math::{Mat22, Mat33, Rot, Vec2, Vec3};

/// Revolute joint definition. The bodies rotate about a shared anchor
/// point; the joint angle is zero at the reference angle.
#[derive(Debug, Clone, PartialEq)]
pub struct RevoluteJointDef {
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,

    /// The body B angle minus body A angle in the reference state (radians)
    pub reference_angle: f32,

    pub enable_limit: bool,

    /// The lower angle for the joint limit (radians)
    pub lower_angle: f32,

    /// The upper angle for the joint limit (radians)
    pub upper_angle: f32,

    pub enable_motor: bool,

    /// The desired motor speed in radians per second
    pub motor_speed: f32,

    /// The maximum motor torque used to achieve the desired motor speed, in N-m
    pub max_motor_torque: f32,
}

impl Default for RevoluteJointDef {
    fn default() -> Self {
        Self {
            local_anchor_a: Vec2::zero(),
            local_anchor_b: Vec2::zero(),
            reference_angle: 0.0,
            enable_limit: false,
            lower_angle: 0.0,
            upper_angle: 0.0,
            enable_motor: false,
            motor_speed: 0.0,
            max_motor_torque: 0.0,
        }
    }
}

impl RevoluteJointDef {
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

/// Constrains two bodies to share a point while rotating freely about it,
/// with an optional angle limit and motor.
///
/// Point-to-point constraint
/// C = p2 - p1
/// Cdot = v2 - v1 = v2 + cross(w2, r2) - v1 - cross(w1, r1)
/// J = [-I -r1_skew I r2_skew ]
///
/// Motor constraint
/// Cdot = w2 - w1
/// J = [0 0 -1 0 0 1]
#[derive(Debug, Clone, PartialEq)]
pub struct RevoluteJoint {
    pub(crate) local_anchor_a: Vec2,
    pub(crate) local_anchor_b: Vec2,
    pub(crate) reference_angle: f32,

    impulse: Vec3,
    motor_impulse: f32,

    enable_motor: bool,
    max_motor_torque: f32,
    motor_speed: f32,

    enable_limit: bool,
    lower_angle: f32,
    upper_angle: f32,

    a: SolverBody,
    b: SolverBody,
    r_a: Vec2,
    r_b: Vec2,
    mass: Mat33,
    motor_mass: f32,
    limit_state: LimitState,
}

impl RevoluteJoint {
    /// Builds the joint from its definition
    pub(crate) fn new(def: &RevoluteJointDef) -> Self {
        Self {
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            reference_angle: def.reference_angle,
            impulse: Vec3::zero(),
            motor_impulse: 0.0,
            enable_motor: def.enable_motor,
            max_motor_torque: def.max_motor_torque,
            motor_speed: def.motor_speed,
            enable_limit: def.enable_limit,
            lower_angle: def.lower_angle,
            upper_angle: def.upper_angle,
            a: SolverBody::default(),
            b: SolverBody::default(),
            r_a: Vec2::zero(),
            r_b: Vec2::zero(),
            mass: Mat33::zero(),
            motor_mass: 0.0,
            limit_state: LimitState::Inactive,
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

    /// The current joint angle in radians
    pub fn joint_angle(&self, body_a: &Body, body_b: &Body) -> f32 {
        body_b.sweep.a - body_a.sweep.a - self.reference_angle
    }

    /// The current joint angular speed in radians per second
    pub fn joint_speed(&self, body_a: &Body, body_b: &Body) -> f32 {
        body_b.angular_velocity - body_a.angular_velocity
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

    /// Lower angle limit in radians
    pub fn lower_limit(&self) -> f32 {
        self.lower_angle
    }

    /// Upper angle limit in radians
    pub fn upper_limit(&self) -> f32 {
        self.upper_angle
    }

    /// Sets the joint limits in radians. `lower` must not exceed `upper`.
    pub fn set_limits(&mut self, lower: f32, upper: f32) {
        if lower != self.lower_angle || upper != self.upper_angle {
            self.impulse.z = 0.0;
            self.lower_angle = lower;
            self.upper_angle = upper;
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

    /// Target motor speed in radians per second
    pub fn motor_speed(&self) -> f32 {
        self.motor_speed
    }

    /// Sets the target motor speed in radians per second
    pub fn set_motor_speed(&mut self, speed: f32) {
        self.motor_speed = speed;
    }

    /// Maximum motor torque in newton meters
    pub fn max_motor_torque(&self) -> f32 {
        self.max_motor_torque
    }

    /// Sets the maximum motor torque in newton meters
    pub fn set_max_motor_torque(&mut self, torque: f32) {
        self.max_motor_torque = torque;
    }

    /// The motor torque applied during the last step, given the inverse time step
    pub fn motor_torque(&self, inv_dt: f32) -> f32 {
        inv_dt * self.motor_impulse
    }

    /// Reaction force on body B at the anchor, in newtons
    pub(crate) fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        Vec2::new(self.impulse.x, self.impulse.y) * inv_dt
    }

    /// Reaction torque on body B, in newton meters
    pub(crate) fn reaction_torque(&self, inv_dt: f32) -> f32 {
        inv_dt * self.impulse.z
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
        let (r_a, r_b) = (self.r_a, self.r_b);

        // J = [-I -r1_skew I r2_skew]
        //     [ 0       -1 0       1]
        // r_skew = [-ry; rx]
        let fixed_rotation = i_a + i_b == 0.0;

        self.mass.ex.x = m_a + m_b + r_a.y * r_a.y * i_a + r_b.y * r_b.y * i_b;
        self.mass.ey.x = -r_a.y * r_a.x * i_a - r_b.y * r_b.x * i_b;
        self.mass.ez.x = -r_a.y * i_a - r_b.y * i_b;
        self.mass.ex.y = self.mass.ey.x;
        self.mass.ey.y = m_a + m_b + r_a.x * r_a.x * i_a + r_b.x * r_b.x * i_b;
        self.mass.ez.y = r_a.x * i_a + r_b.x * i_b;
        self.mass.ex.z = self.mass.ez.x;
        self.mass.ey.z = self.mass.ez.y;
        self.mass.ez.z = i_a + i_b;

        self.motor_mass = i_a + i_b;
        if self.motor_mass > 0.0 {
            self.motor_mass = 1.0 / self.motor_mass;
        }

        if !self.enable_motor || fixed_rotation {
            self.motor_impulse = 0.0;
        }

        if self.enable_limit && !fixed_rotation {
            let joint_angle = a_b - a_a - self.reference_angle;
            if (self.upper_angle - self.lower_angle).abs() < 2.0 * data.config.angular_slop {
                self.limit_state = LimitState::Equal;
            } else if joint_angle <= self.lower_angle {
                if self.limit_state != LimitState::AtLower {
                    self.impulse.z = 0.0;
                }
                self.limit_state = LimitState::AtLower;
            } else if joint_angle >= self.upper_angle {
                if self.limit_state != LimitState::AtUpper {
                    self.impulse.z = 0.0;
                }
                self.limit_state = LimitState::AtUpper;
            } else {
                self.limit_state = LimitState::Inactive;
                self.impulse.z = 0.0;
            }
        } else {
            self.limit_state = LimitState::Inactive;
        }

        if data.step.warm_starting {
            // Scale impulses to support a variable time step
            self.impulse = self.impulse * data.step.dt_ratio;
            self.motor_impulse *= data.step.dt_ratio;

            let p = Vec2::new(self.impulse.x, self.impulse.y);

            v_a -= p * m_a;
            w_a -= i_a * (r_a.cross(&p) + self.motor_impulse + self.impulse.z);

            v_b += p * m_b;
            w_b += i_b * (r_b.cross(&p) + self.motor_impulse + self.impulse.z);
        } else {
            self.impulse = Vec3::zero();
            self.motor_impulse = 0.0;
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

        let fixed_rotation = i_a + i_b == 0.0;

        // Solve motor constraint
        if self.enable_motor && self.limit_state != LimitState::Equal && !fixed_rotation {
            let cdot = w_b - w_a - self.motor_speed;
            let impulse = -self.motor_mass * cdot;
            let old_impulse = self.motor_impulse;
            let max_impulse = data.step.dt * self.max_motor_torque;
            self.motor_impulse = (self.motor_impulse + impulse).clamp(-max_impulse, max_impulse);
            let impulse = self.motor_impulse - old_impulse;

            w_a -= i_a * impulse;
            w_b += i_b * impulse;
        }

        // Solve limit constraint
        if self.enable_limit && self.limit_state != LimitState::Inactive && !fixed_rotation {
            let cdot1 = v_b + Vec2::scalar_cross(w_b, r_b) - v_a - Vec2::scalar_cross(w_a, r_a);
            let cdot2 = w_b - w_a;
            let cdot = Vec3::new(cdot1.x, cdot1.y, cdot2);

            let mut impulse = -self.mass.solve33(cdot);

            match self.limit_state {
                LimitState::Equal => {
                    self.impulse += impulse;
                }
                LimitState::AtLower | LimitState::AtUpper => {
                    let new_impulse = self.impulse.z + impulse.z;
                    let violated = if self.limit_state == LimitState::AtLower {
                        new_impulse < 0.0
                    } else {
                        new_impulse > 0.0
                    };
                    if violated {
                        let rhs = -cdot1 + Vec2::new(self.mass.ez.x, self.mass.ez.y) * self.impulse.z;
                        let reduced = self.mass.solve22(rhs);
                        impulse.x = reduced.x;
                        impulse.y = reduced.y;
                        impulse.z = -self.impulse.z;
                        self.impulse.x += reduced.x;
                        self.impulse.y += reduced.y;
                        self.impulse.z = 0.0;
                    } else {
                        self.impulse += impulse;
                    }
                }
                LimitState::Inactive => {}
            }

            let p = Vec2::new(impulse.x, impulse.y);

            v_a -= p * m_a;
            w_a -= i_a * (r_a.cross(&p) + impulse.z);

            v_b += p * m_b;
            w_b += i_b * (r_b.cross(&p) + impulse.z);
        } else {
            // Solve point to point constraint
            let cdot = v_b + Vec2::scalar_cross(w_b, r_b) - v_a - Vec2::scalar_cross(w_a, r_a);
            let impulse = self.mass.solve22(-cdot);

            self.impulse.x += impulse.x;
            self.impulse.y += impulse.y;

            v_a -= impulse * m_a;
            w_a -= i_a * r_a.cross(&impulse);

            v_b += impulse * m_b;
            w_b += i_b * r_b.cross(&impulse);
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

        let mut angular_error = 0.0;
        let fixed_rotation = i_a + i_b == 0.0;

        // Solve angular limit constraint
        if self.enable_limit && self.limit_state != LimitState::Inactive && !fixed_rotation {
            let angle = a_b - a_a - self.reference_angle;
            let max_correction = config.max_angular_correction;

            let limit_impulse = match self.limit_state {
                LimitState::Equal => {
                    // Prevent large angular corrections
                    let c = (angle - self.lower_angle).clamp(-max_correction, max_correction);
                    angular_error = c.abs();
                    -self.motor_mass * c
                }
                LimitState::AtLower => {
                    let c = angle - self.lower_angle;
                    angular_error = -c;

                    // Prevent large angular corrections and allow some slop
                    let c = (c + config.angular_slop).clamp(-max_correction, 0.0);
                    -self.motor_mass * c
                }
                LimitState::AtUpper => {
                    let c = angle - self.upper_angle;
                    angular_error = c;

                    // Prevent large angular corrections and allow some slop
                    let c = (c - config.angular_slop).clamp(0.0, max_correction);
                    -self.motor_mass * c
                }
                LimitState::Inactive => 0.0,
            };

            a_a -= i_a * limit_impulse;
            a_b += i_b * limit_impulse;
        }

        // Solve point to point constraint
        let q_a = Rot::new(a_a);
        let q_b = Rot::new(a_b);
        let r_a = q_a.rotate(self.local_anchor_a - self.a.local_center);
        let r_b = q_b.rotate(self.local_anchor_b - self.b.local_center);

        let c = c_b + r_b - c_a - r_a;
        let position_error = c.length();

        let k = Mat22::new(
            Vec2::new(
                m_a + m_b + i_a * r_a.y * r_a.y + i_b * r_b.y * r_b.y,
                -i_a * r_a.x * r_a.y - i_b * r_b.x * r_b.y,
            ),
            Vec2::new(
                -i_a * r_a.x * r_a.y - i_b * r_b.x * r_b.y,
                m_a + m_b + i_a * r_a.x * r_a.x + i_b * r_b.x * r_b.x,
            ),
        );

        let impulse = -k.solve(c);

        c_a -= impulse * m_a;
        a_a -= i_a * r_a.cross(&impulse);

        c_b += impulse * m_b;
        a_b += i_b * r_b.cross(&impulse);

        data.positions[self.a.index] = Position { c: c_a, a: a_a };
        data.positions[self.b.index] = Position { c: c_b, a: a_b };

        position_error <= config.linear_slop && angular_error <= config.angular_slop
    }
}

use std::f32::consts::PI;

use crate::bodies::Body;
use crate::constraints::joint::SolverBody;
use crate::core::time_step::{Position, SolverData, Velocity};
use crate::math::{Rot, Vec2};

/// Wheel joint definition. The suspension axis is given in body A
/// coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct WheelJointDef {
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,

    /// The local translation axis in body A
    pub local_axis_a: Vec2,

    pub enable_motor: bool,

    /// The maximum motor torque, usually in N-m
    pub max_motor_torque: f32,

    /// The desired motor speed in radians per second
    pub motor_speed: f32,

    /// Suspension frequency, zero indicates no suspension
    pub frequency_hz: f32,

    /// Suspension damping ratio, one indicates critical damping
    pub damping_ratio: f32,
}

impl Default for WheelJointDef {
    fn default() -> Self {
        Self {
            local_anchor_a: Vec2::zero(),
            local_anchor_b: Vec2::zero(),
            local_axis_a: Vec2::unit_x(),
            enable_motor: false,
            max_motor_torque: 0.0,
            motor_speed: 0.0,
            frequency_hz: 2.0,
            damping_ratio: 0.7,
        }
    }
}

impl WheelJointDef {
    /// Uses a world anchor point and a world translation axis
    pub fn new(body_a: &Body, body_b: &Body, anchor: Vec2, axis: Vec2) -> Self {
        Self {
            local_anchor_a: body_a.local_point(anchor),
            local_anchor_b: body_b.local_point(anchor),
            local_axis_a: body_a.local_vector(axis),
            ..Self::default()
        }
    }
}

/// A line constraint with a rotational motor and a linear spring, used to
/// model vehicle suspension.
///
/// Linear constraint (point-to-line)
/// d = pB - pA = xB + rB - xA - rA
/// C = dot(ay, d)
/// Cdot = dot(d, cross(wA, ay)) + dot(ay, vB + cross(wB, rB) - vA - cross(wA, rA))
/// J = [-ay, -cross(d + rA, ay), ay, cross(rB, ay)]
///
/// Spring linear constraint
/// C = dot(ax, d)
/// J = [-ax -cross(d+rA, ax) ax cross(rB, ax)]
///
/// Motor rotational constraint
/// Cdot = wB - wA
/// J = [0 0 -1 0 0 1]
#[derive(Debug, Clone, PartialEq)]
pub struct WheelJoint {
    local_anchor_a: Vec2,
    local_anchor_b: Vec2,
    local_x_axis_a: Vec2,
    local_y_axis_a: Vec2,

    impulse: f32,
    motor_impulse: f32,
    spring_impulse: f32,

    max_motor_torque: f32,
    motor_speed: f32,
    enable_motor: bool,

    frequency_hz: f32,
    damping_ratio: f32,

    a: SolverBody,
    b: SolverBody,
    ax: Vec2,
    ay: Vec2,
    s_ax: f32,
    s_bx: f32,
    s_ay: f32,
    s_by: f32,
    mass: f32,
    motor_mass: f32,
    spring_mass: f32,
    bias: f32,
    gamma: f32,
}

impl WheelJoint {
    /// Builds the joint from its definition
    pub(crate) fn new(def: &WheelJointDef) -> Self {
        let local_x_axis_a = def.local_axis_a.normalize();
        Self {
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            local_x_axis_a,
            local_y_axis_a: Vec2::scalar_cross(1.0, local_x_axis_a),
            impulse: 0.0,
            motor_impulse: 0.0,
            spring_impulse: 0.0,
            max_motor_torque: def.max_motor_torque,
            motor_speed: def.motor_speed,
            enable_motor: def.enable_motor,
            frequency_hz: def.frequency_hz,
            damping_ratio: def.damping_ratio,
            a: SolverBody::default(),
            b: SolverBody::default(),
            ax: Vec2::zero(),
            ay: Vec2::zero(),
            s_ax: 0.0,
            s_bx: 0.0,
            s_ay: 0.0,
            s_by: 0.0,
            mass: 0.0,
            motor_mass: 0.0,
            spring_mass: 0.0,
            bias: 0.0,
            gamma: 0.0,
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

    /// Translation axis in the frame of body A
    pub fn local_axis_a(&self) -> Vec2 {
        self.local_x_axis_a
    }

    /// The current suspension translation, usually in meters
    pub fn joint_translation(&self, body_a: &Body, body_b: &Body) -> f32 {
        let p_a = body_a.world_point(self.local_anchor_a);
        let p_b = body_b.world_point(self.local_anchor_b);
        let axis = body_a.world_vector(self.local_x_axis_a);
        (p_b - p_a).dot(&axis)
    }

    /// The current wheel angular speed in radians per second
    pub fn joint_speed(&self, body_a: &Body, body_b: &Body) -> f32 {
        body_b.angular_velocity - body_a.angular_velocity
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

    /// Motor torque for the last step, in newton meters
    pub fn motor_torque(&self, inv_dt: f32) -> f32 {
        inv_dt * self.motor_impulse
    }

    /// Suspension spring frequency in hertz
    pub fn spring_frequency(&self) -> f32 {
        self.frequency_hz
    }

    /// Sets the suspension spring frequency in hertz
    pub fn set_spring_frequency(&mut self, hz: f32) {
        self.frequency_hz = hz;
    }

    /// Suspension damping ratio
    pub fn spring_damping_ratio(&self) -> f32 {
        self.damping_ratio
    }

    /// Sets the suspension damping ratio
    pub fn set_spring_damping_ratio(&mut self, ratio: f32) {
        self.damping_ratio = ratio;
    }

    /// Reaction force on body B at the anchor, in newtons
    pub(crate) fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        (self.ay * self.impulse + self.ax * self.spring_impulse) * inv_dt
    }

    /// Reaction torque on body B, in newton meters
    pub(crate) fn reaction_torque(&self, inv_dt: f32) -> f32 {
        inv_dt * self.motor_impulse
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
        let d = c_b + r_b - c_a - r_a;

        // Point to line constraint
        self.ay = q_a.rotate(self.local_y_axis_a);
        self.s_ay = (d + r_a).cross(&self.ay);
        self.s_by = r_b.cross(&self.ay);

        self.mass = m_a + m_b + i_a * self.s_ay * self.s_ay + i_b * self.s_by * self.s_by;
        if self.mass > 0.0 {
            self.mass = 1.0 / self.mass;
        }

        // Spring constraint
        self.spring_mass = 0.0;
        self.bias = 0.0;
        self.gamma = 0.0;
        if self.frequency_hz > 0.0 {
            self.ax = q_a.rotate(self.local_x_axis_a);
            self.s_ax = (d + r_a).cross(&self.ax);
            self.s_bx = r_b.cross(&self.ax);

            let inv_mass = m_a + m_b + i_a * self.s_ax * self.s_ax + i_b * self.s_bx * self.s_bx;

            if inv_mass > 0.0 {
                self.spring_mass = 1.0 / inv_mass;

                let c = d.dot(&self.ax);

                // Frequency
                let omega = 2.0 * PI * self.frequency_hz;

                // Damping coefficient
                let damp = 2.0 * self.spring_mass * self.damping_ratio * omega;

                // Spring stiffness
                let k = self.spring_mass * omega * omega;

                // magic formulas
                let h = data.step.dt;
                self.gamma = h * (damp + h * k);
                if self.gamma > 0.0 {
                    self.gamma = 1.0 / self.gamma;
                }

                self.bias = c * h * k * self.gamma;

                self.spring_mass = inv_mass + self.gamma;
                if self.spring_mass > 0.0 {
                    self.spring_mass = 1.0 / self.spring_mass;
                }
            }
        } else {
            self.spring_impulse = 0.0;
        }

        // Rotational motor
        if self.enable_motor {
            self.motor_mass = i_a + i_b;
            if self.motor_mass > 0.0 {
                self.motor_mass = 1.0 / self.motor_mass;
            }
        } else {
            self.motor_mass = 0.0;
            self.motor_impulse = 0.0;
        }

        if data.step.warm_starting {
            // Account for variable time step
            self.impulse *= data.step.dt_ratio;
            self.spring_impulse *= data.step.dt_ratio;
            self.motor_impulse *= data.step.dt_ratio;

            let p = self.ay * self.impulse + self.ax * self.spring_impulse;
            let l_a = self.impulse * self.s_ay + self.spring_impulse * self.s_ax + self.motor_impulse;
            let l_b = self.impulse * self.s_by + self.spring_impulse * self.s_bx + self.motor_impulse;

            v_a -= p * m_a;
            w_a -= i_a * l_a;

            v_b += p * m_b;
            w_b += i_b * l_b;
        } else {
            self.impulse = 0.0;
            self.spring_impulse = 0.0;
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

        // Solve spring constraint
        {
            let cdot = self.ax.dot(&(v_b - v_a)) + self.s_bx * w_b - self.s_ax * w_a;
            let impulse = -self.spring_mass * (cdot + self.bias + self.gamma * self.spring_impulse);
            self.spring_impulse += impulse;

            let p = self.ax * impulse;
            let l_a = impulse * self.s_ax;
            let l_b = impulse * self.s_bx;

            v_a -= p * m_a;
            w_a -= i_a * l_a;

            v_b += p * m_b;
            w_b += i_b * l_b;
        }

        // Solve rotational motor constraint
        {
            let cdot = w_b - w_a - self.motor_speed;
            let impulse = -self.motor_mass * cdot;

            let old_impulse = self.motor_impulse;
            let max_impulse = data.step.dt * self.max_motor_torque;
            self.motor_impulse = (self.motor_impulse + impulse).clamp(-max_impulse, max_impulse);
            let impulse = self.motor_impulse - old_impulse;

            w_a -= i_a * impulse;
            w_b += i_b * impulse;
        }

        // Solve point to line constraint
        {
            let cdot = self.ay.dot(&(v_b - v_a)) + self.s_by * w_b - self.s_ay * w_a;
            let impulse = -self.mass * cdot;
            self.impulse += impulse;

            let p = self.ay * impulse;
            let l_a = impulse * self.s_ay;
            let l_b = impulse * self.s_by;

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

        let q_a = Rot::new(a_a);
        let q_b = Rot::new(a_b);

        let r_a = q_a.rotate(self.local_anchor_a - self.a.local_center);
        let r_b = q_b.rotate(self.local_anchor_b - self.b.local_center);
        let d = (c_b - c_a) + r_b - r_a;

        let ay = q_a.rotate(self.local_y_axis_a);

        let s_ay = (d + r_a).cross(&ay);
        let s_by = r_b.cross(&ay);

        let c = d.dot(&ay);

        let k = m_a + m_b + i_a * s_ay * s_ay + i_b * s_by * s_by;

        let impulse = if k != 0.0 { -c / k } else { 0.0 };

        let p = ay * impulse;
        let l_a = impulse * s_ay;
        let l_b = impulse * s_by;

        c_a -= p * m_a;
        a_a -= i_a * l_a;
        c_b += p * m_b;
        a_b += i_b * l_b;

        data.positions[self.a.index] = Position { c: c_a, a: a_a };
        data.positions[self.b.index] = Position { c: c_b, a: a_b };

        c.abs() <= data.config.linear_slop
    }
}

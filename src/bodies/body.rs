use crate::bodies::body_flags::BodyFlags;
use crate::bodies::{BodyType, ContactEdge, JointEdge};
use crate::core::{BodyHandle, FixtureHandle};
use crate::error::PhysicsError;
use crate::math::{Vec2, Rot, Transform, Sweep};
use crate::shapes::MassData;
use crate::Result;

/// Parameters used to construct a body
#[derive(Debug, Clone, PartialEq)]
pub struct BodyDef {
    /// The body type: static, kinematic, or dynamic
    pub body_type: BodyType,

    /// The world position of the body origin
    pub position: Vec2,

    /// The world angle of the body in radians
    pub angle: f32,

    /// The linear velocity of the body's origin in world coordinates
    pub linear_velocity: Vec2,

    /// The angular velocity of the body
    pub angular_velocity: f32,

    /// Reduces the linear velocity over time
    pub linear_damping: f32,

    /// Reduces the angular velocity over time
    pub angular_damping: f32,

    /// Set this flag to false if this body should never fall asleep
    pub allow_sleep: bool,

    /// Is this body initially awake or sleeping?
    pub awake: bool,

    /// Should this body be prevented from rotating?
    pub fixed_rotation: bool,

    /// Is this a fast moving body? The flag is stored for the caller;
    /// the step has no continuous collision and treats bullets like any
    /// other dynamic body.
    pub bullet: bool,

    /// Does this body start out active?
    pub active: bool,

    /// Scale the gravity applied to this body
    pub gravity_scale: f32,

    /// Application specific data
    pub user_data: u64,
}

impl Default for BodyDef {
    fn default() -> Self {
        Self {
            body_type: BodyType::Static,
            position: Vec2::zero(),
            angle: 0.0,
            linear_velocity: Vec2::zero(),
            angular_velocity: 0.0,
            linear_damping: 0.0,
            angular_damping: 0.0,
            allow_sleep: true,
            awake: true,
            fixed_rotation: false,
            bullet: false,
            active: true,
            gravity_scale: 1.0,
            user_data: 0,
        }
    }
}

impl BodyDef {
    /// A dynamic body at the given position
    pub fn dynamic(position: Vec2) -> Self {
        Self { body_type: BodyType::Dynamic, position, ..Self::default() }
    }

    /// A kinematic body at the given position
    pub fn kinematic(position: Vec2) -> Self {
        Self { body_type: BodyType::Kinematic, position, ..Self::default() }
    }

    /// A static body at the given position
    pub fn fixed(position: Vec2) -> Self {
        Self { body_type: BodyType::Static, position, ..Self::default() }
    }

    /// Checks the definition for non-finite or negative values
    pub fn validate(&self) -> Result<()> {
        if !self.position.is_valid() || !self.angle.is_finite() {
            return Err(PhysicsError::InvalidParameter("body position and angle must be finite".to_string()));
        }
        if !self.linear_velocity.is_valid() || !self.angular_velocity.is_finite() {
            return Err(PhysicsError::InvalidParameter("body velocity must be finite".to_string()));
        }
        if !(self.linear_damping >= 0.0 && self.angular_damping >= 0.0) {
            return Err(PhysicsError::InvalidParameter(format!(
                "body damping must be non-negative, got {} / {}", self.linear_damping, self.angular_damping
            )));
        }
        if !self.gravity_scale.is_finite() {
            return Err(PhysicsError::InvalidParameter("gravity scale must be finite".to_string()));
        }
        Ok(())
    }
}

/// A rigid body. Bodies are created by the world and own an ordered list
/// of fixtures.
#[derive(Debug, Clone)]
pub struct Body {
    pub(crate) body_type: BodyType,
    pub(crate) flags: BodyFlags,

    /// Index of the body inside the island currently being solved
    pub(crate) island_index: usize,

    /// The body origin transform
    pub(crate) xf: Transform,

    /// The swept motion for CCD and the solver
    pub(crate) sweep: Sweep,

    pub(crate) linear_velocity: Vec2,
    pub(crate) angular_velocity: f32,

    pub(crate) force: Vec2,
    pub(crate) torque: f32,

    pub(crate) fixtures: Vec<FixtureHandle>,
    pub(crate) joint_edges: Vec<JointEdge>,
    pub(crate) contact_edges: Vec<ContactEdge>,

    pub(crate) mass: f32,
    pub(crate) inv_mass: f32,

    /// Rotational inertia about the center of mass
    pub(crate) inertia: f32,
    pub(crate) inv_inertia: f32,

    pub(crate) linear_damping: f32,
    pub(crate) angular_damping: f32,
    pub(crate) gravity_scale: f32,

    pub(crate) sleep_time: f32,

    /// Application specific data
    pub user_data: u64,
}

impl Body {
    /// Builds a body from a validated definition
    pub(crate) fn new(def: &BodyDef) -> Self {
        let mut flags = BodyFlags::empty();
        flags.set(BodyFlags::BULLET, def.bullet);
        flags.set(BodyFlags::FIXED_ROTATION, def.fixed_rotation);
        flags.set(BodyFlags::AUTO_SLEEP, def.allow_sleep);
        flags.set(BodyFlags::AWAKE, def.awake);
        flags.set(BodyFlags::ACTIVE, def.active);

        let xf = Transform::new(def.position, Rot::new(def.angle));
        let sweep = Sweep {
            local_center: Vec2::zero(),
            c0: xf.p,
            c: xf.p,
            a0: def.angle,
            a: def.angle,
        };

        let (mass, inv_mass) = if def.body_type == BodyType::Dynamic { (1.0, 1.0) } else { (0.0, 0.0) };

        Self {
            body_type: def.body_type,
            flags,
            island_index: 0,
            xf,
            sweep,
            linear_velocity: def.linear_velocity,
            angular_velocity: def.angular_velocity,
            force: Vec2::zero(),
            torque: 0.0,
            fixtures: Vec::new(),
            joint_edges: Vec::new(),
            contact_edges: Vec::new(),
            mass,
            inv_mass,
            inertia: 0.0,
            inv_inertia: 0.0,
            linear_damping: def.linear_damping,
            angular_damping: def.angular_damping,
            gravity_scale: def.gravity_scale,
            sleep_time: 0.0,
            user_data: def.user_data,
        }
    }

    /// Returns the type of this body
    pub fn body_type(&self) -> BodyType {
        self.body_type
    }

    /// Returns the body origin transform
    pub fn transform(&self) -> &Transform {
        &self.xf
    }

    /// Returns the world position of the body origin
    pub fn position(&self) -> Vec2 {
        self.xf.p
    }

    /// Returns the current world rotation angle in radians
    pub fn angle(&self) -> f32 {
        self.sweep.a
    }

    /// Returns the world position of the center of mass
    pub fn world_center(&self) -> Vec2 {
        self.sweep.c
    }

    /// Returns the local position of the center of mass
    pub fn local_center(&self) -> Vec2 {
        self.sweep.local_center
    }

    /// Returns the linear velocity of the center of mass
    pub fn linear_velocity(&self) -> Vec2 {
        self.linear_velocity
    }

    /// Sets the linear velocity of the center of mass. Ignored for static bodies.
    pub fn set_linear_velocity(&mut self, v: Vec2) {
        if self.body_type == BodyType::Static {
            return;
        }
        if v.dot(&v) > 0.0 {
            self.set_awake(true);
        }
        self.linear_velocity = v;
    }

    /// Returns the angular velocity in radians per second
    pub fn angular_velocity(&self) -> f32 {
        self.angular_velocity
    }

    /// Sets the angular velocity. Ignored for static bodies.
    pub fn set_angular_velocity(&mut self, w: f32) {
        if self.body_type == BodyType::Static {
            return;
        }
        if w * w > 0.0 {
            self.set_awake(true);
        }
        self.angular_velocity = w;
    }

    /// Applies a force at a world point. If the force is not applied at the
    /// center of mass, it will generate a torque and affect the angular
    /// velocity. A sleeping body is only affected when `wake` is set.
    pub fn apply_force(&mut self, force: Vec2, point: Vec2, wake: bool) {
        if !self.prepare_for_load(wake) {
            return;
        }
        self.force += force;
        self.torque += (point - self.sweep.c).cross(&force);
    }

    /// Applies a force to the center of mass
    pub fn apply_force_to_center(&mut self, force: Vec2, wake: bool) {
        if !self.prepare_for_load(wake) {
            return;
        }
        self.force += force;
    }

    /// Applies a torque. This affects the angular velocity without
    /// affecting the linear velocity of the center of mass.
    pub fn apply_torque(&mut self, torque: f32, wake: bool) {
        if !self.prepare_for_load(wake) {
            return;
        }
        self.torque += torque;
    }

    /// Applies an impulse at a world point. This immediately modifies the
    /// velocity and, when off-center, the angular velocity.
    pub fn apply_linear_impulse(&mut self, impulse: Vec2, point: Vec2, wake: bool) {
        if !self.prepare_for_load(wake) {
            return;
        }
        self.linear_velocity += impulse * self.inv_mass;
        self.angular_velocity += self.inv_inertia * (point - self.sweep.c).cross(&impulse);
    }

    /// Applies an impulse to the center of mass
    pub fn apply_linear_impulse_to_center(&mut self, impulse: Vec2, wake: bool) {
        if !self.prepare_for_load(wake) {
            return;
        }
        self.linear_velocity += impulse * self.inv_mass;
    }

    /// Applies an angular impulse
    pub fn apply_angular_impulse(&mut self, impulse: f32, wake: bool) {
        if !self.prepare_for_load(wake) {
            return;
        }
        self.angular_velocity += self.inv_inertia * impulse;
    }

    fn prepare_for_load(&mut self, wake: bool) -> bool {
        if self.body_type != BodyType::Dynamic {
            return false;
        }
        if wake && !self.is_awake() {
            self.set_awake(true);
        }
        self.is_awake()
    }

    /// Returns the accumulated force
    pub fn force(&self) -> Vec2 {
        self.force
    }

    /// Returns the accumulated torque
    pub fn torque(&self) -> f32 {
        self.torque
    }

    /// Returns the total mass of the body
    pub fn mass(&self) -> f32 {
        self.mass
    }

    /// Returns the inverse mass, zero for static and kinematic bodies
    pub fn inv_mass(&self) -> f32 {
        self.inv_mass
    }

    /// Returns the rotational inertia about the body origin
    pub fn inertia(&self) -> f32 {
        self.inertia + self.mass * self.sweep.local_center.dot(&self.sweep.local_center)
    }

    /// Returns the mass data of the body
    pub fn mass_data(&self) -> MassData {
        MassData {
            mass: self.mass,
            center: self.sweep.local_center,
            inertia: self.inertia(),
        }
    }

    /// Overrides the mass properties computed from the fixtures. Only
    /// dynamic bodies are affected; a non-positive mass becomes 1.
    pub fn set_mass_data(&mut self, data: &MassData) {
        if self.body_type != BodyType::Dynamic {
            return;
        }

        self.inv_mass = 0.0;
        self.inertia = 0.0;
        self.inv_inertia = 0.0;

        self.mass = if data.mass > 0.0 { data.mass } else { 1.0 };
        self.inv_mass = 1.0 / self.mass;

        if data.inertia > 0.0 && !self.is_fixed_rotation() {
            self.inertia = data.inertia - self.mass * data.center.dot(&data.center);
            if self.inertia > 0.0 {
                self.inv_inertia = 1.0 / self.inertia;
            } else {
                self.inertia = 0.0;
            }
        }

        self.move_center(data.center);
    }

    /// Recomputes mass properties from the given per-fixture mass data
    pub(crate) fn reset_mass_data<I>(&mut self, fixtures: I)
    where
        I: IntoIterator<Item = MassData>,
    {
        self.mass = 0.0;
        self.inv_mass = 0.0;
        self.inertia = 0.0;
        self.inv_inertia = 0.0;
        self.sweep.local_center = Vec2::zero();

        // Static and kinematic bodies have zero mass
        if self.body_type != BodyType::Dynamic {
            self.sweep.c0 = self.xf.p;
            self.sweep.c = self.xf.p;
            self.sweep.a0 = self.sweep.a;
            return;
        }

        // Accumulate mass over all fixtures
        let mut local_center = Vec2::zero();
        let mut inertia = 0.0;
        for data in fixtures {
            self.mass += data.mass;
            local_center += data.center * data.mass;
            inertia += data.inertia;
        }

        if self.mass > 0.0 {
            self.inv_mass = 1.0 / self.mass;
            local_center *= self.inv_mass;
        } else {
            // Force all dynamic bodies to have a positive mass
            self.mass = 1.0;
            self.inv_mass = 1.0;
        }

        if inertia > 0.0 && !self.is_fixed_rotation() {
            // Center the inertia about the center of mass
            self.inertia = inertia - self.mass * local_center.dot(&local_center);
            if self.inertia > 0.0 {
                self.inv_inertia = 1.0 / self.inertia;
            } else {
                self.inertia = 0.0;
            }
        }

        self.move_center(local_center);
    }

    /// Moves the center of mass, keeping the velocity of the origin
    fn move_center(&mut self, local_center: Vec2) {
        let old_center = self.sweep.c;
        self.sweep.local_center = local_center;
        self.sweep.c = self.xf.apply(local_center);
        self.sweep.c0 = self.sweep.c;

        // Update center of mass velocity
        self.linear_velocity += Vec2::scalar_cross(self.angular_velocity, self.sweep.c - old_center);
    }

    /// Gets the world coordinates of a point given in body coordinates
    pub fn world_point(&self, local_point: Vec2) -> Vec2 {
        self.xf.apply(local_point)
    }

    /// Gets the world coordinates of a vector given in body coordinates
    pub fn world_vector(&self, local_vector: Vec2) -> Vec2 {
        self.xf.q.rotate(local_vector)
    }

    /// Gets a local point relative to the body origin from a world point
    pub fn local_point(&self, world_point: Vec2) -> Vec2 {
        self.xf.apply_inverse(world_point)
    }

    /// Gets a local vector from a world vector
    pub fn local_vector(&self, world_vector: Vec2) -> Vec2 {
        self.xf.q.inv_rotate(world_vector)
    }

    /// Gets the world velocity of a point attached to this body
    pub fn linear_velocity_from_world_point(&self, world_point: Vec2) -> Vec2 {
        self.linear_velocity + Vec2::scalar_cross(self.angular_velocity, world_point - self.sweep.c)
    }

    /// Gets the world velocity of a point given in body coordinates
    pub fn linear_velocity_from_local_point(&self, local_point: Vec2) -> Vec2 {
        self.linear_velocity_from_world_point(self.world_point(local_point))
    }

    /// Linear damping, reduces the linear velocity over time
    pub fn linear_damping(&self) -> f32 {
        self.linear_damping
    }

    /// Sets the linear damping
    pub fn set_linear_damping(&mut self, damping: f32) {
        self.linear_damping = damping.max(0.0);
    }

    /// Angular damping, reduces the angular velocity over time
    pub fn angular_damping(&self) -> f32 {
        self.angular_damping
    }

    /// Sets the angular damping
    pub fn set_angular_damping(&mut self, damping: f32) {
        self.angular_damping = damping.max(0.0);
    }

    /// Scale applied to the world gravity
    pub fn gravity_scale(&self) -> f32 {
        self.gravity_scale
    }

    /// Scales the world gravity
    pub fn set_gravity_scale(&mut self, scale: f32) {
        self.gravity_scale = scale;
    }

    /// Marks the body as fast moving. Stored only: there is no continuous
    /// collision, so a bullet steps exactly like a plain dynamic body.
    pub fn set_bullet(&mut self, flag: bool) {
        self.flags.set(BodyFlags::BULLET, flag);
    }

    /// Whether the body is marked as fast moving
    pub fn is_bullet(&self) -> bool {
        self.flags.contains(BodyFlags::BULLET)
    }

    /// Enables or disables sleeping. Disabling wakes the body.
    pub fn set_sleeping_allowed(&mut self, flag: bool) {
        self.flags.set(BodyFlags::AUTO_SLEEP, flag);
        if !flag {
            self.set_awake(true);
        }
    }

    /// Whether the body may fall asleep
    pub fn is_sleeping_allowed(&self) -> bool {
        self.flags.contains(BodyFlags::AUTO_SLEEP)
    }

    /// Sets the sleep state. A sleeping body has very low CPU cost and
    /// loses its velocity and accumulated forces.
    pub fn set_awake(&mut self, flag: bool) {
        if flag {
            if !self.flags.contains(BodyFlags::AWAKE) {
                self.flags.insert(BodyFlags::AWAKE);
                self.sleep_time = 0.0;
            }
        } else {
            self.flags.remove(BodyFlags::AWAKE);
            self.sleep_time = 0.0;
            self.linear_velocity = Vec2::zero();
            self.angular_velocity = 0.0;
            self.force = Vec2::zero();
            self.torque = 0.0;
        }
    }

    /// Whether the body is simulated this step
    pub fn is_awake(&self) -> bool {
        self.flags.contains(BodyFlags::AWAKE)
    }

    /// Inactive bodies are not simulated and have no contacts
    pub fn is_active(&self) -> bool {
        self.flags.contains(BodyFlags::ACTIVE)
    }

    /// Whether rotation is locked
    pub fn is_fixed_rotation(&self) -> bool {
        self.flags.contains(BodyFlags::FIXED_ROTATION)
    }

    /// The fixtures attached to this body, in creation order
    pub fn fixtures(&self) -> &[FixtureHandle] {
        &self.fixtures
    }

    /// The joints attached to this body
    pub fn joint_edges(&self) -> &[JointEdge] {
        &self.joint_edges
    }

    /// The contacts this body takes part in
    pub fn contact_edges(&self) -> &[ContactEdge] {
        &self.contact_edges
    }

    /// Returns false when the two bodies may never collide: neither is
    /// dynamic, or a joint between them disables collision.
    pub(crate) fn should_collide(&self, other_handle: BodyHandle, other: &Body) -> bool {
        // At least one body should be dynamic
        if self.body_type != BodyType::Dynamic && other.body_type != BodyType::Dynamic {
            return false;
        }

        !self
            .joint_edges
            .iter()
            .any(|edge| edge.other == other_handle && !edge.collide_connected)
    }

    /// Updates the origin transform from the sweep
    pub(crate) fn synchronize_transform(&mut self) {
        self.xf.q.set(self.sweep.a);
        self.xf.p = self.sweep.c - self.xf.q.rotate(self.sweep.local_center);
    }

    /// Places the body and resets its sweep
    pub(crate) fn set_transform_internal(&mut self, position: Vec2, angle: f32) {
        self.xf.set(position, angle);
        self.sweep.c = self.xf.apply(self.sweep.local_center);
        self.sweep.a = angle;
        self.sweep.c0 = self.sweep.c;
        self.sweep.a0 = angle;
    }

    /// Zeroes the accumulated force and torque
    pub(crate) fn clear_forces(&mut self) {
        self.force = Vec2::zero();
        self.torque = 0.0;
    }
}

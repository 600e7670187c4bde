use tracing::{debug, trace, warn};

use crate::bodies::body_flags::BodyFlags;
use crate::bodies::{Body, BodyDef, BodyType, Fixture, FixtureDef, FixtureProxy, JointEdge};
use crate::collision::contact_manager::ContactManager;
use crate::collision::{BroadPhase, Contact, ContactFilter, Filter};
use crate::constraints::{Joint, JointDef, JointKind};
use crate::core::island::IslandBuilder;
use crate::core::{
    Arena, BodyHandle, ContactHandle, ContactListener, FixtureHandle, JointHandle, ParticleSystemHandle,
    QueryCallback, RayCastCallback, SimulationConfig, TimeStep,
};
use crate::error::PhysicsError;
use crate::math::{Aabb, RayCastInput, Transform, Vec2};
use crate::particles::{ParticleSystem, ParticleSystemDef, ParticleWorld};
use crate::Result;

/// Particle iterations recommended at most by
/// [`World::calculate_reasonable_particle_iterations`]
const MAX_RECOMMENDED_PARTICLE_ITERATIONS: u32 = 8;

/// Fraction of the particle radius a particle may fall per sub-step
const PARTICLE_RADIUS_THRESHOLD: f32 = 0.01;

/// The physics world. Owns every body, fixture, joint, contact and particle
/// system, and advances them with [`World::step`].
pub struct World {
    bodies: Arena<BodyHandle, Body>,
    fixtures: Arena<FixtureHandle, Fixture>,
    joints: Arena<JointHandle, Joint>,
    particle_systems: Arena<ParticleSystemHandle, ParticleSystem>,
    contact_manager: ContactManager,
    islands: IslandBuilder,

    /// Configuration for the simulation
    config: SimulationConfig,

    /// Inverse time step of the last step with dt > 0, for warm starting
    inv_dt0: f32,

    /// A fixture was created or re-activated since the last pair search
    new_fixture: bool,

    auto_clear_forces: bool,
}

impl Default for World {
    fn default() -> Self {
        Self::new(SimulationConfig::default().gravity)
    }
}

impl World {
    /// Creates a world with default settings and the given gravity
    pub fn new(gravity: Vec2) -> Self {
        Self::build(SimulationConfig::with_gravity(gravity))
    }

    /// Creates a world with the given configuration
    pub fn with_config(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: SimulationConfig) -> Self {
        let broad_phase = BroadPhase::new(config.broad_phase_cell_size, config.aabb_extension, config.aabb_multiplier);
        Self {
            bodies: Arena::new(),
            fixtures: Arena::new(),
            joints: Arena::new(),
            particle_systems: Arena::new(),
            contact_manager: ContactManager::new(broad_phase),
            islands: IslandBuilder::new(),
            config,
            inv_dt0: 0.0,
            new_fixture: false,
            auto_clear_forces: true,
        }
    }

    /// Returns a reference to the simulation configuration
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// World gravity
    pub fn gravity(&self) -> Vec2 {
        self.config.gravity
    }

    /// Sets the world gravity
    pub fn set_gravity(&mut self, gravity: Vec2) {
        self.config.gravity = gravity;
    }

    /// Whether bodies may fall asleep
    pub fn allow_sleeping(&self) -> bool {
        self.config.allow_sleeping
    }

    /// Enables or disables sleeping. Disabling wakes every body.
    pub fn set_allow_sleeping(&mut self, flag: bool) {
        if flag == self.config.allow_sleeping {
            return;
        }

        self.config.allow_sleeping = flag;
        if !flag {
            for body in self.bodies.values_mut() {
                body.set_awake(true);
            }
        }
    }

    /// Whether impulses from the previous step seed the solver
    pub fn warm_starting(&self) -> bool {
        self.config.warm_starting
    }

    /// Enables or disables warm starting
    pub fn set_warm_starting(&mut self, flag: bool) {
        self.config.warm_starting = flag;
    }

    /// Whether forces are cleared after every step
    pub fn auto_clear_forces(&self) -> bool {
        self.auto_clear_forces
    }

    /// Sets whether forces are cleared after each step
    pub fn set_auto_clear_forces(&mut self, flag: bool) {
        self.auto_clear_forces = flag;
    }

    /// Clears the accumulated forces and torques of every body
    pub fn clear_forces(&mut self) {
        for body in self.bodies.values_mut() {
            body.clear_forces();
        }
    }

    /// Installs the listener notified of contact and particle contact events
    pub fn set_contact_listener(&mut self, listener: Box<dyn ContactListener>) {
        self.contact_manager.contact_listener = Some(listener);
    }

    /// Removes and returns the contact listener
    pub fn take_contact_listener(&mut self) -> Option<Box<dyn ContactListener>> {
        self.contact_manager.contact_listener.take()
    }

    /// Installs a filter consulted instead of the fixture filter data
    pub fn set_contact_filter(&mut self, filter: Box<dyn ContactFilter>) {
        self.contact_manager.contact_filter = Some(filter);
    }

    // Bodies

    /// Creates a rigid body without fixtures
    pub fn create_body(&mut self, def: &BodyDef) -> Result<BodyHandle> {
        def.validate()?;
        let handle = self.bodies.insert(Body::new(def));
        debug!(?handle, body_type = ?def.body_type, "Created body");
        Ok(handle)
    }

    /// Destroys a body together with its joints, contacts and fixtures
    pub fn destroy_body(&mut self, handle: BodyHandle) -> Result<()> {
        let body = self.bodies.fetch(handle)?;
        let joint_edges = body.joint_edges.clone();
        let contact_edges = body.contact_edges.clone();
        let fixture_handles = body.fixtures.clone();

        for edge in joint_edges {
            // A gear joint destroyed earlier in this loop takes its edges with it
            if self.joints.contains(edge.joint) {
                self.destroy_joint(edge.joint)?;
            }
        }

        for edge in contact_edges {
            self.contact_manager.destroy(edge.contact, &mut self.bodies, &self.fixtures);
        }

        for &fixture in &fixture_handles {
            if let Some(Fixture { proxy: Some(proxy), .. }) = self.fixtures.remove(fixture) {
                self.contact_manager.broad_phase.destroy_proxy(proxy.proxy_id);
            }
        }
        for system in self.particle_systems.values_mut() {
            system.remove_fixture_contacts(&fixture_handles);
        }

        self.bodies.remove(handle);
        debug!(?handle, fixtures = fixture_handles.len(), "Destroyed body");
        Ok(())
    }

    /// Gets a body
    pub fn body(&self, handle: BodyHandle) -> Result<&Body> {
        self.bodies.fetch(handle)
    }

    /// Mutable access to a body
    pub fn body_mut(&mut self, handle: BodyHandle) -> Result<&mut Body> {
        self.bodies.fetch_mut(handle)
    }

    /// All bodies with their handles
    pub fn bodies(&self) -> impl Iterator<Item = (BodyHandle, &Body)> + '_ {
        self.bodies.iter()
    }

    /// Number of bodies
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Places a body origin and angle, updating its broadphase proxies.
    /// Contacts are updated on the next step.
    pub fn set_transform(&mut self, handle: BodyHandle, position: Vec2, angle: f32) -> Result<()> {
        if !position.is_valid() || !angle.is_finite() {
            warn!(?handle, "rejected non-finite body transform");
            return Err(PhysicsError::InvalidParameter("body transform must be finite".to_string()));
        }

        let body = self.bodies.fetch_mut(handle)?;
        body.set_transform_internal(position, angle);

        let body = &self.bodies[handle];
        synchronize_fixtures(body, &mut self.fixtures, &mut self.contact_manager.broad_phase);
        self.new_fixture = true;
        Ok(())
    }

    /// Changes the body type, recomputing mass and dropping its contacts
    pub fn set_body_type(&mut self, handle: BodyHandle, body_type: BodyType) -> Result<()> {
        let body = self.bodies.fetch_mut(handle)?;
        if body.body_type == body_type {
            return Ok(());
        }

        body.body_type = body_type;
        self.reset_mass_data(handle)?;

        let body = &mut self.bodies[handle];
        if body_type == BodyType::Static {
            body.linear_velocity = Vec2::zero();
            body.angular_velocity = 0.0;
            body.sweep.a0 = body.sweep.a;
            body.sweep.c0 = body.sweep.c;
            synchronize_fixtures(body, &mut self.fixtures, &mut self.contact_manager.broad_phase);
        }

        let body = &mut self.bodies[handle];
        body.set_awake(true);
        body.clear_forces();
        let contact_edges = body.contact_edges.clone();
        let fixture_handles = body.fixtures.clone();

        for edge in contact_edges {
            self.contact_manager.destroy(edge.contact, &mut self.bodies, &self.fixtures);
        }

        // Touch the proxies so that new contacts will be created
        for fixture in fixture_handles {
            if let Some(proxy) = self.fixtures.get(fixture).and_then(|f| f.proxy) {
                self.contact_manager.broad_phase.touch_proxy(proxy.proxy_id);
            }
        }

        debug!(?handle, ?body_type, "Changed body type");
        Ok(())
    }

    /// Activates or deactivates a body. Inactive bodies have no proxies,
    /// no contacts and are not simulated; their joints are ignored.
    pub fn set_body_active(&mut self, handle: BodyHandle, flag: bool) -> Result<()> {
        let body = self.bodies.fetch_mut(handle)?;
        if body.is_active() == flag {
            return Ok(());
        }

        if flag {
            body.flags.insert(BodyFlags::ACTIVE);
            let body = &self.bodies[handle];
            create_proxies(body, &mut self.fixtures, &mut self.contact_manager.broad_phase);
            self.new_fixture = true;
        } else {
            body.flags.remove(BodyFlags::ACTIVE);
            let body = &self.bodies[handle];
            let contact_edges = body.contact_edges.clone();
            destroy_proxies(body, &mut self.fixtures, &mut self.contact_manager.broad_phase);

            for edge in contact_edges {
                self.contact_manager.destroy(edge.contact, &mut self.bodies, &self.fixtures);
            }
        }

        debug!(?handle, active = flag, "Changed body activity");
        Ok(())
    }

    /// Locks or unlocks the rotation of a body
    pub fn set_fixed_rotation(&mut self, handle: BodyHandle, flag: bool) -> Result<()> {
        let body = self.bodies.fetch_mut(handle)?;
        if body.is_fixed_rotation() == flag {
            return Ok(());
        }

        body.flags.set(BodyFlags::FIXED_ROTATION, flag);
        body.angular_velocity = 0.0;
        self.reset_mass_data(handle)
    }

    /// Recomputes the mass properties of a body from its fixture densities
    pub fn reset_mass_data(&mut self, handle: BodyHandle) -> Result<()> {
        let body = self.bodies.fetch_mut(handle)?;
        let fixtures = &self.fixtures;
        let mass_data = body
            .fixtures
            .iter()
            .filter_map(|&fixture| fixtures.get(fixture))
            .filter(|fixture| fixture.density > 0.0)
            .map(Fixture::mass_data)
            .collect::<Vec<_>>();
        body.reset_mass_data(mass_data);
        Ok(())
    }

    // Fixtures

    /// Attaches a shape to a body. The body mass is updated when the
    /// fixture has a positive density.
    pub fn create_fixture(&mut self, body: BodyHandle, def: &FixtureDef) -> Result<FixtureHandle> {
        def.validate()?;
        let owner = self.bodies.fetch(body)?;
        let active = owner.is_active();
        let xf = owner.xf;

        let handle = self.fixtures.insert(Fixture::new(body, def));
        if active {
            let fixture = &mut self.fixtures[handle];
            let aabb = fixture.shape.compute_aabb(&xf);
            let proxy_id = self.contact_manager.broad_phase.create_proxy(&aabb, handle);
            fixture.proxy = Some(FixtureProxy { aabb, proxy_id });
        }

        self.bodies[body].fixtures.push(handle);
        if def.density > 0.0 {
            self.reset_mass_data(body)?;
        }

        // Let the world know we have a new fixture. This will cause new
        // contacts to be created at the beginning of the next time step.
        self.new_fixture = true;

        debug!(?handle, ?body, shape = ?def.shape.shape_type(), "Created fixture");
        Ok(handle)
    }

    /// Detaches and destroys a fixture, its contacts and its proxy
    pub fn destroy_fixture(&mut self, handle: FixtureHandle) -> Result<()> {
        let body = self.fixtures.fetch(handle)?.body;

        let contact_edges = self.bodies.get(body).map(|b| b.contact_edges.clone()).unwrap_or_default();
        for edge in contact_edges {
            let involved = self
                .contact_manager
                .contacts
                .get(edge.contact)
                .is_some_and(|c| c.fixture_a == handle || c.fixture_b == handle);
            if involved {
                self.contact_manager.destroy(edge.contact, &mut self.bodies, &self.fixtures);
            }
        }

        if let Some(Fixture { proxy: Some(proxy), .. }) = self.fixtures.remove(handle) {
            self.contact_manager.broad_phase.destroy_proxy(proxy.proxy_id);
        }
        for system in self.particle_systems.values_mut() {
            system.remove_fixture_contacts(&[handle]);
        }

        if let Some(owner) = self.bodies.get_mut(body) {
            owner.fixtures.retain(|&f| f != handle);
        }
        self.reset_mass_data(body)?;

        debug!(?handle, ?body, "Destroyed fixture");
        Ok(())
    }

    /// Gets a fixture
    pub fn fixture(&self, handle: FixtureHandle) -> Result<&Fixture> {
        self.fixtures.fetch(handle)
    }

    /// Mutable access to material properties. Density changes apply on
    /// the next [`World::reset_mass_data`].
    pub fn fixture_mut(&mut self, handle: FixtureHandle) -> Result<&mut Fixture> {
        self.fixtures.fetch_mut(handle)
    }

    /// Number of fixtures
    pub fn fixture_count(&self) -> usize {
        self.fixtures.len()
    }

    /// Replaces the collision filter of a fixture and refilters its contacts
    pub fn set_filter(&mut self, handle: FixtureHandle, filter: Filter) -> Result<()> {
        self.fixtures.fetch_mut(handle)?.filter = filter;
        self.refilter(handle)
    }

    /// Flags the contacts of a fixture for filtering on the next step. Call
    /// this when the result of a custom contact filter changes.
    pub fn refilter(&mut self, handle: FixtureHandle) -> Result<()> {
        let fixture = self.fixtures.fetch(handle)?;
        let proxy = fixture.proxy;
        let body = self.bodies.fetch(fixture.body)?;

        for edge in &body.contact_edges {
            if let Some(contact) = self.contact_manager.contacts.get_mut(edge.contact) {
                if contact.fixture_a == handle || contact.fixture_b == handle {
                    contact.flag_for_filtering();
                }
            }
        }

        // Touch the proxy so that new contacts will be created
        if let Some(proxy) = proxy {
            self.contact_manager.broad_phase.touch_proxy(proxy.proxy_id);
        }
        Ok(())
    }

    // Joints

    /// Creates a joint between two bodies of this world
    pub fn create_joint(&mut self, def: &JointDef) -> Result<JointHandle> {
        let joint = Joint::new(def, &self.bodies, &self.joints)?;
        let (body_a, body_b, collide_connected) = (joint.body_a, joint.body_b, joint.collide_connected);
        let joint_type = joint.joint_type();

        let handle = self.joints.insert(joint);

        // Connect to the bodies' doubly linked lists
        self.bodies[body_a].joint_edges.push(JointEdge { other: body_b, joint: handle, collide_connected });
        self.bodies[body_b].joint_edges.push(JointEdge { other: body_a, joint: handle, collide_connected });

        // If the joint prevents collisions, then flag any contacts for filtering
        if !collide_connected {
            self.flag_contacts_between(body_a, body_b);
        }

        debug!(?handle, ?joint_type, ?body_a, ?body_b, "Created joint");
        Ok(handle)
    }

    /// Destroys a joint and wakes its bodies. Gear joints built on the
    /// joint are destroyed as well.
    pub fn destroy_joint(&mut self, handle: JointHandle) -> Result<()> {
        self.joints.fetch(handle)?;

        let gears: Vec<JointHandle> = self
            .joints
            .iter()
            .filter(|(_, joint)| match &joint.kind {
                JointKind::Gear(gear) => gear.joint1() == handle || gear.joint2() == handle,
                _ => false,
            })
            .map(|(gear, _)| gear)
            .collect();
        for gear in gears {
            debug!(?gear, joint = ?handle, "Destroying gear joint of destroyed joint");
            self.destroy_joint(gear)?;
        }

        let Some(joint) = self.joints.remove(handle) else {
            return Ok(());
        };

        for body in [joint.body_a, joint.body_b] {
            if let Some(body) = self.bodies.get_mut(body) {
                body.set_awake(true);
                body.joint_edges.retain(|edge| edge.joint != handle);
            }
        }

        // If the joint prevented collisions, then flag any contacts for filtering
        if !joint.collide_connected {
            self.flag_contacts_between(joint.body_a, joint.body_b);
        }

        debug!(?handle, joint_type = ?joint.joint_type(), "Destroyed joint");
        Ok(())
    }

    fn flag_contacts_between(&mut self, body_a: BodyHandle, body_b: BodyHandle) {
        let Some(body) = self.bodies.get(body_b) else { return };
        for edge in &body.contact_edges {
            if edge.other == body_a {
                if let Some(contact) = self.contact_manager.contacts.get_mut(edge.contact) {
                    contact.flag_for_filtering();
                }
            }
        }
    }

    /// Gets a joint
    pub fn joint(&self, handle: JointHandle) -> Result<&Joint> {
        self.joints.fetch(handle)
    }

    /// Mutable access to a joint. Both bodies are woken so that changed
    /// parameters take effect on the next step.
    pub fn joint_mut(&mut self, handle: JointHandle) -> Result<&mut Joint> {
        let joint = self.joints.fetch_mut(handle)?;
        for body in [joint.body_a, joint.body_b] {
            if let Some(body) = self.bodies.get_mut(body) {
                body.set_awake(true);
            }
        }
        Ok(joint)
    }

    /// All joints with their handles
    pub fn joints(&self) -> impl Iterator<Item = (JointHandle, &Joint)> + '_ {
        self.joints.iter()
    }

    /// Number of joints
    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    /// Anchor point on body A in world coordinates
    pub fn joint_anchor_a(&self, handle: JointHandle) -> Result<Vec2> {
        let joint = self.joints.fetch(handle)?;
        Ok(joint.anchor_a(self.bodies.fetch(joint.body_a)?))
    }

    /// Anchor point on body B in world coordinates
    pub fn joint_anchor_b(&self, handle: JointHandle) -> Result<Vec2> {
        let joint = self.joints.fetch(handle)?;
        Ok(joint.anchor_b(self.bodies.fetch(joint.body_b)?))
    }

    /// A joint is active when both of its bodies are active
    pub fn is_joint_active(&self, handle: JointHandle) -> Result<bool> {
        let joint = self.joints.fetch(handle)?;
        Ok(self.bodies.fetch(joint.body_a)?.is_active() && self.bodies.fetch(joint.body_b)?.is_active())
    }

    // Contacts

    /// Gets a contact
    pub fn contact(&self, handle: ContactHandle) -> Result<&Contact> {
        self.contact_manager.contacts.fetch(handle)
    }

    /// Mutable access to a contact, e.g. to override friction. Changes to
    /// the enabled flag last until the contact is next updated.
    pub fn contact_mut(&mut self, handle: ContactHandle) -> Result<&mut Contact> {
        self.contact_manager.contacts.fetch_mut(handle)
    }

    /// All contacts with their handles
    pub fn contacts(&self) -> impl Iterator<Item = (ContactHandle, &Contact)> + '_ {
        self.contact_manager.contacts.iter()
    }

    /// Number of contacts, touching or not
    pub fn contact_count(&self) -> usize {
        self.contact_manager.contacts.len()
    }

    /// Number of broadphase proxies
    pub fn proxy_count(&self) -> usize {
        self.contact_manager.broad_phase.proxy_count()
    }

    // Particle systems

    /// Creates an empty particle system
    pub fn create_particle_system(&mut self, def: &ParticleSystemDef) -> Result<ParticleSystemHandle> {
        let system = ParticleSystem::new(def, &self.config).inspect_err(|error| {
            warn!(%error, "rejected particle system");
        })?;
        let handle = self.particle_systems.insert(system);
        debug!(?handle, radius = def.radius, max_count = def.max_count, "Created particle system");
        Ok(handle)
    }

    /// Destroys a particle system and all of its particles
    pub fn destroy_particle_system(&mut self, handle: ParticleSystemHandle) -> Result<()> {
        let system = self.particle_systems.remove(handle).ok_or_else(|| {
            PhysicsError::ResourceNotFound(format!("Particle system with handle {handle:?} not found"))
        })?;
        debug!(?handle, particles = system.particle_count(), "Destroyed particle system");
        Ok(())
    }

    /// Gets a particle system
    pub fn particle_system(&self, handle: ParticleSystemHandle) -> Result<&ParticleSystem> {
        self.particle_systems.fetch(handle)
    }

    /// Mutable access to a particle system
    pub fn particle_system_mut(&mut self, handle: ParticleSystemHandle) -> Result<&mut ParticleSystem> {
        self.particle_systems.fetch_mut(handle)
    }

    /// All particle systems with their handles
    pub fn particle_systems(&self) -> impl Iterator<Item = (ParticleSystemHandle, &ParticleSystem)> + '_ {
        self.particle_systems.iter()
    }

    /// Number of particle systems
    pub fn particle_system_count(&self) -> usize {
        self.particle_systems.len()
    }

    /// Particle iterations that keep the fastest falling particle of the
    /// smallest system from moving more than a fraction of its radius per
    /// sub-step
    pub fn calculate_reasonable_particle_iterations(&self, dt: f32) -> u32 {
        let smallest_radius = self.particle_systems.values().map(ParticleSystem::radius).reduce(f32::min);
        let Some(radius) = smallest_radius else {
            // No particle systems
            return 1;
        };

        let gravity = self.config.gravity.length();
        let iterations = ((gravity / (PARTICLE_RADIUS_THRESHOLD * radius)).sqrt() * dt).ceil();
        (iterations as u32).clamp(1, MAX_RECOMMENDED_PARTICLE_ITERATIONS)
    }

    fn split_particles(&mut self) -> (&mut Arena<ParticleSystemHandle, ParticleSystem>, ParticleWorld<'_>) {
        let world = ParticleWorld {
            bodies: &mut self.bodies,
            fixtures: &self.fixtures,
            broad_phase: &self.contact_manager.broad_phase,
            listener: self.contact_manager.contact_listener.as_deref_mut(),
            gravity: self.config.gravity,
            config: &self.config,
        };
        (&mut self.particle_systems, world)
    }

    // Simulation

    /// Steps the world with the configured iteration counts
    pub fn step_default(&mut self, dt: f32) -> Result<()> {
        let SimulationConfig { velocity_iterations, position_iterations, particle_iterations, .. } = self.config;
        self.step_with_particles(dt, velocity_iterations, position_iterations, particle_iterations)
    }

    /// Advances the world by `dt` seconds with one particle iteration
    pub fn step(&mut self, dt: f32, velocity_iterations: u32, position_iterations: u32) -> Result<()> {
        self.step_with_particles(dt, velocity_iterations, position_iterations, 1)
    }

    /// Advances the world by `dt` seconds.
    ///
    /// A zero `dt` only finds new contacts and updates the existing ones.
    pub fn step_with_particles(
        &mut self,
        dt: f32,
        velocity_iterations: u32,
        position_iterations: u32,
        particle_iterations: u32,
    ) -> Result<()> {
        if !dt.is_finite() || dt < 0.0 {
            warn!(dt, "rejected time step");
            return Err(PhysicsError::InvalidParameter(format!(
                "time step must be finite and non-negative, got {dt}"
            )));
        }

        // If new fixtures were added, we need to find the new contacts
        if self.new_fixture {
            self.contact_manager.find_new_contacts(&mut self.bodies, &self.fixtures);
            self.new_fixture = false;
        }

        let inv_dt = if dt > 0.0 { 1.0 / dt } else { 0.0 };
        let step = TimeStep {
            dt,
            inv_dt,
            dt_ratio: self.inv_dt0 * dt,
            velocity_iterations,
            position_iterations,
            particle_iterations,
            warm_starting: self.config.warm_starting,
        };

        // Update contacts. This is where some contacts are destroyed.
        self.contact_manager.collide(&mut self.bodies, &self.fixtures);

        if step.dt > 0.0 {
            let (systems, mut world) = self.split_particles();
            for (handle, system) in systems.iter_mut() {
                system.update_contacts(handle, &mut world);
            }

            let island_count = self.islands.solve(
                &step,
                &self.config,
                &mut self.bodies,
                &self.fixtures,
                &mut self.joints,
                &mut self.contact_manager,
            );

            let (systems, mut world) = self.split_particles();
            for (handle, system) in systems.iter_mut() {
                system.solve(handle, &step, &mut world);
            }

            self.synchronize_solved_fixtures();

            // Look for new contacts
            self.contact_manager.find_new_contacts(&mut self.bodies, &self.fixtures);

            self.inv_dt0 = step.inv_dt;
            trace!(
                dt,
                islands = island_count,
                contacts = self.contact_manager.contacts.len(),
                "Stepped world"
            );
        }

        if self.auto_clear_forces {
            self.clear_forces();
        }

        Ok(())
    }

    /// Moves the proxies of every body solved in the last step
    fn synchronize_solved_fixtures(&mut self) {
        for body in self.bodies.values() {
            // If a body was not in an island then it did not move
            if !body.flags.contains(BodyFlags::ISLAND) || body.body_type == BodyType::Static {
                continue;
            }
            synchronize_fixtures(body, &mut self.fixtures, &mut self.contact_manager.broad_phase);
        }
    }

    // Queries

    /// Reports every fixture hit by the segment from `point1` to `point2`,
    /// then every particle of the systems the callback asks for
    pub fn ray_cast(&self, callback: &mut dyn RayCastCallback, point1: Vec2, point2: Vec2) {
        let input = RayCastInput::new(point1, point2);
        let broad_phase = &self.contact_manager.broad_phase;

        broad_phase.ray_cast(&input, |sub_input, proxy| {
            let Some(handle) = broad_phase.user_data(proxy) else {
                return sub_input.max_fraction;
            };
            let Some(fixture) = self.fixtures.get(handle) else {
                return sub_input.max_fraction;
            };
            let Some(body) = self.bodies.get(fixture.body) else {
                return sub_input.max_fraction;
            };

            match fixture.shape.ray_cast(sub_input, &body.xf) {
                Some(output) => {
                    let fraction = output.fraction;
                    let point = point1 * (1.0 - fraction) + point2 * fraction;
                    callback.report_fixture(handle, point, output.normal, fraction)
                }
                None => sub_input.max_fraction,
            }
        });

        for (handle, system) in self.particle_systems.iter() {
            if callback.should_query_particle_system(handle) && !system.ray_cast(handle, callback, point1, point2) {
                return;
            }
        }
    }

    /// Reports every fixture whose bounds overlap the box, then every
    /// particle inside it for the systems the callback asks for
    pub fn query_aabb(&self, callback: &mut dyn QueryCallback, aabb: &Aabb) {
        let broad_phase = &self.contact_manager.broad_phase;
        let mut stopped = false;

        broad_phase.query(aabb, |proxy| {
            let Some(handle) = broad_phase.user_data(proxy) else { return true };
            let overlaps = self
                .fixtures
                .get(handle)
                .and_then(Fixture::aabb)
                .is_some_and(|bounds| bounds.overlaps(aabb));
            if overlaps && !callback.report_fixture(handle) {
                stopped = true;
                return false;
            }
            true
        });
        if stopped {
            return;
        }

        for (handle, system) in self.particle_systems.iter() {
            if callback.should_query_particle_system(handle) && !system.query_aabb(handle, callback, aabb) {
                return;
            }
        }
    }

    /// Moves the world origin. Useful for large worlds: every world
    /// position is translated by `-new_origin`.
    pub fn shift_origin(&mut self, new_origin: Vec2) {
        for body in self.bodies.values_mut() {
            body.xf.p -= new_origin;
            body.sweep.c0 -= new_origin;
            body.sweep.c -= new_origin;
        }
        for fixture in self.fixtures.values_mut() {
            if let Some(proxy) = fixture.proxy.as_mut() {
                proxy.aabb.translate(-new_origin);
            }
        }
        for joint in self.joints.values_mut() {
            joint.shift_origin(new_origin);
        }
        for system in self.particle_systems.values_mut() {
            system.shift_origin(new_origin);
        }
        self.contact_manager.broad_phase.shift_origin(new_origin);
        debug!(?new_origin, "Shifted world origin");
    }
}

fn create_proxies(body: &Body, fixtures: &mut Arena<FixtureHandle, Fixture>, broad_phase: &mut BroadPhase<FixtureHandle>) {
    for &handle in &body.fixtures {
        let Some(fixture) = fixtures.get_mut(handle) else { continue };
        let aabb = fixture.shape.compute_aabb(&body.xf);
        let proxy_id = broad_phase.create_proxy(&aabb, handle);
        fixture.proxy = Some(FixtureProxy { aabb, proxy_id });
    }
}

fn destroy_proxies(body: &Body, fixtures: &mut Arena<FixtureHandle, Fixture>, broad_phase: &mut BroadPhase<FixtureHandle>) {
    for &handle in &body.fixtures {
        if let Some(proxy) = fixtures.get_mut(handle).and_then(|fixture| fixture.proxy.take()) {
            broad_phase.destroy_proxy(proxy.proxy_id);
        }
    }
}

/// Moves the proxies of a body to cover its sweep over the last step
fn synchronize_fixtures(body: &Body, fixtures: &mut Arena<FixtureHandle, Fixture>, broad_phase: &mut BroadPhase<FixtureHandle>) {
    let xf1: Transform = body.sweep.transform_at(0.0);
    let xf2 = body.xf;
    let displacement = xf2.p - xf1.p;

    for &handle in &body.fixtures {
        let Some(fixture) = fixtures.get_mut(handle) else { continue };
        let Some(proxy) = fixture.proxy.as_mut() else { continue };

        // Compute an AABB that covers the swept shape (may miss some rotation effect)
        let aabb1 = fixture.shape.compute_aabb(&xf1);
        let aabb2 = fixture.shape.compute_aabb(&xf2);
        proxy.aabb = aabb1.union(&aabb2);
        broad_phase.move_proxy(proxy.proxy_id, &proxy.aabb, displacement);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{CircleShape, PolygonShape};
    use approx::assert_relative_eq;

    #[test]
    fn test_negative_dt_is_rejected() {
        let mut world = World::new(Vec2::new(0.0, -10.0));
        assert!(matches!(world.step(-1.0, 8, 3), Err(PhysicsError::InvalidParameter(_))));
        assert!(matches!(world.step(f32::NAN, 8, 3), Err(PhysicsError::InvalidParameter(_))));
    }

    #[test]
    fn test_zero_dt_creates_contacts_without_moving() {
        let mut world = World::new(Vec2::new(0.0, -10.0));
        let ground = world.create_body(&BodyDef::fixed(Vec2::zero())).unwrap();
        world
            .create_fixture(ground, &FixtureDef::new(PolygonShape::new_box(5.0, 0.5).unwrap()))
            .unwrap();
        let ball = world.create_body(&BodyDef::dynamic(Vec2::new(0.0, 0.9))).unwrap();
        world
            .create_fixture(ball, &FixtureDef::new(CircleShape::new(0.5).unwrap()).with_density(1.0))
            .unwrap();

        world.step(0.0, 8, 3).unwrap();

        assert_eq!(world.contact_count(), 1);
        assert_relative_eq!(world.body(ball).unwrap().position(), Vec2::new(0.0, 0.9));
        assert_relative_eq!(world.body(ball).unwrap().linear_velocity(), Vec2::zero());
    }

    #[test]
    fn test_fixture_density_sets_mass() {
        let mut world = World::default();
        let body = world.create_body(&BodyDef::dynamic(Vec2::zero())).unwrap();
        world
            .create_fixture(body, &FixtureDef::new(PolygonShape::new_box(1.0, 1.0).unwrap()).with_density(2.0))
            .unwrap();
        assert_relative_eq!(world.body(body).unwrap().mass(), 8.0);
    }

    #[test]
    fn test_inactive_body_has_no_proxies() {
        let mut world = World::default();
        let body = world.create_body(&BodyDef::dynamic(Vec2::zero())).unwrap();
        world
            .create_fixture(body, &FixtureDef::new(CircleShape::new(1.0).unwrap()).with_density(1.0))
            .unwrap();
        assert_eq!(world.proxy_count(), 1);

        world.set_body_active(body, false).unwrap();
        assert_eq!(world.proxy_count(), 0);
        assert!(world.fixture(world.body(body).unwrap().fixtures()[0]).unwrap().aabb().is_none());

        world.set_body_active(body, true).unwrap();
        assert_eq!(world.proxy_count(), 1);
    }

    #[test]
    fn test_reasonable_particle_iterations() {
        let mut world = World::new(Vec2::new(0.0, -10.0));
        assert_eq!(world.calculate_reasonable_particle_iterations(1.0 / 60.0), 1);

        world
            .create_particle_system(&ParticleSystemDef::default().with_radius(0.025))
            .unwrap();
        // ceil(sqrt(10 / 0.00025) / 60) = ceil(3.33)
        assert_eq!(world.calculate_reasonable_particle_iterations(1.0 / 60.0), 4);
    }

    #[test]
    fn test_shift_origin_moves_bodies() {
        let mut world = World::default();
        let body = world.create_body(&BodyDef::dynamic(Vec2::new(10.0, 5.0))).unwrap();
        world.shift_origin(Vec2::new(10.0, 0.0));
        assert_relative_eq!(world.body(body).unwrap().position(), Vec2::new(0.0, 5.0));
    }
}

use crate::bodies::body_flags::BodyFlags;
use crate::bodies::{Body, BodyType, Fixture};
use crate::collision::contact_manager::ContactManager;
use crate::collision::contact_solver::ContactSolver;
use crate::collision::ContactFlags;
use crate::constraints::Joint;
use crate::core::time_step::{Position, SolverData, Velocity};
use crate::core::{Arena, BodyHandle, ContactHandle, FixtureHandle, JointHandle, SimulationConfig, TimeStep};

/// A set of bodies connected through touching contacts and joints. Static
/// bodies may appear in several islands; they never link two islands.
#[derive(Debug, Default, Clone)]
pub struct Island {
    /// The bodies in the island, in solver order
    pub bodies: Vec<BodyHandle>,

    /// The touching contacts of the island
    pub contacts: Vec<ContactHandle>,

    /// The joints of the island
    pub joints: Vec<JointHandle>,
}

impl Island {
    /// Adds a body and records its solver index on the body
    pub fn add_body(&mut self, handle: BodyHandle, body: &mut Body) {
        body.island_index = self.bodies.len();
        self.bodies.push(handle);
    }

    /// Adds a touching, enabled, non-sensor contact
    pub fn add_contact(&mut self, contact: ContactHandle) {
        self.contacts.push(contact);
    }

    /// Adds a joint whose bodies are both in the island
    pub fn add_joint(&mut self, joint: JointHandle) {
        self.joints.push(joint);
    }

    /// Empties the island, keeping its buffers for the next one
    pub fn clear(&mut self) {
        self.bodies.clear();
        self.contacts.clear();
        self.joints.clear();
    }

    /// Integrates velocities, solves the velocity and position constraints,
    /// integrates positions and puts resting islands to sleep
    pub fn solve(
        &self,
        step: &TimeStep,
        config: &SimulationConfig,
        bodies: &mut Arena<BodyHandle, Body>,
        fixtures: &Arena<FixtureHandle, Fixture>,
        joints: &mut Arena<JointHandle, Joint>,
        contact_manager: &mut ContactManager,
    ) {
        let h = step.dt;

        let mut positions = Vec::with_capacity(self.bodies.len());
        let mut velocities = Vec::with_capacity(self.bodies.len());

        // Integrate velocities
        for &handle in &self.bodies {
            let body = &mut bodies[handle];

            let c = body.sweep.c;
            let a = body.sweep.a;
            let mut v = body.linear_velocity;
            let mut w = body.angular_velocity;

            // Store positions for continuous collision
            body.sweep.c0 = c;
            body.sweep.a0 = a;

            if body.body_type == BodyType::Dynamic {
                v += (config.gravity * body.gravity_scale + body.force * body.inv_mass) * h;
                w += h * body.inv_inertia * body.torque;

                // Pade approximation of v * exp(-c * dt), stable for large damping
                v *= 1.0 / (1.0 + h * body.linear_damping);
                w *= 1.0 / (1.0 + h * body.angular_damping);
            }

            positions.push(Position { c, a });
            velocities.push(Velocity { v, w });
        }

        let mut contact_solver = ContactSolver::new(*step, &self.contacts, &contact_manager.contacts, bodies, fixtures);
        contact_solver.initialize_velocity_constraints(&contact_manager.contacts, &positions, &velocities, config);
        if step.warm_starting {
            contact_solver.warm_start(&mut velocities);
        }

        let mut data = SolverData {
            step: *step,
            config,
            positions: &mut positions,
            velocities: &mut velocities,
        };

        for &handle in &self.joints {
            joints[handle].init_velocity_constraints(bodies, &mut data);
        }

        for _ in 0..step.velocity_iterations {
            for &handle in &self.joints {
                joints[handle].solve_velocity_constraints(&mut data);
            }
            contact_solver.solve_velocity_constraints(data.velocities);
        }

        contact_solver.store_impulses(&mut contact_manager.contacts);

        // Integrate positions
        for (position, velocity) in data.positions.iter_mut().zip(data.velocities.iter_mut()) {
            let translation = velocity.v * h;
            if translation.length_squared() > config.max_translation * config.max_translation {
                velocity.v *= config.max_translation / translation.length();
            }

            let rotation = h * velocity.w;
            if rotation * rotation > config.max_rotation * config.max_rotation {
                velocity.w *= config.max_rotation / rotation.abs();
            }

            position.c += velocity.v * h;
            position.a += h * velocity.w;
        }

        let mut position_solved = false;
        for _ in 0..step.position_iterations {
            let contacts_okay = contact_solver.solve_position_constraints(data.positions, config);

            let mut joints_okay = true;
            for &handle in &self.joints {
                let joint_okay = joints[handle].solve_position_constraints(&mut data);
                joints_okay = joints_okay && joint_okay;
            }

            if contacts_okay && joints_okay {
                // Exit early if the position errors are small
                position_solved = true;
                break;
            }
        }

        // Copy state buffers back to the bodies
        for (i, &handle) in self.bodies.iter().enumerate() {
            let body = &mut bodies[handle];
            body.sweep.c = data.positions[i].c;
            body.sweep.a = data.positions[i].a;
            body.linear_velocity = data.velocities[i].v;
            body.angular_velocity = data.velocities[i].w;
            body.synchronize_transform();
        }

        if let Some(listener) = contact_manager.contact_listener.as_deref_mut() {
            for (handle, impulse) in contact_solver.impulses() {
                if let Some(contact) = contact_manager.contacts.get(handle) {
                    listener.post_solve(contact, &impulse);
                }
            }
        }

        if config.allow_sleeping {
            self.update_sleep(h, config, bodies, position_solved);
        }
    }

    fn update_sleep(&self, h: f32, config: &SimulationConfig, bodies: &mut Arena<BodyHandle, Body>, position_solved: bool) {
        let lin_tol_sqr = config.linear_sleep_tolerance * config.linear_sleep_tolerance;
        let ang_tol_sqr = config.angular_sleep_tolerance * config.angular_sleep_tolerance;

        let mut min_sleep_time = f32::MAX;
        for &handle in &self.bodies {
            let body = &mut bodies[handle];
            if body.body_type == BodyType::Static {
                continue;
            }

            if !body.flags.contains(BodyFlags::AUTO_SLEEP)
                || body.angular_velocity * body.angular_velocity > ang_tol_sqr
                || body.linear_velocity.length_squared() > lin_tol_sqr
            {
                body.sleep_time = 0.0;
                min_sleep_time = 0.0;
            } else {
                body.sleep_time += h;
                min_sleep_time = min_sleep_time.min(body.sleep_time);
            }
        }

        if min_sleep_time >= config.time_to_sleep && position_solved {
            for &handle in &self.bodies {
                bodies[handle].set_awake(false);
            }
        }
    }
}

/// Walks the contact and joint graph from every awake body and solves each
/// island found
#[derive(Debug, Default)]
pub struct IslandBuilder {
    island: Island,
    stack: Vec<BodyHandle>,
}

impl IslandBuilder {
    /// Builder with empty scratch buffers
    pub fn new() -> Self {
        Self::default()
    }

    /// Solves every island and returns how many were solved
    pub fn solve(
        &mut self,
        step: &TimeStep,
        config: &SimulationConfig,
        bodies: &mut Arena<BodyHandle, Body>,
        fixtures: &Arena<FixtureHandle, Fixture>,
        joints: &mut Arena<JointHandle, Joint>,
        contact_manager: &mut ContactManager,
    ) -> usize {
        for body in bodies.values_mut() {
            body.flags.remove(BodyFlags::ISLAND);
        }
        for contact in contact_manager.contacts.values_mut() {
            contact.flags.remove(ContactFlags::ISLAND);
        }
        for joint in joints.values_mut() {
            joint.island = false;
        }

        let mut island_count = 0;
        for seed in bodies.handles() {
            let body = &bodies[seed];
            if body.flags.contains(BodyFlags::ISLAND) || !body.is_awake() || !body.is_active() {
                continue;
            }

            // The seed must be dynamic or kinematic
            if body.body_type == BodyType::Static {
                continue;
            }

            self.island.clear();
            self.stack.push(seed);
            bodies[seed].flags.insert(BodyFlags::ISLAND);

            while let Some(handle) = self.stack.pop() {
                self.visit(handle, bodies, fixtures, joints, contact_manager);
            }

            self.island.solve(step, config, bodies, fixtures, joints, contact_manager);
            island_count += 1;

            // Allow static bodies to participate in other islands
            for &handle in &self.island.bodies {
                let body = &mut bodies[handle];
                if body.body_type == BodyType::Static {
                    body.flags.remove(BodyFlags::ISLAND);
                }
            }
        }

        island_count
    }

    /// Adds a body to the current island and pushes its unvisited neighbours
    fn visit(
        &mut self,
        handle: BodyHandle,
        bodies: &mut Arena<BodyHandle, Body>,
        fixtures: &Arena<FixtureHandle, Fixture>,
        joints: &mut Arena<JointHandle, Joint>,
        contact_manager: &mut ContactManager,
    ) {
        let body = &mut bodies[handle];
        self.island.add_body(handle, body);

        // Make sure the body is awake without resetting its sleep timer
        body.flags.insert(BodyFlags::AWAKE);

        // Don't propagate islands across static bodies
        if body.body_type == BodyType::Static {
            return;
        }

        let contact_edges = body.contact_edges.clone();
        let joint_edges = body.joint_edges.clone();

        for edge in contact_edges {
            let Some(contact) = contact_manager.contacts.get_mut(edge.contact) else { continue };

            // Has this contact already been added to an island?
            if contact.flags.contains(ContactFlags::ISLAND) {
                continue;
            }

            // Is this contact solid and touching?
            if !contact.is_enabled() || !contact.is_touching() {
                continue;
            }

            let sensor = [contact.fixture_a, contact.fixture_b]
                .iter()
                .any(|&fixture| fixtures.get(fixture).map_or(true, |f| f.is_sensor));
            if sensor {
                continue;
            }

            contact.flags.insert(ContactFlags::ISLAND);
            self.island.add_contact(edge.contact);

            self.push_body(edge.other, bodies);
        }

        for edge in joint_edges {
            let Some(joint) = joints.get_mut(edge.joint) else { continue };
            if joint.island {
                continue;
            }

            // Don't simulate joints connected to inactive bodies. Gear joints
            // also read the bodies of their two joints.
            let extra = joint.extra_bodies();
            let others = std::iter::once(edge.other).chain(extra.into_iter().flat_map(|(c, d)| [c, d]));
            if !others.clone().all(|other| bodies.get(other).is_some_and(|body| body.is_active())) {
                continue;
            }

            joint.island = true;
            self.island.add_joint(edge.joint);
            for other in others {
                self.push_body(other, bodies);
            }
        }
    }

    fn push_body(&mut self, handle: BodyHandle, bodies: &mut Arena<BodyHandle, Body>) {
        let Some(body) = bodies.get_mut(handle) else { return };

        // Was the other body already added to this island?
        if body.flags.contains(BodyFlags::ISLAND) {
            return;
        }

        body.flags.insert(BodyFlags::ISLAND);
        self.stack.push(handle);
    }
}

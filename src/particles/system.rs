use std::collections::HashMap;
use std::ops::Range;

use tracing::{debug, trace};

use crate::bodies::{Body, Fixture};
use crate::collision::BroadPhase;
use crate::core::{
    Arena, BodyHandle, ContactListener, FixtureHandle, ParticleGroupHandle, ParticleSystemHandle, QueryCallback,
    RayCastCallback, SimulationConfig, MAX_TRIAD_DISTANCE,
};
use crate::error::PhysicsError;
use crate::math::{Aabb, Transform, Vec2};
use crate::particles::{
    ParticleBodyContact, ParticleColor, ParticleContact, ParticleDef, ParticleFlags, ParticleGroup, ParticleGroupDef,
    ParticlePair, ParticleTriad,
};
use crate::shapes::Shape;
use crate::Result;

/// Parameters of a particle system
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleSystemDef {
    /// Particle radius in meters
    pub radius: f32,

    /// Particle density in kg/m^2
    pub density: f32,

    /// Scales the world gravity for every particle
    pub gravity_scale: f32,

    /// Maximum number of particles, 0 for no limit
    pub max_count: usize,

    /// Isotropic pressure of fluid particles
    pub pressure_strength: f32,

    /// Damping of the relative normal velocity between particles and bodies
    pub damping_strength: f32,

    pub viscous_strength: f32,
    pub spring_strength: f32,

    /// Pull of elastic triads towards their rest shape
    pub elastic_strength: f32,
    pub powder_strength: f32,
    pub surface_tension_pressure_strength: f32,
    pub surface_tension_normal_strength: f32,
    pub repulsive_strength: f32,

    /// When the system is full, make room by destroying the particle
    /// closest to the end of its lifetime instead of refusing new ones
    pub destroy_by_age: bool,
}

impl Default for ParticleSystemDef {
    fn default() -> Self {
        Self {
            radius: 1.0,
            density: 1.0,
            gravity_scale: 1.0,
            max_count: 0,
            pressure_strength: 0.05,
            damping_strength: 1.0,
            viscous_strength: 0.25,
            spring_strength: 0.25,
            elastic_strength: 0.25,
            powder_strength: 0.5,
            surface_tension_pressure_strength: 0.2,
            surface_tension_normal_strength: 0.2,
            repulsive_strength: 1.0,
            destroy_by_age: true,
        }
    }
}

impl ParticleSystemDef {
    /// Sets the particle radius
    pub fn with_radius(mut self, radius: f32) -> Self {
        self.radius = radius;
        self
    }

    /// Limits the number of particles, 0 for no limit
    pub fn with_max_count(mut self, max_count: usize) -> Self {
        self.max_count = max_count;
        self
    }

    /// Checks the radius, density and strengths
    pub fn validate(&self) -> Result<()> {
        if !(self.radius.is_finite() && self.radius > 0.0) {
            return Err(PhysicsError::DegenerateGeometry(format!(
                "particle radius must be positive, got {}",
                self.radius
            )));
        }

        if !(self.density.is_finite() && self.density > 0.0) {
            return Err(PhysicsError::InvalidParameter(format!(
                "particle density must be positive, got {}",
                self.density
            )));
        }

        let strengths = [
            ("gravity_scale", self.gravity_scale),
            ("pressure_strength", self.pressure_strength),
            ("damping_strength", self.damping_strength),
            ("viscous_strength", self.viscous_strength),
            ("spring_strength", self.spring_strength),
            ("elastic_strength", self.elastic_strength),
            ("powder_strength", self.powder_strength),
            ("surface_tension_pressure_strength", self.surface_tension_pressure_strength),
            ("surface_tension_normal_strength", self.surface_tension_normal_strength),
            ("repulsive_strength", self.repulsive_strength),
        ];
        for (name, value) in strengths {
            if !value.is_finite() {
                return Err(PhysicsError::InvalidParameter(format!("{name} must be finite")));
            }
        }

        Ok(())
    }
}

/// World state the particle solver reads and writes
pub(crate) struct ParticleWorld<'a> {
    pub bodies: &'a mut Arena<BodyHandle, Body>,
    pub fixtures: &'a Arena<FixtureHandle, Fixture>,
    pub broad_phase: &'a BroadPhase<FixtureHandle>,
    pub listener: Option<&'a mut (dyn ContactListener + 'static)>,
    pub gravity: Vec2,
    pub config: &'a SimulationConfig,
}

/// A set of particles sharing radius, density and solver strengths.
///
/// Per-particle state lives in parallel buffers indexed by particle index.
/// Indices are stable during a step; destroyed particles are flagged as
/// zombies and removed when the step ends, which shifts the indices of
/// the particles behind them.
#[derive(Debug, Clone)]
pub struct ParticleSystem {
    pub(super) def: ParticleSystemDef,
    pub(super) stride_factor: f32,
    pub(super) diameter: f32,
    pub(super) inv_diameter: f32,
    pub(super) squared_diameter: f32,

    pub(super) positions: Vec<Vec2>,
    pub(super) velocities: Vec<Vec2>,
    pub(super) flags: Vec<ParticleFlags>,
    pub(super) colors: Vec<ParticleColor>,
    pub(super) lifetimes: Vec<f32>,
    pub(super) weights: Vec<f32>,
    pub(super) group_of: Vec<Option<ParticleGroupHandle>>,

    pub(super) contacts: Vec<ParticleContact>,
    pub(super) body_contacts: Vec<ParticleBodyContact>,
    pub(super) pairs: Vec<ParticlePair>,
    pub(super) triads: Vec<ParticleTriad>,
    pub(super) groups: Arena<ParticleGroupHandle, ParticleGroup>,

    /// Particle pairs reported to the listener, sorted
    pub(super) listened_contacts: Vec<(usize, usize)>,

    /// Particle-fixture pairs reported to the listener, sorted
    pub(super) listened_body_contacts: Vec<(usize, FixtureHandle)>,

    pub(super) zombie_count: usize,

    /// Application specific data
    pub user_data: u64,
}

impl ParticleSystem {
    /// Validates the definition and creates an empty system
    pub(crate) fn new(def: &ParticleSystemDef, config: &SimulationConfig) -> Result<Self> {
        def.validate()?;

        let diameter = 2.0 * def.radius;
        Ok(Self {
            def: def.clone(),
            stride_factor: config.particle_stride,
            diameter,
            inv_diameter: 1.0 / diameter,
            squared_diameter: diameter * diameter,
            positions: Vec::new(),
            velocities: Vec::new(),
            flags: Vec::new(),
            colors: Vec::new(),
            lifetimes: Vec::new(),
            weights: Vec::new(),
            group_of: Vec::new(),
            contacts: Vec::new(),
            body_contacts: Vec::new(),
            pairs: Vec::new(),
            triads: Vec::new(),
            groups: Arena::new(),
            listened_contacts: Vec::new(),
            listened_body_contacts: Vec::new(),
            zombie_count: 0,
            user_data: 0,
        })
    }

    /// Definition the system was created from, with later changes applied
    pub fn def(&self) -> &ParticleSystemDef {
        &self.def
    }

    /// Particle radius in meters
    pub fn radius(&self) -> f32 {
        self.def.radius
    }

    /// Changes the particle radius. Existing particles keep their positions.
    pub fn set_radius(&mut self, radius: f32) -> Result<()> {
        if !(radius.is_finite() && radius > 0.0) {
            return Err(PhysicsError::DegenerateGeometry(format!(
                "particle radius must be positive, got {radius}"
            )));
        }
        self.def.radius = radius;
        self.diameter = 2.0 * radius;
        self.inv_diameter = 1.0 / self.diameter;
        self.squared_diameter = self.diameter * self.diameter;
        Ok(())
    }

    /// Particle density in kg/m^2
    pub fn density(&self) -> f32 {
        self.def.density
    }

    /// Sets the particle density in kg/m^2
    pub fn set_density(&mut self, density: f32) -> Result<()> {
        if !(density.is_finite() && density > 0.0) {
            return Err(PhysicsError::InvalidParameter(format!(
                "particle density must be positive, got {density}"
            )));
        }
        self.def.density = density;
        Ok(())
    }

    /// Scale applied to the world gravity for every particle
    pub fn gravity_scale(&self) -> f32 {
        self.def.gravity_scale
    }

    /// Scales the world gravity for every particle
    pub fn set_gravity_scale(&mut self, scale: f32) {
        self.def.gravity_scale = scale;
    }

    /// Damping strength of particle contacts
    pub fn damping(&self) -> f32 {
        self.def.damping_strength
    }

    /// Sets the damping strength of particle contacts
    pub fn set_damping(&mut self, damping: f32) {
        self.def.damping_strength = damping;
    }

    /// Particle limit, 0 for none
    pub fn max_count(&self) -> usize {
        self.def.max_count
    }

    /// Sets the particle limit, 0 for none. Fails when the system already
    /// holds more live particles than the new limit.
    pub fn set_max_count(&mut self, max_count: usize) -> Result<()> {
        if max_count != 0 && self.live_count() > max_count {
            return Err(PhysicsError::InvalidState(format!(
                "{} particles exist, cannot lower the limit to {max_count}",
                self.live_count()
            )));
        }
        self.def.max_count = max_count;
        Ok(())
    }

    /// Makes a full system destroy its oldest particle for a new one
    pub fn set_destruction_by_age(&mut self, enable: bool) {
        self.def.destroy_by_age = enable;
    }

    /// Whether a full system destroys its oldest particle for a new one
    pub fn destruction_by_age(&self) -> bool {
        self.def.destroy_by_age
    }

    /// Spacing of particles created by groups
    pub fn particle_stride(&self) -> f32 {
        self.stride_factor * self.diameter
    }

    /// Mass of a single particle
    pub fn particle_mass(&self) -> f32 {
        let stride = self.particle_stride();
        self.def.density * stride * stride
    }

    /// Inverse mass of a single particle
    pub fn particle_inv_mass(&self) -> f32 {
        1.0 / self.particle_mass()
    }

    /// Number of particles, including zombies waiting for removal
    pub fn particle_count(&self) -> usize {
        self.positions.len()
    }

    fn live_count(&self) -> usize {
        self.positions.len() - self.zombie_count
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index < self.positions.len() {
            Ok(())
        } else {
            Err(PhysicsError::ResourceNotFound(format!(
                "particle {index} out of range, the system has {}",
                self.positions.len()
            )))
        }
    }

    /// Appends a particle and returns its index
    pub fn create_particle(&mut self, def: &ParticleDef) -> Result<usize> {
        if !def.position.is_valid() || !def.velocity.is_valid() || def.lifetime.is_nan() {
            return Err(PhysicsError::InvalidParameter("particle state must be finite".to_string()));
        }

        if let Some(handle) = def.group {
            let group = self.groups.fetch(handle)?;
            if group.first_index + group.count != self.positions.len() {
                return Err(PhysicsError::InvalidState(
                    "particles can only be appended to the most recently created group".to_string(),
                ));
            }
        }

        self.make_room()?;

        let index = self.push_particle(def.flags, def.position, def.velocity, def.color, def.lifetime, def.group);
        if let Some(group) = def.group.and_then(|handle| self.groups.get_mut(handle)) {
            group.count += 1;
        }

        trace!(index, "Created particle");
        Ok(index)
    }

    /// Frees one slot when the system is full
    fn make_room(&mut self) -> Result<()> {
        let max_count = self.def.max_count;
        if max_count == 0 || self.live_count() < max_count {
            return Ok(());
        }

        if !self.def.destroy_by_age {
            return Err(PhysicsError::CapacityExceeded(format!(
                "particle system is full ({max_count} particles)"
            )));
        }

        match self.oldest_particle() {
            Some(index) => {
                debug!(index, "Particle system full, destroying oldest particle");
                self.flag_zombie(index);
                Ok(())
            }
            None => Err(PhysicsError::CapacityExceeded(format!(
                "particle system is full ({max_count} particles)"
            ))),
        }
    }

    /// The live particle with the least remaining lifetime, or the lowest
    /// live index when every particle lives forever
    fn oldest_particle(&self) -> Option<usize> {
        let live = || (0..self.positions.len()).filter(|&i| !self.flags[i].contains(ParticleFlags::ZOMBIE));

        live()
            .filter(|&i| self.lifetimes[i] > 0.0)
            .min_by(|&a, &b| self.lifetimes[a].total_cmp(&self.lifetimes[b]))
            .or_else(|| live().next())
    }

    fn push_particle(
        &mut self,
        flags: ParticleFlags,
        position: Vec2,
        velocity: Vec2,
        color: ParticleColor,
        lifetime: f32,
        group: Option<ParticleGroupHandle>,
    ) -> usize {
        let index = self.positions.len();
        self.positions.push(position);
        self.velocities.push(velocity);
        self.flags.push(flags - ParticleFlags::ZOMBIE);
        self.colors.push(color);
        self.lifetimes.push(lifetime);
        self.weights.push(0.0);
        self.group_of.push(group);
        index
    }

    fn flag_zombie(&mut self, index: usize) {
        if !self.flags[index].contains(ParticleFlags::ZOMBIE) {
            self.flags[index].insert(ParticleFlags::ZOMBIE);
            self.zombie_count += 1;
        }
    }

    /// Flags a particle for removal at the end of the step
    pub fn destroy_particle(&mut self, index: usize) -> Result<()> {
        self.check_index(index)?;
        self.flag_zombie(index);
        Ok(())
    }

    /// Flags every particle whose position is inside the shape. Returns the
    /// number of particles flagged.
    pub fn destroy_particles_in_shape(&mut self, shape: &Shape, xf: &Transform) -> usize {
        let mut destroyed = 0;
        for index in 0..self.positions.len() {
            if !self.flags[index].contains(ParticleFlags::ZOMBIE) && shape.test_point(xf, self.positions[index]) {
                self.flag_zombie(index);
                destroyed += 1;
            }
        }
        destroyed
    }

    /// Flags of a particle
    pub fn particle_flags(&self, index: usize) -> Result<ParticleFlags> {
        self.check_index(index)?;
        Ok(self.flags[index])
    }

    /// Replaces the flags of a particle. The zombie flag cannot be cleared
    /// this way.
    pub fn set_particle_flags(&mut self, index: usize, flags: ParticleFlags) -> Result<()> {
        self.check_index(index)?;
        let zombie = self.flags[index] & ParticleFlags::ZOMBIE;
        self.flags[index] = flags - ParticleFlags::ZOMBIE | zombie;
        if flags.contains(ParticleFlags::ZOMBIE) {
            self.flag_zombie(index);
        }
        Ok(())
    }

    /// Remaining lifetime of a particle, zero or less for infinite
    pub fn particle_lifetime(&self, index: usize) -> Result<f32> {
        self.check_index(index)?;
        Ok(self.lifetimes[index])
    }

    /// Sets the remaining lifetime in seconds, zero or less for infinite
    pub fn set_particle_lifetime(&mut self, index: usize, lifetime: f32) -> Result<()> {
        self.check_index(index)?;
        if lifetime.is_nan() {
            return Err(PhysicsError::InvalidParameter("particle lifetime must not be NaN".to_string()));
        }
        self.lifetimes[index] = lifetime;
        Ok(())
    }

    /// Group of a particle, if any
    pub fn particle_group_of(&self, index: usize) -> Option<ParticleGroupHandle> {
        self.group_of.get(index).copied().flatten()
    }

    /// Particle positions
    pub fn positions(&self) -> &[Vec2] {
        &self.positions
    }

    /// Mutable particle positions. The buffer cannot be resized.
    pub fn positions_mut(&mut self) -> &mut [Vec2] {
        &mut self.positions
    }

    /// Particle velocities
    pub fn velocities(&self) -> &[Vec2] {
        &self.velocities
    }

    /// Mutable particle velocities
    pub fn velocities_mut(&mut self) -> &mut [Vec2] {
        &mut self.velocities
    }

    /// Particle flags
    pub fn flags(&self) -> &[ParticleFlags] {
        &self.flags
    }

    /// Particle colours
    pub fn colors(&self) -> &[ParticleColor] {
        &self.colors
    }

    /// Mutable particle colours
    pub fn colors_mut(&mut self) -> &mut [ParticleColor] {
        &mut self.colors
    }

    /// Remaining particle lifetimes
    pub fn lifetimes(&self) -> &[f32] {
        &self.lifetimes
    }

    /// Contact weight sums of the last solver iteration
    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    /// Particle pairs closer than one diameter, sorted by index
    pub fn contacts(&self) -> &[ParticleContact] {
        &self.contacts
    }

    /// Particles closer than one diameter to a fixture, sorted by index
    pub fn body_contacts(&self) -> &[ParticleBodyContact] {
        &self.body_contacts
    }

    /// Spring connections created by spring groups
    pub fn pairs(&self) -> &[ParticlePair] {
        &self.pairs
    }

    /// Rest-shape triangles created by elastic groups
    pub fn triads(&self) -> &[ParticleTriad] {
        &self.triads
    }

    /// Fills a shape with particles. Circles and polygons are filled on a
    /// grid with one particle stride spacing, edges are stroked along their
    /// length. Spring groups connect neighbouring particles with pairs,
    /// elastic groups with triads.
    pub fn create_particle_group(&mut self, def: &ParticleGroupDef) -> Result<ParticleGroupHandle> {
        if !def.position.is_valid()
            || !def.linear_velocity.is_valid()
            || !def.angle.is_finite()
            || !def.angular_velocity.is_finite()
            || !def.strength.is_finite()
        {
            return Err(PhysicsError::InvalidParameter("particle group state must be finite".to_string()));
        }

        let xf = Transform::from_position_angle(def.position, def.angle);
        let points = self.fill_points(&def.shape, &xf);

        let max_count = self.def.max_count;
        if max_count != 0 {
            let overflow = self.live_count() + points.len() > max_count;
            if points.len() > max_count || (overflow && !self.def.destroy_by_age) {
                return Err(PhysicsError::CapacityExceeded(format!(
                    "a group of {} particles does not fit a system limited to {max_count}",
                    points.len()
                )));
            }
        }

        let first_index = self.positions.len();
        let handle = self.groups.insert(ParticleGroup::new(first_index, def.strength, def.user_data));

        for &p in &points {
            self.make_room()?;
            let velocity = def.linear_velocity + Vec2::scalar_cross(def.angular_velocity, p - def.position);
            self.push_particle(def.flags, p, velocity, def.color, def.lifetime, Some(handle));
        }
        self.groups[handle].count = points.len();

        let range = first_index..first_index + points.len();
        if def.flags.contains(ParticleFlags::SPRING) {
            self.create_pairs(range.clone(), def.strength);
        }
        if def.flags.contains(ParticleFlags::ELASTIC) {
            self.create_triads(range, def.strength);
        }

        debug!(?handle, count = points.len(), "Created particle group");
        Ok(handle)
    }

    fn fill_points(&self, shape: &Shape, xf: &Transform) -> Vec<Vec2> {
        let stride = self.particle_stride();
        let mut points = Vec::new();

        match shape {
            Shape::Edge(edge) => {
                let v1 = xf.apply(edge.v1);
                let v2 = xf.apply(edge.v2);
                let d = v2 - v1;
                let length = d.length();
                let mut position_on_edge = 0.0;
                while position_on_edge < length {
                    points.push(v1 + d * (position_on_edge / length));
                    position_on_edge += stride;
                }
            }
            _ => {
                let aabb = shape.compute_aabb(xf);
                let mut y = (aabb.lower.y / stride).floor() * stride;
                while y < aabb.upper.y {
                    let mut x = (aabb.lower.x / stride).floor() * stride;
                    while x < aabb.upper.x {
                        let p = Vec2::new(x, y);
                        if shape.test_point(xf, p) {
                            points.push(p);
                        }
                        x += stride;
                    }
                    y += stride;
                }
            }
        }

        points
    }

    /// For each particle of the range, the later particles of the range
    /// closer than `max_distance`, in index order
    fn neighbours(&self, range: Range<usize>, max_distance: f32) -> Vec<Vec<usize>> {
        let inv_cell_size = 1.0 / max_distance;
        let cell_of = |p: Vec2| ((p.x * inv_cell_size).floor() as i32, (p.y * inv_cell_size).floor() as i32);

        let mut grid: HashMap<(i32, i32), Vec<usize>> = HashMap::new();
        for index in range.clone() {
            grid.entry(cell_of(self.positions[index])).or_default().push(index);
        }

        let max_distance_squared = max_distance * max_distance;
        range
            .map(|a| {
                let (x, y) = cell_of(self.positions[a]);
                let mut found: Vec<usize> = (-1..=1)
                    .flat_map(|dx| (-1..=1).map(move |dy| (x + dx, y + dy)))
                    .filter_map(|cell| grid.get(&cell))
                    .flatten()
                    .copied()
                    .filter(|&b| b > a && self.positions[a].distance_squared(&self.positions[b]) < max_distance_squared)
                    .collect();
                found.sort_unstable();
                found
            })
            .collect()
    }

    fn create_pairs(&mut self, range: Range<usize>, strength: f32) {
        // Stride spacing is below one diameter so grid neighbours connect
        let first = range.start;
        let neighbours = self.neighbours(range, self.diameter);
        for (offset, others) in neighbours.iter().enumerate() {
            let a = first + offset;
            for &b in others {
                let distance = self.positions[a].distance(&self.positions[b]);
                self.pairs.push(ParticlePair { index_a: a, index_b: b, distance, strength });
            }
        }
    }

    /// Triangulates the range. A triangle is skipped when it lies on the
    /// same side of a shared edge as a triangle already accepted, so every
    /// fill grid cell gets two triads.
    fn create_triads(&mut self, range: Range<usize>, strength: f32) {
        let first = range.start;
        let stride = self.particle_stride();
        let neighbours = self.neighbours(range, MAX_TRIAD_DISTANCE * stride);
        // Fill grid triangles have a cross product of stride^2
        let min_cross = 0.5 * stride * stride;

        let mut opposite: HashMap<(usize, usize), Vec<usize>> = HashMap::new();
        let created = self.triads.len();
        for (offset, others) in neighbours.iter().enumerate() {
            let a = first + offset;
            for (i, &b) in others.iter().enumerate() {
                for &c in &others[i + 1..] {
                    if neighbours[b - first].binary_search(&c).is_err() {
                        continue;
                    }

                    let (pa, pb, pc) = (self.positions[a], self.positions[b], self.positions[c]);
                    if (pb - pa).cross(&(pc - pa)).abs() < min_cross {
                        continue;
                    }

                    let edges = [(a, b, c), (b, c, a), (a, c, b)];
                    let overlaps = edges.iter().any(|&(p, q, r)| {
                        opposite
                            .get(&(p, q))
                            .is_some_and(|others| others.iter().any(|&o| same_side(&self.positions, p, q, r, o)))
                    });
                    if overlaps {
                        continue;
                    }
                    for (p, q, r) in edges {
                        opposite.entry((p, q)).or_default().push(r);
                    }

                    let centroid = (pa + pb + pc) * (1.0 / 3.0);
                    self.triads.push(ParticleTriad {
                        index_a: a,
                        index_b: b,
                        index_c: c,
                        pa: pa - centroid,
                        pb: pb - centroid,
                        pc: pc - centroid,
                        strength,
                    });
                }
            }
        }

        trace!(count = self.triads.len() - created, "Created particle triads");
    }

    /// Destroys every particle of a group. The group handle becomes
    /// invalid immediately, its particles are removed at the end of the step.
    pub fn destroy_particle_group(&mut self, handle: ParticleGroupHandle) -> Result<()> {
        let group = self.groups.remove(handle).ok_or_else(|| {
            PhysicsError::ResourceNotFound(format!("Particle group with handle {handle:?} not found"))
        })?;

        for index in group.range() {
            self.flag_zombie(index);
            self.group_of[index] = None;
        }

        debug!(?handle, count = group.count, "Destroyed particle group");
        Ok(())
    }

    /// Gets a group
    pub fn particle_group(&self, handle: ParticleGroupHandle) -> Result<&ParticleGroup> {
        self.groups.fetch(handle)
    }

    /// Mutable access to a group
    pub fn particle_group_mut(&mut self, handle: ParticleGroupHandle) -> Result<&mut ParticleGroup> {
        self.groups.fetch_mut(handle)
    }

    /// All groups with their handles
    pub fn particle_groups(&self) -> impl Iterator<Item = (ParticleGroupHandle, &ParticleGroup)> + '_ {
        self.groups.iter()
    }

    /// Number of groups
    pub fn particle_group_count(&self) -> usize {
        self.groups.len()
    }

    /// Bounds of the live particle centers, if any
    pub fn compute_aabb(&self) -> Option<Aabb> {
        let mut live = self.live_indices();
        let first = live.next()?;
        let mut aabb = Aabb::new(self.positions[first], self.positions[first]);
        for index in live {
            aabb.lower = aabb.lower.min(&self.positions[index]);
            aabb.upper = aabb.upper.max(&self.positions[index]);
        }
        Some(aabb)
    }

    pub(super) fn live_indices(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.positions.len()).filter(|&index| !self.flags[index].contains(ParticleFlags::ZOMBIE))
    }

    pub(super) fn all_flags(&self) -> ParticleFlags {
        self.flags.iter().fold(ParticleFlags::empty(), |all, &flags| all | flags)
    }

    /// Reports the particles whose disc is hit by the segment. The callback
    /// return value follows [`RayCastCallback`]. Returns false if the
    /// callback terminated the cast.
    pub(crate) fn ray_cast(
        &self,
        system: ParticleSystemHandle,
        callback: &mut dyn RayCastCallback,
        point1: Vec2,
        point2: Vec2,
    ) -> bool {
        let v = point2 - point1;
        let vv = v.dot(&v);
        if vv <= 0.0 {
            return true;
        }

        let lower = point1.min(&point2);
        let upper = point1.max(&point2);
        let bounds = Aabb::new(lower, upper).expand(self.def.radius);

        let mut fraction = 1.0;
        for index in self.live_indices() {
            let position = self.positions[index];
            if !bounds.contains_point(position) {
                continue;
            }

            // Solve |point1 + t * v - position| = radius for the entering t
            let p = point1 - position;
            let pv = p.dot(&v);
            let determinant = pv * pv - vv * (p.dot(&p) - self.def.radius * self.def.radius);
            if determinant < 0.0 {
                continue;
            }

            let t = (-pv - determinant.sqrt()) / vv;
            if t < 0.0 || t > fraction {
                continue;
            }

            let normal = (p + v * t).normalize();
            let result = callback.report_particle(system, index, point1 + v * t, normal, t);
            if result == 0.0 {
                return false;
            }
            if result > 0.0 {
                fraction = fraction.min(result);
            }
        }

        true
    }

    /// Reports the particles whose center lies inside the box. Returns
    /// false if the callback stopped the query.
    pub(crate) fn query_aabb(&self, system: ParticleSystemHandle, callback: &mut dyn QueryCallback, aabb: &Aabb) -> bool {
        for index in self.live_indices() {
            if aabb.contains_point(self.positions[index]) && !callback.report_particle(system, index) {
                return false;
            }
        }
        true
    }

    /// Drops the contacts with fixtures that are being destroyed
    pub(crate) fn remove_fixture_contacts(&mut self, removed: &[FixtureHandle]) {
        self.body_contacts.retain(|contact| !removed.contains(&contact.fixture));
        self.listened_body_contacts.retain(|(_, fixture)| !removed.contains(fixture));
    }

    /// Moves every particle for a new world origin
    pub(crate) fn shift_origin(&mut self, new_origin: Vec2) {
        for position in &mut self.positions {
            *position -= new_origin;
        }
    }

    /// Decrements lifetimes and flags the expired particles
    pub(super) fn solve_lifetimes(&mut self, dt: f32) {
        for index in 0..self.lifetimes.len() {
            if self.lifetimes[index] > 0.0 {
                self.lifetimes[index] -= dt;
                if self.lifetimes[index] <= 0.0 {
                    self.lifetimes[index] = 0.0;
                    self.flag_zombie(index);
                }
            }
        }
    }

    /// Removes zombie particles, shifting the survivors down. Contacts,
    /// pairs, triads and group ranges are remapped to the new indices and groups
    /// left without particles are destroyed.
    pub(crate) fn compact(&mut self) {
        if self.zombie_count == 0 {
            return;
        }

        let count = self.positions.len();
        let mut new_index = vec![None; count];
        let mut next = 0;
        for index in 0..count {
            if self.flags[index].contains(ParticleFlags::ZOMBIE) {
                continue;
            }
            new_index[index] = Some(next);
            self.positions[next] = self.positions[index];
            self.velocities[next] = self.velocities[index];
            self.flags[next] = self.flags[index];
            self.colors[next] = self.colors[index];
            self.lifetimes[next] = self.lifetimes[index];
            self.weights[next] = self.weights[index];
            self.group_of[next] = self.group_of[index];
            next += 1;
        }

        self.positions.truncate(next);
        self.velocities.truncate(next);
        self.flags.truncate(next);
        self.colors.truncate(next);
        self.lifetimes.truncate(next);
        self.weights.truncate(next);
        self.group_of.truncate(next);

        let remap = |index: usize| new_index[index];

        self.contacts.retain_mut(|contact| match (remap(contact.index_a), remap(contact.index_b)) {
            (Some(a), Some(b)) => {
                contact.index_a = a;
                contact.index_b = b;
                true
            }
            _ => false,
        });
        self.body_contacts.retain_mut(|contact| match remap(contact.index) {
            Some(index) => {
                contact.index = index;
                true
            }
            None => false,
        });
        self.pairs.retain_mut(|pair| match (remap(pair.index_a), remap(pair.index_b)) {
            (Some(a), Some(b)) => {
                pair.index_a = a;
                pair.index_b = b;
                true
            }
            _ => false,
        });
        self.triads.retain_mut(|triad| match (remap(triad.index_a), remap(triad.index_b), remap(triad.index_c)) {
            (Some(a), Some(b), Some(c)) => {
                triad.index_a = a;
                triad.index_b = b;
                triad.index_c = c;
                true
            }
            _ => false,
        });
        self.listened_contacts = self
            .listened_contacts
            .iter()
            .filter_map(|&(a, b)| Some((remap(a)?, remap(b)?)))
            .collect();
        self.listened_body_contacts = self
            .listened_body_contacts
            .iter()
            .filter_map(|&(index, fixture)| Some((remap(index)?, fixture)))
            .collect();

        self.update_group_ranges();

        trace!(removed = count - next, remaining = next, "Compacted particle buffers");
        self.zombie_count = 0;
    }

    fn update_group_ranges(&mut self) {
        let mut ranges: Vec<(ParticleGroupHandle, usize, usize)> =
            self.groups.handles().into_iter().map(|handle| (handle, usize::MAX, 0)).collect();

        for (index, group) in self.group_of.iter().enumerate() {
            let Some(group) = group else { continue };
            if let Some(range) = ranges.iter_mut().find(|(handle, _, _)| handle == group) {
                range.1 = range.1.min(index);
                range.2 += 1;
            }
        }

        for (handle, first_index, count) in ranges {
            let emptied = self.groups.get(handle).is_some_and(|group| group.count > 0 && count == 0);
            if emptied {
                self.groups.remove(handle);
                debug!(?handle, "Destroyed empty particle group");
            } else if let Some(group) = self.groups.get_mut(handle) {
                group.first_index = if count == 0 { self.positions.len() } else { first_index };
                group.count = count;
            }
        }
    }
}

/// Whether `r` and `o` lie strictly on the same side of the line through `p` and `q`
fn same_side(positions: &[Vec2], p: usize, q: usize, r: usize, o: usize) -> bool {
    let edge = positions[q] - positions[p];
    edge.cross(&(positions[r] - positions[p])) * edge.cross(&(positions[o] - positions[p])) > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{CircleShape, PolygonShape};
    use approx::assert_relative_eq;

    fn system(radius: f32) -> ParticleSystem {
        ParticleSystem::new(&ParticleSystemDef::default().with_radius(radius), &SimulationConfig::default())
            .expect("valid system")
    }

    #[test]
    fn test_invalid_radius_is_rejected() {
        let result = ParticleSystem::new(&ParticleSystemDef::default().with_radius(0.0), &SimulationConfig::default());
        assert!(matches!(result, Err(PhysicsError::DegenerateGeometry(_))));
    }

    #[test]
    fn test_particle_mass_uses_stride() {
        let system = system(0.5);
        // stride = 0.75 * 1.0
        assert_relative_eq!(system.particle_stride(), 0.75);
        assert_relative_eq!(system.particle_mass(), 0.5625);
    }

    #[test]
    fn test_capacity_without_destruction_by_age() {
        let mut system = system(0.1);
        system.set_max_count(2).unwrap();
        system.set_destruction_by_age(false);

        system.create_particle(&ParticleDef::new(Vec2::zero())).unwrap();
        system.create_particle(&ParticleDef::new(Vec2::unit_x())).unwrap();
        let result = system.create_particle(&ParticleDef::new(Vec2::unit_y()));
        assert!(matches!(result, Err(PhysicsError::CapacityExceeded(_))));
    }

    #[test]
    fn test_destruction_by_age_picks_shortest_lifetime() {
        let mut system = system(0.1);
        system.set_max_count(3).unwrap();

        system.create_particle(&ParticleDef::new(Vec2::zero())).unwrap();
        system.create_particle(&ParticleDef::new(Vec2::unit_x()).with_lifetime(5.0)).unwrap();
        system.create_particle(&ParticleDef::new(Vec2::unit_y()).with_lifetime(2.0)).unwrap();
        system.create_particle(&ParticleDef::new(Vec2::new(2.0, 2.0))).unwrap();

        assert!(system.flags()[2].contains(ParticleFlags::ZOMBIE));
        system.compact();
        assert_eq!(system.particle_count(), 3);
        assert_eq!(system.positions()[2], Vec2::new(2.0, 2.0));
    }

    #[test]
    fn test_compaction_remaps_group_ranges() {
        let mut system = system(0.25);
        let first = system
            .create_particle_group(&ParticleGroupDef::new(PolygonShape::new_box(1.0, 1.0).unwrap()))
            .unwrap();
        let second = system
            .create_particle_group(&ParticleGroupDef::new(CircleShape::new(0.5).unwrap()).with_position(Vec2::new(5.0, 0.0)))
            .unwrap();
        let first_count = system.particle_group(first).unwrap().particle_count();
        let second_count = system.particle_group(second).unwrap().particle_count();
        assert!(first_count > 0 && second_count > 0);

        system.destroy_particle_group(first).unwrap();
        system.compact();

        assert!(system.particle_group(first).is_err());
        let group = system.particle_group(second).unwrap();
        assert_eq!(group.first_index(), 0);
        assert_eq!(group.particle_count(), second_count);
        assert_eq!(system.particle_count(), second_count);
    }

    #[test]
    fn test_group_particles_inside_shape() {
        let mut system = system(0.1);
        let def = ParticleGroupDef::new(CircleShape::new(1.0).unwrap()).with_position(Vec2::new(3.0, 4.0));
        let handle = system.create_particle_group(&def).unwrap();

        let group = system.particle_group(handle).unwrap();
        for index in group.range() {
            assert!(system.positions()[index].distance(&Vec2::new(3.0, 4.0)) <= 1.0);
        }
    }

    #[test]
    fn test_spring_group_connects_axis_neighbours() {
        let mut system = system(0.25);
        let def = ParticleGroupDef::new(PolygonShape::new_box(0.5, 0.5).unwrap()).with_flags(ParticleFlags::SPRING);
        system.create_particle_group(&def).unwrap();

        // A 3x3 grid at 0.375 spacing, diagonals are longer than one diameter
        assert_eq!(system.particle_count(), 9);
        assert_eq!(system.pairs().len(), 12);
        for pair in system.pairs() {
            assert_relative_eq!(pair.distance, 0.375, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_elastic_group_triangulates_grid_cells() {
        let mut system = system(0.25);
        let def = ParticleGroupDef::new(PolygonShape::new_box(0.5, 0.5).unwrap()).with_flags(ParticleFlags::ELASTIC);
        system.create_particle_group(&def).unwrap();

        assert_eq!(system.particle_count(), 9);
        assert_eq!(system.triads().len(), 8);
        for triad in system.triads() {
            assert_relative_eq!(triad.pa + triad.pb + triad.pc, Vec2::zero(), epsilon = 1e-5);
        }
    }

    #[test]
    fn test_compaction_drops_triads_of_destroyed_particles() {
        let mut system = system(0.25);
        let def = ParticleGroupDef::new(PolygonShape::new_box(0.5, 0.5).unwrap()).with_flags(ParticleFlags::ELASTIC);
        system.create_particle_group(&def).unwrap();

        // Triads through the center particle go with it
        system.destroy_particle(4).unwrap();
        system.compact();
        assert_eq!(system.particle_count(), 8);
        assert!(system.triads().iter().all(|triad| triad.index_c < 8));
        assert!(system.triads().len() < 8);
    }

    #[test]
    fn test_lifetime_expiry_flags_zombie() {
        let mut system = system(0.1);
        system.create_particle(&ParticleDef::new(Vec2::zero()).with_lifetime(0.05)).unwrap();
        system.create_particle(&ParticleDef::new(Vec2::unit_x())).unwrap();

        system.solve_lifetimes(0.1);
        assert!(system.flags()[0].contains(ParticleFlags::ZOMBIE));
        assert!(!system.flags()[1].contains(ParticleFlags::ZOMBIE));
    }
}

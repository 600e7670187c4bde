use std::collections::HashMap;

use crate::bodies::{Body, Fixture};
use crate::collision::BroadPhase;
use crate::core::{Arena, BodyHandle, ContactListener, FixtureHandle, ParticleSystemHandle};
use crate::math::{Aabb, Vec2};
use crate::particles::system::ParticleWorld;
use crate::particles::{ParticleBodyContact, ParticleContact, ParticleFlags, ParticleSystem};

/// Uniform grid of particle indices with one diameter per cell
type ParticleGrid = HashMap<(i32, i32), Vec<usize>>;

impl ParticleSystem {
    fn cell_of(&self, p: Vec2) -> (i32, i32) {
        ((p.x * self.inv_diameter).floor() as i32, (p.y * self.inv_diameter).floor() as i32)
    }

    fn build_grid(&self) -> ParticleGrid {
        let mut grid = ParticleGrid::new();
        for index in self.live_indices() {
            grid.entry(self.cell_of(self.positions[index])).or_default().push(index);
        }
        grid
    }

    /// Rebuilds particle-particle and particle-fixture contacts and reports
    /// the changes to the listener
    pub(crate) fn update_contacts(&mut self, system: ParticleSystemHandle, world: &mut ParticleWorld) {
        let grid = self.build_grid();
        self.update_particle_contacts(&grid);
        self.update_body_contacts(&grid, world.bodies, world.fixtures, world.broad_phase);
        self.notify_listener(system, world.listener.as_deref_mut());
    }

    fn update_particle_contacts(&mut self, grid: &ParticleGrid) {
        self.contacts.clear();

        for a in self.live_indices().collect::<Vec<_>>() {
            let (x, y) = self.cell_of(self.positions[a]);
            for dx in -1..=1 {
                for dy in -1..=1 {
                    let Some(cell) = grid.get(&(x + dx, y + dy)) else { continue };
                    for &b in cell {
                        if b > a {
                            self.add_contact(a, b);
                        }
                    }
                }
            }
        }

        self.contacts.sort_by_key(|contact| (contact.index_a, contact.index_b));
    }

    fn add_contact(&mut self, a: usize, b: usize) {
        let d = self.positions[b] - self.positions[a];
        let distance_squared = d.length_squared();
        if distance_squared >= self.squared_diameter {
            return;
        }

        let distance = distance_squared.sqrt();
        let normal = if distance > f32::EPSILON { d / distance } else { Vec2::unit_x() };
        self.contacts.push(ParticleContact {
            index_a: a,
            index_b: b,
            weight: 1.0 - distance * self.inv_diameter,
            normal,
            flags: self.flags[a] | self.flags[b],
        });
    }

    fn update_body_contacts(
        &mut self,
        grid: &ParticleGrid,
        bodies: &Arena<BodyHandle, Body>,
        fixtures: &Arena<FixtureHandle, Fixture>,
        broad_phase: &BroadPhase<FixtureHandle>,
    ) {
        self.body_contacts.clear();

        let Some(bounds) = self.compute_aabb() else { return };
        let candidates = overlapping_fixtures(broad_phase, &bounds.expand(self.diameter));

        let inv_mass = self.particle_inv_mass();
        for handle in candidates {
            let Some(fixture) = fixtures.get(handle) else { continue };
            if fixture.is_sensor {
                continue;
            }
            let Some(body) = bodies.get(fixture.body) else { continue };

            let xf = body.xf;
            let aabb = fixture.shape.compute_aabb(&xf).expand(self.diameter);
            let center = body.world_center();

            for index in self.particles_in(grid, &aabb) {
                let p = self.positions[index];
                let (distance, n) = fixture.shape.compute_distance(&xf, p);
                if distance >= self.diameter {
                    continue;
                }

                let inv_am = if self.flags[index].contains(ParticleFlags::WALL) { 0.0 } else { inv_mass };
                let rpn = (p - center).cross(&n);
                let inv_m = inv_am + body.inv_mass + body.inv_inertia * rpn * rpn;

                self.body_contacts.push(ParticleBodyContact {
                    index,
                    body: fixture.body,
                    fixture: handle,
                    weight: 1.0 - distance * self.inv_diameter,
                    normal: -n,
                    mass: if inv_m > 0.0 { 1.0 / inv_m } else { 0.0 },
                });
            }
        }

        self.body_contacts.sort_by_key(|contact| (contact.index, contact.fixture));
    }

    /// Live particles whose center is inside the box
    fn particles_in(&self, grid: &ParticleGrid, aabb: &Aabb) -> Vec<usize> {
        let (x0, y0) = self.cell_of(aabb.lower);
        let (x1, y1) = self.cell_of(aabb.upper);
        let cells = (x1 - x0 + 1) as i64 * (y1 - y0 + 1) as i64;

        // Large fixtures touch more cells than there are particles
        if cells > grid.len() as i64 {
            return grid
                .values()
                .flatten()
                .copied()
                .filter(|&index| aabb.contains_point(self.positions[index]))
                .collect();
        }

        let mut found = Vec::new();
        for x in x0..=x1 {
            for y in y0..=y1 {
                let Some(cell) = grid.get(&(x, y)) else { continue };
                found.extend(cell.iter().copied().filter(|&index| aabb.contains_point(self.positions[index])));
            }
        }
        found
    }

    fn notify_listener(&mut self, system: ParticleSystemHandle, listener: Option<&mut (dyn ContactListener + 'static)>) {
        let current: Vec<(usize, usize)> = self
            .contacts
            .iter()
            .filter(|contact| contact.flags.contains(ParticleFlags::PARTICLE_CONTACT_LISTENER))
            .map(|contact| (contact.index_a, contact.index_b))
            .collect();
        let current_body: Vec<(usize, FixtureHandle)> = self
            .body_contacts
            .iter()
            .filter(|contact| self.flags[contact.index].contains(ParticleFlags::FIXTURE_CONTACT_LISTENER))
            .map(|contact| (contact.index, contact.fixture))
            .collect();

        if let Some(listener) = listener {
            for contact in &self.contacts {
                let key = (contact.index_a, contact.index_b);
                if contact.flags.contains(ParticleFlags::PARTICLE_CONTACT_LISTENER)
                    && self.listened_contacts.binary_search(&key).is_err()
                {
                    listener.begin_particle_contact(system, contact);
                }
            }
            for &(a, b) in &self.listened_contacts {
                if current.binary_search(&(a, b)).is_err() {
                    listener.end_particle_contact(system, a, b);
                }
            }

            for contact in &self.body_contacts {
                let key = (contact.index, contact.fixture);
                if self.flags[contact.index].contains(ParticleFlags::FIXTURE_CONTACT_LISTENER)
                    && self.listened_body_contacts.binary_search(&key).is_err()
                {
                    listener.begin_particle_body_contact(system, contact);
                }
            }
            for &(index, fixture) in &self.listened_body_contacts {
                if current_body.binary_search(&(index, fixture)).is_err() {
                    listener.end_particle_body_contact(system, fixture, index);
                }
            }
        }

        self.listened_contacts = current;
        self.listened_body_contacts = current_body;
    }
}

/// Fixtures whose fat bounds overlap the box, sorted and unique
pub(super) fn overlapping_fixtures(broad_phase: &BroadPhase<FixtureHandle>, aabb: &Aabb) -> Vec<FixtureHandle> {
    let mut found = Vec::new();
    broad_phase.query(aabb, |proxy| {
        if let Some(fixture) = broad_phase.user_data(proxy) {
            found.push(fixture);
        }
        true
    });
    found.sort();
    found.dedup();
    found
}

#[cfg(test)]
mod tests {
    use crate::core::SimulationConfig;
    use crate::math::Vec2;
    use crate::particles::{ParticleDef, ParticleSystem, ParticleSystemDef};
    use approx::assert_relative_eq;

    #[test]
    fn test_contacts_within_one_diameter() {
        let def = ParticleSystemDef::default().with_radius(0.5);
        let mut system = ParticleSystem::new(&def, &SimulationConfig::default()).unwrap();
        system.create_particle(&ParticleDef::new(Vec2::zero())).unwrap();
        system.create_particle(&ParticleDef::new(Vec2::new(0.5, 0.0))).unwrap();
        system.create_particle(&ParticleDef::new(Vec2::new(3.0, 0.0))).unwrap();

        let grid = system.build_grid();
        system.update_particle_contacts(&grid);

        assert_eq!(system.contacts().len(), 1);
        let contact = system.contacts()[0];
        assert_eq!((contact.index_a, contact.index_b), (0, 1));
        assert_relative_eq!(contact.weight, 0.5);
        assert_relative_eq!(contact.normal, Vec2::unit_x());
    }

    #[test]
    fn test_coincident_particles_use_x_normal() {
        let def = ParticleSystemDef::default().with_radius(0.5);
        let mut system = ParticleSystem::new(&def, &SimulationConfig::default()).unwrap();
        system.create_particle(&ParticleDef::new(Vec2::new(1.0, 1.0))).unwrap();
        system.create_particle(&ParticleDef::new(Vec2::new(1.0, 1.0))).unwrap();

        let grid = system.build_grid();
        system.update_particle_contacts(&grid);

        assert_eq!(system.contacts().len(), 1);
        assert_relative_eq!(system.contacts()[0].weight, 1.0);
        assert_eq!(system.contacts()[0].normal, Vec2::unit_x());
    }
}

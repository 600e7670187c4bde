use tracing::trace;

use crate::core::{BodyHandle, ParticleSystemHandle, TimeStep};
use crate::math::{Aabb, RayCastInput, Rot, Vec2};
use crate::particles::contacts::overlapping_fixtures;
use crate::particles::system::ParticleWorld;
use crate::particles::{ParticleFlags, ParticleSystem};

impl ParticleSystem {
    /// Advances the particles by one world step.
    ///
    /// Contacts must be current when this is called; sub-steps after the
    /// first recompute them. Zombies are removed at the end.
    pub(crate) fn solve(&mut self, system: ParticleSystemHandle, step: &TimeStep, world: &mut ParticleWorld) {
        if step.dt <= 0.0 {
            return;
        }

        self.solve_lifetimes(step.dt);

        let iterations = step.particle_iterations.max(1);
        let sub_step = TimeStep {
            dt: step.dt / iterations as f32,
            inv_dt: step.inv_dt * iterations as f32,
            ..*step
        };

        for iteration in 0..iterations {
            if iteration > 0 {
                self.update_contacts(system, world);
            }

            let all_flags = self.all_flags();
            self.compute_weight();

            if all_flags.contains(ParticleFlags::VISCOUS) {
                self.solve_viscous(world);
            }
            if all_flags.contains(ParticleFlags::REPULSIVE) {
                self.solve_repulsive(&sub_step);
            }
            if all_flags.contains(ParticleFlags::POWDER) {
                self.solve_powder(&sub_step, world);
            }
            if all_flags.contains(ParticleFlags::TENSILE) {
                self.solve_tensile(&sub_step, world);
            }

            self.solve_gravity(&sub_step, world.gravity);
            self.solve_pressure(&sub_step, world);
            self.solve_damping(&sub_step, world);

            if all_flags.contains(ParticleFlags::ELASTIC) {
                self.solve_elastic(&sub_step);
            }
            if all_flags.contains(ParticleFlags::SPRING) {
                self.solve_spring(&sub_step);
            }

            self.limit_velocity(&sub_step);
            self.solve_collision(&sub_step, world);

            if all_flags.contains(ParticleFlags::WALL) {
                self.solve_wall();
            }

            for (position, velocity) in self.positions.iter_mut().zip(&self.velocities) {
                *position += *velocity * sub_step.dt;
            }
        }

        trace!(?system, count = self.positions.len(), zombies = self.zombie_count, "Solved particle system");
        self.compact();
    }

    fn critical_velocity(&self, step: &TimeStep) -> f32 {
        self.diameter * step.inv_dt
    }

    fn critical_pressure(&self, step: &TimeStep) -> f32 {
        let velocity = self.critical_velocity(step);
        self.def.density * velocity * velocity
    }

    fn compute_weight(&mut self) {
        self.weights.iter_mut().for_each(|weight| *weight = 0.0);
        for contact in &self.body_contacts {
            self.weights[contact.index] += contact.weight;
        }
        for contact in &self.contacts {
            self.weights[contact.index_a] += contact.weight;
            self.weights[contact.index_b] += contact.weight;
        }
    }

    fn apply_body_impulse(world: &mut ParticleWorld, body: BodyHandle, impulse: Vec2, point: Vec2) {
        if let Some(body) = world.bodies.get_mut(body) {
            body.apply_linear_impulse(impulse, point, true);
        }
    }

    fn solve_viscous(&mut self, world: &mut ParticleWorld) {
        let strength = self.def.viscous_strength;
        let inv_mass = self.particle_inv_mass();

        for contact in &self.body_contacts {
            let a = contact.index;
            if !self.flags[a].contains(ParticleFlags::VISCOUS) {
                continue;
            }
            let Some(body) = world.bodies.get(contact.body) else { continue };
            let p = self.positions[a];
            let v = body.linear_velocity_from_world_point(p) - self.velocities[a];
            let f = v * (strength * contact.mass * contact.weight);
            self.velocities[a] += f * inv_mass;
            Self::apply_body_impulse(world, contact.body, -f, p);
        }

        for contact in &self.contacts {
            if !contact.flags.contains(ParticleFlags::VISCOUS) {
                continue;
            }
            let (a, b) = (contact.index_a, contact.index_b);
            let v = self.velocities[b] - self.velocities[a];
            let f = v * (strength * contact.weight);
            self.velocities[a] += f;
            self.velocities[b] -= f;
        }
    }

    /// Pushes apart particles of different groups
    fn solve_repulsive(&mut self, step: &TimeStep) {
        let strength = self.def.repulsive_strength * self.critical_velocity(step);
        for contact in &self.contacts {
            if !contact.flags.contains(ParticleFlags::REPULSIVE) {
                continue;
            }
            let (a, b) = (contact.index_a, contact.index_b);
            if self.group_of[a] == self.group_of[b] {
                continue;
            }
            let f = contact.normal * (strength * contact.weight);
            self.velocities[a] -= f;
            self.velocities[b] += f;
        }
    }

    /// Repulsion that only kicks in beyond the rest spacing of a group
    fn solve_powder(&mut self, step: &TimeStep, world: &mut ParticleWorld) {
        let strength = self.def.powder_strength * self.critical_velocity(step);
        let min_weight = 1.0 - self.stride_factor;
        let inv_mass = self.particle_inv_mass();

        for contact in &self.body_contacts {
            let a = contact.index;
            if !self.flags[a].contains(ParticleFlags::POWDER) || contact.weight <= min_weight {
                continue;
            }
            let f = contact.normal * (contact.mass * strength * (contact.weight - min_weight));
            self.velocities[a] -= f * inv_mass;
            Self::apply_body_impulse(world, contact.body, f, self.positions[a]);
        }

        for contact in &self.contacts {
            if !contact.flags.contains(ParticleFlags::POWDER) || contact.weight <= min_weight {
                continue;
            }
            let f = contact.normal * (strength * (contact.weight - min_weight));
            self.velocities[contact.index_a] -= f;
            self.velocities[contact.index_b] += f;
        }
    }

    /// Surface tension between tensile particles
    fn solve_tensile(&mut self, step: &TimeStep, world: &ParticleWorld) {
        let mut accumulation = vec![Vec2::zero(); self.positions.len()];
        for contact in &self.contacts {
            if contact.flags.contains(ParticleFlags::TENSILE) {
                let weighted_normal = contact.normal * contact.weight;
                accumulation[contact.index_a] -= weighted_normal;
                accumulation[contact.index_b] += weighted_normal;
            }
        }

        let critical_velocity = self.critical_velocity(step);
        let pressure_strength = self.def.surface_tension_pressure_strength * critical_velocity;
        let normal_strength = self.def.surface_tension_normal_strength * critical_velocity;
        let max_velocity_variation = world.config.max_particle_force * critical_velocity;

        for contact in &self.contacts {
            if !contact.flags.contains(ParticleFlags::TENSILE) {
                continue;
            }
            let (a, b) = (contact.index_a, contact.index_b);
            let h = self.weights[a] + self.weights[b];
            let s = accumulation[b] - accumulation[a];
            let fn_ = (pressure_strength * (h - 2.0) + normal_strength * s.dot(&contact.normal))
                .min(max_velocity_variation)
                * contact.weight;
            let f = contact.normal * fn_;
            self.velocities[a] -= f;
            self.velocities[b] += f;
        }
    }

    fn solve_gravity(&mut self, step: &TimeStep, gravity: Vec2) {
        let dv = gravity * (step.dt * self.def.gravity_scale);
        for velocity in &mut self.velocities {
            *velocity += dv;
        }
    }

    /// Isotropic pressure from the contact weight of each particle
    fn solve_pressure(&mut self, step: &TimeStep, world: &mut ParticleWorld) {
        let critical_pressure = self.critical_pressure(step);
        let pressure_per_weight = self.def.pressure_strength * critical_pressure;
        let max_pressure = world.config.max_particle_pressure * critical_pressure;
        let min_weight = world.config.min_particle_weight;

        let pressures: Vec<f32> = self
            .weights
            .iter()
            .zip(&self.flags)
            .map(|(&weight, flags)| {
                if flags.contains(ParticleFlags::POWDER) {
                    0.0
                } else {
                    (pressure_per_weight * (weight - min_weight).max(0.0)).min(max_pressure)
                }
            })
            .collect();

        let velocity_per_pressure = step.dt / (self.def.density * self.def.radius);
        let inv_mass = self.particle_inv_mass();

        for contact in &self.body_contacts {
            let a = contact.index;
            let h = pressures[a] + pressure_per_weight * contact.weight;
            let f = contact.normal * (velocity_per_pressure * contact.weight * contact.mass * h);
            self.velocities[a] -= f * inv_mass;
            Self::apply_body_impulse(world, contact.body, f, self.positions[a]);
        }

        for contact in &self.contacts {
            let (a, b) = (contact.index_a, contact.index_b);
            let h = pressures[a] + pressures[b];
            let f = contact.normal * (velocity_per_pressure * contact.weight * h);
            self.velocities[a] -= f;
            self.velocities[b] += f;
        }
    }

    /// Damps the approaching normal velocity of touching particles
    fn solve_damping(&mut self, step: &TimeStep, world: &mut ParticleWorld) {
        let linear_damping = self.def.damping_strength;
        let quadratic_damping = 1.0 / self.critical_velocity(step);
        let inv_mass = self.particle_inv_mass();

        for contact in &self.body_contacts {
            let a = contact.index;
            let Some(body) = world.bodies.get(contact.body) else { continue };
            let p = self.positions[a];
            let v = body.linear_velocity_from_world_point(p) - self.velocities[a];
            let vn = v.dot(&contact.normal);
            if vn < 0.0 {
                let damping = (linear_damping * contact.weight).max((-quadratic_damping * vn).min(0.5));
                let f = contact.normal * (damping * contact.mass * vn);
                self.velocities[a] += f * inv_mass;
                Self::apply_body_impulse(world, contact.body, -f, p);
            }
        }

        for contact in &self.contacts {
            let (a, b) = (contact.index_a, contact.index_b);
            let v = self.velocities[b] - self.velocities[a];
            let vn = v.dot(&contact.normal);
            if vn < 0.0 {
                let damping = (linear_damping * contact.weight).max((-quadratic_damping * vn).min(0.5));
                let f = contact.normal * (damping * vn);
                self.velocities[a] += f;
                self.velocities[b] -= f;
            }
        }
    }

    /// Pulls each triad towards its rest shape, rotated to best fit the
    /// predicted positions
    fn solve_elastic(&mut self, step: &TimeStep) {
        let elastic_strength = step.inv_dt * self.def.elastic_strength;
        for triad in &self.triads {
            let (a, b, c) = (triad.index_a, triad.index_b, triad.index_c);
            let mut pa = self.positions[a] + self.velocities[a] * step.dt;
            let mut pb = self.positions[b] + self.velocities[b] * step.dt;
            let mut pc = self.positions[c] + self.velocities[c] * step.dt;
            let centroid = (pa + pb + pc) * (1.0 / 3.0);
            pa -= centroid;
            pb -= centroid;
            pc -= centroid;

            let sin = triad.pa.cross(&pa) + triad.pb.cross(&pb) + triad.pc.cross(&pc);
            let cos = triad.pa.dot(&pa) + triad.pb.dot(&pb) + triad.pc.dot(&pc);
            let length = (sin * sin + cos * cos).sqrt();
            if length <= f32::EPSILON {
                continue;
            }
            let r = Rot { s: sin / length, c: cos / length };

            let strength = elastic_strength * triad.strength;
            self.velocities[a] += (r.rotate(triad.pa) - pa) * strength;
            self.velocities[b] += (r.rotate(triad.pb) - pb) * strength;
            self.velocities[c] += (r.rotate(triad.pc) - pc) * strength;
        }
    }

    /// Pulls spring pairs back to their rest distance
    fn solve_spring(&mut self, step: &TimeStep) {
        let spring_strength = step.inv_dt * self.def.spring_strength;
        for pair in &self.pairs {
            let (a, b) = (pair.index_a, pair.index_b);
            let pa = self.positions[a] + self.velocities[a] * step.dt;
            let pb = self.positions[b] + self.velocities[b] * step.dt;
            let d = pb - pa;
            let r1 = d.length();
            if r1 <= f32::EPSILON {
                continue;
            }
            let strength = spring_strength * pair.strength;
            let f = d * (strength * (pair.distance - r1) / r1);
            self.velocities[a] -= f;
            self.velocities[b] += f;
        }
    }

    /// Clamps every speed to one diameter per sub-step
    fn limit_velocity(&mut self, step: &TimeStep) {
        let critical_velocity = self.critical_velocity(step);
        let critical_velocity_squared = critical_velocity * critical_velocity;
        for velocity in &mut self.velocities {
            let v2 = velocity.length_squared();
            if v2 > critical_velocity_squared {
                *velocity *= (critical_velocity_squared / v2).sqrt();
            }
        }
    }

    /// Stops particles at fixture surfaces by casting their motion over the
    /// sub-step. The momentum removed from a particle goes to the body.
    fn solve_collision(&mut self, step: &TimeStep, world: &mut ParticleWorld) {
        let mut indices = self.live_indices();
        let Some(first) = indices.next() else { return };

        let swept = |index: usize| {
            let p1 = self.positions[index];
            let p2 = p1 + self.velocities[index] * step.dt;
            Aabb::new(p1.min(&p2), p1.max(&p2))
        };
        let bounds = indices.fold(swept(first), |bounds, index| bounds.union(&swept(index)));
        let candidates = overlapping_fixtures(world.broad_phase, &bounds);

        let linear_slop = world.config.linear_slop;
        let mass = self.particle_mass();
        let mut impulses = Vec::new();

        for handle in candidates {
            let Some(fixture) = world.fixtures.get(handle) else { continue };
            if fixture.is_sensor {
                continue;
            }
            let Some(body) = world.bodies.get(fixture.body) else { continue };
            let xf = body.xf;
            let fixture_aabb = fixture.shape.compute_aabb(&xf);

            for index in 0..self.positions.len() {
                if self.flags[index].contains(ParticleFlags::ZOMBIE) {
                    continue;
                }
                let p1 = self.positions[index];
                let p2 = p1 + self.velocities[index] * step.dt;
                if !Aabb::new(p1.min(&p2), p1.max(&p2)).overlaps(&fixture_aabb) {
                    continue;
                }

                let input = RayCastInput::new(p1, p2);
                let Some(output) = fixture.shape.ray_cast(&input, &xf) else { continue };

                let p = input.point_at(output.fraction) + output.normal * linear_slop;
                let v = (p - p1) * step.inv_dt;
                let impulse = (self.velocities[index] - v) * mass;
                self.velocities[index] = v;
                impulses.push((fixture.body, impulse, p));
            }
        }

        for (body, impulse, point) in impulses {
            Self::apply_body_impulse(world, body, impulse, point);
        }
    }

    fn solve_wall(&mut self) {
        for (velocity, flags) in self.velocities.iter_mut().zip(&self.flags) {
            if flags.contains(ParticleFlags::WALL) {
                *velocity = Vec2::zero();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Arena, ArenaHandle, SimulationConfig};
    use crate::collision::BroadPhase;
    use crate::particles::{ParticleDef, ParticleSystemDef};
    use approx::assert_relative_eq;

    fn step(dt: f32) -> TimeStep {
        TimeStep {
            dt,
            inv_dt: 1.0 / dt,
            dt_ratio: 1.0,
            velocity_iterations: 8,
            position_iterations: 3,
            particle_iterations: 1,
            warm_starting: true,
        }
    }

    #[test]
    fn test_free_particle_falls_under_gravity() {
        let config = SimulationConfig::default();
        let def = ParticleSystemDef::default().with_radius(0.1);
        let mut system = ParticleSystem::new(&def, &config).unwrap();
        system.create_particle(&ParticleDef::new(Vec2::zero())).unwrap();

        let mut bodies = Arena::new();
        let fixtures = Arena::new();
        let broad_phase = BroadPhase::new(4.0, 0.1, 2.0);
        let mut world = ParticleWorld {
            bodies: &mut bodies,
            fixtures: &fixtures,
            broad_phase: &broad_phase,
            listener: None,
            gravity: config.gravity,
            config: &config,
        };

        let handle = ParticleSystemHandle::from_raw_parts(0, 0);
        system.update_contacts(handle, &mut world);
        system.solve(handle, &step(0.01), &mut world);

        assert_relative_eq!(system.velocities()[0], Vec2::new(0.0, -0.1), epsilon = 1e-6);
        assert_relative_eq!(system.positions()[0], Vec2::new(0.0, -0.001), epsilon = 1e-6);
    }

    #[test]
    fn test_wall_particles_do_not_move() {
        let config = SimulationConfig::default();
        let def = ParticleSystemDef::default().with_radius(0.1);
        let mut system = ParticleSystem::new(&def, &config).unwrap();
        system
            .create_particle(&ParticleDef::new(Vec2::zero()).with_flags(ParticleFlags::WALL))
            .unwrap();

        let mut bodies = Arena::new();
        let fixtures = Arena::new();
        let broad_phase = BroadPhase::new(4.0, 0.1, 2.0);
        let mut world = ParticleWorld {
            bodies: &mut bodies,
            fixtures: &fixtures,
            broad_phase: &broad_phase,
            listener: None,
            gravity: config.gravity,
            config: &config,
        };

        let handle = ParticleSystemHandle::from_raw_parts(0, 0);
        for _ in 0..10 {
            system.update_contacts(handle, &mut world);
            system.solve(handle, &step(1.0 / 60.0), &mut world);
        }

        assert_eq!(system.positions()[0], Vec2::zero());
        assert_eq!(system.velocities()[0], Vec2::zero());
    }
}

use crate::collision::{Contact, Manifold};
use crate::core::config::MAX_MANIFOLD_POINTS;
use crate::core::{FixtureHandle, ParticleSystemHandle};
use crate::math::Vec2;
use crate::particles::{ParticleBodyContact, ParticleContact};

/// Impulses applied by the contact solver, reported in `post_solve`
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ContactImpulse {
    pub normal_impulses: [f32; MAX_MANIFOLD_POINTS],
    pub tangent_impulses: [f32; MAX_MANIFOLD_POINTS],
    pub count: usize,
}

/// Receives contact notifications during a step.
///
/// Callbacks run synchronously inside `World::step` and must not try to
/// change the world. Every method has an empty default implementation.
pub trait ContactListener {
    /// Called when two fixtures begin to touch
    fn begin_contact(&mut self, _contact: &Contact) {}

    /// Called when two fixtures cease to touch, including when a touching
    /// contact is destroyed
    fn end_contact(&mut self, _contact: &Contact) {}

    /// Called after a touching contact is updated and before it is solved.
    /// The contact may be disabled for the current step here.
    fn pre_solve(&mut self, _contact: &mut Contact, _old_manifold: &Manifold) {}

    /// Reports the impulses applied to a touching contact by the solver
    fn post_solve(&mut self, _contact: &Contact, _impulse: &ContactImpulse) {}

    /// Called when a particle with the fixture-contact flag starts
    /// touching a fixture
    fn begin_particle_body_contact(&mut self, _system: ParticleSystemHandle, _contact: &ParticleBodyContact) {}

    /// Called when a particle with the fixture-contact flag stops
    /// touching a fixture
    fn end_particle_body_contact(&mut self, _system: ParticleSystemHandle, _fixture: FixtureHandle, _index: usize) {}

    /// Called when two particles start touching and one of them has the
    /// particle-contact flag
    fn begin_particle_contact(&mut self, _system: ParticleSystemHandle, _contact: &ParticleContact) {}

    /// Called when two particles stop touching
    fn end_particle_contact(&mut self, _system: ParticleSystemHandle, _index_a: usize, _index_b: usize) {}
}

/// Receives the hits of a world ray cast.
///
/// The returned value controls the cast: -1 ignores the hit and continues,
/// 0 terminates, `fraction` clips the ray to this hit and 1 continues
/// without clipping.
pub trait RayCastCallback {
    /// Called for each fixture found in the query
    fn report_fixture(&mut self, fixture: FixtureHandle, point: Vec2, normal: Vec2, fraction: f32) -> f32;

    /// Called for each particle found in the query. The default stops
    /// the cast of the current particle system.
    fn report_particle(
        &mut self,
        _system: ParticleSystemHandle,
        _index: usize,
        _point: Vec2,
        _normal: Vec2,
        _fraction: f32,
    ) -> f32 {
        0.0
    }

    /// Whether particles of the given system should be reported
    fn should_query_particle_system(&mut self, _system: ParticleSystemHandle) -> bool {
        true
    }
}

impl<F> RayCastCallback for F
where
    F: FnMut(FixtureHandle, Vec2, Vec2, f32) -> f32,
{
    fn report_fixture(&mut self, fixture: FixtureHandle, point: Vec2, normal: Vec2, fraction: f32) -> f32 {
        self(fixture, point, normal, fraction)
    }

    fn should_query_particle_system(&mut self, _system: ParticleSystemHandle) -> bool {
        false
    }
}

/// Receives the results of an AABB query. Returning false stops the query.
pub trait QueryCallback {
    /// Called for each fixture whose bounds overlap the query
    fn report_fixture(&mut self, fixture: FixtureHandle) -> bool;

    /// Called for each particle inside the query bounds
    fn report_particle(&mut self, _system: ParticleSystemHandle, _index: usize) -> bool {
        false
    }

    /// Whether particles of the given system should be reported
    fn should_query_particle_system(&mut self, _system: ParticleSystemHandle) -> bool {
        true
    }
}

impl<F> QueryCallback for F
where
    F: FnMut(FixtureHandle) -> bool,
{
    fn report_fixture(&mut self, fixture: FixtureHandle) -> bool {
        self(fixture)
    }

    fn should_query_particle_system(&mut self, _system: ParticleSystemHandle) -> bool {
        false
    }
}

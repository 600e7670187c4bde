use bitflags::bitflags;
use crate::bodies::Fixture;
use crate::collision::collide_circle::{collide_circles, collide_polygon_and_circle};
use crate::collision::collide_edge::{collide_edge_and_circle, collide_edge_and_polygon};
use crate::collision::collide_polygon::collide_polygons;
use crate::collision::manifold::{Manifold, WorldManifold};
use crate::core::{BodyHandle, FixtureHandle, ContactListener};
use crate::math::Transform;
use crate::shapes::{Shape, ShapeType};

bitflags! {
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub(crate) struct ContactFlags: u8 {
        /// Used when crawling the contact graph to form islands
        const ISLAND = 0x01;

        /// The shapes are touching
        const TOUCHING = 0x02;

        /// The contact may be disabled by the user for one step
        const ENABLED = 0x04;

        /// The contact needs filtering because a fixture filter changed
        const FILTER = 0x08;
    }
}

/// Friction mixing law: the geometric mean
#[inline]
pub fn mix_friction(friction_a: f32, friction_b: f32) -> f32 {
    (friction_a * friction_b).sqrt()
}

/// Restitution mixing law: the larger value wins
#[inline]
pub fn mix_restitution(restitution_a: f32, restitution_b: f32) -> f32 {
    restitution_a.max(restitution_b)
}

/// Whether a pair of shape types has a collision routine. Edge pairs never collide.
pub(crate) fn is_collidable(a: ShapeType, b: ShapeType) -> bool {
    !(a == ShapeType::Edge && b == ShapeType::Edge)
}

/// Whether the pair must be swapped so that the routine's primary shape is A
pub(crate) fn needs_swap(a: ShapeType, b: ShapeType) -> bool {
    // Routines are registered as (polygon|edge|circle, circle), (edge, polygon) and (polygon, polygon)
    matches!(
        (a, b),
        (ShapeType::Circle, ShapeType::Polygon)
            | (ShapeType::Circle, ShapeType::Edge)
            | (ShapeType::Polygon, ShapeType::Edge)
    )
}

/// Manages the contact between two fixtures whose fat AABBs overlap.
/// A contact may exist without the shapes touching.
#[derive(Debug, Clone)]
pub struct Contact {
    pub(crate) flags: ContactFlags,
    pub(crate) fixture_a: FixtureHandle,
    pub(crate) fixture_b: FixtureHandle,
    pub(crate) body_a: BodyHandle,
    pub(crate) body_b: BodyHandle,
    pub(crate) manifold: Manifold,
    pub(crate) friction: f32,
    pub(crate) restitution: f32,
    pub(crate) tangent_speed: f32,
}

impl Contact {
    /// Creates a contact, assuming the fixtures are already ordered for dispatch
    pub(crate) fn new(
        fixture_a: FixtureHandle,
        a: &Fixture,
        fixture_b: FixtureHandle,
        b: &Fixture,
    ) -> Self {
        Self {
            flags: ContactFlags::ENABLED,
            fixture_a,
            fixture_b,
            body_a: a.body,
            body_b: b.body,
            manifold: Manifold::default(),
            friction: mix_friction(a.friction, b.friction),
            restitution: mix_restitution(a.restitution, b.restitution),
            tangent_speed: 0.0,
        }
    }

    /// The first fixture in this contact
    pub fn fixture_a(&self) -> FixtureHandle {
        self.fixture_a
    }

    /// The second fixture in this contact
    pub fn fixture_b(&self) -> FixtureHandle {
        self.fixture_b
    }

    /// Body of fixture A
    pub fn body_a(&self) -> BodyHandle {
        self.body_a
    }

    /// Body of fixture B
    pub fn body_b(&self) -> BodyHandle {
        self.body_b
    }

    /// The contact manifold in local coordinates
    pub fn manifold(&self) -> &Manifold {
        &self.manifold
    }

    /// Evaluates the manifold in world coordinates
    pub fn world_manifold(&self, xf_a: &Transform, radius_a: f32, xf_b: &Transform, radius_b: f32) -> WorldManifold {
        WorldManifold::new(&self.manifold, xf_a, radius_a, xf_b, radius_b)
    }

    /// Is this contact touching?
    pub fn is_touching(&self) -> bool {
        self.flags.contains(ContactFlags::TOUCHING)
    }

    /// Enables or disables the contact. This lasts for the current step
    /// only and is meant to be used from `pre_solve`.
    pub fn set_enabled(&mut self, flag: bool) {
        self.flags.set(ContactFlags::ENABLED, flag);
    }

    /// Whether the contact takes part in the solve
    pub fn is_enabled(&self) -> bool {
        self.flags.contains(ContactFlags::ENABLED)
    }

    /// Flags the contact for filtering, applied on the next collide pass
    pub(crate) fn flag_for_filtering(&mut self) {
        self.flags.insert(ContactFlags::FILTER);
    }

    /// Mixed friction of the two fixtures, may be overridden
    pub fn friction(&self) -> f32 {
        self.friction
    }

    /// Overrides the default friction mixture. The value persists until
    /// reset.
    pub fn set_friction(&mut self, friction: f32) {
        self.friction = friction;
    }

    /// Restores the mixed friction of the two fixtures
    pub fn reset_friction(&mut self, fixture_a: &Fixture, fixture_b: &Fixture) {
        self.friction = mix_friction(fixture_a.friction, fixture_b.friction);
    }

    /// Mixed restitution of the two fixtures, may be overridden
    pub fn restitution(&self) -> f32 {
        self.restitution
    }

    /// Overrides the default restitution mixture. The value persists until
    /// reset.
    pub fn set_restitution(&mut self, restitution: f32) {
        self.restitution = restitution;
    }

    /// Restores the mixed restitution of the two fixtures
    pub fn reset_restitution(&mut self, fixture_a: &Fixture, fixture_b: &Fixture) {
        self.restitution = mix_restitution(fixture_a.restitution, fixture_b.restitution);
    }

    /// Desired tangent speed for conveyor belt behavior, in meters per second
    pub fn set_tangent_speed(&mut self, speed: f32) {
        self.tangent_speed = speed;
    }

    /// Surface speed along the contact tangent, for conveyor belts
    pub fn tangent_speed(&self) -> f32 {
        self.tangent_speed
    }

    /// Computes the manifold for the current transforms
    pub(crate) fn evaluate(shape_a: &Shape, xf_a: &Transform, shape_b: &Shape, xf_b: &Transform) -> Manifold {
        match (shape_a, shape_b) {
            (Shape::Circle(a), Shape::Circle(b)) => collide_circles(a, xf_a, b, xf_b),
            (Shape::Polygon(a), Shape::Circle(b)) => collide_polygon_and_circle(a, xf_a, b, xf_b),
            (Shape::Polygon(a), Shape::Polygon(b)) => collide_polygons(a, xf_a, b, xf_b),
            (Shape::Edge(a), Shape::Circle(b)) => collide_edge_and_circle(a, xf_a, b, xf_b),
            (Shape::Edge(a), Shape::Polygon(b)) => collide_edge_and_polygon(a, xf_a, b, xf_b),
            _ => Manifold::default(),
        }
    }

    /// Updates the manifold and touching status, matching new points to
    /// old ones so that impulses carry over, and notifies the listener.
    /// Returns true when the touching state changed and the bodies should
    /// be woken.
    pub(crate) fn update(
        &mut self,
        fixture_a: &Fixture,
        xf_a: &Transform,
        fixture_b: &Fixture,
        xf_b: &Transform,
        listener: Option<&mut (dyn ContactListener + 'static)>,
    ) -> bool {
        let old_manifold = self.manifold;

        // Re-enable this contact
        self.flags.insert(ContactFlags::ENABLED);

        let was_touching = self.is_touching();
        let sensor = fixture_a.is_sensor || fixture_b.is_sensor;

        let mut manifold = Self::evaluate(&fixture_a.shape, xf_a, &fixture_b.shape, xf_b);
        let touching = manifold.point_count > 0;

        if sensor {
            // Sensors don't generate manifolds
            manifold.point_count = 0;
        } else {
            // Match old contact ids to new contact ids and copy the stored
            // impulses to warm start the solver
            for mp2 in manifold.points.iter_mut().take(manifold.point_count) {
                mp2.normal_impulse = 0.0;
                mp2.tangent_impulse = 0.0;
                let key = mp2.id.key();

                if let Some(mp1) = old_manifold.points().iter().find(|mp1| mp1.id.key() == key) {
                    mp2.normal_impulse = mp1.normal_impulse;
                    mp2.tangent_impulse = mp1.tangent_impulse;
                }
            }
        }

        self.manifold = manifold;
        self.flags.set(ContactFlags::TOUCHING, touching);

        if let Some(listener) = listener {
            if !was_touching && touching {
                tracing::trace!(fixture_a = ?self.fixture_a, fixture_b = ?self.fixture_b, "contact begin");
                listener.begin_contact(self);
            }

            if was_touching && !touching {
                tracing::trace!(fixture_a = ?self.fixture_a, fixture_b = ?self.fixture_b, "contact end");
                listener.end_contact(self);
            }

            if !sensor && touching {
                listener.pre_solve(self, &old_manifold);
            }
        }

        !sensor && touching != was_touching
    }
}

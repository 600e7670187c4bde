use crate::collision::{Filter, ProxyId};
use crate::core::BodyHandle;
use crate::error::PhysicsError;
use crate::math::{Vec2, Aabb, Transform, RayCastInput, RayCastOutput};
use crate::shapes::{Shape, ShapeType, MassData};
use crate::Result;

/// Parameters used to attach a shape to a body
#[derive(Debug, Clone, PartialEq)]
pub struct FixtureDef {
    /// The shape, cloned into the fixture
    pub shape: Shape,

    /// The friction coefficient, usually in the range [0,1]
    pub friction: f32,

    /// The restitution (elasticity), usually in the range [0,1]
    pub restitution: f32,

    /// The density, usually in kg/m^2
    pub density: f32,

    /// A sensor collects contact information but never generates a response
    pub is_sensor: bool,

    /// Contact filtering data
    pub filter: Filter,

    /// Application specific data
    pub user_data: u64,
}

impl FixtureDef {
    /// A fixture definition with the default material: friction 0.2, no
    /// restitution and zero density
    pub fn new(shape: impl Into<Shape>) -> Self {
        Self {
            shape: shape.into(),
            friction: 0.2,
            restitution: 0.0,
            density: 0.0,
            is_sensor: false,
            filter: Filter::default(),
            user_data: 0,
        }
    }

    /// Sets the density in kg/m^2
    pub fn with_density(mut self, density: f32) -> Self {
        self.density = density;
        self
    }

    /// Sets the friction coefficient
    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    /// Sets the restitution coefficient
    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution;
        self
    }

    /// Makes the fixture a sensor
    pub fn with_sensor(mut self, is_sensor: bool) -> Self {
        self.is_sensor = is_sensor;
        self
    }

    /// Sets the collision filter
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    /// Checks the material and shape values
    pub(crate) fn validate(&self) -> Result<()> {
        if !(self.density >= 0.0) || !self.density.is_finite() {
            return Err(PhysicsError::InvalidParameter(format!(
                "fixture density must be non-negative, got {}", self.density
            )));
        }
        if !(self.friction >= 0.0) || !self.friction.is_finite() {
            return Err(PhysicsError::InvalidParameter(format!(
                "fixture friction must be non-negative, got {}", self.friction
            )));
        }
        if !(self.restitution >= 0.0) || !self.restitution.is_finite() {
            return Err(PhysicsError::InvalidParameter(format!(
                "fixture restitution must be non-negative, got {}", self.restitution
            )));
        }
        Ok(())
    }
}

/// Broadphase registration of a fixture
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct FixtureProxy {
    /// Tight bounds at the last synchronization
    pub aabb: Aabb,
    pub proxy_id: ProxyId,
}

/// Attaches a shape to a body with material and filtering properties
#[derive(Debug, Clone)]
pub struct Fixture {
    pub(crate) body: BodyHandle,
    pub(crate) shape: Shape,
    pub(crate) density: f32,
    pub(crate) friction: f32,
    pub(crate) restitution: f32,
    pub(crate) is_sensor: bool,
    pub(crate) filter: Filter,
    pub(crate) proxy: Option<FixtureProxy>,

    /// Application specific data
    pub user_data: u64,
}

impl Fixture {
    /// Builds a fixture from a validated definition
    pub(crate) fn new(body: BodyHandle, def: &FixtureDef) -> Self {
        Self {
            body,
            shape: def.shape.clone(),
            density: def.density,
            friction: def.friction,
            restitution: def.restitution,
            is_sensor: def.is_sensor,
            filter: def.filter,
            proxy: None,
            user_data: def.user_data,
        }
    }

    /// The body this fixture is attached to
    pub fn body(&self) -> BodyHandle {
        self.body
    }

    /// The child shape
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Kind of the attached shape
    pub fn shape_type(&self) -> ShapeType {
        self.shape.shape_type()
    }

    /// Density in kg/m^2
    pub fn density(&self) -> f32 {
        self.density
    }

    /// Sets the density. Body mass is updated on the next `reset_mass_data`.
    pub fn set_density(&mut self, density: f32) {
        self.density = density.max(0.0);
    }

    /// Friction coefficient
    pub fn friction(&self) -> f32 {
        self.friction
    }

    /// Sets the friction. Existing contacts keep their mixed value until reset.
    pub fn set_friction(&mut self, friction: f32) {
        self.friction = friction;
    }

    /// Restitution coefficient
    pub fn restitution(&self) -> f32 {
        self.restitution
    }

    /// Sets the restitution. Existing contacts keep their mixed value until reset.
    pub fn set_restitution(&mut self, restitution: f32) {
        self.restitution = restitution;
    }

    /// Whether the fixture only detects overlap
    pub fn is_sensor(&self) -> bool {
        self.is_sensor
    }

    /// The contact filtering data
    pub fn filter(&self) -> Filter {
        self.filter
    }

    /// Mass data of the shape at this fixture's density
    pub fn mass_data(&self) -> MassData {
        self.shape.compute_mass(self.density)
    }

    /// Tight bounds computed at the last synchronization, `None` when the
    /// body is inactive
    pub fn aabb(&self) -> Option<Aabb> {
        self.proxy.map(|p| p.aabb)
    }

    /// Tests a world point for containment given the body transform
    pub fn test_point(&self, xf: &Transform, p: Vec2) -> bool {
        self.shape.test_point(xf, p)
    }

    /// Casts a ray against the shape given the body transform
    pub fn ray_cast(&self, input: &RayCastInput, xf: &Transform) -> Option<RayCastOutput> {
        self.shape.ray_cast(input, xf)
    }
}

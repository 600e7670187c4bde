mod manifold;
mod collide_circle;
mod collide_polygon;
mod collide_edge;
mod broad_phase;
mod collision_filter;
mod contact;
pub(crate) mod contact_manager;
pub(crate) mod contact_solver;

pub use self::manifold::{Manifold, ManifoldPoint, ManifoldType, WorldManifold, ContactFeature, FeatureType};
pub use self::broad_phase::{BroadPhase, ProxyId};
pub use self::collision_filter::{Filter, CollisionCategory, ContactFilter, DefaultContactFilter};
pub use self::contact::{Contact, mix_friction, mix_restitution};
pub use self::collide_circle::{collide_circles, collide_polygon_and_circle};
pub use self::collide_polygon::collide_polygons;
pub use self::collide_edge::{collide_edge_and_circle, collide_edge_and_polygon};

pub(crate) use self::contact::ContactFlags;

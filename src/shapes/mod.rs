mod shape;
mod circle;
mod polygon;
mod edge;

pub use self::shape::{Shape, ShapeType, MassData};
pub use self::circle::CircleShape;
pub use self::polygon::PolygonShape;
pub use self::edge::EdgeShape;

mod particle;
mod group;
pub(crate) mod system;
mod contacts;
mod solver;

pub use self::particle::{ParticleBodyContact, ParticleColor, ParticleContact, ParticleDef, ParticleFlags, ParticlePair, ParticleTriad};
pub use self::group::{ParticleGroup, ParticleGroupDef};
pub use self::system::{ParticleSystem, ParticleSystemDef};

pub(crate) use self::system::ParticleWorld;

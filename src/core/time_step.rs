use crate::core::SimulationConfig;
use crate::math::Vec2;

/// Per-step parameters shared by every solver
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeStep {
    /// Time step
    pub dt: f32,

    /// Inverse time step (0 if dt == 0)
    pub inv_dt: f32,

    /// dt * inv_dt of the previous step, used to scale warm-start impulses
    pub dt_ratio: f32,

    pub velocity_iterations: u32,
    pub position_iterations: u32,
    pub particle_iterations: u32,
    pub warm_starting: bool,
}

/// Solver position of a body's center of mass
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub(crate) struct Position {
    pub c: Vec2,
    pub a: f32,
}

/// Solver velocity of a body
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub(crate) struct Velocity {
    pub v: Vec2,
    pub w: f32,
}

/// Island-local state handed to joint solvers
pub(crate) struct SolverData<'a> {
    pub step: TimeStep,
    pub config: &'a SimulationConfig,
    pub positions: &'a mut [Position],
    pub velocities: &'a mut [Velocity],
}

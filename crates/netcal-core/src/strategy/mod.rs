pub mod genetic;
pub mod gravity;
pub mod kernel;
pub mod linear;
mod seeding;

pub use genetic::GeneticStrategy;
pub use gravity::GravityDescent;
pub use kernel::WhiskerDescent;
pub use linear::LinearSearch;

use crate::cancel::{CancelToken, ProgressSink};
use crate::error::NcResult;
use crate::params::{ParameterDescriptor, ParameterSpace};
use crate::population::ParameterSet;

/// Generation-batch strategies driven by the distributed coordinator: the
/// strategy produces whole populations, the coordinator gets them evaluated.
pub trait PopulationStrategy: Send {
    fn label(&self) -> &'static str;

    fn total_generations(&self) -> u32;

    fn initial_population(&mut self, space: &ParameterSpace) -> Vec<ParameterSet>;

    /// Consume the fully evaluated previous generation and breed the next.
    fn next_generation(
        &mut self,
        previous: Vec<ParameterSet>,
        space: &ParameterSpace,
    ) -> Vec<ParameterSet>;
}

/// Callback-driven strategies for a local evaluator: the strategy calls the
/// black-box fitness function itself, one point at a time.
pub trait Exploration: Send {
    fn label(&self) -> &'static str;

    fn explore(
        &mut self,
        space: &ParameterSpace,
        eval: &mut dyn FnMut(&[ParameterDescriptor]) -> NcResult<f32>,
        progress: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> NcResult<ExplorationSummary>;
}

/// Outcome of one exploration run.
#[derive(Debug, Clone)]
pub struct ExplorationSummary {
    pub best_fitness: f32,
    pub best_values: Vec<f32>,
    pub evaluations: usize,
    pub early_stopped: bool,
}

pub mod checkpoint;
pub mod constraints;
pub mod error;
pub mod evaluation;
pub mod evolution;
pub mod individual;
pub mod oracle;
pub mod problem;
pub mod rng;
pub mod selection;
pub mod session;
pub mod strategy;

// Re-export commonly used types for convenience
pub use checkpoint::Checkpoint;
pub use constraints::{Bound, Constraint, ConstraintSpec, PenaltyShaper};
pub use error::{GeneticError, OptionExt, Result, ResultExt};
pub use evaluation::{Evaluation, Evaluator, OracleEvaluator};
pub use evolution::{
    EngineState, EvolutionLauncher, EvolutionLauncherBuilder, EvolutionOptions, EvolutionResult,
    LogLevel, Logbook,
};
pub use individual::Individual;
pub use oracle::{OracleClient, OracleServer, Simulator};
pub use problem::{Objective, ProblemSpec, Variable};
pub use selection::{Nsga2Selection, SelectionStrategy};
pub use strategy::{BoundedBreedStrategy, BreedStrategy};

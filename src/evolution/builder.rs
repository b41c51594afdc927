use crate::{
    error::{GeneticError, Result},
    evaluation::Evaluator,
    problem::ProblemSpec,
    selection::SelectionStrategy,
    strategy::BreedStrategy,
};

use super::{EvolutionLauncher, EvolutionOptions};

/// Fluent construction of an [`EvolutionLauncher`].
///
/// The breed strategy, selection strategy, evaluator and problem are
/// required; the options fall back to their defaults.
#[derive(Debug)]
pub struct EvolutionLauncherBuilder<B, S, E>
where
    B: BreedStrategy,
    S: SelectionStrategy,
    E: Evaluator,
{
    breed_strategy: Option<B>,
    selection_strategy: Option<S>,
    evaluator: Option<E>,
    problem: Option<ProblemSpec>,
    options: Option<EvolutionOptions>,
}

impl<B, S, E> EvolutionLauncherBuilder<B, S, E>
where
    B: BreedStrategy,
    S: SelectionStrategy,
    E: Evaluator,
{
    pub fn new() -> Self {
        Self {
            breed_strategy: None,
            selection_strategy: None,
            evaluator: None,
            problem: None,
            options: None,
        }
    }

    pub fn with_breed_strategy(mut self, breed_strategy: B) -> Self {
        self.breed_strategy = Some(breed_strategy);
        self
    }

    pub fn with_selection_strategy(mut self, selection_strategy: S) -> Self {
        self.selection_strategy = Some(selection_strategy);
        self
    }

    pub fn with_evaluator(mut self, evaluator: E) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    pub fn with_problem(mut self, problem: ProblemSpec) -> Self {
        self.problem = Some(problem);
        self
    }

    pub fn with_options(mut self, options: EvolutionOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn build(self) -> Result<EvolutionLauncher<B, S, E>> {
        let breed_strategy = self.breed_strategy.ok_or_else(|| {
            GeneticError::Configuration("Breeding strategy not specified".to_string())
        })?;

        let selection_strategy = self.selection_strategy.ok_or_else(|| {
            GeneticError::Configuration("Selection strategy not specified".to_string())
        })?;

        let evaluator = self
            .evaluator
            .ok_or_else(|| GeneticError::Configuration("Evaluator not specified".to_string()))?;

        let problem = self
            .problem
            .ok_or_else(|| GeneticError::Configuration("Problem not specified".to_string()))?;

        EvolutionLauncher::new(
            breed_strategy,
            selection_strategy,
            evaluator,
            problem,
            self.options.unwrap_or_default(),
        )
    }
}

impl<B, S, E> Default for EvolutionLauncherBuilder<B, S, E>
where
    B: BreedStrategy,
    S: SelectionStrategy,
    E: Evaluator,
{
    fn default() -> Self {
        Self::new()
    }
}

//! # BreedStrategy
//!
//! The `BreedStrategy` trait defines the interface for strategies responsible for breeding
//! offspring from the current population, the evolution options and the design variables.
pub mod bounded;

use std::fmt::Debug;

use crate::{
    error::Result, evolution::options::EvolutionOptions, individual::Individual,
    problem::Variable, rng::RandomNumberGenerator,
};

/// # BreedStrategy
///
/// The `BreedStrategy` trait defines the interface for strategies responsible for breeding
/// offspring from a set of parent individuals.
pub trait BreedStrategy
where
    Self: Debug + Clone + Send + Sync,
{
    /// Breeds `evol_options.get_num_offspring()` new individuals from `parents`.
    ///
    /// ## Parameters
    ///
    /// - `parents`: The current population.
    /// - `evol_options`: Variation probabilities and distribution indices.
    /// - `variables`: Bounds of every gene; offspring genes must stay inside them.
    /// - `rng`: The run's random number generator.
    ///
    /// ## Returns
    ///
    /// A Result containing the offspring. Offspring whose genes changed carry no
    /// fitness; unchanged copies may keep theirs.
    ///
    /// ## Errors
    ///
    /// This method can fail if:
    /// - The parents slice is empty
    /// - Crossover is requested with fewer than two parents
    fn breed(
        &self,
        parents: &[Individual],
        evol_options: &EvolutionOptions,
        variables: &[Variable],
        rng: &mut RandomNumberGenerator,
    ) -> Result<Vec<Individual>>;
}

pub use bounded::{polynomial_mutation, sbx_crossover, BoundedBreedStrategy};

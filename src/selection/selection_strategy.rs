use std::fmt::Debug;

use crate::error::Result;
use crate::individual::Individual;

/// Trait for survivor selection in multi-objective evolution.
///
/// A selection strategy reduces a pool of evaluated individuals (parents plus
/// offspring) to the next population. The returned individuals are ordered
/// best first according to the strategy.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
/// use simloop::evaluation::Evaluation;
/// use simloop::individual::Individual;
/// use simloop::problem::Variable;
/// use simloop::selection::{Nsga2Selection, SelectionStrategy};
/// use simloop::error::Result;
///
/// fn main() -> Result<()> {
///     let variables = vec![Variable::new("x", 0.0, 1.0)];
///     let pool = [[1.0, 4.0], [2.0, 3.0], [0.5, 0.5]]
///         .iter()
///         .map(|f| {
///             let mut ind = Individual::new(vec![0.5], &variables)?;
///             ind.apply(Evaluation::new(f.to_vec(), BTreeMap::new()));
///             Ok(ind)
///         })
///         .collect::<Result<Vec<_>>>()?;
///
///     // Both objectives maximized: the last individual is dominated.
///     let selected = Nsga2Selection::default().select(pool, 2, &[1.0, 1.0])?;
///
///     assert_eq!(selected.len(), 2);
///     assert!(selected.iter().all(|ind| ind.fitness() != Some(&[0.5, 0.5][..])));
///     Ok(())
/// }
/// ```
pub trait SelectionStrategy: Debug + Send + Sync {
    /// Selects `num_to_select` individuals from `pool`.
    ///
    /// # Arguments
    ///
    /// * `pool` - Evaluated candidates. Consumed by the selection.
    /// * `num_to_select` - The number of survivors.
    /// * `weights` - Signed objective weights; `fitness * weight` is maximized.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The pool is empty while survivors are requested
    /// - More survivors are requested than the pool holds
    /// - An individual has no fitness or a fitness of the wrong length
    fn select(
        &self,
        pool: Vec<Individual>,
        num_to_select: usize,
        weights: &[f64],
    ) -> Result<Vec<Individual>>;
}

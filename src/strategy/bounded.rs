//! # BoundedBreedStrategy
//!
//! Variation for real-valued genes with box bounds. Each offspring is produced
//! by exactly one of three operations, chosen by a single uniform draw `u`:
//!
//! - `u < cx_prob`: simulated binary crossover of two distinct random parents;
//!   the first child is kept.
//! - `u < cx_prob + mut_prob`: polynomial mutation of one random parent.
//! - otherwise: an unchanged copy of one random parent, fitness included.
//!
//! Both operators clamp every gene they write, so offspring never leave the
//! variable bounds.
//!
//! ```rust
//! use simloop::evolution::options::EvolutionOptions;
//! use simloop::individual::Individual;
//! use simloop::problem::Variable;
//! use simloop::rng::RandomNumberGenerator;
//! use simloop::strategy::{BoundedBreedStrategy, BreedStrategy};
//!
//! let variables = vec![Variable::new("w", 0.0, 1.0), Variable::new("l", -2.0, 2.0)];
//! let mut rng = RandomNumberGenerator::from_seed(3);
//! let parents: Vec<Individual> = (0..4)
//!     .map(|_| Individual::random(&variables, &mut rng))
//!     .collect();
//!
//! let options = EvolutionOptions::builder().num_offspring(10).build();
//! let offspring = BoundedBreedStrategy::default()
//!     .breed(&parents, &options, &variables, &mut rng)
//!     .unwrap();
//!
//! assert_eq!(offspring.len(), 10);
//! assert!(offspring.iter().all(|ind| ind.check_bounds(&variables).is_ok()));
//! ```

use crate::error::{GeneticError, Result};
use crate::evolution::options::EvolutionOptions;
use crate::individual::Individual;
use crate::problem::Variable;
use crate::rng::RandomNumberGenerator;

use super::BreedStrategy;

/// Genes closer than this are not recombined.
const SBX_MIN_GAP: f64 = 1e-14;

#[derive(Debug, Clone, Default)]
pub struct BoundedBreedStrategy;

impl BreedStrategy for BoundedBreedStrategy {
    fn breed(
        &self,
        parents: &[Individual],
        evol_options: &EvolutionOptions,
        variables: &[Variable],
        rng: &mut RandomNumberGenerator,
    ) -> Result<Vec<Individual>> {
        if parents.is_empty() {
            return Err(GeneticError::EmptyPopulation);
        }
        let cx_prob = evol_options.get_cx_prob();
        let mut_prob = evol_options.get_mut_prob();
        if cx_prob > 0.0 && parents.len() < 2 {
            return Err(GeneticError::Configuration(
                "Crossover needs at least two parents".to_string(),
            ));
        }

        let mut offspring = Vec::with_capacity(evol_options.get_num_offspring());
        for _ in 0..evol_options.get_num_offspring() {
            let u = rng.probability();
            let child = if u < cx_prob {
                let (i, j) = rng.distinct_pair(parents.len());
                let mut first = parents[i].clone();
                let mut second = parents[j].clone();
                sbx_crossover(
                    first.genes_mut(),
                    second.genes_mut(),
                    variables,
                    evol_options.get_cx_eta(),
                    rng,
                );
                first.invalidate();
                first
            } else if u < cx_prob + mut_prob {
                let mut mutant = parents[rng.index(parents.len())].clone();
                polynomial_mutation(
                    mutant.genes_mut(),
                    variables,
                    evol_options.get_mut_eta(),
                    evol_options.get_gene_mut_prob(),
                    rng,
                );
                mutant.invalidate();
                mutant
            } else {
                parents[rng.index(parents.len())].clone()
            };
            offspring.push(child);
        }

        Ok(offspring)
    }
}

/// Bounded simulated binary crossover, applied in place to both parents.
///
/// Each gene pair is recombined with probability 0.5. The children spread
/// around the parents with a distribution controlled by `eta` (larger means
/// closer to the parents) and are clamped into the variable bounds.
pub fn sbx_crossover(
    first: &mut [f64],
    second: &mut [f64],
    variables: &[Variable],
    eta: f64,
    rng: &mut RandomNumberGenerator,
) {
    for ((a, b), var) in first.iter_mut().zip(second.iter_mut()).zip(variables) {
        if rng.probability() > 0.5 || (*a - *b).abs() <= SBX_MIN_GAP {
            continue;
        }
        let (x1, x2) = if *a < *b { (*a, *b) } else { (*b, *a) };
        let (xl, xu) = (var.low, var.high);
        let gap = x2 - x1;
        let r = rng.probability();

        let spread = |beta: f64| {
            let alpha = 2.0 - beta.powf(-(eta + 1.0));
            if r <= 1.0 / alpha {
                (r * alpha).powf(1.0 / (eta + 1.0))
            } else {
                (1.0 / (2.0 - r * alpha)).powf(1.0 / (eta + 1.0))
            }
        };

        let beta_q = spread(1.0 + 2.0 * (x1 - xl) / gap);
        let c1 = var.clamp(0.5 * (x1 + x2 - beta_q * gap));

        let beta_q = spread(1.0 + 2.0 * (xu - x2) / gap);
        let c2 = var.clamp(0.5 * (x1 + x2 + beta_q * gap));

        if rng.probability() <= 0.5 {
            *a = c2;
            *b = c1;
        } else {
            *a = c1;
            *b = c2;
        }
    }
}

/// Bounded polynomial mutation, applied in place.
///
/// Each gene mutates with probability `indpb`. Genes of a variable with
/// `low == high` are left alone.
pub fn polynomial_mutation(
    genes: &mut [f64],
    variables: &[Variable],
    eta: f64,
    indpb: f64,
    rng: &mut RandomNumberGenerator,
) {
    let mut_pow = 1.0 / (eta + 1.0);
    for (x, var) in genes.iter_mut().zip(variables) {
        if rng.probability() > indpb {
            continue;
        }
        let width = var.high - var.low;
        if width <= 0.0 {
            continue;
        }
        let delta_1 = (*x - var.low) / width;
        let delta_2 = (var.high - *x) / width;
        let r = rng.probability();

        let delta_q = if r < 0.5 {
            let val = 2.0 * r + (1.0 - 2.0 * r) * (1.0 - delta_1).powf(eta + 1.0);
            val.powf(mut_pow) - 1.0
        } else {
            let val = 2.0 * (1.0 - r) + 2.0 * (r - 0.5) * (1.0 - delta_2).powf(eta + 1.0);
            1.0 - val.powf(mut_pow)
        };

        *x = var.clamp(*x + delta_q * width);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::Evaluation;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn variables() -> Vec<Variable> {
        vec![
            Variable::new("a", 0.0, 1.0),
            Variable::new("b", -10.0, 10.0),
            Variable::new("c", 3.0, 3.0),
        ]
    }

    fn evaluated_parents(rng: &mut RandomNumberGenerator) -> Vec<Individual> {
        (0..6)
            .map(|i| {
                let mut ind = Individual::random(&variables(), rng);
                ind.apply(Evaluation::new(vec![i as f64], BTreeMap::new()));
                ind
            })
            .collect()
    }

    #[test]
    fn test_reproduction_only_keeps_fitness() {
        let mut rng = RandomNumberGenerator::from_seed(11);
        let parents = evaluated_parents(&mut rng);
        let options = EvolutionOptions::builder()
            .cx_prob(0.0)
            .mut_prob(0.0)
            .num_offspring(12)
            .build();

        let offspring = BoundedBreedStrategy
            .breed(&parents, &options, &variables(), &mut rng)
            .unwrap();
        assert_eq!(offspring.len(), 12);
        assert!(offspring.iter().all(|o| o.is_evaluated()));
        assert!(offspring.iter().all(|o| parents.contains(o)));
    }

    #[test]
    fn test_crossover_only_invalidates_fitness() {
        let mut rng = RandomNumberGenerator::from_seed(12);
        let parents = evaluated_parents(&mut rng);
        let options = EvolutionOptions::builder()
            .cx_prob(1.0)
            .mut_prob(0.0)
            .num_offspring(8)
            .build();

        let offspring = BoundedBreedStrategy
            .breed(&parents, &options, &variables(), &mut rng)
            .unwrap();
        assert!(offspring.iter().all(|o| !o.is_evaluated()));
    }

    #[test]
    fn test_crossover_with_single_parent_fails() {
        let mut rng = RandomNumberGenerator::from_seed(13);
        let parents = vec![Individual::random(&variables(), &mut rng)];
        let options = EvolutionOptions::default();
        assert!(matches!(
            BoundedBreedStrategy.breed(&parents, &options, &variables(), &mut rng),
            Err(GeneticError::Configuration(_))
        ));
    }

    #[test]
    fn test_empty_parents_fail() {
        let mut rng = RandomNumberGenerator::from_seed(14);
        assert!(matches!(
            BoundedBreedStrategy.breed(&[], &EvolutionOptions::default(), &variables(), &mut rng),
            Err(GeneticError::EmptyPopulation)
        ));
    }

    #[test]
    fn test_mutation_moves_genes() {
        let mut rng = RandomNumberGenerator::from_seed(15);
        let vars = [Variable::new("x", 0.0, 1.0)];
        let moved = (0..100)
            .filter(|_| {
                let mut genes = [0.5];
                polynomial_mutation(&mut genes, &vars, 20.0, 1.0, &mut rng);
                genes[0] != 0.5
            })
            .count();
        assert!(moved > 90);
    }

    #[test]
    fn test_sbx_children_stay_near_parents_with_high_eta() {
        let mut rng = RandomNumberGenerator::from_seed(16);
        let vars = [Variable::new("x", -100.0, 100.0)];
        for _ in 0..100 {
            let mut a = [1.0];
            let mut b = [2.0];
            sbx_crossover(&mut a, &mut b, &vars, 200.0, &mut rng);
            assert!((a[0] - 1.5).abs() < 5.0);
            assert!((b[0] - 1.5).abs() < 5.0);
        }
    }

    proptest! {
        #[test]
        fn prop_offspring_stay_in_bounds(
            seed in any::<u64>(),
            cx_eta in 0.0f64..100.0,
            mut_eta in 0.0f64..100.0,
        ) {
            let mut rng = RandomNumberGenerator::from_seed(seed);
            let parents = evaluated_parents(&mut rng);
            let options = EvolutionOptions::builder()
                .cx_prob(0.5)
                .mut_prob(0.5)
                .gene_mut_prob(1.0)
                .cx_eta(cx_eta)
                .mut_eta(mut_eta)
                .num_offspring(20)
                .build();

            let offspring = BoundedBreedStrategy
                .breed(&parents, &options, &variables(), &mut rng)
                .unwrap();
            for child in &offspring {
                prop_assert!(child.check_bounds(&variables()).is_ok());
            }
        }

        #[test]
        fn prop_operators_clamp_boundary_genes(
            seed in any::<u64>(),
            x in prop::sample::select(vec![0.0f64, 1.0]),
        ) {
            let mut rng = RandomNumberGenerator::from_seed(seed);
            let vars = [Variable::new("x", 0.0, 1.0)];
            let mut genes = [x];
            polynomial_mutation(&mut genes, &vars, 5.0, 1.0, &mut rng);
            prop_assert!(vars[0].contains(genes[0]));

            let mut a = [x];
            let mut b = [1.0 - x];
            sbx_crossover(&mut a, &mut b, &vars, 1.0, &mut rng);
            prop_assert!(vars[0].contains(a[0]) && vars[0].contains(b[0]));
        }
    }
}

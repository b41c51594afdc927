//! # Individual
//!
//! An `Individual` is one candidate design: a gene per design variable, plus
//! the fitness vector and raw measurement record the oracle produced for it.
//!
//! Genes stay inside their variable's bounds at all times. The constructors
//! and the variation operators in [`crate::strategy`] clamp every value they
//! write, and [`Individual::check_bounds`] verifies the invariant.
//!
//! ```rust
//! use simloop::individual::Individual;
//! use simloop::problem::Variable;
//! use simloop::rng::RandomNumberGenerator;
//!
//! let variables = vec![Variable::new("w", 1.0, 2.0), Variable::new("l", -1.0, 1.0)];
//! let mut rng = RandomNumberGenerator::from_seed(1);
//!
//! let ind = Individual::random(&variables, &mut rng);
//! assert!(!ind.is_evaluated());
//! assert!(ind.check_bounds(&variables).is_ok());
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{GeneticError, Result};
use crate::evaluation::Evaluation;
use crate::problem::Variable;
use crate::rng::RandomNumberGenerator;

/// One candidate solution with its evaluation state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Individual {
    genes: Vec<f64>,
    fitness: Option<Vec<f64>>,
    #[serde(default)]
    measurements: BTreeMap<String, f64>,
}

impl Individual {
    /// Creates an unevaluated individual, clamping each gene into its variable's bounds.
    ///
    /// # Errors
    ///
    /// `GeneticError::Configuration` if the gene count differs from the variable count.
    pub fn new(genes: Vec<f64>, variables: &[Variable]) -> Result<Self> {
        if genes.len() != variables.len() {
            return Err(GeneticError::Configuration(format!(
                "Individual has {} genes but the problem defines {} variables",
                genes.len(),
                variables.len()
            )));
        }
        let genes = genes
            .into_iter()
            .zip(variables)
            .map(|(g, v)| v.clamp(g))
            .collect();
        Ok(Self {
            genes,
            fitness: None,
            measurements: BTreeMap::new(),
        })
    }

    /// Samples every gene uniformly from its variable's range.
    pub fn random(variables: &[Variable], rng: &mut RandomNumberGenerator) -> Self {
        Self {
            genes: variables.iter().map(|v| rng.uniform(v.low, v.high)).collect(),
            fitness: None,
            measurements: BTreeMap::new(),
        }
    }

    pub fn genes(&self) -> &[f64] {
        &self.genes
    }

    /// Mutable access for the variation operators, which are responsible for
    /// keeping the genes in bounds.
    pub(crate) fn genes_mut(&mut self) -> &mut [f64] {
        &mut self.genes
    }

    pub fn fitness(&self) -> Option<&[f64]> {
        self.fitness.as_deref()
    }

    pub fn measurements(&self) -> &BTreeMap<String, f64> {
        &self.measurements
    }

    pub fn is_evaluated(&self) -> bool {
        self.fitness.is_some()
    }

    /// Stores the result of an oracle evaluation.
    pub fn apply(&mut self, evaluation: Evaluation) {
        self.fitness = Some(evaluation.fitness);
        self.measurements = evaluation.measurements;
    }

    /// Drops fitness and measurements after the genes changed.
    pub(crate) fn invalidate(&mut self) {
        self.fitness = None;
        self.measurements.clear();
    }

    /// The gene values keyed by variable name, as sent to the oracle.
    pub fn to_variable_map(&self, variables: &[Variable]) -> BTreeMap<String, f64> {
        variables
            .iter()
            .zip(&self.genes)
            .map(|(v, &g)| (v.name.clone(), g))
            .collect()
    }

    /// Fitness multiplied by the objective weights, so that larger is better everywhere.
    pub fn weighted_fitness(&self, weights: &[f64]) -> Option<Vec<f64>> {
        self.fitness
            .as_ref()
            .map(|f| f.iter().zip(weights).map(|(v, w)| v * w).collect())
    }

    /// Returns `true` if `self` is at least as good as `other` on every
    /// objective and strictly better on one. Unevaluated individuals never dominate.
    pub fn dominates(&self, other: &Individual, weights: &[f64]) -> bool {
        match (self.weighted_fitness(weights), other.weighted_fitness(weights)) {
            (Some(a), Some(b)) => dominates(&a, &b),
            _ => false,
        }
    }

    /// Verifies that every gene lies inside its variable's bounds.
    pub fn check_bounds(&self, variables: &[Variable]) -> Result<()> {
        for (v, &g) in variables.iter().zip(&self.genes) {
            if !v.contains(g) {
                return Err(GeneticError::OutOfBounds(format!(
                    "gene '{}' = {} outside [{}, {}]",
                    v.name, g, v.low, v.high
                )));
            }
        }
        Ok(())
    }
}

/// Pareto dominance on weighted values (larger is better).
pub fn dominates(a: &[f64], b: &[f64]) -> bool {
    let mut strictly_better = false;
    for (x, y) in a.iter().zip(b) {
        if x < y {
            return false;
        }
        if x > y {
            strictly_better = true;
        }
    }
    strictly_better
}

//! # EvolutionOptions
//!
//! The `EvolutionOptions` struct holds the tunables of a (μ+λ) run: population
//! and offspring sizes, the generation count, variation probabilities and
//! distribution indices, penalty shaping, checkpointing and logging.
//!
//! ## Example
//!
//! ```rust
//! use simloop::evolution::options::{EvolutionOptions, LogLevel};
//!
//! // Create a new EvolutionOptions instance with custom sizes
//! let custom_options = EvolutionOptions::new(200, LogLevel::Verbose, 50, 10);
//! assert!(custom_options.validate().is_ok());
//!
//! // Create a new EvolutionOptions instance with default parameters
//! let default_options = EvolutionOptions::default();
//! assert_eq!(default_options.get_cx_prob(), 0.8);
//! ```
//!
//! ## Fields
//!
//! - `num_generations`: last generation index of the run (`max_gen`).
//! - `population_size`: μ, the number of survivors per generation.
//! - `num_offspring`: λ, the number of offspring produced per generation.
//! - `cx_prob` / `mut_prob`: probabilities of producing an offspring by
//!   crossover or by mutation. The rest are reproductions.
//! - `gene_mut_prob`: per-gene mutation probability; falls back to `mut_prob`.
//! - `cx_eta` / `mut_eta`: distribution indices of SBX and polynomial mutation.
//! - `shaper`: constraint penalty parameters.
//! - `checkpoint_freq` / `checkpoint_path`: save a checkpoint every
//!   `checkpoint_freq` generations when a path is set.
//! - `max_batch_size`: upper limit of designs per oracle request.
//! - `sel_best`: number of best individuals logged per generation at `Verbose`.
//! - `parallel_threshold`: pool size from which domination counting runs in parallel.
//! - `seed`: fixed RNG seed; `None` seeds from entropy.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constraints::PenaltyShaper;
use crate::error::{GeneticError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Verbose,
    Minimal,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionOptions {
    num_generations: usize,
    log_level: LogLevel,
    population_size: usize,
    num_offspring: usize,
    cx_prob: f64,
    mut_prob: f64,
    gene_mut_prob: Option<f64>,
    cx_eta: f64,
    mut_eta: f64,
    shaper: PenaltyShaper,
    checkpoint_freq: usize,
    checkpoint_path: Option<PathBuf>,
    max_batch_size: Option<usize>,
    sel_best: usize,
    /// Minimum pool size for parallel domination counting
    parallel_threshold: usize,
    seed: Option<u64>,
}

impl EvolutionOptions {
    pub fn new(
        num_generations: usize,
        log_level: LogLevel,
        population_size: usize,
        num_offspring: usize,
    ) -> Self {
        Self {
            num_generations,
            log_level,
            population_size,
            num_offspring,
            ..Self::default()
        }
    }

    /// Checks the options before a run.
    ///
    /// # Errors
    ///
    /// `GeneticError::Configuration` if a size is zero, a probability lies
    /// outside `[0, 1]`, `cx_prob + mut_prob > 1`, crossover is enabled with
    /// fewer than two individuals, a distribution index is negative, or the
    /// checkpoint frequency is zero.
    pub fn validate(&self) -> Result<()> {
        if self.population_size == 0 {
            return Err(GeneticError::Configuration(
                "Population size must be at least 1".to_string(),
            ));
        }
        if self.num_offspring == 0 {
            return Err(GeneticError::Configuration(
                "Number of offspring must be at least 1".to_string(),
            ));
        }
        for (name, p) in [
            ("cx_prob", Some(self.cx_prob)),
            ("mut_prob", Some(self.mut_prob)),
            ("gene_mut_prob", self.gene_mut_prob),
        ] {
            if let Some(p) = p {
                if !(0.0..=1.0).contains(&p) {
                    return Err(GeneticError::Configuration(format!(
                        "{} must lie in [0, 1], got {}",
                        name, p
                    )));
                }
            }
        }
        if self.cx_prob + self.mut_prob > 1.0 {
            return Err(GeneticError::Configuration(format!(
                "The sum of cx_prob and mut_prob must not exceed 1, got {}",
                self.cx_prob + self.mut_prob
            )));
        }
        if self.cx_prob > 0.0 && self.population_size < 2 {
            return Err(GeneticError::Configuration(
                "Crossover needs a population of at least 2".to_string(),
            ));
        }
        if !(self.cx_eta >= 0.0 && self.mut_eta >= 0.0) {
            return Err(GeneticError::Configuration(format!(
                "Distribution indices must be non-negative, got cx_eta {} and mut_eta {}",
                self.cx_eta, self.mut_eta
            )));
        }
        if self.checkpoint_freq == 0 {
            return Err(GeneticError::Configuration(
                "Checkpoint frequency must be at least 1".to_string(),
            ));
        }
        if self.max_batch_size == Some(0) {
            return Err(GeneticError::Configuration(
                "Maximum batch size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn get_num_generations(&self) -> usize {
        self.num_generations
    }

    pub fn get_log_level(&self) -> &LogLevel {
        &self.log_level
    }

    pub fn get_population_size(&self) -> usize {
        self.population_size
    }

    pub fn get_num_offspring(&self) -> usize {
        self.num_offspring
    }

    pub fn get_cx_prob(&self) -> f64 {
        self.cx_prob
    }

    pub fn get_mut_prob(&self) -> f64 {
        self.mut_prob
    }

    /// Per-gene mutation probability, `mut_prob` unless set explicitly.
    pub fn get_gene_mut_prob(&self) -> f64 {
        self.gene_mut_prob.unwrap_or(self.mut_prob)
    }

    pub fn get_cx_eta(&self) -> f64 {
        self.cx_eta
    }

    pub fn get_mut_eta(&self) -> f64 {
        self.mut_eta
    }

    pub fn get_shaper(&self) -> &PenaltyShaper {
        &self.shaper
    }

    pub fn get_checkpoint_freq(&self) -> usize {
        self.checkpoint_freq
    }

    pub fn get_checkpoint_path(&self) -> Option<&Path> {
        self.checkpoint_path.as_deref()
    }

    pub fn get_max_batch_size(&self) -> Option<usize> {
        self.max_batch_size
    }

    pub fn get_sel_best(&self) -> usize {
        self.sel_best
    }

    /// Returns the minimum pool size for parallel domination counting.
    pub fn get_parallel_threshold(&self) -> usize {
        self.parallel_threshold
    }

    pub fn get_seed(&self) -> Option<u64> {
        self.seed
    }

    /// Sets the number of generations.
    pub fn set_num_generations(&mut self, num_generations: usize) {
        self.num_generations = num_generations;
    }

    /// Sets the log level.
    pub fn set_log_level(&mut self, log_level: LogLevel) {
        self.log_level = log_level;
    }

    /// Sets the population size.
    pub fn set_population_size(&mut self, population_size: usize) {
        self.population_size = population_size;
    }

    /// Sets the number of offspring.
    pub fn set_num_offspring(&mut self, num_offspring: usize) {
        self.num_offspring = num_offspring;
    }

    pub fn set_checkpoint_path<P: Into<PathBuf>>(&mut self, path: Option<P>) {
        self.checkpoint_path = path.map(Into::into);
    }

    pub fn set_seed(&mut self, seed: Option<u64>) {
        self.seed = seed;
    }

    /// Sets the parallel threshold.
    pub fn set_parallel_threshold(&mut self, threshold: usize) {
        self.parallel_threshold = threshold;
    }

    /// Returns a builder for creating an `EvolutionOptions` instance.
    ///
    /// # Example
    ///
    /// ```rust
    /// use simloop::evolution::options::{EvolutionOptions, LogLevel};
    ///
    /// let options = EvolutionOptions::builder()
    ///     .num_generations(40)
    ///     .log_level(LogLevel::Minimal)
    ///     .population_size(24)
    ///     .num_offspring(48)
    ///     .cx_prob(0.7)
    ///     .mut_prob(0.2)
    ///     .checkpoint_freq(5)
    ///     .build();
    /// assert_eq!(options.get_gene_mut_prob(), 0.2);
    /// ```
    pub fn builder() -> EvolutionOptionsBuilder {
        EvolutionOptionsBuilder::default()
    }
}

impl Default for EvolutionOptions {
    fn default() -> Self {
        Self {
            num_generations: 100,
            log_level: LogLevel::None,
            population_size: 20,
            num_offspring: 20,
            cx_prob: 0.8,
            mut_prob: 0.1,
            gene_mut_prob: None,
            cx_eta: 20.0,
            mut_eta: 20.0,
            shaper: PenaltyShaper::default(),
            checkpoint_freq: 1,
            checkpoint_path: None,
            max_batch_size: None,
            sel_best: 5,
            parallel_threshold: 1000,
            seed: None,
        }
    }
}

/// Builder for `EvolutionOptions`.
///
/// Unset fields keep their default value.
#[derive(Debug, Clone, Default)]
pub struct EvolutionOptionsBuilder {
    options: EvolutionOptions,
}

impl EvolutionOptionsBuilder {
    /// Sets the number of generations.
    pub fn num_generations(mut self, value: usize) -> Self {
        self.options.num_generations = value;
        self
    }

    /// Sets the log level.
    pub fn log_level(mut self, value: LogLevel) -> Self {
        self.options.log_level = value;
        self
    }

    /// Sets the population size (μ).
    pub fn population_size(mut self, value: usize) -> Self {
        self.options.population_size = value;
        self
    }

    /// Sets the number of offspring (λ).
    pub fn num_offspring(mut self, value: usize) -> Self {
        self.options.num_offspring = value;
        self
    }

    pub fn cx_prob(mut self, value: f64) -> Self {
        self.options.cx_prob = value;
        self
    }

    pub fn mut_prob(mut self, value: f64) -> Self {
        self.options.mut_prob = value;
        self
    }

    pub fn gene_mut_prob(mut self, value: f64) -> Self {
        self.options.gene_mut_prob = Some(value);
        self
    }

    pub fn cx_eta(mut self, value: f64) -> Self {
        self.options.cx_eta = value;
        self
    }

    pub fn mut_eta(mut self, value: f64) -> Self {
        self.options.mut_eta = value;
        self
    }

    /// Sets the base penalty per violated constraint and the penalty weight.
    pub fn penalty(mut self, delta: f64, weight: f64) -> Self {
        self.options.shaper = PenaltyShaper::new(delta, weight);
        self
    }

    pub fn checkpoint_freq(mut self, value: usize) -> Self {
        self.options.checkpoint_freq = value;
        self
    }

    pub fn checkpoint_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.checkpoint_path = Some(path.into());
        self
    }

    pub fn max_batch_size(mut self, value: usize) -> Self {
        self.options.max_batch_size = Some(value);
        self
    }

    pub fn sel_best(mut self, value: usize) -> Self {
        self.options.sel_best = value;
        self
    }

    /// Sets the parallel threshold.
    pub fn parallel_threshold(mut self, value: usize) -> Self {
        self.options.parallel_threshold = value;
        self
    }

    pub fn seed(mut self, value: u64) -> Self {
        self.options.seed = Some(value);
        self
    }

    /// Builds the `EvolutionOptions` instance.
    pub fn build(self) -> EvolutionOptions {
        self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(EvolutionOptions::default().validate().is_ok());
    }

    #[test]
    fn test_gene_mut_prob_falls_back_to_mut_prob() {
        let options = EvolutionOptions::builder().mut_prob(0.15).build();
        assert_eq!(options.get_gene_mut_prob(), 0.15);

        let options = EvolutionOptions::builder()
            .mut_prob(0.15)
            .gene_mut_prob(0.5)
            .build();
        assert_eq!(options.get_gene_mut_prob(), 0.5);
    }

    #[test]
    fn test_probability_sum_above_one() {
        let options = EvolutionOptions::builder().cx_prob(0.7).mut_prob(0.4).build();
        assert!(matches!(
            options.validate(),
            Err(GeneticError::Configuration(_))
        ));
    }

    #[test]
    fn test_crossover_needs_two_parents() {
        let options = EvolutionOptions::builder().population_size(1).build();
        assert!(options.validate().is_err());

        let options = EvolutionOptions::builder()
            .population_size(1)
            .cx_prob(0.0)
            .mut_prob(1.0)
            .build();
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_zero_sizes_rejected() {
        assert!(EvolutionOptions::builder()
            .num_offspring(0)
            .build()
            .validate()
            .is_err());
        assert!(EvolutionOptions::builder()
            .checkpoint_freq(0)
            .build()
            .validate()
            .is_err());
        assert!(EvolutionOptions::builder()
            .max_batch_size(0)
            .build()
            .validate()
            .is_err());
    }

    #[test]
    fn test_deserialize_partial() {
        let options: EvolutionOptions =
            serde_json::from_str(r#"{"population_size": 8, "num_generations": 3}"#).unwrap();
        assert_eq!(options.get_population_size(), 8);
        assert_eq!(options.get_num_generations(), 3);
        assert_eq!(options.get_cx_eta(), 20.0);
    }
}

use std::time::Instant;

use tracing::{debug, error, info, warn};

use super::{
    logbook::{GenerationRecord, Logbook},
    options::{EvolutionOptions, LogLevel},
};
use crate::{
    checkpoint::Checkpoint,
    error::{GeneticError, Result},
    evaluation::Evaluator,
    individual::Individual,
    problem::ProblemSpec,
    rng::RandomNumberGenerator,
    selection::{sort_nondominated, SelectionStrategy},
    strategy::BreedStrategy,
};

/// Lifecycle of a launcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Created, nothing evaluated yet.
    Initializing,
    /// Evaluating and ranking the initial population.
    EvaluatingInitial,
    /// Ready to run the contained generation.
    Generational(usize),
    /// Finished or failed; no further steps are possible.
    Terminated,
}

/// Represents the result of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct EvolutionResult {
    /// All Pareto fronts of the final population; front 0 is the non-dominated set.
    pub fronts: Vec<Vec<Individual>>,
    /// The final population in selection order.
    pub population: Vec<Individual>,
    pub logbook: Logbook,
}

impl EvolutionResult {
    /// The final non-dominated set.
    pub fn pareto_front(&self) -> &[Individual] {
        self.fronts.first().map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Runs a (μ+λ) multi-objective evolution against an evaluator.
///
/// The launcher owns the population, the logbook and the random number
/// generator. Each generation breeds λ offspring from the μ parents, evaluates
/// the offspring whose genes changed, and selects the next μ parents from
/// parents and offspring together.
///
/// Any failure inside [`start`](Self::start) or [`step`](Self::step) shuts the
/// evaluator down and terminates the launcher before the error is returned.
#[derive(Debug)]
pub struct EvolutionLauncher<B, S, E>
where
    B: BreedStrategy,
    S: SelectionStrategy,
    E: Evaluator,
{
    breed_strategy: B,
    selection_strategy: S,
    evaluator: E,
    problem: ProblemSpec,
    options: EvolutionOptions,
    rng: RandomNumberGenerator,
    population: Vec<Individual>,
    logbook: Logbook,
    state: EngineState,
    failed: bool,
}

impl<B, S, E> EvolutionLauncher<B, S, E>
where
    B: BreedStrategy,
    S: SelectionStrategy,
    E: Evaluator,
{
    /// Creates a new `EvolutionLauncher`.
    ///
    /// # Errors
    ///
    /// `GeneticError::Configuration` if the problem or the options are invalid.
    pub fn new(
        breed_strategy: B,
        selection_strategy: S,
        evaluator: E,
        problem: ProblemSpec,
        options: EvolutionOptions,
    ) -> Result<Self> {
        problem.validate()?;
        options.validate()?;
        let rng = match options.get_seed() {
            Some(seed) => RandomNumberGenerator::from_seed(seed),
            None => RandomNumberGenerator::new(),
        };
        Ok(Self {
            breed_strategy,
            selection_strategy,
            evaluator,
            problem,
            options,
            rng,
            population: Vec::new(),
            logbook: Logbook::new(),
            state: EngineState::Initializing,
            failed: false,
        })
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn population(&self) -> &[Individual] {
        &self.population
    }

    pub fn logbook(&self) -> &Logbook {
        &self.logbook
    }

    pub fn options(&self) -> &EvolutionOptions {
        &self.options
    }

    pub fn problem(&self) -> &ProblemSpec {
        &self.problem
    }

    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    /// Snapshot of the current run, as written to the checkpoint file.
    ///
    /// Only meaningful once the launcher has started.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint::new(
            self.last_generation(),
            self.population.clone(),
            self.logbook.clone(),
            self.rng.clone(),
        )
    }

    /// Prepares the first generation.
    ///
    /// With a checkpoint the population, logbook and RNG state are restored and
    /// the run continues after the checkpointed generation. Without one a fresh
    /// population is sampled, evaluated, ranked and recorded as generation 0.
    pub fn start(&mut self, checkpoint: Option<Checkpoint>) -> Result<()> {
        if self.state != EngineState::Initializing {
            return Err(GeneticError::Evolution(format!(
                "Cannot start a launcher in state {:?}",
                self.state
            )));
        }
        let outcome = match checkpoint {
            Some(checkpoint) => self.restore(checkpoint),
            None => self.initialize(),
        };
        self.guard(outcome)
    }

    /// Runs one generation. Returns `true` while generations remain.
    pub fn step(&mut self) -> Result<bool> {
        let generation = match self.state {
            EngineState::Generational(generation) => generation,
            other => {
                return Err(GeneticError::Evolution(format!(
                    "Cannot step a launcher in state {:?}",
                    other
                )))
            }
        };
        if generation > self.options.get_num_generations() {
            return Ok(false);
        }

        let outcome = self.run_generation(generation);
        self.guard(outcome)?;

        self.state = EngineState::Generational(generation + 1);
        Ok(generation < self.options.get_num_generations())
    }

    /// Terminates the run, releases the evaluator and returns the final fronts.
    ///
    /// # Errors
    ///
    /// `GeneticError::Evolution` if the run never started or an earlier
    /// `start` or `step` failed.
    pub fn finish(&mut self) -> Result<EvolutionResult> {
        if self.failed {
            return Err(GeneticError::Evolution(
                "Cannot finish a launcher whose run failed".to_string(),
            ));
        }
        if matches!(
            self.state,
            EngineState::Initializing | EngineState::EvaluatingInitial
        ) {
            return Err(GeneticError::Evolution(
                "Cannot finish a launcher that never started".to_string(),
            ));
        }
        self.shutdown_evaluator();

        let fronts = sort_nondominated(
            self.population.clone(),
            &self.problem.weights(),
            self.options.get_parallel_threshold(),
        )?;
        info!(
            generations = self.last_generation(),
            evaluations = self.logbook.total_evaluations(),
            pareto_front = fronts.first().map_or(0, Vec::len),
            "evolution finished"
        );

        Ok(EvolutionResult {
            fronts,
            population: self.population.clone(),
            logbook: self.logbook.clone(),
        })
    }

    /// Starts, steps through every generation and finishes.
    pub fn run(&mut self, checkpoint: Option<Checkpoint>) -> Result<EvolutionResult> {
        self.start(checkpoint)?;
        while self.step()? {}
        self.finish()
    }

    fn restore(&mut self, checkpoint: Checkpoint) -> Result<()> {
        if checkpoint.population.len() != self.options.get_population_size() {
            return Err(GeneticError::Checkpoint(format!(
                "Checkpoint holds {} individuals, the run expects {}",
                checkpoint.population.len(),
                self.options.get_population_size()
            )));
        }
        let variables = self.problem.variables();
        for ind in &checkpoint.population {
            if ind.genes().len() != variables.len() {
                return Err(GeneticError::Checkpoint(format!(
                    "Checkpointed individual has {} genes, the problem defines {} variables",
                    ind.genes().len(),
                    variables.len()
                )));
            }
            ind.check_bounds(variables)?;
        }

        info!(generation = checkpoint.generation, "resuming from checkpoint");
        self.population = checkpoint.population;
        self.logbook = checkpoint.logbook;
        self.rng = checkpoint.rng;
        self.state = EngineState::Generational(checkpoint.generation + 1);
        Ok(())
    }

    fn initialize(&mut self) -> Result<()> {
        let started = Instant::now();
        self.state = EngineState::EvaluatingInitial;

        let variables = self.problem.variables();
        let mut population: Vec<Individual> = (0..self.options.get_population_size())
            .map(|_| Individual::random(variables, &mut self.rng))
            .collect();

        let evaluations = self.evaluate_invalid(&mut population)?;
        let population_size = population.len();
        self.population = self.selection_strategy.select(
            population,
            population_size,
            &self.problem.weights(),
        )?;

        self.record(0, evaluations, started)?;
        self.state = EngineState::Generational(1);
        Ok(())
    }

    fn run_generation(&mut self, generation: usize) -> Result<()> {
        let started = Instant::now();

        let mut offspring = self.breed_strategy.breed(
            &self.population,
            &self.options,
            self.problem.variables(),
            &mut self.rng,
        )?;
        let evaluations = self.evaluate_invalid(&mut offspring)?;

        let mut pool = std::mem::take(&mut self.population);
        pool.append(&mut offspring);
        self.population = self.selection_strategy.select(
            pool,
            self.options.get_population_size(),
            &self.problem.weights(),
        )?;

        self.record(generation, evaluations, started)
    }

    /// Evaluates every individual without fitness, in batches the evaluator accepts.
    fn evaluate_invalid(&mut self, individuals: &mut [Individual]) -> Result<usize> {
        let invalid: Vec<usize> = (0..individuals.len())
            .filter(|&i| !individuals[i].is_evaluated())
            .collect();
        if invalid.is_empty() {
            return Ok(0);
        }

        let batch_size = match (
            self.evaluator.max_batch_size(),
            self.options.get_max_batch_size(),
        ) {
            (Some(a), Some(b)) => a.min(b),
            (Some(a), None) | (None, Some(a)) => a,
            (None, None) => invalid.len(),
        }
        .max(1);
        let num_objectives = self.problem.objectives().len();

        for chunk in invalid.chunks(batch_size) {
            let batch: Vec<Individual> = chunk.iter().map(|&i| individuals[i].clone()).collect();
            let evaluations = self.evaluator.evaluate(&batch)?;
            if evaluations.len() != batch.len() {
                return Err(GeneticError::Evolution(format!(
                    "Evaluator returned {} evaluations for {} individuals",
                    evaluations.len(),
                    batch.len()
                )));
            }
            for (&i, evaluation) in chunk.iter().zip(evaluations) {
                if evaluation.fitness.len() != num_objectives {
                    return Err(GeneticError::FitnessCalculation(format!(
                        "Evaluation has {} fitness values for {} objectives",
                        evaluation.fitness.len(),
                        num_objectives
                    )));
                }
                individuals[i].apply(evaluation);
            }
        }
        Ok(invalid.len())
    }

    fn record(&mut self, generation: usize, evaluations: usize, started: Instant) -> Result<()> {
        let weights = self.problem.weights();
        let front_size = sort_nondominated(
            self.population.clone(),
            &weights,
            self.options.get_parallel_threshold(),
        )?
        .first()
        .map_or(0, Vec::len);

        let record = GenerationRecord::compute(
            generation,
            evaluations,
            &self.population,
            weights.len(),
            front_size,
        );
        self.logbook.record(record)?;
        self.log_generation(generation, evaluations, started);

        let freq = self.options.get_checkpoint_freq();
        if let Some(path) = self.options.get_checkpoint_path() {
            if generation % freq == 0 {
                Checkpoint::new(
                    generation,
                    self.population.clone(),
                    self.logbook.clone(),
                    self.rng.clone(),
                )
                .save(path)?;
            }
        }
        Ok(())
    }

    fn log_generation(&self, generation: usize, evaluations: usize, started: Instant) {
        let elapsed = started.elapsed().as_secs_f64();
        let per_individual = if evaluations > 0 {
            elapsed / evaluations as f64
        } else {
            0.0
        };

        match self.options.get_log_level() {
            LogLevel::None => debug!(generation, evaluations, elapsed, "generation done"),
            LogLevel::Minimal | LogLevel::Verbose => info!(
                generation,
                evaluations,
                elapsed,
                per_individual,
                "generation done"
            ),
        }

        let best = self.population.iter().take(self.options.get_sel_best());
        for (rank, ind) in best.enumerate() {
            let genes = ind.to_variable_map(self.problem.variables());
            match self.options.get_log_level() {
                LogLevel::Verbose => info!(generation, rank, ?genes, fitness = ?ind.fitness(), "best"),
                LogLevel::None => debug!(generation, rank, ?genes, fitness = ?ind.fitness(), "best"),
                LogLevel::Minimal => {}
            }
        }
    }

    fn last_generation(&self) -> usize {
        match self.state {
            EngineState::Generational(next) => next.saturating_sub(1),
            _ => self.logbook.last().map_or(0, |r| r.generation),
        }
    }

    fn guard<T>(&mut self, outcome: Result<T>) -> Result<T> {
        if let Err(e) = &outcome {
            error!(error = %e, state = ?self.state, "evolution failed");
            self.failed = true;
            self.shutdown_evaluator();
        }
        outcome
    }

    fn shutdown_evaluator(&mut self) {
        self.state = EngineState::Terminated;
        if let Err(e) = self.evaluator.shutdown() {
            warn!(error = %e, "evaluator shutdown failed");
        }
    }
}

//! # Evaluation
//!
//! An `Evaluator` turns a batch of individuals into fitness vectors. The
//! engine owns the population and applies the returned [`Evaluation`]s itself;
//! evaluators only ever see the designs.
//!
//! [`OracleEvaluator`] is the production implementation: it sends the whole
//! batch to the oracle as one `updateAndRun` request and shapes the returned
//! measurements with the problem's constraints.

use std::collections::BTreeMap;

use tracing::debug;

use crate::constraints::PenaltyShaper;
use crate::error::{GeneticError, Result};
use crate::individual::Individual;
use crate::oracle::client::OracleClient;
use crate::oracle::message::{Request, Response};
use crate::problem::ProblemSpec;

/// Result of evaluating one individual.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub fitness: Vec<f64>,
    pub measurements: BTreeMap<String, f64>,
}

impl Evaluation {
    pub fn new(fitness: Vec<f64>, measurements: BTreeMap<String, f64>) -> Self {
        Self {
            fitness,
            measurements,
        }
    }
}

/// Computes fitness for batches of individuals.
pub trait Evaluator {
    /// Evaluates `batch` and returns one `Evaluation` per individual, in order.
    fn evaluate(&mut self, batch: &[Individual]) -> Result<Vec<Evaluation>>;

    /// Largest batch the evaluator accepts in one call, if limited.
    fn max_batch_size(&self) -> Option<usize> {
        None
    }

    /// Releases external resources. Called once when the run ends, also on failure.
    fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Evaluates individuals by asking the oracle to simulate them.
#[derive(Debug)]
pub struct OracleEvaluator {
    client: OracleClient,
    problem: ProblemSpec,
    shaper: PenaltyShaper,
    max_batch_size: Option<usize>,
}

impl OracleEvaluator {
    pub fn new(client: OracleClient, problem: ProblemSpec, shaper: PenaltyShaper) -> Self {
        Self {
            client,
            problem,
            shaper,
            max_batch_size: None,
        }
    }

    /// Limits the number of designs sent in one request.
    pub fn with_max_batch_size(mut self, max_batch_size: Option<usize>) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }

    pub fn client(&self) -> &OracleClient {
        &self.client
    }

    pub fn problem(&self) -> &ProblemSpec {
        &self.problem
    }
}

impl Evaluator for OracleEvaluator {
    fn evaluate(&mut self, batch: &[Individual]) -> Result<Vec<Evaluation>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let variables = self.problem.variables();
        let designs = batch
            .iter()
            .map(|ind| ind.to_variable_map(variables))
            .collect();

        let records = match self.client.request_expect(&Request::UpdateAndRun(designs))? {
            Response::UpdateAndRun(records) => records,
            Response::Error(msg) => {
                return Err(GeneticError::Protocol(format!(
                    "Oracle failed to simulate the batch: {}",
                    msg
                )))
            }
            other => {
                return Err(GeneticError::Protocol(format!(
                    "Expected an 'updateAndRun' response, got '{}'",
                    other.kind()
                )))
            }
        };

        if records.len() != batch.len() {
            return Err(GeneticError::Protocol(format!(
                "Oracle returned {} results for {} designs",
                records.len(),
                batch.len()
            )));
        }
        debug!(designs = batch.len(), "batch simulated");

        records
            .into_iter()
            .map(|measurements| {
                let fitness = self.shaper.shape(
                    self.problem.objectives(),
                    self.problem.constraints(),
                    &measurements,
                )?;
                Ok(Evaluation::new(fitness, measurements))
            })
            .collect()
    }

    fn max_batch_size(&self) -> Option<usize> {
        self.max_batch_size
    }

    fn shutdown(&mut self) -> Result<()> {
        self.client.shutdown()
    }
}

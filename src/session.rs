//! # Session
//!
//! One end-to-end optimization run against a live oracle: connect, load the
//! simulator, check that it knows every design variable, evolve, and end the
//! connection in an orderly way whatever happens.
//!
//! ```no_run
//! use simloop::problem::{Objective, ProblemSpec, Variable};
//! use simloop::session::{run_session, SessionConfig};
//!
//! let problem = ProblemSpec::new(
//!     vec![Variable::new("w", 1e-6, 1e-4)],
//!     vec![Objective::maximize("gain"), Objective::minimize("power")],
//!     Default::default(),
//! ).unwrap();
//!
//! let config = SessionConfig::new("127.0.0.1", 5000, problem);
//! let outcome = run_session(&config);
//! std::process::exit(simloop::session::exit_code(&outcome));
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::checkpoint::Checkpoint;
use crate::error::{GeneticError, Result};
use crate::evaluation::OracleEvaluator;
use crate::evolution::{EvolutionLauncherBuilder, EvolutionOptions, EvolutionResult};
use crate::oracle::client::OracleClient;
use crate::problem::ProblemSpec;
use crate::selection::Nsga2Selection;
use crate::strategy::BoundedBreedStrategy;

/// Everything needed to run one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound on every wait for an oracle response; `None` waits forever.
    #[serde(default)]
    pub read_timeout: Option<Duration>,
    pub problem: ProblemSpec,
    #[serde(default)]
    pub options: EvolutionOptions,
    /// Checkpoint to resume from instead of sampling a fresh population.
    #[serde(default)]
    pub resume_from: Option<PathBuf>,
}

impl SessionConfig {
    pub fn new<S: Into<String>>(host: S, port: u16, problem: ProblemSpec) -> Self {
        Self {
            host: host.into(),
            port,
            read_timeout: None,
            problem,
            options: EvolutionOptions::default(),
            resume_from: None,
        }
    }

    pub fn with_options(mut self, options: EvolutionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    pub fn with_resume_from<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.resume_from = Some(path.into());
        self
    }
}

/// Runs a full optimization against the oracle described by `config`.
///
/// The configuration and the resume checkpoint are checked before connecting.
/// Once connected, every failure first sends the exit request and closes the
/// connection, then returns the original error.
pub fn run_session(config: &SessionConfig) -> Result<EvolutionResult> {
    config.problem.validate()?;
    config.options.validate()?;
    let checkpoint = config
        .resume_from
        .as_ref()
        .map(Checkpoint::load)
        .transpose()?;

    let mut client = OracleClient::connect(&config.host, config.port, config.read_timeout)?;

    if let Err(e) = check_simulator(&mut client, config) {
        error!(error = %e, "oracle rejected the session");
        if let Err(shutdown) = client.shutdown() {
            warn!(error = %shutdown, "could not end the session cleanly");
        }
        return Err(e);
    }

    let evaluator = OracleEvaluator::new(
        client,
        config.problem.clone(),
        *config.options.get_shaper(),
    )
    .with_max_batch_size(config.options.get_max_batch_size());

    let mut launcher = EvolutionLauncherBuilder::new()
        .with_breed_strategy(BoundedBreedStrategy)
        .with_selection_strategy(Nsga2Selection::new(
            config.options.get_parallel_threshold(),
        ))
        .with_evaluator(evaluator)
        .with_problem(config.problem.clone())
        .with_options(config.options.clone())
        .build()?;

    let result = launcher.run(checkpoint)?;
    info!(
        pareto_front = result.pareto_front().len(),
        generations = result.logbook.len(),
        "session complete"
    );
    Ok(result)
}

/// Loads the simulator and verifies it knows every design variable.
fn check_simulator(client: &mut OracleClient, config: &SessionConfig) -> Result<()> {
    let known = client.load_simulator(config.options.get_population_size())?;
    let missing: Vec<&str> = config
        .problem
        .variable_names()
        .into_iter()
        .filter(|name| !known.contains_key(*name))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(GeneticError::Protocol(format!(
            "Simulator does not know the design variables {:?}",
            missing
        )))
    }
}

/// Process exit code for the outcome of [`run_session`]: 0 on success.
pub fn exit_code<T>(outcome: &Result<T>) -> i32 {
    match outcome {
        Ok(_) => 0,
        Err(e) => e.exit_code(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::{Objective, Variable};

    fn problem() -> ProblemSpec {
        ProblemSpec::new(
            vec![Variable::new("w", 0.0, 1.0)],
            vec![Objective::maximize("gain")],
            Default::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_invalid_options_fail_before_connecting() {
        let options = EvolutionOptions::builder().cx_prob(0.9).mut_prob(0.5).build();
        // Port 9 is never contacted: validation fails first.
        let config = SessionConfig::new("127.0.0.1", 9, problem()).with_options(options);
        let outcome = run_session(&config);
        assert!(matches!(outcome, Err(GeneticError::Configuration(_))));
        assert_eq!(exit_code(&outcome), 4);
    }

    #[test]
    fn test_missing_resume_checkpoint() {
        let config =
            SessionConfig::new("127.0.0.1", 9, problem()).with_resume_from("/nonexistent/cp.json");
        assert!(matches!(
            run_session(&config),
            Err(GeneticError::Checkpoint(_))
        ));
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: SessionConfig = serde_json::from_str(
            r#"{
                "host": "localhost",
                "port": 5000,
                "problem": {
                    "variables": [{"name": "w", "low": 0.0, "high": 1.0}],
                    "objectives": [{"name": "gain", "weight": 1.0}]
                }
            }"#,
        )
        .unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.options, EvolutionOptions::default());
        assert!(config.problem.constraints().is_empty());
    }

    #[test]
    fn test_exit_code_success() {
        assert_eq!(exit_code(&Ok::<(), GeneticError>(())), 0);
    }
}

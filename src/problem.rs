//! # Problem Definition
//!
//! A `ProblemSpec` fixes everything about a run that does not change from one
//! generation to the next: the ordered design variables with their bounds, the
//! ordered objectives with their signed weights, and the constraints used to
//! shape fitness.
//!
//! Order matters: gene `i` of every individual belongs to variable `i`, and
//! fitness component `j` belongs to objective `j`.
//!
//! ```rust
//! use simloop::problem::{Objective, ProblemSpec, Variable};
//!
//! let problem = ProblemSpec::new(
//!     vec![Variable::new("w", 1e-6, 1e-4), Variable::new("l", 1e-7, 1e-6)],
//!     vec![Objective::maximize("gain"), Objective::minimize("power")],
//!     Default::default(),
//! ).unwrap();
//!
//! assert_eq!(problem.variable_names(), vec!["w", "l"]);
//! ```

use serde::{Deserialize, Serialize};

use crate::constraints::ConstraintSpec;
use crate::error::{GeneticError, Result};

/// A bounded continuous design variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub low: f64,
    pub high: f64,
}

impl Variable {
    pub fn new<S: Into<String>>(name: S, low: f64, high: f64) -> Self {
        Self {
            name: name.into(),
            low,
            high,
        }
    }

    /// Returns `true` if `value` lies inside `[low, high]`.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.low && value <= self.high
    }

    /// Clamps `value` into `[low, high]`.
    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.low).min(self.high)
    }
}

/// An objective measured by the oracle.
///
/// A positive weight maximizes the measurement, a negative weight minimizes it.
/// The magnitude scales the objective in dominance comparisons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Objective {
    pub name: String,
    pub weight: f64,
}

impl Objective {
    pub fn new<S: Into<String>>(name: S, weight: f64) -> Self {
        Self {
            name: name.into(),
            weight,
        }
    }

    pub fn maximize<S: Into<String>>(name: S) -> Self {
        Self::new(name, 1.0)
    }

    pub fn minimize<S: Into<String>>(name: S) -> Self {
        Self::new(name, -1.0)
    }

    pub fn is_maximized(&self) -> bool {
        self.weight > 0.0
    }
}

/// Variables, objectives and constraints of one optimization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemSpec {
    variables: Vec<Variable>,
    objectives: Vec<Objective>,
    #[serde(default)]
    constraints: ConstraintSpec,
}

impl ProblemSpec {
    /// Creates a validated problem definition.
    ///
    /// # Errors
    ///
    /// Returns `GeneticError::Configuration` if there are no variables or no
    /// objectives, a name is duplicated, a bound or the width of a range is not
    /// finite, `low > high`, or an objective weight is zero or not finite.
    pub fn new(
        variables: Vec<Variable>,
        objectives: Vec<Objective>,
        constraints: ConstraintSpec,
    ) -> Result<Self> {
        let problem = Self {
            variables,
            objectives,
            constraints,
        };
        problem.validate()?;
        Ok(problem)
    }

    /// Checks the invariants listed in [`ProblemSpec::new`].
    ///
    /// Deserialized specs bypass `new`, so callers loading a spec from a file
    /// should run this before use.
    pub fn validate(&self) -> Result<()> {
        if self.variables.is_empty() {
            return Err(GeneticError::Configuration(
                "At least one design variable is required".to_string(),
            ));
        }
        if self.objectives.is_empty() {
            return Err(GeneticError::Configuration(
                "At least one objective is required".to_string(),
            ));
        }

        for (idx, var) in self.variables.iter().enumerate() {
            if !var.low.is_finite() || !var.high.is_finite() {
                return Err(GeneticError::Configuration(format!(
                    "Variable '{}' has non-finite bounds",
                    var.name
                )));
            }
            if var.low > var.high {
                return Err(GeneticError::Configuration(format!(
                    "Variable '{}' has low bound {} above high bound {}",
                    var.name, var.low, var.high
                )));
            }
            if !(var.high - var.low).is_finite() {
                return Err(GeneticError::Configuration(format!(
                    "Variable '{}' spans a range wider than f64 can represent",
                    var.name
                )));
            }
            if self.variables[..idx].iter().any(|v| v.name == var.name) {
                return Err(GeneticError::Configuration(format!(
                    "Variable '{}' is defined twice",
                    var.name
                )));
            }
        }

        for (idx, obj) in self.objectives.iter().enumerate() {
            if obj.weight == 0.0 || !obj.weight.is_finite() {
                return Err(GeneticError::Configuration(format!(
                    "Objective '{}' needs a non-zero finite weight",
                    obj.name
                )));
            }
            if self.objectives[..idx].iter().any(|o| o.name == obj.name) {
                return Err(GeneticError::Configuration(format!(
                    "Objective '{}' is defined twice",
                    obj.name
                )));
            }
        }

        self.constraints.validate()
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn objectives(&self) -> &[Objective] {
        &self.objectives
    }

    pub fn constraints(&self) -> &ConstraintSpec {
        &self.constraints
    }

    pub fn variable_names(&self) -> Vec<&str> {
        self.variables.iter().map(|v| v.name.as_str()).collect()
    }

    /// Objective weights in fitness order.
    pub fn weights(&self) -> Vec<f64> {
        self.objectives.iter().map(|o| o.weight).collect()
    }
}

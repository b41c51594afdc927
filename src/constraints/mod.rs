//! # Constraints Module
//!
//! Constraints describe the measurement ranges a valid design has to reach
//! (for example "phase margin at least 60 degrees"). They never reject an
//! individual. Instead every violation adds to a scalar penalty, and the
//! penalty is folded into each objective by [`PenaltyShaper`], so that
//! infeasible designs keep competing but always look worse than they measured.
//!
//! ## Bounds
//!
//! A constraint is configured with an optional `min` and an optional `max`:
//!
//! - both present: a two-sided [`Bound::Range`]; `min == max` is an exact target
//! - only `max`: [`Bound::AtMost`]
//! - only `min`: [`Bound::AtLeast`]
//!
//! ## Penalty
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use simloop::constraints::{Constraint, ConstraintSpec};
//!
//! let spec = ConstraintSpec::new(vec![Constraint::range("gain", 40.0, 60.0)]).unwrap();
//! let mut measured = BTreeMap::new();
//! measured.insert("gain".to_string(), 70.0);
//!
//! // normalized value 1.5, half a range above the interval, plus the base penalty
//! let penalty = spec.penalty(&measured, 2.0).unwrap();
//! assert!((penalty - 2.5).abs() < 1e-12);
//! ```

use std::collections::BTreeMap;
use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::error::{GeneticError, OptionExt, Result};
use crate::problem::Objective;

/// Largest magnitude allowed for the exponent of the fitness penalty factor.
pub const MAX_PENALTY_EXPONENT: f64 = 500.0;

/// Represents a violation of a constraint.
#[derive(Debug, Clone)]
pub struct ConstraintViolation {
    /// The name of the constraint that was violated
    constraint_name: String,
    /// A description of the violation
    description: String,
    /// Contribution of this violation to the penalty
    severity: f64,
}

impl ConstraintViolation {
    pub fn new<S: Into<String>, D: Into<String>>(
        constraint_name: S,
        description: D,
        severity: f64,
    ) -> Self {
        Self {
            constraint_name: constraint_name.into(),
            description: description.into(),
            severity,
        }
    }

    pub fn constraint_name(&self) -> &str {
        &self.constraint_name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn severity(&self) -> f64 {
        self.severity
    }
}

impl Display for ConstraintViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} (severity {:.3})",
            self.constraint_name, self.description, self.severity
        )
    }
}

/// The resolved form of a constraint's limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound {
    /// Two-sided interval. `min == max` means an exact target value.
    Range { min: f64, max: f64 },
    /// Upper limit only.
    AtMost(f64),
    /// Lower limit only.
    AtLeast(f64),
}

impl Bound {
    /// Returns the penalty contribution of `value`, or `None` if it satisfies the bound.
    ///
    /// `delta` is the base penalty added to every violation.
    pub fn violation(&self, value: f64, delta: f64) -> Option<f64> {
        match *self {
            Bound::Range { min, max } if min == max => {
                (value != min).then(|| delta + (value - min).abs())
            }
            Bound::Range { min, max } => {
                let norm = (value - min) / (max - min);
                if norm < 0.0 {
                    Some(delta - norm)
                } else if norm > 1.0 {
                    Some(delta + (norm - 1.0))
                } else {
                    None
                }
            }
            Bound::AtMost(limit) => {
                (value > limit).then(|| delta + (value / limit - 1.0).abs())
            }
            Bound::AtLeast(limit) => {
                (value < limit).then(|| delta + (value / limit - 1.0).abs())
            }
        }
    }
}

/// A named limit on one oracle measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub name: String,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl Constraint {
    pub fn range<S: Into<String>>(name: S, min: f64, max: f64) -> Self {
        Self {
            name: name.into(),
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn at_most<S: Into<String>>(name: S, max: f64) -> Self {
        Self {
            name: name.into(),
            min: None,
            max: Some(max),
        }
    }

    pub fn at_least<S: Into<String>>(name: S, min: f64) -> Self {
        Self {
            name: name.into(),
            min: Some(min),
            max: None,
        }
    }

    /// Resolves the configured limits into a [`Bound`].
    ///
    /// # Errors
    ///
    /// `GeneticError::ConstraintSpec` if no limit is given, a limit is not finite,
    /// `min > max`, or a single-sided limit is zero (it would be used as a divisor).
    pub fn bound(&self) -> Result<Bound> {
        let spec_err = |msg: &str| {
            GeneticError::ConstraintSpec(format!("Constraint '{}': {}", self.name, msg))
        };

        if self.min.iter().chain(self.max.iter()).any(|v| !v.is_finite()) {
            return Err(spec_err("limits must be finite"));
        }

        match (self.min, self.max) {
            (Some(min), Some(max)) if min > max => {
                Err(spec_err(&format!("min {} is above max {}", min, max)))
            }
            (Some(min), Some(max)) => Ok(Bound::Range { min, max }),
            (None, Some(max)) if max == 0.0 => Err(spec_err("single-sided limit cannot be zero")),
            (None, Some(max)) => Ok(Bound::AtMost(max)),
            (Some(min), None) if min == 0.0 => Err(spec_err("single-sided limit cannot be zero")),
            (Some(min), None) => Ok(Bound::AtLeast(min)),
            (None, None) => Err(spec_err("at least one of min or max is required")),
        }
    }
}

/// Ordered set of constraints checked against every measurement record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConstraintSpec {
    constraints: Vec<Constraint>,
}

impl ConstraintSpec {
    /// Creates a validated constraint set.
    pub fn new(constraints: Vec<Constraint>) -> Result<Self> {
        let spec = Self { constraints };
        spec.validate()?;
        Ok(spec)
    }

    pub fn validate(&self) -> Result<()> {
        for (idx, constraint) in self.constraints.iter().enumerate() {
            constraint.bound()?;
            if self.constraints[..idx]
                .iter()
                .any(|c| c.name == constraint.name)
            {
                return Err(GeneticError::ConstraintSpec(format!(
                    "Constraint '{}' is defined twice",
                    constraint.name
                )));
            }
        }
        Ok(())
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Lists every violated constraint of a measurement record.
    ///
    /// # Errors
    ///
    /// `GeneticError::Protocol` if the record lacks a constrained measurement,
    /// `GeneticError::ConstraintSpec` if a constraint is malformed.
    pub fn check(
        &self,
        measurements: &BTreeMap<String, f64>,
        delta: f64,
    ) -> Result<Vec<ConstraintViolation>> {
        let mut violations = Vec::new();
        for constraint in &self.constraints {
            let bound = constraint.bound()?;
            let value = *measurements.get(&constraint.name).ok_or_else(|| {
                GeneticError::Protocol(format!(
                    "Measurement '{}' is missing from the simulation results",
                    constraint.name
                ))
            })?;
            if let Some(severity) = bound.violation(value, delta) {
                violations.push(ConstraintViolation::new(
                    &constraint.name,
                    format!("measured {} outside {:?}", value, bound),
                    severity,
                ));
            }
        }
        Ok(violations)
    }

    /// Total penalty of a measurement record: the sum of all violation severities.
    pub fn penalty(&self, measurements: &BTreeMap<String, f64>, delta: f64) -> Result<f64> {
        Ok(self
            .check(measurements, delta)?
            .iter()
            .map(ConstraintViolation::severity)
            .sum())
    }
}

/// Turns raw measurements and a penalty into a fitness vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PenaltyShaper {
    /// Base penalty added to every violated constraint.
    pub penalty_delta: f64,
    /// Scales how fast fitness degrades with the penalty.
    pub penalty_weight: f64,
}

impl Default for PenaltyShaper {
    fn default() -> Self {
        Self {
            penalty_delta: 2.0,
            penalty_weight: 1.0,
        }
    }
}

impl PenaltyShaper {
    pub fn new(penalty_delta: f64, penalty_weight: f64) -> Self {
        Self {
            penalty_delta,
            penalty_weight,
        }
    }

    /// Multiplicative factor applied to a raw objective value.
    ///
    /// The factor always moves the value in the worse direction for the
    /// objective: up for a minimized positive value, down for a maximized one,
    /// and inverted when the raw value is negative.
    pub fn factor(&self, objective: &Objective, penalty: f64, raw: f64) -> f64 {
        let signed = if objective.is_maximized() {
            -penalty
        } else {
            penalty
        };
        let exponent =
            (self.penalty_weight * signed).clamp(-MAX_PENALTY_EXPONENT, MAX_PENALTY_EXPONENT);
        let factor = exponent.exp();
        if raw < 0.0 {
            1.0 / factor
        } else {
            factor
        }
    }

    /// Builds the fitness vector of one measurement record.
    ///
    /// # Errors
    ///
    /// `GeneticError::Protocol` if an objective or constrained measurement is
    /// missing, `GeneticError::FitnessCalculation` if a shaped value is not finite.
    pub fn shape(
        &self,
        objectives: &[Objective],
        constraints: &ConstraintSpec,
        measurements: &BTreeMap<String, f64>,
    ) -> Result<Vec<f64>> {
        let penalty = constraints.penalty(measurements, self.penalty_delta)?;

        objectives
            .iter()
            .map(|objective| {
                let raw = measurements.get(&objective.name).copied().ok_or_else_genetic(|| {
                    GeneticError::Protocol(format!(
                        "Objective '{}' is missing from the simulation results",
                        objective.name
                    ))
                })?;
                let value = raw * self.factor(objective, penalty, raw);
                if !value.is_finite() {
                    return Err(GeneticError::FitnessCalculation(format!(
                        "Non-finite fitness for objective '{}' (raw {}, penalty {})",
                        objective.name, raw, penalty
                    )));
                }
                Ok(value)
            })
            .collect()
    }
}

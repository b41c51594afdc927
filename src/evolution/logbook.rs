//! # Logbook
//!
//! Append-only history of a run: one [`GenerationRecord`] per generation,
//! generation 0 being the evaluated initial population.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{GeneticError, Result};
use crate::individual::Individual;

/// Summary statistics of one quantity over a population.
///
/// `std` is the population standard deviation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std: f64,
}

impl Stats {
    /// Returns `None` for an empty sample.
    pub fn from_values<I: IntoIterator<Item = f64>>(values: I) -> Option<Self> {
        let values: Vec<f64> = values.into_iter().collect();
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Some(Self {
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            mean,
            std: var.sqrt(),
        })
    }
}

/// What happened in one generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub generation: usize,
    /// Number of individuals sent to the oracle in this generation.
    pub evaluations: usize,
    /// Fitness statistics of the surviving population, in objective order.
    pub fitness: Vec<Stats>,
    /// Statistics of every measurement the oracle reported for the survivors.
    pub measurements: BTreeMap<String, Stats>,
    /// Size of the non-dominated front of the survivors.
    pub front_size: usize,
}

impl GenerationRecord {
    pub fn compute(
        generation: usize,
        evaluations: usize,
        population: &[Individual],
        num_objectives: usize,
        front_size: usize,
    ) -> Self {
        let fitness = (0..num_objectives)
            .filter_map(|obj| {
                Stats::from_values(
                    population
                        .iter()
                        .filter_map(|ind| ind.fitness().and_then(|f| f.get(obj).copied())),
                )
            })
            .collect();

        let mut samples: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
        for ind in population {
            for (name, &value) in ind.measurements() {
                samples.entry(name.as_str()).or_default().push(value);
            }
        }
        let measurements = samples
            .into_iter()
            .filter_map(|(name, values)| Some((name.to_string(), Stats::from_values(values)?)))
            .collect();

        Self {
            generation,
            evaluations,
            fitness,
            measurements,
            front_size,
        }
    }
}

/// The records of a run in increasing generation order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Logbook {
    records: Vec<GenerationRecord>,
}

impl Logbook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record.
    ///
    /// # Errors
    ///
    /// `GeneticError::Evolution` if the record's generation does not follow the last one.
    pub fn record(&mut self, record: GenerationRecord) -> Result<()> {
        if let Some(last) = self.records.last() {
            if record.generation <= last.generation {
                return Err(GeneticError::Evolution(format!(
                    "Generation {} recorded after generation {}",
                    record.generation, last.generation
                )));
            }
        }
        self.records.push(record);
        Ok(())
    }

    pub fn records(&self) -> &[GenerationRecord] {
        &self.records
    }

    pub fn last(&self) -> Option<&GenerationRecord> {
        self.records.last()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Total number of oracle evaluations over all recorded generations.
    pub fn total_evaluations(&self) -> usize {
        self.records.iter().map(|r| r.evaluations).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::Evaluation;
    use crate::problem::Variable;

    fn individual(fitness: Vec<f64>, gain: f64) -> Individual {
        let mut ind = Individual::new(vec![0.0], &[Variable::new("x", 0.0, 1.0)]).unwrap();
        let mut measurements = BTreeMap::new();
        measurements.insert("gain".to_string(), gain);
        ind.apply(Evaluation::new(fitness, measurements));
        ind
    }

    #[test]
    fn test_stats() {
        let stats = Stats::from_values(vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 4.0);
        assert_eq!(stats.mean, 2.5);
        assert!((stats.std - 1.25f64.sqrt()).abs() < 1e-12);
        assert!(Stats::from_values(Vec::new()).is_none());
    }

    #[test]
    fn test_record_compute() {
        let population = vec![individual(vec![1.0, -2.0], 10.0), individual(vec![3.0, -4.0], 20.0)];
        let record = GenerationRecord::compute(3, 2, &population, 2, 1);
        assert_eq!(record.fitness.len(), 2);
        assert_eq!(record.fitness[0].mean, 2.0);
        assert_eq!(record.fitness[1].min, -4.0);
        assert_eq!(record.measurements["gain"].max, 20.0);
        assert_eq!(record.front_size, 1);
    }

    #[test]
    fn test_logbook_is_append_only_in_order() {
        let mut logbook = Logbook::new();
        logbook.record(GenerationRecord::compute(0, 4, &[], 1, 0)).unwrap();
        logbook.record(GenerationRecord::compute(1, 3, &[], 1, 0)).unwrap();
        assert!(logbook.record(GenerationRecord::compute(1, 3, &[], 1, 0)).is_err());
        assert_eq!(logbook.len(), 2);
        assert_eq!(logbook.total_evaluations(), 7);
    }
}

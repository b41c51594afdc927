use std::cmp::Ordering;

use rayon::prelude::*;

use crate::error::{GeneticError, Result};
use crate::individual::{dominates, Individual};
use crate::selection::selection_strategy::SelectionStrategy;

/// NSGA-II survivor selection: Pareto rank first, crowding distance second.
///
/// Whole non-dominated fronts are taken while they fit. The front that does
/// not fit is sorted by crowding distance, largest first, and truncated. Ties
/// keep their pool order.
#[derive(Debug, Clone)]
pub struct Nsga2Selection {
    /// Pool size from which domination counting runs on the rayon pool.
    parallel_threshold: usize,
}

impl Nsga2Selection {
    pub fn new(parallel_threshold: usize) -> Self {
        Self { parallel_threshold }
    }

    pub fn parallel_threshold(&self) -> usize {
        self.parallel_threshold
    }
}

impl Default for Nsga2Selection {
    fn default() -> Self {
        Self {
            parallel_threshold: 1000,
        }
    }
}

impl SelectionStrategy for Nsga2Selection {
    fn select(
        &self,
        pool: Vec<Individual>,
        num_to_select: usize,
        weights: &[f64],
    ) -> Result<Vec<Individual>> {
        if num_to_select == 0 {
            return Ok(Vec::new());
        }
        if pool.is_empty() {
            return Err(GeneticError::EmptyPopulation);
        }
        if num_to_select > pool.len() {
            return Err(GeneticError::Evolution(format!(
                "Cannot select {} individuals from a pool of {}",
                num_to_select,
                pool.len()
            )));
        }

        let mut selected = Vec::with_capacity(num_to_select);
        for mut front in sort_nondominated(pool, weights, self.parallel_threshold)? {
            let remaining = num_to_select - selected.len();
            if front.len() <= remaining {
                selected.append(&mut front);
            } else {
                selected.extend(most_spread(front, remaining));
            }
            if selected.len() == num_to_select {
                break;
            }
        }
        Ok(selected)
    }
}

/// Keeps the `count` members of `front` with the largest crowding distance.
fn most_spread(front: Vec<Individual>, count: usize) -> Vec<Individual> {
    let distances = {
        let fitness: Vec<&[f64]> = front.iter().filter_map(Individual::fitness).collect();
        crowding_distances(&fitness)
    };

    let mut order: Vec<usize> = (0..front.len()).collect();
    order.sort_by(|&a, &b| {
        distances[b]
            .partial_cmp(&distances[a])
            .unwrap_or(Ordering::Equal)
    });
    order.truncate(count);

    take_indices(front, &order)
}

/// Splits `pool` into Pareto fronts on weighted fitness; front 0 is non-dominated.
///
/// Every individual ends up in exactly one front, and members of a front keep
/// their relative pool order.
///
/// # Errors
///
/// `GeneticError::Evolution` if an individual is unevaluated or its fitness
/// length differs from the number of weights.
pub fn sort_nondominated(
    pool: Vec<Individual>,
    weights: &[f64],
    parallel_threshold: usize,
) -> Result<Vec<Vec<Individual>>> {
    let weighted = pool
        .iter()
        .map(|ind| match ind.weighted_fitness(weights) {
            Some(w) if w.len() == weights.len() => Ok(w),
            Some(w) => Err(GeneticError::Evolution(format!(
                "Fitness has {} values but {} objectives are defined",
                w.len(),
                weights.len()
            ))),
            None => Err(GeneticError::Evolution(
                "Cannot select among unevaluated individuals".to_string(),
            )),
        })
        .collect::<Result<Vec<_>>>()?;

    let fronts = front_indices(&weighted, parallel_threshold);

    let mut slots: Vec<Option<Individual>> = pool.into_iter().map(Some).collect();
    Ok(fronts
        .into_iter()
        .map(|front| front.into_iter().filter_map(|i| slots[i].take()).collect())
        .collect())
}

/// Fast non-dominated sort on weighted fitness vectors, returning index fronts.
pub fn front_indices(weighted: &[Vec<f64>], parallel_threshold: usize) -> Vec<Vec<usize>> {
    let n = weighted.len();
    let relations = |i: usize| {
        let mut dominated = Vec::new();
        let mut dominated_by = 0usize;
        for j in 0..n {
            if i == j {
                continue;
            }
            if dominates(&weighted[i], &weighted[j]) {
                dominated.push(j);
            } else if dominates(&weighted[j], &weighted[i]) {
                dominated_by += 1;
            }
        }
        (dominated, dominated_by)
    };

    let (dominated, mut counts): (Vec<Vec<usize>>, Vec<usize>) = if n >= parallel_threshold {
        (0..n).into_par_iter().map(relations).unzip()
    } else {
        (0..n).map(relations).unzip()
    };

    let mut fronts = Vec::new();
    let mut current: Vec<usize> = (0..n).filter(|&i| counts[i] == 0).collect();
    while !current.is_empty() {
        let mut next = Vec::new();
        for &i in &current {
            for &j in &dominated[i] {
                counts[j] -= 1;
                if counts[j] == 0 {
                    next.push(j);
                }
            }
        }
        next.sort_unstable();
        fronts.push(current);
        current = next;
    }
    fronts
}

/// Crowding distance of every member of one front.
///
/// For each objective the members are sorted by that objective; the two
/// extremes get an infinite distance and every interior member adds the gap
/// between its neighbours divided by the objective's range times the number of
/// objectives. An objective with zero range adds nothing.
pub fn crowding_distances(fitness: &[&[f64]]) -> Vec<f64> {
    let n = fitness.len();
    let mut distances = vec![0.0; n];
    if n == 0 {
        return distances;
    }
    let n_obj = fitness[0].len();

    for obj in 0..n_obj {
        let mut sorted: Vec<usize> = (0..n).collect();
        sorted.sort_by(|&a, &b| {
            fitness[a][obj]
                .partial_cmp(&fitness[b][obj])
                .unwrap_or(Ordering::Equal)
        });

        let first = sorted[0];
        let last = sorted[n - 1];
        distances[first] = f64::INFINITY;
        distances[last] = f64::INFINITY;

        let range = fitness[last][obj] - fitness[first][obj];
        if range == 0.0 {
            continue;
        }
        let norm = range * n_obj as f64;
        for w in sorted.windows(3) {
            distances[w[1]] += (fitness[w[2]][obj] - fitness[w[0]][obj]) / norm;
        }
    }
    distances
}

fn take_indices(items: Vec<Individual>, order: &[usize]) -> Vec<Individual> {
    let mut slots: Vec<Option<Individual>> = items.into_iter().map(Some).collect();
    order.iter().filter_map(|&i| slots[i].take()).collect()
}

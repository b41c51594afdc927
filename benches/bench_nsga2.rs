use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use simloop::{
    evaluation::Evaluation,
    evolution::EvolutionOptions,
    individual::Individual,
    problem::Variable,
    rng::RandomNumberGenerator,
    selection::{Nsga2Selection, SelectionStrategy},
    strategy::{BoundedBreedStrategy, BreedStrategy},
};
use std::collections::BTreeMap;

fn variables() -> Vec<Variable> {
    (0..8)
        .map(|i| Variable::new(format!("x{}", i), 0.0, 1.0))
        .collect()
}

// Random population scored on a noisy two-objective trade-off
fn population(size: usize, rng: &mut RandomNumberGenerator) -> Vec<Individual> {
    let variables = variables();
    (0..size)
        .map(|_| {
            let mut ind = Individual::random(&variables, rng);
            let f1 = ind.genes()[0];
            let f2 = 1.0 - f1.sqrt() + ind.genes()[1..].iter().sum::<f64>() / 7.0;
            ind.apply(Evaluation::new(vec![f1, f2], BTreeMap::new()));
            ind
        })
        .collect()
}

fn bench_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("nsga2_selection");
    let mut rng = RandomNumberGenerator::from_seed(1);
    let weights = [-1.0, -1.0];

    for size in [100, 1000, 4000].iter() {
        let pool = population(*size, &mut rng);

        group.bench_with_input(BenchmarkId::new("sequential", size), &pool, |b, pool| {
            let selection = Nsga2Selection::new(usize::MAX);
            b.iter(|| selection.select(black_box(pool.clone()), size / 2, &weights))
        });

        group.bench_with_input(BenchmarkId::new("parallel", size), &pool, |b, pool| {
            let selection = Nsga2Selection::new(0);
            b.iter(|| selection.select(black_box(pool.clone()), size / 2, &weights))
        });
    }

    group.finish();
}

fn bench_variation(c: &mut Criterion) {
    let mut group = c.benchmark_group("variation");
    let mut rng = RandomNumberGenerator::from_seed(2);
    let variables = variables();

    for size in [10, 100, 1000].iter() {
        let parents = population(*size, &mut rng);
        let options = EvolutionOptions::builder()
            .population_size(*size)
            .num_offspring(*size * 2)
            .build();

        group.bench_with_input(BenchmarkId::new("bounded", size), &parents, |b, parents| {
            b.iter(|| {
                BoundedBreedStrategy.breed(black_box(parents), &options, &variables, &mut rng)
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_selection, bench_variation);
criterion_main!(benches);

use serde_json::{json, Value};
use simloop::{
    checkpoint::{Checkpoint, CHECKPOINT_VERSION},
    evolution::{EvolutionOptions, EvolutionResult},
    oracle::{OracleServer, Record, SimResult, Simulator},
    problem::{Objective, ProblemSpec, Variable},
    session::{run_session, SessionConfig},
};
use std::{collections::BTreeMap, net::TcpListener, path::Path, thread};

/// ZDT1 on two variables, both objectives minimized.
struct Zdt1;

impl Simulator for Zdt1 {
    fn load(&mut self, _population_size: usize) -> SimResult<BTreeMap<String, Value>> {
        let mut vars = BTreeMap::new();
        vars.insert("x1".to_string(), json!([0.0, 1.0]));
        vars.insert("x2".to_string(), json!([0.0, 1.0]));
        Ok(vars)
    }

    fn run(&mut self, batch: &[Record]) -> SimResult<Vec<Record>> {
        Ok(batch
            .iter()
            .map(|design| {
                let f1 = design["x1"];
                let g = 1.0 + 9.0 * design["x2"];
                let mut out = Record::new();
                out.insert("f1".to_string(), f1);
                out.insert("f2".to_string(), g * (1.0 - (f1 / g).sqrt()));
                out
            })
            .collect())
    }
}

fn run(options: EvolutionOptions, resume_from: Option<&Path>) -> EvolutionResult {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let oracle = thread::spawn(move || OracleServer::new(Zdt1).accept_once(&listener));

    let problem = ProblemSpec::new(
        vec![Variable::new("x1", 0.0, 1.0), Variable::new("x2", 0.0, 1.0)],
        vec![Objective::minimize("f1"), Objective::minimize("f2")],
        Default::default(),
    )
    .unwrap();
    let mut config = SessionConfig::new("127.0.0.1", port, problem).with_options(options);
    if let Some(path) = resume_from {
        config = config.with_resume_from(path);
    }

    let result = run_session(&config).unwrap();
    oracle.join().unwrap().unwrap();
    result
}

fn options(generations: usize) -> EvolutionOptions {
    EvolutionOptions::builder()
        .population_size(8)
        .num_offspring(8)
        .num_generations(generations)
        .seed(2024)
        .build()
}

#[test]
fn test_checkpoint_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.json");

    let mut opts = options(3);
    opts.set_checkpoint_path(Some(&path));
    let result = run(opts, None);

    let checkpoint = Checkpoint::load(&path).unwrap();
    assert_eq!(checkpoint.version, CHECKPOINT_VERSION);
    assert_eq!(checkpoint.generation, 3);
    assert_eq!(checkpoint.population, result.population);
    assert_eq!(checkpoint.logbook, result.logbook);

    let text = std::fs::read_to_string(&path).unwrap();
    let value: Value = serde_json::from_str(&text).unwrap();
    for key in ["version", "generation", "population", "logbook", "rng"] {
        assert!(value.get(key).is_some(), "missing {}", key);
    }
}

#[test]
fn test_checkpoint_frequency() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sparse.json");

    let opts = EvolutionOptions::builder()
        .population_size(6)
        .num_offspring(6)
        .num_generations(5)
        .checkpoint_freq(2)
        .checkpoint_path(&path)
        .seed(3)
        .build();
    run(opts, None);

    // Generations 0, 2 and 4 are saved; 5 is not a multiple of 2.
    assert_eq!(Checkpoint::load(&path).unwrap().generation, 4);
}

#[test]
fn test_resumed_run_matches_uninterrupted_run() {
    let uninterrupted = run(options(4), None);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("resume.json");
    let mut first_half = options(2);
    first_half.set_checkpoint_path(Some(&path));
    run(first_half, None);

    let resumed = run(options(4), Some(&path));

    assert_eq!(resumed.population, uninterrupted.population);
    assert_eq!(resumed.logbook.len(), uninterrupted.logbook.len());
    let gens: Vec<usize> = resumed.logbook.records().iter().map(|r| r.generation).collect();
    assert_eq!(gens, vec![0, 1, 2, 3, 4]);
}

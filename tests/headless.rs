use std::fs;

use rstest::rstest;
use tempfile::tempdir;

use flappy_learning::config::{Config, NeatConfig, QLearnConfig, SimConfig};
use flappy_learning::evolution::Evolution;
use flappy_learning::qlearn::QLearner;
use flappy_learning::qtable::QTable;

fn seeded(seed: u64) -> SimConfig {
    SimConfig { seed: Some(seed), ..SimConfig::default() }
}

#[test]
fn config_file_overrides_only_what_it_names() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cfg.json");
    fs::write(
        &path,
        r#"{ "sim": { "seed": 11, "pipe_gap": 180.0 }, "qlearn": { "learning_rate": 0.3 } }"#,
    )
    .unwrap();

    let cfg = Config::from_json_file(&path).unwrap();
    cfg.validate().unwrap();
    assert_eq!(cfg.sim.seed, Some(11));
    assert_eq!(cfg.sim.pipe_gap, 180.0);
    assert_eq!(cfg.sim.gravity, 0.4);
    assert_eq!(cfg.qlearn.learning_rate, 0.3);
    assert_eq!(cfg.neat, NeatConfig::default());
}

#[test]
fn missing_config_file_is_an_error() {
    let dir = tempdir().unwrap();
    assert!(Config::from_json_file(&dir.path().join("absent.json")).is_err());
}

#[test]
fn seeded_training_is_reproducible() {
    let run = || {
        let mut learner = QLearner::new(QTable::new(), seeded(8), QLearnConfig::default());
        let scores: Vec<u32> = learner.run_episodes(5).iter().map(|s| s.score).collect();
        (scores, learner.into_table())
    };
    let (scores_a, table_a) = run();
    let (scores_b, table_b) = run();
    assert_eq!(scores_a, scores_b);
    assert_eq!(table_a, table_b);
}

#[rstest]
#[case("trained.bin")]
#[case("trained.json")]
fn trained_table_survives_a_restart(#[case] name: &str) {
    let dir = tempdir().unwrap();
    let path = dir.path().join(name);

    let mut learner = QLearner::new(QTable::new(), seeded(4), QLearnConfig::default());
    learner.run_episodes(3);
    let trained = learner.into_table();
    assert_ne!(trained, QTable::new());
    trained.save(&path).unwrap();

    let resumed = QLearner::new(QTable::load_or_default(&path), seeded(4), QLearnConfig::default());
    assert_eq!(resumed.table(), &trained);
}

#[test]
fn high_score_never_decreases_across_episodes() {
    let mut learner = QLearner::new(QTable::new(), seeded(21), QLearnConfig::default());
    let mut best = 0;
    for summary in learner.run_episodes(20) {
        assert!(summary.high_score >= best);
        assert!(summary.high_score >= summary.score);
        best = summary.high_score;
    }
}

#[test]
fn evolution_runs_headless_to_completion() {
    let neat = NeatConfig {
        population: 10,
        generations: 3,
        elite: 3,
        max_frames: Some(1_000),
        ..NeatConfig::default()
    };
    let mut evolution = Evolution::new(seeded(5), neat);
    let last = evolution.run(3).unwrap().unwrap();
    assert_eq!(last.generation, 3);
    assert_eq!(evolution.genomes().count(), 10);
    assert!(evolution.champion().is_some());
    assert!(evolution.best_fitness() >= last.best_fitness);
}

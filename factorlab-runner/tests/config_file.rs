//! Config loading from disk.

use std::io::Write;

use factorlab_runner::{ConfigError, EngineConfig, FailurePolicy};

#[test]
fn bdd_scenario_load_full_config_file() {
    // GIVEN a config file with every section spelled out
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[scorer]
fit_timeout_ms = 5000
failure_policy = "exclude"
[scorer.model]
n_estimators = 50
learning_rate = 0.05
num_leaves = 15
min_samples_leaf = 10
max_bins = 63
subsample = 0.8
seed = 7

[optimizer]
init_points = 3
n_iter = 4
seed = 11
kappa = 1.0
acquisition_samples = 500
length_scale = 0.3
noise = 1e-5
max_duration_ms = 1000
[optimizer.bounds]
lambda = [0.0, 0.02]
alpha1 = [0.1, 0.9]
alpha2 = [0.0, 0.5]

[pool]
threads = 3
"#
    )
    .unwrap();

    // WHEN it is loaded
    let config = EngineConfig::load(file.path()).unwrap();

    // THEN every value comes through
    assert_eq!(config.scorer.fit_timeout_ms, Some(5000));
    assert_eq!(config.scorer.failure_policy, FailurePolicy::Exclude);
    assert_eq!(config.scorer.model.max_bins, 63);
    assert_eq!(config.scorer.model.seed, 7);
    assert_eq!(config.optimizer.n_iter, 4);
    assert_eq!(config.optimizer.max_duration_ms, Some(1000));
    assert_eq!(config.optimizer.bounds.alpha1, [0.1, 0.9]);
    assert_eq!(config.pool.threads, 3);
}

#[test]
fn bdd_scenario_missing_file_is_io_error() {
    // GIVEN a path inside an empty directory
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("engine.toml");

    // WHEN it is loaded
    let err = EngineConfig::load(&path).unwrap_err();

    // THEN the error names the path
    assert!(matches!(err, ConfigError::Io { .. }));
    assert!(err.to_string().contains("engine.toml"));
}

#[test]
fn bdd_scenario_invalid_values_are_rejected_on_load() {
    // GIVEN a file with a zero subsample
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("engine.toml");
    std::fs::write(&path, "[scorer.model]\nsubsample = 0.0\n").unwrap();

    // WHEN it is loaded
    // THEN validation fails
    assert!(matches!(
        EngineConfig::load(&path),
        Err(ConfigError::Invalid(_))
    ));
}

//! Engine configuration.
//!
//! Every section defaults, so an empty TOML document is a valid config.

use std::path::Path;

use factorlab_core::GbmParams;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration for scoring, tuning and the worker pool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub scorer: ScorerConfig,
    pub optimizer: OptimizerConfig,
    pub pool: PoolConfig,
}

impl EngineConfig {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scorer.validate()?;
        self.optimizer.validate()?;
        Ok(())
    }
}

/// What a failed factor contributes downstream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Failed factors carry IC 0.0 and still take part in tuning and ranking.
    #[default]
    ScoreAsZero,
    /// Failed factors carry no IC and drop out of tuning, ranking and averages.
    Exclude,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScorerConfig {
    /// Wall-clock bound on one model fit; `None` disables it.
    pub fit_timeout_ms: Option<u64>,
    pub failure_policy: FailurePolicy,
    pub model: GbmParams,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            fit_timeout_ms: Some(30_000),
            failure_policy: FailurePolicy::default(),
            model: GbmParams::default(),
        }
    }
}

impl ScorerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let m = &self.model;
        if m.n_estimators == 0 || m.num_leaves < 2 || m.min_samples_leaf == 0 {
            return Err(ConfigError::Invalid(
                "scorer.model: n_estimators and min_samples_leaf must be positive, num_leaves at least 2"
                    .into(),
            ));
        }
        if m.max_bins < 2 {
            return Err(ConfigError::Invalid("scorer.model.max_bins must be at least 2".into()));
        }
        if !(m.learning_rate > 0.0 && m.learning_rate <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "scorer.model.learning_rate must be in (0, 1], got {}",
                m.learning_rate
            )));
        }
        if !(m.subsample > 0.0 && m.subsample <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "scorer.model.subsample must be in (0, 1], got {}",
                m.subsample
            )));
        }
        Ok(())
    }
}

/// Search box for the penalty weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamBounds {
    pub lambda: [f64; 2],
    pub alpha1: [f64; 2],
    pub alpha2: [f64; 2],
}

impl Default for ParamBounds {
    fn default() -> Self {
        Self {
            lambda: [0.0, 0.01],
            alpha1: [0.0, 1.0],
            alpha2: [0.0, 1.0],
        }
    }
}

impl ParamBounds {
    pub fn as_array(&self) -> [[f64; 2]; 3] {
        [self.lambda, self.alpha1, self.alpha2]
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (name, [lo, hi]) in ["lambda", "alpha1", "alpha2"].iter().zip(self.as_array()) {
            if !lo.is_finite() || !hi.is_finite() || lo < 0.0 || lo > hi {
                return Err(ConfigError::Invalid(format!(
                    "optimizer.bounds.{name} must satisfy 0 <= lower <= upper, got [{lo}, {hi}]"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Random exploration probes before the surrogate takes over.
    pub init_points: usize,
    /// Guided probes chosen by the acquisition function.
    pub n_iter: usize,
    pub seed: u64,
    /// UCB exploration weight.
    pub kappa: f64,
    /// Random candidates scored by the acquisition function per guided step.
    pub acquisition_samples: usize,
    /// Matérn length scale on the unit cube.
    pub length_scale: f64,
    pub noise: f64,
    /// Wall-clock bound on the whole search; `None` disables it.
    pub max_duration_ms: Option<u64>,
    pub bounds: ParamBounds,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            init_points: 5,
            n_iter: 10,
            seed: 42,
            kappa: 2.576,
            acquisition_samples: 2000,
            length_scale: 0.5,
            noise: 1e-6,
            max_duration_ms: Some(60_000),
            bounds: ParamBounds::default(),
        }
    }
}

impl OptimizerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.init_points == 0 {
            return Err(ConfigError::Invalid("optimizer.init_points must be positive".into()));
        }
        if self.n_iter > 0 && self.acquisition_samples == 0 {
            return Err(ConfigError::Invalid(
                "optimizer.acquisition_samples must be positive when n_iter > 0".into(),
            ));
        }
        if !(self.length_scale > 0.0) || !(self.noise >= 0.0) || !(self.kappa >= 0.0) {
            return Err(ConfigError::Invalid(
                "optimizer: length_scale must be positive, noise and kappa non-negative".into(),
            ));
        }
        self.bounds.validate()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Worker threads for factor evaluation; 0 uses the rayon default.
    pub threads: usize,
}

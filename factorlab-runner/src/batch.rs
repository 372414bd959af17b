//! Batch evaluation of candidates on a bounded worker pool.

use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::candidate::FactorCandidate;
use crate::config::{FailurePolicy, PoolConfig};
use crate::scorer::{FactorFailure, FactorScorer};

#[derive(Debug, thiserror::Error)]
#[error("failed to build worker pool: {0}")]
pub struct PoolError(#[from] rayon::ThreadPoolBuildError);

/// A candidate after scoring.
///
/// `failure` records why no genuine IC was measured; `ic` is what tuning,
/// ranking and summaries see under the configured [`FailurePolicy`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluatedFactor {
    pub candidate: FactorCandidate,
    pub ic: Option<f64>,
    #[serde(serialize_with = "serialize_failure")]
    pub failure: Option<FactorFailure>,
}

fn serialize_failure<S: serde::Serializer>(
    failure: &Option<FactorFailure>,
    s: S,
) -> Result<S::Ok, S::Error> {
    match failure {
        Some(f) => s.serialize_some(&f.to_string()),
        None => s.serialize_none(),
    }
}

impl EvaluatedFactor {
    pub fn from_outcome(
        candidate: FactorCandidate,
        outcome: Result<f64, FactorFailure>,
        policy: FailurePolicy,
    ) -> Self {
        match outcome {
            Ok(ic) => Self {
                candidate,
                ic: Some(ic),
                failure: None,
            },
            Err(failure) => Self {
                candidate,
                ic: match policy {
                    FailurePolicy::ScoreAsZero => Some(0.0),
                    FailurePolicy::Exclude => None,
                },
                failure: Some(failure),
            },
        }
    }

    pub fn formula(&self) -> &str {
        &self.candidate.formula
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }
}

/// Dedicated rayon pool for factor scoring.
pub struct ScoringPool {
    pool: rayon::ThreadPool,
}

impl ScoringPool {
    pub fn new(config: &PoolConfig) -> Result<Self, PoolError> {
        // 0 threads lets rayon pick its default.
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .thread_name(|i| format!("factorlab-score-{i}"))
            .build()?;
        Ok(Self { pool })
    }

    pub fn current_num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Score every candidate, preserving input order.
    ///
    /// Candidates with an empty formula are skipped.
    pub fn evaluate(
        &self,
        scorer: &FactorScorer<'_>,
        candidates: &[FactorCandidate],
    ) -> Vec<EvaluatedFactor> {
        let policy = scorer.config().failure_policy;
        let evaluated: Vec<EvaluatedFactor> = self.pool.install(|| {
            candidates
                .par_iter()
                .filter(|c| !c.formula.trim().is_empty())
                .map(|c| {
                    EvaluatedFactor::from_outcome(c.clone(), scorer.score_detailed(&c.formula), policy)
                })
                .collect()
        });
        debug!(
            submitted = candidates.len(),
            evaluated = evaluated.len(),
            failed = evaluated.iter().filter(|e| e.is_failed()).count(),
            "batch evaluated"
        );
        evaluated
    }
}

impl std::fmt::Debug for ScoringPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoringPool")
            .field("threads", &self.pool.current_num_threads())
            .finish()
    }
}

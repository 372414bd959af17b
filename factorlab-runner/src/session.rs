//! Multi-round factor discovery.
//!
//! Each round asks a [`FormulaSource`] for candidates (given the previous
//! round's feedback), scores them on the worker pool and summarizes the
//! round. After the last round the penalty weights are tuned over every
//! factor seen, and the best penalized factor is selected.

use std::collections::{HashMap, HashSet};

use factorlab_core::{DatasetHash, FormulaId, OperatorRegistry, PanelStore};
use serde::Serialize;
use tracing::{info, info_span, warn};

use crate::batch::{EvaluatedFactor, PoolError, ScoringPool};
use crate::candidate::{parse_candidates, FactorCandidate};
use crate::config::{ConfigError, EngineConfig};
use crate::optimizer::{OptimizationReport, PenaltyOptimizer};
use crate::penalty::ScoringParams;
use crate::ranker::{self, Feedback, RankedFactor};
use crate::scorer::{FactorFailure, FactorScorer};

/// Supplies candidate formulas, one batch per round.
pub trait FormulaSource {
    fn propose(
        &mut self,
        round: usize,
        feedback: &Feedback,
    ) -> anyhow::Result<Vec<FactorCandidate>>;
}

/// Replays fixed batches; rounds past the end get no candidates.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    batches: Vec<Vec<FactorCandidate>>,
}

impl StaticSource {
    pub fn new(batches: Vec<Vec<FactorCandidate>>) -> Self {
        Self { batches }
    }

    /// One batch per generator response, parsed with [`parse_candidates`].
    pub fn from_responses<S: AsRef<str>>(responses: &[S]) -> anyhow::Result<Self> {
        let batches = responses
            .iter()
            .map(|r| parse_candidates(r.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(batches))
    }
}

impl FormulaSource for StaticSource {
    fn propose(&mut self, round: usize, _feedback: &Feedback) -> anyhow::Result<Vec<FactorCandidate>> {
        Ok(self.batches.get(round).cloned().unwrap_or_default())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("formula source failed in round {round}: {source}")]
    Source {
        round: usize,
        #[source]
        source: anyhow::Error,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct RoundReport {
    pub round: usize,
    pub evaluated: Vec<EvaluatedFactor>,
    pub feedback: Feedback,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub dataset_hash: DatasetHash,
    pub rounds: Vec<RoundReport>,
    /// `None` when tuning was skipped and default weights were used.
    pub optimization: Option<OptimizationReport>,
    pub params: ScoringParams,
    pub ranking: Vec<RankedFactor>,
    pub selected: Option<RankedFactor>,
}

impl SessionReport {
    /// Every evaluated factor across rounds, ordered by IC.
    pub fn by_ic(&self) -> Vec<EvaluatedFactor> {
        let all: Vec<EvaluatedFactor> =
            self.rounds.iter().flat_map(|r| r.evaluated.iter().cloned()).collect();
        ranker::sort_by_ic(&all)
    }
}

type Outcome = (Option<f64>, Option<FactorFailure>);

pub struct DiscoverySession<'a> {
    panel: &'a PanelStore,
    registry: &'a OperatorRegistry,
    config: EngineConfig,
    pool: ScoringPool,
}

impl<'a> DiscoverySession<'a> {
    pub fn new(
        panel: &'a PanelStore,
        registry: &'a OperatorRegistry,
        config: EngineConfig,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        let pool = ScoringPool::new(&config.pool)?;
        Ok(Self {
            panel,
            registry,
            config,
            pool,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run `rounds` rounds and select a factor.
    ///
    /// A formula already scored earlier in the session reuses its outcome.
    pub fn run(
        &self,
        source: &mut dyn FormulaSource,
        rounds: usize,
    ) -> Result<SessionReport, SessionError> {
        let scorer = FactorScorer::new(self.panel, self.registry, self.config.scorer.clone());
        let mut outcomes: HashMap<FormulaId, Outcome> = HashMap::new();
        let mut reports = Vec::with_capacity(rounds);
        let mut feedback = Feedback::NothingToSummarize;

        info!(
            dataset = self.panel.dataset_hash().short(),
            rows = self.panel.len(),
            rounds,
            threads = self.pool.current_num_threads(),
            "discovery session started"
        );

        for round in 0..rounds {
            let span = info_span!("round", round);
            let _guard = span.enter();

            let candidates = source
                .propose(round, &feedback)
                .map_err(|source| SessionError::Source { round, source })?;
            let candidates: Vec<FactorCandidate> = candidates
                .into_iter()
                .filter(|c| !c.formula.trim().is_empty())
                .collect();

            let mut pending = HashSet::new();
            let fresh: Vec<FactorCandidate> = candidates
                .iter()
                .filter(|c| {
                    let id = FormulaId::of(&c.formula);
                    !outcomes.contains_key(&id) && pending.insert(id)
                })
                .cloned()
                .collect();
            for scored in self.pool.evaluate(&scorer, &fresh) {
                outcomes.insert(FormulaId::of(scored.formula()), (scored.ic, scored.failure));
            }

            let evaluated: Vec<EvaluatedFactor> = candidates
                .into_iter()
                .filter_map(|candidate| {
                    let (ic, failure) = outcomes.get(&FormulaId::of(&candidate.formula))?.clone();
                    Some(EvaluatedFactor { candidate, ic, failure })
                })
                .collect();

            feedback = ranker::summarize(&evaluated);
            match feedback.summary() {
                Some(s) => info!(
                    evaluated = s.count_evaluated,
                    failed = s.count_failed,
                    best_ic = s.best_ic,
                    average_ic = s.average_ic,
                    best = %s.best_formula,
                    "round summarized"
                ),
                None => warn!(proposed = evaluated.len(), "round produced nothing to summarize"),
            }
            reports.push(RoundReport {
                round,
                evaluated,
                feedback: feedback.clone(),
            });
        }

        let all: Vec<EvaluatedFactor> =
            reports.iter().flat_map(|r| r.evaluated.iter().cloned()).collect();
        let optimization = match PenaltyOptimizer::new(self.config.optimizer.clone()).optimize(&all) {
            Ok(report) => Some(report),
            Err(skipped) => {
                warn!(reason = %skipped, "penalty tuning skipped, using default weights");
                None
            }
        };
        let params = optimization
            .as_ref()
            .map_or_else(ScoringParams::default, |o| o.params);
        let ranking = ranker::rank(&all, &params);
        let selected = ranking.first().cloned();

        if let Some(best) = &selected {
            info!(
                formula = %best.formula,
                ic = best.ic,
                penalty = best.penalty,
                score = best.optimized_score,
                "factor selected"
            );
        }

        Ok(SessionReport {
            dataset_hash: self.panel.dataset_hash().clone(),
            rounds: reports,
            optimization,
            params,
            ranking,
            selected,
        })
    }
}

impl std::fmt::Debug for DiscoverySession<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoverySession")
            .field("dataset", &self.panel.dataset_hash().short())
            .field("config", &self.config)
            .field("pool", &self.pool)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use factorlab_core::SyntheticPanel;

    struct FailingSource;

    impl FormulaSource for FailingSource {
        fn propose(&mut self, round: usize, _: &Feedback) -> anyhow::Result<Vec<FactorCandidate>> {
            if round == 0 {
                Ok(vec![FactorCandidate::new("", "rank(close)")])
            } else {
                Err(anyhow!("generator unavailable"))
            }
        }
    }

    fn small_config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.pool.threads = 2;
        config.optimizer.acquisition_samples = 100;
        config
    }

    #[test]
    fn source_error_aborts_with_round() {
        let panel = SyntheticPanel::new(3, 60).build().unwrap();
        let reg = OperatorRegistry::standard();
        let session = DiscoverySession::new(&panel, &reg, small_config()).unwrap();
        let err = session.run(&mut FailingSource, 3).unwrap_err();
        assert!(matches!(err, SessionError::Source { round: 1, .. }));
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let panel = SyntheticPanel::new(2, 30).build().unwrap();
        let reg = OperatorRegistry::standard();
        let mut config = small_config();
        config.optimizer.bounds.lambda = [0.5, 0.1];
        assert!(matches!(
            DiscoverySession::new(&panel, &reg, config),
            Err(SessionError::Config(_))
        ));
    }

    #[test]
    fn repeated_formulas_reuse_outcomes() {
        let panel = SyntheticPanel::new(3, 60).build().unwrap();
        let reg = OperatorRegistry::standard();
        let session = DiscoverySession::new(&panel, &reg, small_config()).unwrap();
        let mut source = StaticSource::new(vec![
            vec![FactorCandidate::new("first", "delta(close,5)")],
            vec![FactorCandidate::new("again", "delta(close, 5)")],
        ]);
        let report = session.run(&mut source, 2).unwrap();
        let a = &report.rounds[0].evaluated[0];
        let b = &report.rounds[1].evaluated[0];
        assert_eq!(a.ic, b.ic);
        assert_eq!(b.candidate.description, "again");
    }

    #[test]
    fn split_literal_does_not_share_outcome_with_joined_one() {
        let panel = SyntheticPanel::new(3, 60).build().unwrap();
        let reg = OperatorRegistry::standard();
        let config = small_config();
        let scorer = FactorScorer::new(&panel, &reg, config.scorer.clone());
        let session = DiscoverySession::new(&panel, &reg, config).unwrap();
        let mut source = StaticSource::new(vec![
            vec![FactorCandidate::new("split", "delay(close, 1 0)")],
            vec![FactorCandidate::new("joined", "delay(close,10)")],
        ]);

        let report = session.run(&mut source, 2).unwrap();

        let split = &report.rounds[0].evaluated[0];
        let joined = &report.rounds[1].evaluated[0];
        assert!(matches!(split.failure, Some(FactorFailure::ExpressionRejected(_))));
        assert!(joined.failure.is_none());
        assert_eq!(joined.ic, scorer.score_detailed("delay(close,10)").ok());
    }

    #[test]
    fn no_candidates_uses_default_weights() {
        let panel = SyntheticPanel::new(2, 30).build().unwrap();
        let reg = OperatorRegistry::standard();
        let session = DiscoverySession::new(&panel, &reg, small_config()).unwrap();
        let report = session.run(&mut StaticSource::default(), 2).unwrap();
        assert!(report.optimization.is_none());
        assert_eq!(report.params, ScoringParams::default());
        assert!(report.selected.is_none());
        assert!(report
            .rounds
            .iter()
            .all(|r| r.feedback == Feedback::NothingToSummarize));
    }
}

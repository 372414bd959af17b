//! FactorLab Runner — factor scoring, penalty tuning, ranking, discovery sessions.
//!
//! This crate builds on `factorlab-core` to provide:
//! - Candidate parsing from generator output
//! - The IC scorer (formula → boosted-tree fit → Pearson IC) and a bounded pool
//! - Complexity penalty and Gaussian-process tuning of its weights
//! - Penalized ranking and per-round feedback summaries
//! - Multi-round discovery sessions driven by a formula source

pub mod batch;
pub mod candidate;
pub mod config;
pub mod gp;
pub mod optimizer;
pub mod penalty;
pub mod ranker;
pub mod scorer;
pub mod session;

pub use batch::{EvaluatedFactor, PoolError, ScoringPool};
pub use candidate::{parse_candidates, CandidateParseError, FactorCandidate};
pub use config::{
    ConfigError, EngineConfig, FailurePolicy, OptimizerConfig, ParamBounds, PoolConfig,
    ScorerConfig,
};
pub use gp::{GaussianProcess, GpError};
pub use optimizer::{OptimizationReport, OptimizationSkipped, PenaltyOptimizer, Probe};
pub use penalty::{count_numeric_literals, formula_length, net_score, penalty, ScoringParams};
pub use ranker::{rank, select, sort_by_ic, summarize, Feedback, FeedbackSummary, RankedFactor};
pub use scorer::{forward_returns, FactorFailure, FactorScorer, MIN_COMPLETE_ROWS};
pub use session::{
    DiscoverySession, FormulaSource, RoundReport, SessionError, SessionReport, StaticSource,
};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn scorer_is_shareable_across_workers() {
        assert_send::<FactorScorer<'static>>();
        assert_sync::<FactorScorer<'static>>();
    }

    #[test]
    fn results_are_send_sync() {
        assert_send::<EvaluatedFactor>();
        assert_sync::<EvaluatedFactor>();
        assert_send::<RankedFactor>();
        assert_sync::<RankedFactor>();
        assert_send::<Feedback>();
        assert_sync::<Feedback>();
        assert_send::<OptimizationReport>();
        assert_sync::<OptimizationReport>();
    }

    #[test]
    fn engine_pieces_are_send_sync() {
        assert_send::<EngineConfig>();
        assert_sync::<EngineConfig>();
        assert_send::<ScoringPool>();
        assert_sync::<ScoringPool>();
        assert_send::<GaussianProcess>();
        assert_sync::<GaussianProcess>();
    }
}

//! Penalized ranking and per-round feedback.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::batch::EvaluatedFactor;
use crate::penalty::ScoringParams;

/// A factor with its penalty and net score under the chosen weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedFactor {
    pub description: String,
    pub formula: String,
    pub ic: f64,
    pub penalty: f64,
    pub optimized_score: f64,
}

/// Factors with a defined IC, best net score first; ties by formula.
pub fn rank(factors: &[EvaluatedFactor], params: &ScoringParams) -> Vec<RankedFactor> {
    let mut ranked: Vec<RankedFactor> = factors
        .iter()
        .filter_map(|f| {
            let ic = f.ic?;
            let penalty = params.penalty(f.formula());
            Some(RankedFactor {
                description: f.candidate.description.clone(),
                formula: f.candidate.formula.clone(),
                ic,
                penalty,
                optimized_score: ic - params.lambda * penalty,
            })
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.optimized_score
            .total_cmp(&a.optimized_score)
            .then_with(|| a.formula.cmp(&b.formula))
    });
    ranked
}

/// Top-ranked factor, if any has a defined IC.
pub fn select(factors: &[EvaluatedFactor], params: &ScoringParams) -> Option<RankedFactor> {
    rank(factors, params).into_iter().next()
}

/// Evaluated factors ordered by IC, highest first. Undefined ICs go last.
pub fn sort_by_ic(factors: &[EvaluatedFactor]) -> Vec<EvaluatedFactor> {
    let mut sorted = factors.to_vec();
    sorted.sort_by(|a, b| match (a.ic, b.ic) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    sorted
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackSummary {
    pub best_formula: String,
    pub best_ic: f64,
    pub average_ic: f64,
    pub count_evaluated: usize,
    pub count_positive_ic: usize,
    pub count_failed: usize,
}

/// What the formula source hears about the previous round.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Feedback {
    NothingToSummarize,
    Summary(FeedbackSummary),
}

impl Feedback {
    pub fn summary(&self) -> Option<&FeedbackSummary> {
        match self {
            Self::Summary(s) => Some(s),
            Self::NothingToSummarize => None,
        }
    }
}

/// Summarize one round. The best factor here is by raw IC, not net score.
pub fn summarize(factors: &[EvaluatedFactor]) -> Feedback {
    let by_ic = sort_by_ic(factors);
    let Some((best, best_ic)) = by_ic.first().and_then(|f| Some((f, f.ic?))) else {
        return Feedback::NothingToSummarize;
    };

    let ics: Vec<f64> = factors.iter().filter_map(|f| f.ic).collect();
    Feedback::Summary(FeedbackSummary {
        best_formula: best.candidate.formula.clone(),
        best_ic,
        average_ic: ics.iter().sum::<f64>() / ics.len() as f64,
        count_evaluated: factors.len(),
        count_positive_ic: ics.iter().filter(|ic| **ic > 0.0).count(),
        count_failed: factors.iter().filter(|f| f.is_failed()).count(),
    })
}

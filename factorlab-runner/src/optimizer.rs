//! Penalty-weight tuning by Bayesian optimization.
//!
//! The objective for a weight vector `(lambda, alpha1, alpha2)` is the best
//! net score any evaluated factor reaches under it. A few seeded random
//! probes seed a Gaussian-process surrogate; each guided probe then takes the
//! candidate with the highest upper confidence bound.

use std::time::{Duration, Instant};

use factorlab_core::SeedHierarchy;
use rand::Rng;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::batch::EvaluatedFactor;
use crate::config::OptimizerConfig;
use crate::gp::GaussianProcess;
use crate::penalty::{count_numeric_literals, formula_length, ScoringParams};

const DIMS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OptimizationSkipped {
    #[error("no evaluated factors")]
    NoFactors,

    #[error("no factor has a defined IC")]
    NoDefinedIc,

    #[error("optimizer has no probe budget (init_points + n_iter is 0)")]
    NoProbeBudget,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Probe {
    pub params: ScoringParams,
    pub value: f64,
    pub guided: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationReport {
    pub params: ScoringParams,
    pub best_value: f64,
    pub probes: Vec<Probe>,
    /// The wall-clock budget ran out before all probes were taken.
    pub stopped_early: bool,
}

/// Precomputed per-factor terms so each objective call is a tight loop.
#[derive(Debug, Clone, Copy)]
struct Term {
    ic: f64,
    length: f64,
    literals: f64,
}

#[derive(Debug, Clone)]
pub struct PenaltyOptimizer {
    config: OptimizerConfig,
}

impl PenaltyOptimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    /// Tuned weights, or the defaults when tuning is skipped.
    pub fn optimize_or_default(&self, factors: &[EvaluatedFactor]) -> ScoringParams {
        match self.optimize(factors) {
            Ok(report) => report.params,
            Err(skipped) => {
                warn!(reason = %skipped, "penalty tuning skipped, using default weights");
                ScoringParams::default()
            }
        }
    }

    pub fn optimize(
        &self,
        factors: &[EvaluatedFactor],
    ) -> Result<OptimizationReport, OptimizationSkipped> {
        let total = self.config.init_points + self.config.n_iter;
        if total == 0 {
            return Err(OptimizationSkipped::NoProbeBudget);
        }
        if factors.is_empty() {
            return Err(OptimizationSkipped::NoFactors);
        }
        let terms: Vec<Term> = factors
            .iter()
            .filter_map(|f| {
                let ic = f.ic.filter(|ic| ic.is_finite())?;
                Some(Term {
                    ic,
                    length: formula_length(f.formula()) as f64,
                    literals: count_numeric_literals(f.formula()) as f64,
                })
            })
            .collect();
        if terms.is_empty() {
            return Err(OptimizationSkipped::NoDefinedIc);
        }

        let cfg = &self.config;
        let seeds = SeedHierarchy::new(cfg.seed);
        let deadline = cfg
            .max_duration_ms
            .map(|ms| Instant::now() + Duration::from_millis(ms));

        let mut unit_points: Vec<Vec<f64>> = Vec::with_capacity(total);
        let mut probes: Vec<Probe> = Vec::with_capacity(total);
        let mut stopped_early = false;

        for step in 0..total {
            if step > 0 && deadline.is_some_and(|d| Instant::now() > d) {
                stopped_early = true;
                break;
            }
            let guided = step >= cfg.init_points;
            let x = if guided {
                self.acquire(&seeds, (step - cfg.init_points) as u64, &unit_points, &probes)
            } else {
                random_point(&mut seeds.rng_for("explore", step as u64))
            };
            let params = self.to_params(&x);
            let value = objective(&terms, &params);
            info!(
                step,
                guided,
                lambda = params.lambda,
                alpha1 = params.alpha1,
                alpha2 = params.alpha2,
                value,
                "penalty probe"
            );
            unit_points.push(x);
            probes.push(Probe { params, value, guided });
        }

        // First maximum wins. The first step always runs, so `probes` is non-empty.
        let best = probes
            .iter()
            .fold(None::<&Probe>, |best, p| match best {
                Some(b) if b.value >= p.value => Some(b),
                _ => Some(p),
            })
            .copied()
            .ok_or(OptimizationSkipped::NoProbeBudget)?;

        info!(
            lambda = best.params.lambda,
            alpha1 = best.params.alpha1,
            alpha2 = best.params.alpha2,
            best_value = best.value,
            probes = probes.len(),
            stopped_early,
            "penalty tuning finished"
        );
        Ok(OptimizationReport {
            params: best.params,
            best_value: best.value,
            probes,
            stopped_early,
        })
    }

    /// Candidate with the highest UCB among seeded random samples.
    fn acquire(
        &self,
        seeds: &SeedHierarchy,
        iteration: u64,
        unit_points: &[Vec<f64>],
        probes: &[Probe],
    ) -> Vec<f64> {
        let cfg = &self.config;
        let mut rng = seeds.rng_for("acquire", iteration);
        let candidates: Vec<Vec<f64>> =
            (0..cfg.acquisition_samples.max(1)).map(|_| random_point(&mut rng)).collect();

        let values: Vec<f64> = probes.iter().map(|p| p.value).collect();
        let gp = match GaussianProcess::fit(unit_points, &values, cfg.length_scale, cfg.noise) {
            Ok(gp) => gp,
            Err(err) => {
                warn!(%err, iteration, "surrogate fit failed, probing a random candidate");
                return candidates.into_iter().next().unwrap_or_else(|| vec![0.5; DIMS]);
            }
        };

        let best = candidates
            .par_iter()
            .enumerate()
            .map(|(i, x)| (i, gp.ucb(x, cfg.kappa)))
            .reduce(
                || (usize::MAX, f64::NEG_INFINITY),
                |a, b| {
                    if b.1 > a.1 || (b.1 == a.1 && b.0 < a.0) {
                        b
                    } else {
                        a
                    }
                },
            );
        candidates
            .get(best.0)
            .cloned()
            .unwrap_or_else(|| candidates[0].clone())
    }

    fn to_params(&self, unit: &[f64]) -> ScoringParams {
        let bounds = self.config.bounds.as_array();
        let mut out = [0.0; DIMS];
        for ((o, u), [lo, hi]) in out.iter_mut().zip(unit).zip(bounds) {
            *o = lo + u * (hi - lo);
        }
        ScoringParams::from_array(out)
    }
}

fn random_point(rng: &mut impl Rng) -> Vec<f64> {
    (0..DIMS).map(|_| rng.gen::<f64>()).collect()
}

/// Best net score across factors under `params`.
fn objective(terms: &[Term], params: &ScoringParams) -> f64 {
    terms
        .par_iter()
        .map(|t| {
            let penalty = params.alpha1 * t.length + params.alpha2 * t.literals;
            t.ic - params.lambda * penalty
        })
        .reduce(|| f64::NEG_INFINITY, f64::max)
}

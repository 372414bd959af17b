//! Factor scorer: formula → in-sample IC of a boosted-tree fit.
//!
//! The scorer pairs each factor value with the next-period return of the same
//! entity, fits a single-feature model on the complete rows, and reports the
//! Pearson correlation between fitted values and realized returns. Every
//! failure is recovered here: `score` never returns anything but a number.

use std::time::{Duration, Instant};

use factorlab_core::model::pearson;
use factorlab_core::{
    BoostedTrees, CompiledFormula, EvaluationError, ModelError, OperatorRegistry, PanelStore,
};
use tracing::{debug, warn};

use crate::config::ScorerConfig;

/// Complete (factor, target) rows required before a model is fitted.
pub const MIN_COMPLETE_ROWS: usize = 100;

/// Why a factor scored 0.0 without a genuine measurement.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FactorFailure {
    #[error("expression rejected: {0}")]
    ExpressionRejected(EvaluationError),

    #[error("only {rows} complete rows, {required} required")]
    InsufficientData { rows: usize, required: usize },

    #[error("evaluation failed: {0}")]
    EvaluationFailure(String),

    #[error("model fit exceeded {limit_ms} ms")]
    BudgetExceeded { limit_ms: u64 },
}

impl From<EvaluationError> for FactorFailure {
    fn from(err: EvaluationError) -> Self {
        if err.is_rejection() {
            Self::ExpressionRejected(err)
        } else {
            Self::EvaluationFailure(err.to_string())
        }
    }
}

/// Next-period simple return per row, computed within each entity.
///
/// The last row of every entity has no successor and is NaN, as is any row
/// whose close is non-positive or undefined.
pub fn forward_returns(panel: &PanelStore) -> Vec<f64> {
    let mut out = vec![f64::NAN; panel.len()];
    let Some(close) = panel.column("close") else {
        return out;
    };
    for span in panel.index().entity_spans() {
        for t in span.start..span.end.saturating_sub(1) {
            let (now, next) = (close[t], close[t + 1]);
            if now > 0.0 && next.is_finite() {
                out[t] = next / now - 1.0;
            }
        }
    }
    out
}

/// Scores formulas against one panel. Cheap to share across threads.
#[derive(Debug)]
pub struct FactorScorer<'a> {
    panel: &'a PanelStore,
    registry: &'a OperatorRegistry,
    config: ScorerConfig,
    target: Vec<f64>,
}

impl<'a> FactorScorer<'a> {
    pub fn new(panel: &'a PanelStore, registry: &'a OperatorRegistry, config: ScorerConfig) -> Self {
        Self {
            panel,
            registry,
            config,
            target: forward_returns(panel),
        }
    }

    pub fn panel(&self) -> &PanelStore {
        self.panel
    }

    pub fn config(&self) -> &ScorerConfig {
        &self.config
    }

    /// IC in [-1, 1]; 0.0 on any failure.
    pub fn score(&self, formula: &str) -> f64 {
        self.score_detailed(formula).unwrap_or(0.0)
    }

    /// IC in [-1, 1], or the reason no IC could be measured.
    pub fn score_detailed(&self, formula: &str) -> Result<f64, FactorFailure> {
        match self.measure(formula) {
            Ok(ic) => {
                debug!(formula, ic, "scored factor");
                Ok(ic)
            }
            Err(failure) => {
                warn!(formula, reason = %failure, "factor scored as failure");
                Err(failure)
            }
        }
    }

    fn measure(&self, formula: &str) -> Result<f64, FactorFailure> {
        let scope = self.panel.scope();
        let compiled = CompiledFormula::compile(formula, &scope, self.registry)?;
        let factor = compiled.evaluate(&scope)?;

        let (x, y): (Vec<f64>, Vec<f64>) = factor
            .iter()
            .zip(&self.target)
            .filter(|(f, t)| f.is_finite() && t.is_finite())
            .map(|(f, t)| (*f, *t))
            .unzip();
        if x.len() < MIN_COMPLETE_ROWS {
            return Err(FactorFailure::InsufficientData {
                rows: x.len(),
                required: MIN_COMPLETE_ROWS,
            });
        }

        let deadline = self
            .config
            .fit_timeout_ms
            .map(|ms| Instant::now() + Duration::from_millis(ms));
        let model = BoostedTrees::fit(&x, &y, &self.config.model, deadline).map_err(|err| match err {
            ModelError::DeadlineExceeded { .. } => FactorFailure::BudgetExceeded {
                limit_ms: self.config.fit_timeout_ms.unwrap_or_default(),
            },
            other => FactorFailure::EvaluationFailure(other.to_string()),
        })?;

        let predictions = model.predict(&x);
        debug!(formula, rows = x.len(), trees = model.n_trees(), "fitted factor model");

        // Constant predictions carry no signal; that is a measurement, not a failure.
        Ok(pearson(&predictions, &y).map_or(0.0, |ic| ic.clamp(-1.0, 1.0)))
    }
}

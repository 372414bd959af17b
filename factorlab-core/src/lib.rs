//! FactorLab Core — panel store, operator library, expression sandbox, model.
//!
//! This crate holds everything a factor formula touches:
//! - The immutable (entity, date) OHLCV panel and its ingestion paths
//! - Time-series and cross-sectional operators behind a static registry
//! - The expression sandbox that lexes, parses, binds and evaluates formulas
//! - Histogram gradient-boosted trees and correlation helpers for scoring
//! - A BLAKE3 seed hierarchy for reproducible randomness

pub mod data;
pub mod domain;
pub mod expr;
pub mod model;
pub mod operators;
pub mod rng;

pub use data::{PanelError, PanelIndex, PanelStore, SyntheticPanel};
pub use domain::{DatasetHash, FormulaId, PanelRow, BASE_COLUMNS};
pub use expr::{evaluate, CompiledFormula, EvalScope, EvaluationError};
pub use model::{BoostedTrees, GbmParams, ModelError};
pub use operators::{ArgKind, OperatorFn, OperatorRegistry, OperatorSpec};
pub use rng::SeedHierarchy;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything shared across scoring threads is Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<PanelStore>();
        require_sync::<PanelStore>();
        require_send::<PanelIndex>();
        require_sync::<PanelIndex>();
        require_send::<OperatorRegistry>();
        require_sync::<OperatorRegistry>();
        require_send::<CompiledFormula>();
        require_sync::<CompiledFormula>();
        require_send::<EvalScope<'static>>();
        require_sync::<EvalScope<'static>>();
        require_send::<EvaluationError>();
        require_sync::<EvaluationError>();
        require_send::<BoostedTrees>();
        require_sync::<BoostedTrees>();
        require_send::<GbmParams>();
        require_sync::<GbmParams>();
        require_send::<SeedHierarchy>();
        require_sync::<SeedHierarchy>();
    }

    /// Architecture contract: operators see only series and the panel index.
    ///
    /// The function-pointer signatures carry no panel store or column map, so
    /// an operator cannot reach columns the formula did not pass it.
    #[test]
    fn operators_receive_only_their_arguments() {
        fn _check(f: OperatorFn, s: &[f64], index: &PanelIndex) -> Vec<f64> {
            match f {
                OperatorFn::Elementwise(op) => op(s),
                OperatorFn::TimeSeries(op) => op(s, 1, index),
                OperatorFn::Pairwise(op) => op(s, s, 1, index),
                OperatorFn::CrossSectional(op) => op(s, index),
                OperatorFn::Scaled { func, default } => func(s, default, index),
                OperatorFn::Grouped(op) => op(s, s, index),
            }
        }
    }
}

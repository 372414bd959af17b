//! Expression sandbox.
//!
//! A formula goes through three phases: lex, parse to an AST, and bind
//! against the panel's columns and the operator registry. Nothing is evaluated
//! until binding succeeds, so a rejected formula never runs any operator.
//! Evaluation then yields one value per panel row, or an error; never a
//! partial series.

pub mod ast;
pub mod binder;
pub mod error;
pub mod eval;
pub mod lexer;
pub mod parser;

use std::collections::BTreeMap;

use crate::data::PanelIndex;
use crate::operators::OperatorRegistry;

pub use binder::{Bound, MAX_WINDOW};
pub use error::EvaluationError;
pub use parser::{parse, MAX_DEPTH, MAX_FORMULA_LEN};

/// Read-only view of the panel a formula evaluates against.
#[derive(Debug, Clone, Copy)]
pub struct EvalScope<'a> {
    pub index: &'a PanelIndex,
    pub columns: &'a BTreeMap<String, Vec<f64>>,
}

impl<'a> EvalScope<'a> {
    pub fn new(index: &'a PanelIndex, columns: &'a BTreeMap<String, Vec<f64>>) -> Self {
        Self { index, columns }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

/// A formula that passed lexing, parsing and binding.
#[derive(Debug, Clone)]
pub struct CompiledFormula {
    source: String,
    bound: Bound,
}

impl CompiledFormula {
    pub fn compile(
        formula: &str,
        scope: &EvalScope<'_>,
        registry: &OperatorRegistry,
    ) -> Result<Self, EvaluationError> {
        let ast = parse(formula)?;
        let bound = binder::Binder::new(scope.columns, registry).bind(&ast)?;
        Ok(Self {
            source: formula.to_string(),
            bound,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate to a panel-aligned series; scalar results are broadcast.
    pub fn evaluate(&self, scope: &EvalScope<'_>) -> Result<Vec<f64>, EvaluationError> {
        let out = eval::eval(&self.bound, scope)?.into_series(scope.len());
        if out.len() != scope.len() {
            return Err(EvaluationError::LengthMismatch {
                context: "formula".to_string(),
                expected: scope.len(),
                got: out.len(),
            });
        }
        Ok(out)
    }
}

/// Compile and evaluate `formula` in one step.
pub fn evaluate(
    formula: &str,
    scope: &EvalScope<'_>,
    registry: &OperatorRegistry,
) -> Result<Vec<f64>, EvaluationError> {
    CompiledFormula::compile(formula, scope, registry)?.evaluate(scope)
}

/// Check that `formula` is admissible without evaluating it.
pub fn validate(
    formula: &str,
    scope: &EvalScope<'_>,
    registry: &OperatorRegistry,
) -> Result<(), EvaluationError> {
    CompiledFormula::compile(formula, scope, registry).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SyntheticPanel;
    use crate::operators::{OperatorFn, OperatorSpec};

    fn run(formula: &str) -> Result<Vec<f64>, EvaluationError> {
        let panel = SyntheticPanel::new(3, 30).build().unwrap();
        evaluate(formula, &panel.scope(), &OperatorRegistry::standard())
    }

    #[test]
    fn column_reference_is_the_column() {
        let panel = SyntheticPanel::new(2, 10).build().unwrap();
        let out = evaluate("close", &panel.scope(), &OperatorRegistry::standard()).unwrap();
        assert_eq!(out, panel.column("close").unwrap());
    }

    #[test]
    fn scalar_result_broadcasts() {
        let out = run("1e-6 * 2").unwrap();
        assert_eq!(out.len(), 90);
        assert!(out.iter().all(|v| *v == 2e-6));
    }

    #[test]
    fn arithmetic_and_comparison() {
        let panel = SyntheticPanel::new(2, 10).build().unwrap();
        let reg = OperatorRegistry::standard();
        let out = evaluate("(close - open) / open", &panel.scope(), &reg).unwrap();
        let close = panel.column("close").unwrap();
        let open = panel.column("open").unwrap();
        assert!((out[3] - (close[3] - open[3]) / open[3]).abs() < 1e-12);

        let up = evaluate("close > open", &panel.scope(), &reg).unwrap();
        assert!(up.iter().all(|v| *v == 0.0 || *v == 1.0));
    }

    #[test]
    fn nested_operators() {
        let out = run("rank(delta(close, 5)) * -1 + ts_rank(volume, 10) ** 2").unwrap();
        assert_eq!(out.len(), 90);
        assert!(out.iter().any(|v| v.is_finite()));
    }

    #[test]
    fn delta_has_leading_nans_per_entity() {
        let panel = SyntheticPanel::new(2, 30).build().unwrap();
        let out = evaluate("delta(close, 5)", &panel.scope(), &OperatorRegistry::standard()).unwrap();
        for span in panel.index().entity_spans() {
            let s = &out[span.clone()];
            assert_eq!(s.iter().take_while(|v| v.is_nan()).count(), 5);
            assert!(s[5..].iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn entity_attribute_feeds_indneutralize() {
        let panel = SyntheticPanel::new(4, 10)
            .build()
            .unwrap()
            .with_entity_attribute(
                "sector",
                &[("SYN000", 1.0), ("SYN001", 1.0), ("SYN002", 2.0), ("SYN003", 2.0)]
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v))
                    .collect(),
            )
            .unwrap();
        let out = evaluate(
            "indneutralize(close, sector)",
            &panel.scope(),
            &OperatorRegistry::standard(),
        )
        .unwrap();
        // two entities per sector: the residuals on each date cancel
        let idx = panel.index();
        for rows in idx.date_groups() {
            let sum: f64 = rows.iter().map(|r| out[*r]).sum();
            assert!(sum.abs() < 1e-9);
        }
    }

    #[test]
    fn rejections_are_classified() {
        for formula in [
            "__import__('os')",
            "close.__class__",
            "x = 1",
            "close[0]",
            "open(5)",
            "rank",
            "delay(close, 2.5)",
        ] {
            let err = run(formula).unwrap_err();
            assert!(err.is_rejection(), "{formula}: {err}");
        }
    }

    #[test]
    fn misbehaving_operator_is_a_failure() {
        fn short(values: &[f64]) -> Vec<f64> {
            values[..values.len() / 2].to_vec()
        }
        let mut reg = OperatorRegistry::standard();
        reg.register(OperatorSpec::new("half", "broken", OperatorFn::Elementwise(short)))
            .unwrap();
        let panel = SyntheticPanel::new(1, 10).build().unwrap();
        let err = evaluate("half(close)", &panel.scope(), &reg).unwrap_err();
        assert!(matches!(err, EvaluationError::LengthMismatch { .. }));
        assert!(!err.is_rejection());
    }

    #[test]
    fn validate_does_not_need_evaluation() {
        let panel = SyntheticPanel::new(1, 10).build().unwrap();
        let reg = OperatorRegistry::standard();
        assert!(validate("ts_sum(close, 3)", &panel.scope(), &reg).is_ok());
        assert!(validate("ts_sum(close)", &panel.scope(), &reg).is_err());
    }

    #[test]
    fn custom_operator_shadowing_a_column_is_ambiguous() {
        fn same(values: &[f64]) -> Vec<f64> {
            values.to_vec()
        }
        let panel = SyntheticPanel::new(2, 10)
            .build()
            .unwrap()
            .with_entity_attribute(
                "sector",
                &[("SYN000", 1.0), ("SYN001", 2.0)]
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v))
                    .collect(),
            )
            .unwrap();
        let mut reg = OperatorRegistry::standard();
        reg.register(OperatorSpec::new("sector", "clashes", OperatorFn::Elementwise(same)))
            .unwrap();

        for formula in ["sector", "sector(close)", "indneutralize(close, sector)"] {
            let err = evaluate(formula, &panel.scope(), &reg).unwrap_err();
            assert_eq!(err, EvaluationError::AmbiguousIdentifier("sector".into()), "{formula}");
            assert!(err.is_rejection());
        }
        assert!(evaluate("close", &panel.scope(), &reg).is_ok());
    }
}

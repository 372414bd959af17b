//! Binding: resolve every identifier against the allow-list, check operator
//! arity and argument kinds, and fold constant subtrees.
//!
//! A formula that binds successfully can only touch panel columns and
//! registered operators.

use std::collections::BTreeMap;

use super::ast::{BinOp, Expr, UnaryOp};
use super::error::EvaluationError;
use crate::operators::{ArgKind, OperatorFn, OperatorRegistry};

/// Largest window accepted; anything bigger is almost certainly a mistake.
pub const MAX_WINDOW: usize = 100_000;

/// Formula tree with every name resolved.
#[derive(Debug, Clone)]
pub enum Bound {
    Const(f64),
    Column(String),
    Neg(Box<Bound>),
    Binary {
        op: BinOp,
        lhs: Box<Bound>,
        rhs: Box<Bound>,
    },
    Call {
        name: String,
        func: OperatorFn,
        args: Vec<BoundArg>,
    },
}

#[derive(Debug, Clone)]
pub enum BoundArg {
    Series(Bound),
    Window(usize),
    Scalar(f64),
}

pub struct Binder<'a> {
    columns: &'a BTreeMap<String, Vec<f64>>,
    registry: &'a OperatorRegistry,
}

impl<'a> Binder<'a> {
    pub fn new(columns: &'a BTreeMap<String, Vec<f64>>, registry: &'a OperatorRegistry) -> Self {
        Self { columns, registry }
    }

    pub fn bind(&self, expr: &Expr) -> Result<Bound, EvaluationError> {
        match expr {
            Expr::Number(n) => Ok(Bound::Const(*n)),
            Expr::Ident { name, .. } => {
                self.check_unambiguous(name)?;
                if self.columns.contains_key(name) {
                    Ok(Bound::Column(name.clone()))
                } else if self.registry.contains(name) {
                    Err(EvaluationError::OperatorAsValue(name.clone()))
                } else {
                    Err(EvaluationError::UnknownIdentifier(name.clone()))
                }
            }
            Expr::Unary { op, operand } => {
                let inner = self.bind(operand)?;
                Ok(match (op, inner) {
                    (UnaryOp::Plus, inner) => inner,
                    (UnaryOp::Neg, Bound::Const(v)) => Bound::Const(-v),
                    (UnaryOp::Neg, inner) => Bound::Neg(Box::new(inner)),
                })
            }
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.bind(lhs)?;
                let rhs = self.bind(rhs)?;
                Ok(match (lhs, rhs) {
                    (Bound::Const(a), Bound::Const(b)) => Bound::Const(op.apply(a, b)),
                    (lhs, rhs) => Bound::Binary {
                        op: *op,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    },
                })
            }
            Expr::Call { name, args, .. } => self.bind_call(name, args),
        }
    }

    /// A name may resolve to a column or an operator, never both.
    fn check_unambiguous(&self, name: &str) -> Result<(), EvaluationError> {
        if self.columns.contains_key(name) && self.registry.contains(name) {
            return Err(EvaluationError::AmbiguousIdentifier(name.to_string()));
        }
        Ok(())
    }

    fn bind_call(&self, name: &str, args: &[Expr]) -> Result<Bound, EvaluationError> {
        self.check_unambiguous(name)?;
        let Some(spec) = self.registry.get(name) else {
            return Err(if self.columns.contains_key(name) {
                EvaluationError::NotCallable(name.to_string())
            } else {
                EvaluationError::UnknownIdentifier(name.to_string())
            });
        };

        let (min, max) = (spec.func.min_args(), spec.func.max_args());
        if args.len() < min || args.len() > max {
            let expected = if min == max {
                min.to_string()
            } else {
                format!("{min} to {max}")
            };
            return Err(EvaluationError::Arity {
                name: name.to_string(),
                expected,
                got: args.len(),
            });
        }

        let mut bound = Vec::with_capacity(args.len());
        for (i, (arg, kind)) in args.iter().zip(spec.func.arg_kinds()).enumerate() {
            let value = self.bind(arg)?;
            let invalid = |reason: String| EvaluationError::InvalidArgument {
                name: name.to_string(),
                position: i + 1,
                expected: *kind,
                reason,
            };
            bound.push(match kind {
                ArgKind::Series => BoundArg::Series(value),
                ArgKind::Window => BoundArg::Window(window_value(&value).map_err(invalid)?),
                ArgKind::Scalar => match value {
                    Bound::Const(v) if v.is_finite() => BoundArg::Scalar(v),
                    Bound::Const(v) => return Err(invalid(format!("{v} is not finite"))),
                    _ => return Err(invalid("must be a constant".to_string())),
                },
            });
        }

        Ok(Bound::Call {
            name: name.to_string(),
            func: spec.func,
            args: bound,
        })
    }
}

fn window_value(value: &Bound) -> Result<usize, String> {
    let Bound::Const(v) = value else {
        return Err("must be a constant".to_string());
    };
    let v = *v;
    if !v.is_finite() || v.fract() != 0.0 {
        return Err(format!("{v} is not an integer"));
    }
    if v < 1.0 {
        return Err(format!("{v} is not positive"));
    }
    if v > MAX_WINDOW as f64 {
        return Err(format!("{v} exceeds {MAX_WINDOW}"));
    }
    Ok(v as usize)
}

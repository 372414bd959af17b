//! Evaluation of a bound formula over a panel scope.

use super::binder::{Bound, BoundArg};
use super::error::EvaluationError;
use super::EvalScope;
use crate::operators::OperatorFn;

/// Intermediate value: scalars broadcast lazily against series.
#[derive(Debug, Clone)]
pub enum Value {
    Scalar(f64),
    Series(Vec<f64>),
}

impl Value {
    pub fn into_series(self, n: usize) -> Vec<f64> {
        match self {
            Value::Scalar(v) => vec![v; n],
            Value::Series(s) => s,
        }
    }
}

pub fn eval(bound: &Bound, scope: &EvalScope<'_>) -> Result<Value, EvaluationError> {
    match bound {
        Bound::Const(v) => Ok(Value::Scalar(*v)),
        Bound::Column(name) => scope
            .columns
            .get(name)
            .map(|c| Value::Series(c.clone()))
            // The binder only admits columns present in the scope.
            .ok_or_else(|| EvaluationError::UnknownIdentifier(name.clone())),
        Bound::Neg(inner) => Ok(match eval(inner, scope)? {
            Value::Scalar(v) => Value::Scalar(-v),
            Value::Series(s) => Value::Series(s.into_iter().map(|v| -v).collect()),
        }),
        Bound::Binary { op, lhs, rhs } => {
            let lhs = eval(lhs, scope)?;
            let rhs = eval(rhs, scope)?;
            Ok(match (lhs, rhs) {
                (Value::Scalar(a), Value::Scalar(b)) => Value::Scalar(op.apply(a, b)),
                (Value::Series(a), Value::Scalar(b)) => {
                    Value::Series(a.into_iter().map(|x| op.apply(x, b)).collect())
                }
                (Value::Scalar(a), Value::Series(b)) => {
                    Value::Series(b.into_iter().map(|y| op.apply(a, y)).collect())
                }
                (Value::Series(a), Value::Series(b)) => {
                    if a.len() != b.len() {
                        return Err(EvaluationError::LengthMismatch {
                            context: format!("operator '{}'", op.symbol()),
                            expected: a.len(),
                            got: b.len(),
                        });
                    }
                    Value::Series(a.iter().zip(&b).map(|(x, y)| op.apply(*x, *y)).collect())
                }
            })
        }
        Bound::Call { name, func, args } => {
            let out = call(name, func, args, scope)?;
            if out.len() != scope.len() {
                return Err(EvaluationError::LengthMismatch {
                    context: name.clone(),
                    expected: scope.len(),
                    got: out.len(),
                });
            }
            Ok(Value::Series(out))
        }
    }
}

fn call(
    name: &str,
    op: &OperatorFn,
    args: &[BoundArg],
    scope: &EvalScope<'_>,
) -> Result<Vec<f64>, EvaluationError> {
    let n = scope.len();
    let mut series: Vec<Vec<f64>> = Vec::with_capacity(2);
    let mut window = None;
    let mut scalar = None;
    for arg in args {
        match arg {
            BoundArg::Series(b) => series.push(eval(b, scope)?.into_series(n)),
            BoundArg::Window(d) => window = Some(*d),
            BoundArg::Scalar(v) => scalar = Some(*v),
        }
    }

    let malformed = || EvaluationError::OperatorFailure {
        name: name.to_string(),
        reason: "arguments do not match the operator signature".to_string(),
    };
    let index = scope.index;
    Ok(match (*op, series.as_slice(), window) {
        (OperatorFn::Elementwise(f), [s], None) => f(s),
        (OperatorFn::TimeSeries(f), [s], Some(d)) => f(s, d, index),
        (OperatorFn::Pairwise(f), [a, b], Some(d)) => f(a, b, d, index),
        (OperatorFn::CrossSectional(f), [s], None) => f(s, index),
        (OperatorFn::Scaled { func, default }, [s], None) => {
            func(s, scalar.unwrap_or(default), index)
        }
        (OperatorFn::Grouped(f), [s, g], None) => f(s, g, index),
        _ => return Err(malformed()),
    })
}

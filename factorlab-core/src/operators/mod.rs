//! Operator library and its static registry.
//!
//! Operators are plain functions over panel-aligned `&[f64]` series. The
//! [`OperatorRegistry`] maps each callable name to an [`OperatorSpec`] whose
//! [`OperatorFn`] variant fixes the arity and the kind of every argument, so
//! the expression binder can check calls before anything is evaluated.

pub mod cross_section;
pub mod elementwise;
pub mod time_series;
pub mod window;

use std::collections::BTreeMap;
use std::fmt;

use crate::data::PanelIndex;
use crate::domain::BASE_COLUMNS;

pub use window::min_periods;

/// Kind of value an operator argument must be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    /// Any expression; scalars broadcast to a series.
    Series,
    /// Constant positive integer (lookback length).
    Window,
    /// Constant real number.
    Scalar,
}

impl fmt::Display for ArgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgKind::Series => write!(f, "series"),
            ArgKind::Window => write!(f, "window"),
            ArgKind::Scalar => write!(f, "scalar"),
        }
    }
}

/// Typed operator entry point. The variant is the call signature.
#[derive(Debug, Clone, Copy)]
pub enum OperatorFn {
    /// `op(s)`
    Elementwise(fn(&[f64]) -> Vec<f64>),
    /// `op(s, d)`
    TimeSeries(fn(&[f64], usize, &PanelIndex) -> Vec<f64>),
    /// `op(s1, s2, d)`
    Pairwise(fn(&[f64], &[f64], usize, &PanelIndex) -> Vec<f64>),
    /// `op(s)` per date
    CrossSectional(fn(&[f64], &PanelIndex) -> Vec<f64>),
    /// `op(s[, a])` per date with a constant that defaults to `default`
    Scaled {
        func: fn(&[f64], f64, &PanelIndex) -> Vec<f64>,
        default: f64,
    },
    /// `op(s, group)` per date
    Grouped(fn(&[f64], &[f64], &PanelIndex) -> Vec<f64>),
}

impl OperatorFn {
    /// Argument kinds in call order.
    pub fn arg_kinds(&self) -> &'static [ArgKind] {
        use ArgKind::*;
        match self {
            OperatorFn::Elementwise(_) | OperatorFn::CrossSectional(_) => &[Series],
            OperatorFn::TimeSeries(_) => &[Series, Window],
            OperatorFn::Pairwise(_) => &[Series, Series, Window],
            OperatorFn::Scaled { .. } => &[Series, Scalar],
            OperatorFn::Grouped(_) => &[Series, Series],
        }
    }

    /// Fewest arguments a call may pass; trailing arguments past this have defaults.
    pub fn min_args(&self) -> usize {
        match self {
            OperatorFn::Scaled { .. } => 1,
            other => other.arg_kinds().len(),
        }
    }

    pub fn max_args(&self) -> usize {
        self.arg_kinds().len()
    }
}

/// A registered operator.
#[derive(Debug, Clone)]
pub struct OperatorSpec {
    pub name: String,
    pub description: String,
    pub func: OperatorFn,
}

impl OperatorSpec {
    pub fn new(name: &str, description: &str, func: OperatorFn) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            func,
        }
    }

    /// `name(s, d)`-style signature for catalogs and error messages.
    pub fn signature(&self) -> String {
        let kinds = self.func.arg_kinds();
        let args: Vec<String> = kinds
            .iter()
            .enumerate()
            .map(|(i, kind)| {
                let label = match kind {
                    ArgKind::Series if kinds.len() == 2 && i == 1 => "group".to_string(),
                    ArgKind::Series => format!("s{}", i + 1),
                    ArgKind::Window => "d".to_string(),
                    ArgKind::Scalar => "a".to_string(),
                };
                if i >= self.func.min_args() {
                    format!("[{label}]")
                } else {
                    label
                }
            })
            .collect();
        format!("{}({})", self.name, args.join(", "))
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
    #[error("operator '{0}' is already registered")]
    Duplicate(String),

    #[error("'{0}' is not a valid operator name")]
    InvalidName(String),

    #[error("'{0}' is reserved for a panel column")]
    ReservedName(String),
}

/// Name → operator table. Built once, passed by reference.
#[derive(Debug, Clone, Default)]
pub struct OperatorRegistry {
    ops: BTreeMap<String, OperatorSpec>,
}

impl OperatorRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The standard library: sign, the time-series family and the
    /// cross-sectional family.
    pub fn standard() -> Self {
        use cross_section as cs;
        use time_series as ts;
        use OperatorFn::*;

        let table: [(&str, &str, OperatorFn); 17] = [
            ("sign", "Sign of each value: -1, 0 or 1.", Elementwise(elementwise::sign)),
            ("delay", "Value d rows earlier for the same entity.", TimeSeries(ts::delay)),
            ("delta", "Current value minus the value d rows earlier.", TimeSeries(ts::delta)),
            (
                "correlation",
                "Rolling Pearson correlation of two series over the last d rows.",
                Pairwise(ts::correlation),
            ),
            (
                "covariance",
                "Rolling sample covariance of two series over the last d rows.",
                Pairwise(ts::covariance),
            ),
            ("ts_min", "Rolling minimum over the last d rows.", TimeSeries(ts::ts_min)),
            ("ts_max", "Rolling maximum over the last d rows.", TimeSeries(ts::ts_max)),
            (
                "ts_argmin",
                "Position (oldest = 0) of the minimum within the last d rows.",
                TimeSeries(ts::ts_argmin),
            ),
            (
                "ts_argmax",
                "Position (oldest = 0) of the maximum within the last d rows.",
                TimeSeries(ts::ts_argmax),
            ),
            (
                "ts_rank",
                "Percentile rank of the current value within the last d rows.",
                TimeSeries(ts::ts_rank),
            ),
            (
                "stddev",
                "Rolling sample standard deviation over the last d rows.",
                TimeSeries(ts::stddev),
            ),
            ("ts_sum", "Rolling sum over the last d rows.", TimeSeries(ts::ts_sum)),
            ("ts_product", "Rolling product over the last d rows.", TimeSeries(ts::ts_product)),
            (
                "decay_linear",
                "Linearly weighted moving average over the last d rows, newest weighted most.",
                TimeSeries(ts::decay_linear),
            ),
            (
                "rank",
                "Cross-sectional percentile rank across entities on each date.",
                CrossSectional(cs::rank),
            ),
            (
                "scale",
                "Rescale across entities so absolute values sum to a (default 1) on each date.",
                Scaled {
                    func: cs::scale,
                    default: 1.0,
                },
            ),
            (
                "indneutralize",
                "Subtract the per-date mean of each group from the series.",
                Grouped(cs::indneutralize),
            ),
        ];

        let ops = table
            .into_iter()
            .map(|(name, description, func)| {
                (name.to_string(), OperatorSpec::new(name, description, func))
            })
            .collect();
        Self { ops }
    }

    /// Add an operator. Names must be identifiers, unique, and must not
    /// shadow a base column.
    pub fn register(&mut self, spec: OperatorSpec) -> Result<(), RegistryError> {
        let mut chars = spec.name.chars();
        let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(RegistryError::InvalidName(spec.name));
        }
        if BASE_COLUMNS.contains(&spec.name.as_str()) {
            return Err(RegistryError::ReservedName(spec.name));
        }
        if self.ops.contains_key(&spec.name) {
            return Err(RegistryError::Duplicate(spec.name));
        }
        self.ops.insert(spec.name.clone(), spec);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&OperatorSpec> {
        self.ops.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ops.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.ops.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// `(signature, description)` pairs in name order.
    pub fn catalog(&self) -> Vec<(String, &str)> {
        self.ops
            .values()
            .map(|spec| (spec.signature(), spec.description.as_str()))
            .collect()
    }

    /// Catalog rendered as one `- signature: description` line per operator.
    pub fn catalog_text(&self) -> String {
        self.catalog()
            .into_iter()
            .map(|(sig, desc)| format!("- {sig}: {desc}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for operator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;

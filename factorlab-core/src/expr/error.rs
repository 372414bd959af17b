use thiserror::Error;

use crate::operators::ArgKind;

/// Why a formula could not be turned into a series.
///
/// Most variants are *rejections*: the formula is structurally outside the
/// allowed language and nothing was evaluated. The remainder are runtime
/// *failures* raised while evaluating an already-bound formula.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    #[error("empty expression")]
    EmptyExpression,

    #[error("expression is {len} characters long (max {max})")]
    TooLong { len: usize, max: usize },

    #[error("expression nests deeper than {max} levels")]
    TooDeep { max: usize },

    #[error("unexpected character '{ch}' at position {position}")]
    UnexpectedChar { ch: char, position: usize },

    #[error("invalid number at position {position}")]
    InvalidNumber { position: usize },

    #[error("{construct} is not allowed (position {position})")]
    ForbiddenConstruct {
        construct: &'static str,
        position: usize,
    },

    #[error("unexpected {found} at position {position}")]
    UnexpectedToken { found: String, position: usize },

    #[error("unknown identifier '{0}'")]
    UnknownIdentifier(String),

    #[error("'{0}' is a column and cannot be called")]
    NotCallable(String),

    #[error("operator '{0}' must be called")]
    OperatorAsValue(String),

    #[error("'{0}' names both a column and an operator")]
    AmbiguousIdentifier(String),

    #[error("{name} expects {expected} argument(s), got {got}")]
    Arity {
        name: String,
        expected: String,
        got: usize,
    },

    #[error("argument {position} of {name} must be a {expected}: {reason}")]
    InvalidArgument {
        name: String,
        position: usize,
        expected: ArgKind,
        reason: String,
    },

    #[error("operator {name} failed: {reason}")]
    OperatorFailure { name: String, reason: String },

    #[error("{context} produced {got} values, expected {expected}")]
    LengthMismatch {
        context: String,
        expected: usize,
        got: usize,
    },
}

impl EvaluationError {
    /// True for structural errors caught before evaluation.
    pub fn is_rejection(&self) -> bool {
        !matches!(
            self,
            EvaluationError::OperatorFailure { .. } | EvaluationError::LengthMismatch { .. }
        )
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::expr::lexer::Lexer;

/// Deterministic dataset hash (BLAKE3 over the canonical panel contents).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetHash(pub String);

impl DatasetHash {
    pub fn from_hash(hash: &str) -> Self {
        Self(hash.to_string())
    }

    /// Short prefix for log lines.
    pub fn short(&self) -> &str {
        let end = self.0.len().min(12);
        &self.0[..end]
    }
}

impl fmt::Display for DatasetHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identity of a formula string, used to deduplicate candidates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FormulaId(pub String);

impl FormulaId {
    /// Hash of the formula's token stream, so `delta(close,5)` and
    /// `delta( close , 5 )` share an id while `1 0` and `10` do not.
    ///
    /// Text that does not lex is hashed verbatim under a separate tag.
    pub fn of(formula: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        match Lexer::new(formula).tokenize() {
            Ok(tokens) => {
                hasher.update(b"tokens\x1e");
                for token in &tokens {
                    hasher.update(format!("{:?}", token.kind).as_bytes());
                    hasher.update(b"\x1f");
                }
            }
            Err(_) => {
                hasher.update(b"text\x1e");
                hasher.update(formula.as_bytes());
            }
        }
        Self(hasher.finalize().to_hex().to_string())
    }
}

impl fmt::Display for FormulaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

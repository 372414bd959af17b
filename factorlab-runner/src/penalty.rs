//! Complexity penalty and net score.

use serde::{Deserialize, Serialize};

/// Penalty weights. `lambda` scales the whole penalty against the IC.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringParams {
    pub lambda: f64,
    pub alpha1: f64,
    pub alpha2: f64,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            lambda: 0.001,
            alpha1: 0.5,
            alpha2: 0.5,
        }
    }
}

impl ScoringParams {
    pub fn from_array([lambda, alpha1, alpha2]: [f64; 3]) -> Self {
        Self { lambda, alpha1, alpha2 }
    }

    pub fn penalty(&self, formula: &str) -> f64 {
        penalty(formula, self.alpha1, self.alpha2)
    }

    pub fn net(&self, ic: f64, formula: &str) -> f64 {
        net_score(ic, self.lambda, self.penalty(formula))
    }
}

/// Formula length in characters.
pub fn formula_length(formula: &str) -> usize {
    formula.chars().count()
}

/// Number of maximal ASCII digit runs; `1e-6` counts two, `0.5` counts two.
pub fn count_numeric_literals(formula: &str) -> usize {
    let mut count = 0;
    let mut in_run = false;
    for c in formula.chars() {
        let digit = c.is_ascii_digit();
        if digit && !in_run {
            count += 1;
        }
        in_run = digit;
    }
    count
}

pub fn penalty(formula: &str, alpha1: f64, alpha2: f64) -> f64 {
    alpha1 * formula_length(formula) as f64 + alpha2 * count_numeric_literals(formula) as f64
}

pub fn net_score(ic: f64, lambda: f64, penalty: f64) -> f64 {
    ic - lambda * penalty
}

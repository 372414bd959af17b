//! Elementwise operators.

/// -1, 0 or 1 per value; NaN stays NaN.
pub fn sign(values: &[f64]) -> Vec<f64> {
    values
        .iter()
        .map(|&v| {
            if v.is_nan() {
                f64::NAN
            } else if v > 0.0 {
                1.0
            } else if v < 0.0 {
                -1.0
            } else {
                0.0
            }
        })
        .collect()
}

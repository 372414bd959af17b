//! Gaussian-process surrogate over the unit cube.
//!
//! Matérn 5/2 kernel with unit signal variance, targets standardized before
//! fitting. The Cholesky factor is cached for prediction.

use nalgebra::{Cholesky, DMatrix, DVector, Dyn};

const JITTER_RETRIES: usize = 6;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GpError {
    #[error("no observations")]
    Empty,

    #[error("covariance matrix is not positive definite")]
    NotPositiveDefinite,
}

/// Matérn ν = 5/2 correlation at Euclidean distance `r`.
pub fn matern52(r: f64, length_scale: f64) -> f64 {
    let s = 5f64.sqrt() * r / length_scale;
    (1.0 + s + s * s / 3.0) * (-s).exp()
}

fn distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f64>().sqrt()
}

#[derive(Debug, Clone)]
pub struct GaussianProcess {
    points: Vec<Vec<f64>>,
    chol: Cholesky<f64, Dyn>,
    alpha: DVector<f64>,
    y_mean: f64,
    y_std: f64,
    length_scale: f64,
}

impl GaussianProcess {
    /// Fit to `points` (unit-cube coordinates) and observed `values`.
    ///
    /// Adds growing diagonal jitter when the kernel matrix is numerically
    /// singular, e.g. for repeated points.
    pub fn fit(
        points: &[Vec<f64>],
        values: &[f64],
        length_scale: f64,
        noise: f64,
    ) -> Result<Self, GpError> {
        let n = points.len();
        if n == 0 || values.len() != n {
            return Err(GpError::Empty);
        }

        let y_mean = values.iter().sum::<f64>() / n as f64;
        let var = values.iter().map(|v| (v - y_mean).powi(2)).sum::<f64>() / n as f64;
        let y_std = if var > 0.0 { var.sqrt() } else { 1.0 };
        let y = DVector::from_iterator(n, values.iter().map(|v| (v - y_mean) / y_std));

        let kernel =
            DMatrix::from_fn(n, n, |i, j| matern52(distance(&points[i], &points[j]), length_scale));

        let mut jitter = noise.max(0.0);
        let mut chol = None;
        for _ in 0..=JITTER_RETRIES {
            let k = &kernel + DMatrix::identity(n, n) * jitter;
            if let Some(c) = k.cholesky() {
                chol = Some(c);
                break;
            }
            jitter = (jitter * 10.0).max(1e-10);
        }
        let chol = chol.ok_or(GpError::NotPositiveDefinite)?;
        let alpha = chol.solve(&y);

        Ok(Self {
            points: points.to_vec(),
            chol,
            alpha,
            y_mean,
            y_std,
            length_scale,
        })
    }

    /// Posterior mean and standard deviation at `x`, in original units.
    pub fn predict(&self, x: &[f64]) -> (f64, f64) {
        let k = DVector::from_iterator(
            self.points.len(),
            self.points.iter().map(|p| matern52(distance(p, x), self.length_scale)),
        );
        let mean = k.dot(&self.alpha);
        let var = self
            .chol
            .l()
            .solve_lower_triangular(&k)
            .map_or(0.0, |v| (1.0 - v.dot(&v)).max(0.0));
        (mean * self.y_std + self.y_mean, var.sqrt() * self.y_std)
    }

    /// Upper confidence bound `mean + kappa * std`.
    pub fn ucb(&self, x: &[f64], kappa: f64) -> f64 {
        let (mean, std) = self.predict(x);
        mean + kappa * std
    }
}

//! Gradient-boosted regression trees over a single feature.
//!
//! Least-squares boosting with histogram binning and leaf-wise growth. With
//! one feature every tree is a partition of the bin axis into contiguous
//! intervals, so the fitted ensemble collapses into a per-bin prediction
//! table: predicting is a binary search over bin edges plus a lookup.

use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Boosting hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GbmParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub num_leaves: usize,
    pub min_samples_leaf: usize,
    pub max_bins: usize,
    /// Fraction of rows drawn (Bernoulli) for each tree; 1.0 uses all rows.
    pub subsample: f64,
    pub seed: u64,
}

impl Default for GbmParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            num_leaves: 31,
            min_samples_leaf: 20,
            max_bins: 255,
            subsample: 1.0,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("no training rows")]
    EmptyInput,

    #[error("feature has {features} rows but target has {targets}")]
    LengthMismatch { features: usize, targets: usize },

    #[error("non-finite value at row {row}")]
    NonFinite { row: usize },

    #[error("fit exceeded its time budget after {trees} trees")]
    DeadlineExceeded { trees: usize },
}

/// Fitted ensemble.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoostedTrees {
    /// Ascending split points between bins; bin `b` holds `edges[b-1] < x <= edges[b]`.
    edges: Vec<f64>,
    /// Ensemble output for each bin.
    table: Vec<f64>,
    n_trees: usize,
}

#[derive(Debug, Clone, Copy)]
struct Leaf {
    lo: usize,
    hi: usize,
    best: Option<Split>,
}

#[derive(Debug, Clone, Copy)]
struct Split {
    /// First bin of the right child.
    at: usize,
    gain: f64,
}

impl BoostedTrees {
    /// Fit on `(x, y)`. Both must be finite and the same length.
    ///
    /// `deadline` is checked after every tree; crossing it aborts the fit.
    pub fn fit(
        x: &[f64],
        y: &[f64],
        params: &GbmParams,
        deadline: Option<Instant>,
    ) -> Result<Self, ModelError> {
        if x.len() != y.len() {
            return Err(ModelError::LengthMismatch {
                features: x.len(),
                targets: y.len(),
            });
        }
        if x.is_empty() {
            return Err(ModelError::EmptyInput);
        }
        if let Some(row) = x
            .iter()
            .zip(y)
            .position(|(a, b)| !a.is_finite() || !b.is_finite())
        {
            return Err(ModelError::NonFinite { row });
        }

        let edges = bin_edges(x, params.max_bins.max(2));
        let bins: Vec<usize> = x.iter().map(|v| bin_of(&edges, *v)).collect();
        let n_bins = edges.len() + 1;

        let base = y.iter().sum::<f64>() / y.len() as f64;
        let mut table = vec![base; n_bins];
        let mut rng = StdRng::seed_from_u64(params.seed);
        let min_leaf = params.min_samples_leaf.max(1);
        let mut n_trees = 0;

        let mut grad = vec![0.0; n_bins];
        let mut count = vec![0usize; n_bins];
        for _ in 0..params.n_estimators {
            grad.iter_mut().for_each(|g| *g = 0.0);
            count.iter_mut().for_each(|c| *c = 0);
            for (i, &b) in bins.iter().enumerate() {
                if params.subsample < 1.0 && rng.gen::<f64>() >= params.subsample {
                    continue;
                }
                // Negative gradient of squared loss: the residual.
                grad[b] += y[i] - table[b];
                count[b] += 1;
            }

            let leaves = grow_tree(&grad, &count, params.num_leaves.max(1), min_leaf);
            if leaves.len() < 2 {
                trace!(trees = n_trees, "no admissible split, stopping");
                break;
            }
            for leaf in &leaves {
                let g: f64 = grad[leaf.lo..leaf.hi].iter().sum();
                let n: usize = count[leaf.lo..leaf.hi].iter().sum();
                if n == 0 {
                    continue;
                }
                let step = params.learning_rate * g / n as f64;
                table[leaf.lo..leaf.hi].iter_mut().for_each(|t| *t += step);
            }
            n_trees += 1;

            if deadline.is_some_and(|d| Instant::now() > d) {
                return Err(ModelError::DeadlineExceeded { trees: n_trees });
            }
        }

        Ok(Self {
            edges,
            table,
            n_trees,
        })
    }

    pub fn predict_one(&self, x: f64) -> f64 {
        if x.is_nan() {
            return f64::NAN;
        }
        self.table[bin_of(&self.edges, x)]
    }

    pub fn predict(&self, x: &[f64]) -> Vec<f64> {
        x.iter().map(|v| self.predict_one(*v)).collect()
    }

    /// Trees actually grown; boosting stops early once no split helps.
    pub fn n_trees(&self) -> usize {
        self.n_trees
    }

    pub fn n_bins(&self) -> usize {
        self.table.len()
    }
}

fn bin_of(edges: &[f64], x: f64) -> usize {
    edges.partition_point(|e| *e < x)
}

/// Split points between bins. Distinct values get their own bin when they fit;
/// otherwise edges sit at (approximate) quantiles.
fn bin_edges(x: &[f64], max_bins: usize) -> Vec<f64> {
    let mut sorted = x.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mut distinct = sorted.clone();
    distinct.dedup();

    if distinct.len() <= max_bins {
        return distinct.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect();
    }

    let n = sorted.len();
    let mut edges: Vec<f64> = Vec::with_capacity(max_bins - 1);
    for k in 1..max_bins {
        let i = k * n / max_bins;
        if i == 0 || i >= n {
            continue;
        }
        let (lo, hi) = (sorted[i - 1], sorted[i]);
        if lo == hi {
            continue;
        }
        let edge = (lo + hi) / 2.0;
        if edges.last().map_or(true, |last| edge > *last) {
            edges.push(edge);
        }
    }
    edges
}

/// Leaf-wise growth over bin histograms: repeatedly split the leaf with the
/// largest gain until `num_leaves` is reached or nothing can split.
fn grow_tree(grad: &[f64], count: &[usize], num_leaves: usize, min_leaf: usize) -> Vec<Leaf> {
    let root = Leaf {
        lo: 0,
        hi: grad.len(),
        best: best_split(grad, count, 0, grad.len(), min_leaf),
    };
    let mut leaves = vec![root];

    while leaves.len() < num_leaves {
        let mut pick: Option<(usize, Split)> = None;
        for (i, leaf) in leaves.iter().enumerate() {
            if let Some(split) = leaf.best {
                if pick.map_or(true, |(_, p)| split.gain > p.gain) {
                    pick = Some((i, split));
                }
            }
        }
        let Some((i, split)) = pick else {
            break;
        };
        let leaf = leaves[i];
        let left = Leaf {
            lo: leaf.lo,
            hi: split.at,
            best: best_split(grad, count, leaf.lo, split.at, min_leaf),
        };
        let right = Leaf {
            lo: split.at,
            hi: leaf.hi,
            best: best_split(grad, count, split.at, leaf.hi, min_leaf),
        };
        leaves[i] = left;
        leaves.insert(i + 1, right);
    }
    leaves
}

/// Best boundary inside bins `lo..hi` by squared-loss gain
/// `GL²/nL + GR²/nR − G²/n`; first boundary wins ties.
fn best_split(grad: &[f64], count: &[usize], lo: usize, hi: usize, min_leaf: usize) -> Option<Split> {
    let g_total: f64 = grad[lo..hi].iter().sum();
    let n_total: usize = count[lo..hi].iter().sum();
    if n_total < 2 * min_leaf {
        return None;
    }
    let parent = g_total * g_total / n_total as f64;

    let mut best: Option<Split> = None;
    let mut gl = 0.0;
    let mut nl = 0usize;
    for at in (lo + 1)..hi {
        gl += grad[at - 1];
        nl += count[at - 1];
        let nr = n_total - nl;
        if nl < min_leaf {
            continue;
        }
        if nr < min_leaf {
            break;
        }
        if count[at - 1] == 0 {
            // Same partition as the previous boundary.
            continue;
        }
        let gr = g_total - gl;
        let gain = gl * gl / nl as f64 + gr * gr / nr as f64 - parent;
        if gain > 1e-12 && best.map_or(true, |b| gain > b.gain) {
            best = Some(Split { at, gain });
        }
    }
    best
}

//! Time-series operators: causal, computed independently per entity.
//!
//! Every function takes a panel-aligned series, an integer window `d` and the
//! panel index, and returns a series of the same length. Undefined results are
//! NaN.

use super::window::{min_periods, rolling_apply, rolling_apply_pair, rolling_valid, valid_count};
use crate::data::PanelIndex;

/// Value `d` rows earlier within the same entity.
pub fn delay(values: &[f64], d: usize, index: &PanelIndex) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    for span in index.entity_spans() {
        for row in span.clone() {
            if row >= span.start + d {
                out[row] = values[row - d];
            }
        }
    }
    out
}

/// `s - delay(s, d)`.
pub fn delta(values: &[f64], d: usize, index: &PanelIndex) -> Vec<f64> {
    let lagged = delay(values, d, index);
    values.iter().zip(&lagged).map(|(v, l)| v - l).collect()
}

pub fn ts_sum(values: &[f64], d: usize, index: &PanelIndex) -> Vec<f64> {
    rolling_valid(values, d, index, |w| w.iter().sum())
}

pub fn ts_product(values: &[f64], d: usize, index: &PanelIndex) -> Vec<f64> {
    rolling_valid(values, d, index, |w| w.iter().product())
}

pub fn ts_min(values: &[f64], d: usize, index: &PanelIndex) -> Vec<f64> {
    rolling_valid(values, d, index, |w| w.iter().copied().fold(f64::INFINITY, f64::min))
}

pub fn ts_max(values: &[f64], d: usize, index: &PanelIndex) -> Vec<f64> {
    rolling_valid(values, d, index, |w| {
        w.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    })
}

/// Rolling sample standard deviation (n - 1); needs two valid points.
pub fn stddev(values: &[f64], d: usize, index: &PanelIndex) -> Vec<f64> {
    rolling_valid(values, d, index, sample_std)
}

fn sample_std(w: &[f64]) -> f64 {
    let n = w.len();
    if n < 2 {
        return f64::NAN;
    }
    let mean = w.iter().sum::<f64>() / n as f64;
    let ss: f64 = w.iter().map(|v| (v - mean).powi(2)).sum();
    (ss / (n - 1) as f64).sqrt()
}

/// Offset (oldest = 0) of the window minimum; first occurrence wins.
pub fn ts_argmin(values: &[f64], d: usize, index: &PanelIndex) -> Vec<f64> {
    rolling_extreme_offset(values, d, index, |candidate, best| candidate < best)
}

/// Offset (oldest = 0) of the window maximum; first occurrence wins.
pub fn ts_argmax(values: &[f64], d: usize, index: &PanelIndex) -> Vec<f64> {
    rolling_extreme_offset(values, d, index, |candidate, best| candidate > best)
}

fn rolling_extreme_offset<F>(values: &[f64], d: usize, index: &PanelIndex, better: F) -> Vec<f64>
where
    F: Fn(f64, f64) -> bool,
{
    let min = min_periods(d);
    rolling_apply(values, d, index, |window| {
        if valid_count(window) < min {
            return f64::NAN;
        }
        let mut best: Option<(usize, f64)> = None;
        for (i, &v) in window.iter().enumerate() {
            if v.is_nan() {
                continue;
            }
            match best {
                Some((_, b)) if !better(v, b) => {}
                _ => best = Some((i, v)),
            }
        }
        best.map_or(f64::NAN, |(i, _)| i as f64)
    })
}

/// Percentile rank (ties averaged) of the window's last value among the
/// window's valid values. NaN when the last value is NaN.
pub fn ts_rank(values: &[f64], d: usize, index: &PanelIndex) -> Vec<f64> {
    let min = min_periods(d);
    rolling_apply(values, d, index, |window| {
        let last = window[window.len() - 1];
        if last.is_nan() {
            return f64::NAN;
        }
        let valid = valid_count(window);
        if valid < min {
            return f64::NAN;
        }
        let below = window.iter().filter(|v| **v < last).count();
        let equal = window.iter().filter(|v| **v == last).count();
        (below as f64 + (equal as f64 + 1.0) / 2.0) / valid as f64
    })
}

/// Linearly weighted moving average, weights `1..=d` oldest to newest.
///
/// Weights are anchored to the newest row, so a partial window at the start
/// of an entity uses the heaviest weights. The result is normalized by the
/// weights of the valid points actually used.
pub fn decay_linear(values: &[f64], d: usize, index: &PanelIndex) -> Vec<f64> {
    let min = min_periods(d);
    rolling_apply(values, d, index, |window| {
        if valid_count(window) < min {
            return f64::NAN;
        }
        let len = window.len();
        let mut num = 0.0;
        let mut den = 0.0;
        for (i, &v) in window.iter().enumerate() {
            if v.is_nan() {
                continue;
            }
            let weight = (d - (len - 1 - i)) as f64;
            num += weight * v;
            den += weight;
        }
        num / den
    })
}

/// Rolling Pearson correlation over rows where both inputs are valid.
pub fn correlation(a: &[f64], b: &[f64], d: usize, index: &PanelIndex) -> Vec<f64> {
    rolling_pairs(a, b, d, index, |xs, ys| {
        let (cov, var_x, var_y) = co_moments(xs, ys);
        if var_x <= 0.0 || var_y <= 0.0 {
            return f64::NAN;
        }
        (cov / (var_x * var_y).sqrt()).clamp(-1.0, 1.0)
    })
}

/// Rolling sample covariance over rows where both inputs are valid.
pub fn covariance(a: &[f64], b: &[f64], d: usize, index: &PanelIndex) -> Vec<f64> {
    rolling_pairs(a, b, d, index, |xs, ys| {
        let (cov, _, _) = co_moments(xs, ys);
        cov / (xs.len() - 1) as f64
    })
}

fn rolling_pairs<F>(a: &[f64], b: &[f64], d: usize, index: &PanelIndex, stat: F) -> Vec<f64>
where
    F: Fn(&[f64], &[f64]) -> f64,
{
    let min = min_periods(d).max(2);
    let mut xs = Vec::with_capacity(d);
    let mut ys = Vec::with_capacity(d);
    rolling_apply_pair(a, b, d, index, |wa, wb| {
        xs.clear();
        ys.clear();
        for (&x, &y) in wa.iter().zip(wb) {
            if !x.is_nan() && !y.is_nan() {
                xs.push(x);
                ys.push(y);
            }
        }
        if xs.len() < min {
            f64::NAN
        } else {
            stat(&xs, &ys)
        }
    })
}

/// Centered cross and squared sums: (Σdxdy, Σdx², Σdy²).
fn co_moments(xs: &[f64], ys: &[f64]) -> (f64, f64, f64) {
    let n = xs.len() as f64;
    let mx = xs.iter().sum::<f64>() / n;
    let my = ys.iter().sum::<f64>() / n;
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mx;
        let dy = y - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    (sxy, sxx, syy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::{assert_approx, DEFAULT_EPSILON};
    use chrono::NaiveDate;

    fn idx(n: usize) -> PanelIndex {
        PanelIndex::single_entity("A", n)
    }

    fn two_entities(n: usize) -> PanelIndex {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut keys = Vec::new();
        for e in ["A", "B"] {
            for i in 0..n {
                keys.push((e, start + chrono::Duration::days(i as i64)));
            }
        }
        PanelIndex::from_keys(&keys)
    }

    #[test]
    fn delay_shifts_within_entity() {
        let index = two_entities(3);
        let out = delay(&[1.0, 2.0, 3.0, 10.0, 20.0, 30.0], 1, &index);
        assert!(out[0].is_nan());
        assert_eq!(out[1], 1.0);
        assert_eq!(out[2], 2.0);
        assert!(out[3].is_nan());
        assert_eq!(out[4], 10.0);
    }

    #[test]
    fn delta_leading_nans_per_entity() {
        let index = two_entities(8);
        let values: Vec<f64> = (0..16).map(|i| i as f64).collect();
        let out = delta(&values, 5, &index);
        for span in index.entity_spans() {
            let s = &out[span.clone()];
            assert!(s[..5].iter().all(|v| v.is_nan()));
            assert!(s[5..].iter().all(|v| *v == 5.0));
        }
    }

    #[test]
    fn delay_zero_is_identity() {
        let out = delay(&[1.0, 2.0], 0, &idx(2));
        assert_eq!(out, vec![1.0, 2.0]);
    }

    #[test]
    fn ts_sum_and_product() {
        let index = idx(4);
        let values = [1.0, 2.0, 3.0, 4.0];
        let sums = ts_sum(&values, 2, &index);
        assert!(sums[0].is_nan());
        assert_eq!(&sums[1..], &[3.0, 5.0, 7.0]);
        let prods = ts_product(&values, 2, &index);
        assert_eq!(&prods[1..], &[2.0, 6.0, 12.0]);
    }

    #[test]
    fn ts_min_max_partial_prefix() {
        // d = 5 needs 4 valid points
        let index = idx(6);
        let values = [5.0, 3.0, 4.0, 1.0, 2.0, 6.0];
        let mins = ts_min(&values, 5, &index);
        let maxs = ts_max(&values, 5, &index);
        assert!(mins[2].is_nan());
        assert_eq!(mins[3], 1.0);
        assert_eq!(maxs[3], 5.0);
        assert_eq!(maxs[5], 6.0);
    }

    #[test]
    fn stddev_sample() {
        let out = stddev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0], 8, &idx(8));
        // population std is 2.0; sample = 2 * sqrt(8/7)
        assert_approx(out[7], 2.0 * (8.0f64 / 7.0).sqrt(), DEFAULT_EPSILON);
    }

    #[test]
    fn stddev_window_one_is_nan() {
        let out = stddev(&[1.0, 2.0], 1, &idx(2));
        assert!(out.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn argmin_argmax_offsets_first_occurrence() {
        let index = idx(5);
        let values = [3.0, 1.0, 1.0, 5.0, 5.0];
        let amin = ts_argmin(&values, 5, &index);
        let amax = ts_argmax(&values, 5, &index);
        assert_eq!(amin[4], 1.0);
        assert_eq!(amax[4], 3.0);
        assert_eq!(amin[3], 1.0);
    }

    #[test]
    fn argmax_counts_from_window_start() {
        let index = idx(5);
        let values = [9.0, 1.0, 2.0, 3.0, 2.0];
        let out = ts_argmax(&values, 3, &index);
        // window at t=4 is [2, 3, 2]
        assert_eq!(out[4], 1.0);
    }

    #[test]
    fn ts_rank_of_last_value() {
        let index = idx(4);
        let out = ts_rank(&[1.0, 2.0, 3.0, 2.0], 4, &index);
        // last = 2 among [1,2,3,2]: below=1, equal=2, avg rank 2.5 / 4
        assert_approx(out[3], 0.625, DEFAULT_EPSILON);
        let rising = ts_rank(&[1.0, 2.0, 3.0, 4.0], 4, &index);
        assert_approx(rising[3], 1.0, DEFAULT_EPSILON);
    }

    #[test]
    fn ts_rank_nan_last_is_nan() {
        let out = ts_rank(&[1.0, 2.0, f64::NAN], 2, &idx(3));
        assert!(out[2].is_nan());
    }

    #[test]
    fn decay_linear_weights_newest_heaviest() {
        let out = decay_linear(&[1.0, 2.0, 3.0], 3, &idx(3));
        // (1*1 + 2*2 + 3*3) / 6
        assert_approx(out[2], 14.0 / 6.0, DEFAULT_EPSILON);
    }

    #[test]
    fn decay_linear_constant_is_constant() {
        let out = decay_linear(&[4.0; 10], 5, &idx(10));
        for v in &out[3..] {
            assert_approx(*v, 4.0, DEFAULT_EPSILON);
        }
    }

    #[test]
    fn correlation_perfect_and_degenerate() {
        let index = idx(5);
        let a = [1.0, 2.0, 3.0, 4.0, 5.0];
        let b = [2.0, 4.0, 6.0, 8.0, 10.0];
        let neg: Vec<f64> = a.iter().map(|v| -v).collect();
        assert_approx(correlation(&a, &b, 5, &index)[4], 1.0, 1e-12);
        assert_approx(correlation(&a, &neg, 5, &index)[4], -1.0, 1e-12);
        let flat = [1.0; 5];
        assert!(correlation(&a, &flat, 5, &index)[4].is_nan());
    }

    #[test]
    fn covariance_sample() {
        let index = idx(3);
        let out = covariance(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0], 3, &index);
        assert_approx(out[2], 1.0, DEFAULT_EPSILON);
    }

    #[test]
    fn pairwise_drops_rows_with_nan() {
        let index = idx(5);
        let a = [1.0, f64::NAN, 3.0, 4.0, 5.0];
        let b = [1.0, 2.0, 3.0, 4.0, 5.0];
        // d = 5 needs 4 valid pairs; 4 remain at t = 4
        let out = covariance(&a, &b, 5, &index);
        assert!(out[3].is_nan());
        assert!(out[4].is_finite());
    }
}

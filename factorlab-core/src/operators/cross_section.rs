//! Cross-sectional operators: computed per date across entities.

use std::collections::HashMap;

use crate::data::PanelIndex;

/// Percentile rank within each date, ties averaged: `avg_rank / n_valid`.
/// NaN inputs stay NaN and do not count toward `n_valid`.
pub fn rank(values: &[f64], index: &PanelIndex) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    let mut valid: Vec<(f64, usize)> = Vec::new();
    for rows in index.date_groups() {
        valid.clear();
        valid.extend(
            rows.iter()
                .map(|&r| (values[r], r))
                .filter(|(v, _)| !v.is_nan()),
        );
        valid.sort_by(|a, b| a.0.total_cmp(&b.0));
        let n = valid.len() as f64;

        let mut i = 0;
        while i < valid.len() {
            let mut j = i;
            while j + 1 < valid.len() && valid[j + 1].0 == valid[i].0 {
                j += 1;
            }
            // 1-based ranks i+1 ..= j+1 share their average
            let avg = (i + j) as f64 / 2.0 + 1.0;
            for &(_, row) in &valid[i..=j] {
                out[row] = avg / n;
            }
            i = j + 1;
        }
    }
    out
}

/// Rescale so the absolute values on each date sum to `a`.
/// A date whose valid values are all zero (or absent) yields NaN.
pub fn scale(values: &[f64], a: f64, index: &PanelIndex) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    for rows in index.date_groups() {
        let total: f64 = rows
            .iter()
            .map(|&r| values[r])
            .filter(|v| !v.is_nan())
            .map(f64::abs)
            .sum();
        if total == 0.0 || !total.is_finite() {
            continue;
        }
        for &r in rows {
            out[r] = values[r] * a / total;
        }
    }
    out
}

/// Subtract, per date, the mean of `values` within each `group` value.
/// Rows with a NaN group or NaN value yield NaN.
pub fn indneutralize(values: &[f64], group: &[f64], index: &PanelIndex) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    let mut sums: HashMap<u64, (f64, usize)> = HashMap::new();
    for rows in index.date_groups() {
        sums.clear();
        for &r in rows {
            if values[r].is_nan() || group[r].is_nan() {
                continue;
            }
            let entry = sums.entry(group_key(group[r])).or_insert((0.0, 0));
            entry.0 += values[r];
            entry.1 += 1;
        }
        for &r in rows {
            if values[r].is_nan() || group[r].is_nan() {
                continue;
            }
            if let Some((sum, count)) = sums.get(&group_key(group[r])) {
                out[r] = values[r] - sum / *count as f64;
            }
        }
    }
    out
}

/// Group identity by bit pattern, with -0.0 folded into 0.0.
fn group_key(g: f64) -> u64 {
    if g == 0.0 {
        0.0f64.to_bits()
    } else {
        g.to_bits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::{assert_approx, DEFAULT_EPSILON};
    use chrono::NaiveDate;

    /// `n` entities observed on one date.
    fn one_date(n: usize) -> PanelIndex {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let names: Vec<String> = (0..n).map(|i| format!("E{i}")).collect();
        let keys: Vec<(&str, NaiveDate)> = names.iter().map(|s| (s.as_str(), date)).collect();
        PanelIndex::from_keys(&keys)
    }

    #[test]
    fn rank_percentiles_with_ties() {
        let out = rank(&[10.0, 20.0, 20.0, 30.0], &one_date(4));
        assert_eq!(out, vec![0.25, 0.625, 0.625, 1.0]);
    }

    #[test]
    fn rank_keeps_nan() {
        let out = rank(&[3.0, f64::NAN, 1.0], &one_date(3));
        assert_eq!(out[0], 1.0);
        assert!(out[1].is_nan());
        assert_eq!(out[2], 0.5);
    }

    #[test]
    fn scale_sums_abs_to_target() {
        let out = scale(&[1.0, -3.0, 4.0], 2.0, &one_date(3));
        let total: f64 = out.iter().map(|v| v.abs()).sum();
        assert_approx(total, 2.0, DEFAULT_EPSILON);
        assert_approx(out[1], -0.75, DEFAULT_EPSILON);
    }

    #[test]
    fn scale_all_zero_is_nan() {
        let out = scale(&[0.0, 0.0], 1.0, &one_date(2));
        assert!(out.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn indneutralize_demeans_within_group() {
        let values = [1.0, 3.0, 10.0, 20.0];
        let group = [1.0, 1.0, 2.0, 2.0];
        let out = indneutralize(&values, &group, &one_date(4));
        assert_eq!(out, vec![-1.0, 1.0, -5.0, 5.0]);
    }

    #[test]
    fn indneutralize_nan_group_is_nan() {
        let out = indneutralize(&[1.0, 2.0], &[f64::NAN, 1.0], &one_date(2));
        assert!(out[0].is_nan());
        assert_eq!(out[1], 0.0);
    }
}

//! Per-entity rolling window plumbing shared by the time-series operators.

use crate::data::PanelIndex;

/// Minimum valid observations a window of length `d` needs: `max(1, ceil(0.8 * d))`.
pub fn min_periods(d: usize) -> usize {
    ((4 * d + 4) / 5).max(1)
}

/// Apply `f` to the trailing window of every row, entity by entity.
///
/// The window for row `t` of an entity is rows `t+1-d ..= t` of that entity,
/// truncated to the entity's available prefix. Windows never cross entities.
pub fn rolling_apply<F>(values: &[f64], d: usize, index: &PanelIndex, mut f: F) -> Vec<f64>
where
    F: FnMut(&[f64]) -> f64,
{
    let mut out = vec![f64::NAN; values.len()];
    if d == 0 {
        return out;
    }
    for span in index.entity_spans() {
        let series = &values[span.clone()];
        for t in 0..series.len() {
            let start = (t + 1).saturating_sub(d);
            out[span.start + t] = f(&series[start..=t]);
        }
    }
    out
}

/// Same as [`rolling_apply`] over two aligned inputs.
pub fn rolling_apply_pair<F>(
    a: &[f64],
    b: &[f64],
    d: usize,
    index: &PanelIndex,
    mut f: F,
) -> Vec<f64>
where
    F: FnMut(&[f64], &[f64]) -> f64,
{
    let mut out = vec![f64::NAN; a.len()];
    if d == 0 {
        return out;
    }
    for span in index.entity_spans() {
        let xs = &a[span.clone()];
        let ys = &b[span.clone()];
        for t in 0..xs.len() {
            let start = (t + 1).saturating_sub(d);
            out[span.start + t] = f(&xs[start..=t], &ys[start..=t]);
        }
    }
    out
}

/// Rolling statistic over the valid (non-NaN) points of each window.
/// Windows with fewer than `min_periods(d)` valid points yield NaN.
pub fn rolling_valid<F>(values: &[f64], d: usize, index: &PanelIndex, stat: F) -> Vec<f64>
where
    F: Fn(&[f64]) -> f64,
{
    let min = min_periods(d);
    let mut buf = Vec::with_capacity(d);
    rolling_apply(values, d, index, |window| {
        buf.clear();
        buf.extend(window.iter().copied().filter(|v| !v.is_nan()));
        if buf.len() < min {
            f64::NAN
        } else {
            stat(&buf)
        }
    })
}

/// Number of non-NaN entries in a window.
pub fn valid_count(window: &[f64]) -> usize {
    window.iter().filter(|v| !v.is_nan()).count()
}

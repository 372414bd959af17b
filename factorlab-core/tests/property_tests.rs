//! Property tests for operator invariants.
//!
//! Uses proptest to verify:
//! 1. delta(s, d) == s - delay(s, d), with d leading NaNs per entity
//! 2. rank values are percentiles in (0, 1] with ties averaged
//! 3. scale makes absolute values on each date sum to the target
//! 4. decay_linear of a constant is the constant
//! 5. rolling min <= value-window stats <= rolling max

use chrono::NaiveDate;
use proptest::prelude::*;
use factorlab_core::operators::{cross_section, time_series};
use factorlab_core::PanelIndex;

// ── Strategies (proptest) ────────────────────────────────────────────

/// Panel index with `entities` entities observed on the same `days` dates.
fn balanced_index(entities: usize, days: usize) -> PanelIndex {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let names: Vec<String> = (0..entities).map(|e| format!("E{e}")).collect();
    let mut keys = Vec::with_capacity(entities * days);
    for name in &names {
        for d in 0..days {
            keys.push((name.as_str(), start + chrono::Duration::days(d as i64)));
        }
    }
    PanelIndex::from_keys(&keys)
}

fn arb_value() -> impl Strategy<Value = f64> {
    prop_oneof![
        9 => (-1000.0..1000.0_f64).prop_map(|v| (v * 100.0).round() / 100.0),
        1 => Just(f64::NAN),
    ]
}

/// (entities, days, values) with values laid out entity-major.
fn arb_panel() -> impl Strategy<Value = (usize, usize, Vec<f64>)> {
    (1usize..5, 1usize..40).prop_flat_map(|(e, d)| {
        (Just(e), Just(d), prop::collection::vec(arb_value(), e * d))
    })
}

fn arb_window() -> impl Strategy<Value = usize> {
    1usize..15
}

// ── 1. delta / delay ─────────────────────────────────────────────────

proptest! {
    #[test]
    fn delta_is_value_minus_delay((e, d, values) in arb_panel(), w in arb_window()) {
        let index = balanced_index(e, d);
        let delta = time_series::delta(&values, w, &index);
        let delay = time_series::delay(&values, w, &index);
        for row in 0..values.len() {
            let expected = values[row] - delay[row];
            prop_assert!(
                (delta[row].is_nan() && expected.is_nan()) || delta[row] == expected
            );
        }
        for span in index.entity_spans() {
            let lead = w.min(span.len());
            prop_assert!(delta[span.start..span.start + lead].iter().all(|v| v.is_nan()));
        }
    }
}

// ── 2. rank ──────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn rank_is_percentile_per_date((e, d, values) in arb_panel()) {
        let index = balanced_index(e, d);
        let ranks = cross_section::rank(&values, &index);
        for rows in index.date_groups() {
            let valid: Vec<usize> = rows.iter().copied().filter(|r| !values[*r].is_nan()).collect();
            let n = valid.len() as f64;
            let mut total = 0.0;
            for &r in rows {
                if values[r].is_nan() {
                    prop_assert!(ranks[r].is_nan());
                } else {
                    prop_assert!(ranks[r] > 0.0 && ranks[r] <= 1.0);
                    total += ranks[r];
                }
            }
            // average ranks always sum to n(n+1)/2
            if !valid.is_empty() {
                prop_assert!((total * n - n * (n + 1.0) / 2.0).abs() < 1e-9);
            }
            for &a in &valid {
                for &b in &valid {
                    if values[a] == values[b] {
                        prop_assert_eq!(ranks[a], ranks[b]);
                    }
                    if values[a] < values[b] {
                        prop_assert!(ranks[a] < ranks[b]);
                    }
                }
            }
        }
    }
}

// ── 3. scale ─────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn scale_hits_target_abs_sum((e, d, values) in arb_panel(), a in 0.1..10.0_f64) {
        let index = balanced_index(e, d);
        let scaled = cross_section::scale(&values, a, &index);
        for rows in index.date_groups() {
            let raw: f64 = rows.iter().map(|r| values[*r]).filter(|v| !v.is_nan()).map(f64::abs).sum();
            let got: f64 = rows.iter().map(|r| scaled[*r]).filter(|v| !v.is_nan()).map(f64::abs).sum();
            if raw > 0.0 {
                prop_assert!((got - a).abs() < 1e-9 * a.max(1.0));
            } else {
                prop_assert!(rows.iter().all(|r| scaled[*r].is_nan()));
            }
        }
    }
}

// ── 4. decay_linear ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn decay_linear_of_constant(c in -100.0..100.0_f64, days in 1usize..40, w in arb_window()) {
        let index = balanced_index(2, days);
        let values = vec![c; 2 * days];
        let out = time_series::decay_linear(&values, w, &index);
        for v in out.iter().filter(|v| !v.is_nan()) {
            prop_assert!((v - c).abs() < 1e-9);
        }
    }
}

// ── 5. rolling bounds ────────────────────────────────────────────────

proptest! {
    #[test]
    fn rolling_stats_within_bounds((e, d, values) in arb_panel(), w in arb_window()) {
        let index = balanced_index(e, d);
        let lo = time_series::ts_min(&values, w, &index);
        let hi = time_series::ts_max(&values, w, &index);
        let avg = time_series::decay_linear(&values, w, &index);
        let pct = time_series::ts_rank(&values, w, &index);
        for row in 0..values.len() {
            if lo[row].is_nan() {
                prop_assert!(hi[row].is_nan());
                continue;
            }
            prop_assert!(lo[row] <= hi[row]);
            if !avg[row].is_nan() {
                prop_assert!(avg[row] >= lo[row] - 1e-9 && avg[row] <= hi[row] + 1e-9);
            }
            if !pct[row].is_nan() {
                prop_assert!(pct[row] > 0.0 && pct[row] <= 1.0);
            }
        }
    }
}

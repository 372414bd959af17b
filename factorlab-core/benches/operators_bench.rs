//! Criterion benchmarks for FactorLab hot paths.
//!
//! Benchmarks:
//! 1. Rolling time-series operators over a multi-entity panel
//! 2. Cross-sectional operators
//! 3. Full formula compile + evaluate
//! 4. Boosted-tree fit on a single feature

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use factorlab_core::operators::{cross_section, time_series};
use factorlab_core::{evaluate, BoostedTrees, GbmParams, OperatorRegistry, SyntheticPanel};

// ── 1. Time-series operators ─────────────────────────────────────────

fn bench_time_series(c: &mut Criterion) {
    let mut group = c.benchmark_group("time_series");

    for &days in &[252, 1260] {
        let panel = SyntheticPanel::new(20, days).build().unwrap();
        let close = panel.column("close").unwrap().to_vec();
        let volume = panel.column("volume").unwrap().to_vec();
        let index = panel.index().clone();

        group.bench_with_input(BenchmarkId::new("ts_rank_10", days), &days, |b, _| {
            b.iter(|| time_series::ts_rank(black_box(&close), 10, black_box(&index)));
        });
        group.bench_with_input(BenchmarkId::new("decay_linear_20", days), &days, |b, _| {
            b.iter(|| time_series::decay_linear(black_box(&close), 20, black_box(&index)));
        });
        group.bench_with_input(BenchmarkId::new("correlation_10", days), &days, |b, _| {
            b.iter(|| {
                time_series::correlation(black_box(&close), black_box(&volume), 10, &index)
            });
        });
    }

    group.finish();
}

// ── 2. Cross-sectional operators ─────────────────────────────────────

fn bench_cross_section(c: &mut Criterion) {
    let mut group = c.benchmark_group("cross_section");
    let panel = SyntheticPanel::new(100, 252).build().unwrap();
    let close = panel.column("close").unwrap().to_vec();
    let index = panel.index().clone();

    group.bench_function("rank_100x252", |b| {
        b.iter(|| cross_section::rank(black_box(&close), black_box(&index)));
    });
    group.bench_function("scale_100x252", |b| {
        b.iter(|| cross_section::scale(black_box(&close), 1.0, black_box(&index)));
    });

    group.finish();
}

// ── 3. Formula evaluation ────────────────────────────────────────────

fn bench_formula(c: &mut Criterion) {
    let mut group = c.benchmark_group("formula");
    let panel = SyntheticPanel::new(20, 1260).build().unwrap();
    let reg = OperatorRegistry::standard();

    for formula in [
        "rank(delta(close, 5))",
        "-1 * correlation(rank(open), rank(volume), 10)",
        "ts_rank(decay_linear(close / delay(close, 1) - 1, 10), 20)",
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(formula), &formula, |b, f| {
            b.iter(|| evaluate(black_box(f), &panel.scope(), &reg));
        });
    }

    group.finish();
}

// ── 4. Model fit ─────────────────────────────────────────────────────

fn bench_gbm_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("gbm_fit");
    group.sample_size(20);

    for &n in &[1_000usize, 10_000] {
        let x: Vec<f64> = (0..n).map(|i| ((i * 7919) % 1013) as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| (v / 100.0).sin()).collect();
        let params = GbmParams::default();
        group.bench_with_input(BenchmarkId::new("default_params", n), &n, |b, _| {
            b.iter(|| BoostedTrees::fit(black_box(&x), black_box(&y), &params, None));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_time_series,
    bench_cross_section,
    bench_formula,
    bench_gbm_fit,
);
criterion_main!(benches);

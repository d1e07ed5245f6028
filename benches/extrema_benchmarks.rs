//! Benchmarks for the extrema-finding pipeline
//!
//! Compares performance of:
//! - Peak detection with prominence and width filters
//! - The bounded trend fit
//! - A full maxima run, with and without refinement

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use gwecc_extrema::peaks::{find_peaks, PeakOptions};
use gwecc_extrema::{find_extrema, EccentricInspiral, ExtremaConfig, GlobalFitSetup, Polarity};
use std::f64::consts::PI;

/// Generate a sine wave with deterministic jitter
fn generate_jittered_sine(m: usize, cycles: f64) -> Vec<f64> {
    (0..m)
        .map(|i| {
            let t = i as f64 / m as f64;
            (2.0 * PI * cycles * t).sin() + 0.05 * (17.3 * i as f64).sin()
        })
        .collect()
}

fn inspiral(t_start: f64) -> EccentricInspiral {
    EccentricInspiral {
        t_start,
        ..Default::default()
    }
}

/// Benchmark peak detection with different signal lengths
fn bench_find_peaks(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_peaks");
    let options = PeakOptions {
        prominence: Some(0.5),
        width: Some(5.0),
        ..Default::default()
    };

    for size in [1_000, 10_000, 100_000].iter() {
        let data = generate_jittered_sine(*size, 20.0);
        group.bench_with_input(BenchmarkId::new("jittered_sine", size), size, |b, _| {
            b.iter(|| find_peaks(black_box(&data), black_box(&options)))
        });
    }

    group.finish();
}

/// Benchmark the global trend fit
fn bench_trend_fit(c: &mut Criterion) {
    let sim = inspiral(-3000.0).generate().unwrap();
    let series = sim.series().unwrap();
    let setup = GlobalFitSetup::from_series(&series, 10.0).unwrap();
    let t = &series.t()[..setup.idx_end];
    let omega = &series.omega()[..setup.idx_end];

    c.bench_function("trend_fit_global", |b| {
        b.iter(|| {
            setup
                .model
                .fit(
                    black_box(t),
                    black_box(omega),
                    &setup.initial,
                    &setup.bounds,
                    10_000,
                )
                .unwrap()
        })
    });
}

/// Benchmark full maxima runs on inspirals of different lengths
fn bench_find_extrema(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_extrema");
    group.sample_size(10);

    for t_start in [-2000.0, -3000.0, -5000.0] {
        let sim = inspiral(t_start).generate().unwrap();
        let series = sim.series().unwrap();
        let plain = ExtremaConfig::default();
        let refined = ExtremaConfig {
            refine_extrema: true,
            ..Default::default()
        };

        group.bench_with_input(BenchmarkId::new("grid", -t_start), &t_start, |b, _| {
            b.iter(|| find_extrema(black_box(&series), Polarity::Maxima, &plain).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("refined", -t_start), &t_start, |b, _| {
            b.iter(|| find_extrema(black_box(&series), Polarity::Maxima, &refined).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_find_peaks, bench_trend_fit, bench_find_extrema);

criterion_main!(benches);

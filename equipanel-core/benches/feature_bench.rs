//! Criterion benchmarks for the panel hot paths.
//!
//! Benchmarks:
//! 1. Full build (join, clean, features) on synthetic sources
//! 2. Feature engine alone, sequential vs rayon per entity
//! 3. Indicator batch over one long series

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use equipanel_core::clean::clean_panel;
use equipanel_core::features::engineer_features;
use equipanel_core::indicators::{Atr, Bollinger, Indicator, Macd, PriceSeries, Rsi};
use equipanel_core::join::join_sources;
use equipanel_core::synthetic::{generate_sources, SyntheticSpec};
use equipanel_core::{build_panel, PipelineConfig};

fn spec(entities: usize) -> SyntheticSpec {
    SyntheticSpec {
        entities,
        days: 730,
        ..SyntheticSpec::default()
    }
}

fn bench_build_panel(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_panel");
    let config = PipelineConfig::default();
    for entities in [10, 50] {
        let sources = generate_sources(&spec(entities)).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(entities), &sources, |b, sources| {
            b.iter(|| build_panel(black_box(sources), &config).unwrap())
        });
    }
    group.finish();
}

fn bench_features(c: &mut Criterion) {
    let mut group = c.benchmark_group("engineer_features");
    let sources = generate_sources(&spec(50)).unwrap();
    let base = PipelineConfig::default();
    let (joined, _) = join_sources(&sources, &base).unwrap();
    let (cleaned, _) = clean_panel(joined, &base).unwrap();

    for parallel in [false, true] {
        let mut config = base.clone();
        config.features.parallel = parallel;
        let label = if parallel { "rayon" } else { "sequential" };
        group.bench_function(label, |b| {
            b.iter(|| engineer_features(black_box(cleaned.clone()), &config).unwrap())
        });
    }
    group.finish();
}

fn bench_indicators(c: &mut Criterion) {
    let close: Vec<f64> = (0..5_000)
        .map(|i| 100.0 + (i as f64 * 0.1).sin() * 10.0)
        .collect();
    let high: Vec<f64> = close.iter().map(|c| c + 1.5).collect();
    let low: Vec<f64> = close.iter().map(|c| c - 1.5).collect();
    let series = PriceSeries::new(&high, &low, &close);

    let batch: Vec<Box<dyn Indicator>> = vec![
        Box::new(Rsi::new(14)),
        Box::new(Bollinger::upper(5, 2.0)),
        Box::new(Bollinger::lower(5, 2.0)),
        Box::new(Atr::new(14)),
        Box::new(Macd::new(12, 26, 9)),
    ];
    c.bench_function("indicator_batch_5000", |b| {
        b.iter(|| {
            for indicator in &batch {
                black_box(indicator.compute(black_box(&series)));
            }
        })
    });
}

criterion_group!(benches, bench_build_panel, bench_features, bench_indicators);
criterion_main!(benches);

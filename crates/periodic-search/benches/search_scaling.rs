//! Periodic search cost versus baseline length
//!
//! Past the segment ceiling the cost should grow roughly linearly with the
//! observed span.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use periodic_search::{Budget, PeriodicSearch, SearchConfig};

fn light_curve(baseline_days: f64) -> (Vec<f64>, Vec<f64>) {
    let cadence = 1.0 / 48.0;
    let n = (baseline_days / cadence) as usize;
    let time: Vec<f64> = (0..n).map(|i| i as f64 * cadence).collect();
    let flux = time
        .iter()
        .enumerate()
        .map(|(i, t)| {
            let dip = if (t % 4.3) < 0.15 { 0.004 } else { 0.0 };
            1.0 - dip + 0.001 * ((i as f64 * 12.9898).sin() * 43758.5453).fract()
        })
        .collect();
    (time, flux)
}

fn bench_search_scaling(c: &mut Criterion) {
    let engine = PeriodicSearch::new(SearchConfig {
        max_segment_days: 60.0,
        max_period_days: 20.0,
        ..SearchConfig::default()
    });

    let mut group = c.benchmark_group("periodic_search_baseline");
    group.sample_size(10);
    for baseline in [120.0, 240.0, 480.0] {
        let (time, flux) = light_curve(baseline);
        group.throughput(Throughput::Elements(time.len() as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(baseline as u64),
            &(time, flux),
            |b, (time, flux)| {
                b.iter(|| engine.run(black_box(time), black_box(flux), None, &Budget::Unbounded))
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_search_scaling);
criterion_main!(benches);

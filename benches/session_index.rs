//! Benchmarks for session lookup and inertial segmentation
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use datacollect_rs::raw::InertialSeries;
use datacollect_rs::session::SessionIndex;
use datacollect_rs::types::TimeRange;

/// Back-to-back 20 minute sessions with a 5 minute break
fn windows(count: usize) -> Vec<TimeRange> {
    (0..count as i64)
        .map(|i| {
            let start = i * 25 * 60_000;
            TimeRange::new(start, start + 20 * 60_000)
        })
        .collect()
}

fn bench_unique_overlap(c: &mut Criterion) {
    let mut group = c.benchmark_group("unique_overlap");

    for count in [100usize, 1_000, 10_000] {
        let index = SessionIndex::new(windows(count));
        let span = count as i64 * 25 * 60_000;
        let queries: Vec<TimeRange> = (0..1_000i64)
            .map(|i| {
                let start = (i * 7_919 * 1_000) % span;
                TimeRange::new(start, start + 60_000)
            })
            .collect();

        group.throughput(Throughput::Elements(queries.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &queries, |b, queries| {
            b.iter(|| {
                for query in queries {
                    black_box(index.unique_overlap(*query));
                }
            })
        });
    }

    group.finish();
}

fn bench_segments(c: &mut Criterion) {
    let mut group = c.benchmark_group("segments");

    for samples in [10_000usize, 100_000] {
        // 50 Hz with a 5 s gap every 30 000 samples
        let timestamps: Vec<i64> = (0..samples as i64)
            .map(|i| i * 20 + (i / 30_000) * 5_000)
            .collect();
        let series = InertialSeries {
            columns: vec!["acc_x".to_string()],
            values: timestamps.iter().map(|&t| vec![t as f64]).collect(),
            timestamps,
        };

        group.throughput(Throughput::Elements(samples as u64));
        group.bench_with_input(BenchmarkId::from_parameter(samples), &series, |b, series| {
            b.iter(|| black_box(series.segments(1_000, 10_000)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_unique_overlap, bench_segments);
criterion_main!(benches);

use beamdrift::beam::Beam;
use beamdrift::profile::histogram::histogram;
use beamdrift::test_utils::{gaussian_beam, lhc_rf, lhc_ring};
use beamdrift::tracker::{ParticleSelection, RingAndRfSection, Solver, TrackerOptions};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

fn tracker_with(solver: Solver, periodicity: bool) -> RingAndRfSection {
    let ring = lhc_ring(1_000_000);
    let rf = lhc_rf(&ring, 6e6);
    let options = TrackerOptions {
        solver,
        periodicity,
        ..TrackerOptions::default()
    };
    RingAndRfSection::new(rf, options).expect("valid tracker options")
}

fn bunch(count: usize, seed: u64) -> Beam {
    let ring = lhc_ring(1);
    gaussian_beam(&lhc_rf(&ring, 6e6), count, 0.25e-9, seed)
}

// =============================================================================
// Kick and Drift Benchmarks
// =============================================================================

fn bench_kick_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("kick_scaling");
    let tracker = tracker_with(Solver::Simple, false);

    for &count in &[1_000, 10_000, 100_000, 1_000_000] {
        let mut beam = bunch(count, 42);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("particles", count), &count, |b, _| {
            b.iter(|| {
                tracker.kick(black_box(&mut beam), &ParticleSelection::All, 0);
            });
        });
    }

    group.finish();
}

fn bench_drift_solvers(c: &mut Criterion) {
    let mut group = c.benchmark_group("drift_solvers");
    let count = 100_000;

    for solver in [Solver::Simple, Solver::Full] {
        let tracker = tracker_with(solver, false);
        let mut beam = bunch(count, 42);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new(solver.name(), count), &count, |b, _| {
            b.iter(|| {
                tracker.drift(black_box(&mut beam), &ParticleSelection::All, 1);
            });
        });
    }

    group.finish();
}

// =============================================================================
// Full Turn Benchmarks
// =============================================================================

fn bench_turn(c: &mut Criterion) {
    let mut group = c.benchmark_group("turn");
    let count = 100_000;

    for periodicity in [false, true] {
        let mut tracker = tracker_with(Solver::Simple, periodicity);
        let mut beam = bunch(count, 7);
        let label = if periodicity { "periodic" } else { "plain" };
        group.throughput(Throughput::Elements(count as u64));
        group.bench_function(label, |b| {
            b.iter(|| {
                tracker.track(black_box(&mut beam)).expect("turn within programme");
            });
        });
    }

    group.finish();
}

// =============================================================================
// Histogram Benchmarks
// =============================================================================

fn bench_histogram_workers(c: &mut Criterion) {
    let mut group = c.benchmark_group("histogram_workers");
    let count = 1_000_000;
    let beam = bunch(count, 3);
    let t_rf = 2.5e-9;

    for &workers in &[1, 2, 4, 8] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("workers", workers), &workers, |b, &workers| {
            b.iter(|| {
                let counts = histogram(black_box(&beam.dt), &beam.id, 0.0, t_rf, 512, workers);
                black_box(counts);
            });
        });
    }

    group.finish();
}

criterion_group!(kernels, bench_kick_scaling, bench_drift_solvers);
criterion_group!(turns, bench_turn);
criterion_group!(profiles, bench_histogram_workers);

criterion_main!(kernels, turns, profiles);

use beamdrift::fft::FftContext;
use beamdrift::impedance::{
    ConvolutionMethod, FreqOptions, ImpedanceSource, InducedVoltageFreq, InducedVoltageModel, InducedVoltageTime,
    Resonators,
};
use beamdrift::math::convolve_full;
use beamdrift::test_utils::{bucket_profile, gaussian_beam, lhc_rf, lhc_ring};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::hint::black_box;

fn resonator() -> ImpedanceSource {
    Resonators::new(vec![1e5, 3e4], vec![1.2e9, 2.5e9], vec![5.0, 1.0])
        .expect("valid resonators")
        .into()
}

fn random_signal(len: usize, seed: u64) -> Vec<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..len).map(|_| rng.random_range(-1.0..1.0)).collect()
}

// =============================================================================
// Convolution Benchmarks
// =============================================================================

fn bench_convolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("convolution");

    for &len in &[64, 256, 1024, 4096] {
        let a = random_signal(len, 1);
        let b = random_signal(len, 2);
        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::new("direct", len), &len, |bench, _| {
            bench.iter(|| black_box(convolve_full(black_box(&a), black_box(&b))));
        });
        let mut fft = FftContext::new();
        group.bench_with_input(BenchmarkId::new("fft", len), &len, |bench, _| {
            bench.iter(|| {
                let out = fft
                    .convolve(black_box(&a), black_box(&b), 2 * len - 1)
                    .expect("matching lengths");
                black_box(out);
            });
        });
    }

    group.finish();
}

// =============================================================================
// Induced Voltage Engine Benchmarks
// =============================================================================

fn bench_engines(c: &mut Criterion) {
    let mut group = c.benchmark_group("induced_voltage");
    let ring = lhc_ring(10);
    let rf = lhc_rf(&ring, 6e6);
    let beam = gaussian_beam(&rf, 100_000, 0.25e-9, 42);

    for &n_slices in &[128, 512, 2048] {
        let profile = bucket_profile(&beam, &rf, n_slices);
        group.throughput(Throughput::Elements(n_slices as u64));

        let mut time = InducedVoltageTime::new(&ring, &profile, vec![resonator()], ConvolutionMethod::Fft)
            .expect("valid engine");
        group.bench_with_input(BenchmarkId::new("time_fft", n_slices), &n_slices, |b, _| {
            b.iter(|| {
                black_box(time.induced_voltage_generation(&beam, &profile, 0).expect("fresh grid"));
            });
        });

        let mut freq = InducedVoltageFreq::new(&ring, &profile, vec![resonator()], FreqOptions::default())
            .expect("valid engine");
        group.bench_with_input(BenchmarkId::new("frequency", n_slices), &n_slices, |b, _| {
            b.iter(|| {
                black_box(freq.induced_voltage_generation(&beam, &profile, 0).expect("fresh grid"));
            });
        });
    }

    group.finish();
}

fn bench_multi_turn_memory(c: &mut Criterion) {
    let mut group = c.benchmark_group("multi_turn_memory");
    let ring = lhc_ring(10);
    let rf = lhc_rf(&ring, 6e6);
    let beam = gaussian_beam(&rf, 100_000, 0.25e-9, 42);
    let profile = bucket_profile(&beam, &rf, 256);

    for &turns in &[1, 4, 16] {
        let options = FreqOptions {
            multi_turn_memory: Some(turns),
            ..FreqOptions::default()
        };
        let mut engine =
            InducedVoltageFreq::new(&ring, &profile, vec![resonator()], options).expect("valid engine");
        let mut turn = 0;
        group.bench_with_input(BenchmarkId::new("turns", turns), &turns, |b, _| {
            b.iter(|| {
                // a new turn each iteration so the memory shift is measured
                turn = (turn + 1) % 10;
                engine.set_turn(turn);
                black_box(engine.induced_voltage_generation(&beam, &profile, 0).expect("fresh grid"));
            });
        });
    }

    group.finish();
}

criterion_group!(kernels, bench_convolution);
criterion_group!(engines, bench_engines, bench_multi_turn_memory);

criterion_main!(kernels, engines);

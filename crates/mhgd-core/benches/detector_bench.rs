//! Detector Benchmarks
//!
//! Compares parallel vs sequential chain execution and the two inversion
//! methods.
//!
//! Run with: cargo bench -p mhgd-core --bench detector_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use std::time::Duration;

use mhgd_core::inverse::{invert_hermitian, InverseOptions};
use mhgd_core::prelude::*;

fn rayleigh(nt: usize, rng: &mut StdRng) -> CMatrix {
    let scale = std::f64::consts::FRAC_1_SQRT_2;
    let data = (0..nt * nt)
        .map(|_| {
            let re: f64 = rng.sample(StandardNormal);
            let im: f64 = rng.sample(StandardNormal);
            Complex64::new(re * scale, im * scale)
        })
        .collect();
    CMatrix::new(nt, nt, data).expect("square data")
}

/// Benchmark one detection: sequential vs parallel chains
fn bench_detection(c: &mut Criterion) {
    let mut group = c.benchmark_group("detection");
    group.measurement_time(Duration::from_secs(10));

    for &nt in [4usize, 8, 16].iter() {
        let mut rng = StdRng::seed_from_u64(nt as u64);
        let base = DetectorConfig {
            num_antennas: nt,
            modulation: Modulation::Qam16,
            samplers: 8,
            ..Default::default()
        };
        let constellation = Constellation::new(base.modulation);
        let h = rayleigh(nt, &mut rng);
        let x: Vec<Complex64> = (0..nt)
            .map(|_| constellation.point(rng.gen_range(0..constellation.len())))
            .collect();
        let y = h.mat_vec_mul(&x);
        let seeds: Vec<ChainSeed> = (0..base.samplers as u32).collect();
        let tables: Vec<PerturbationTable> = seeds
            .iter()
            .map(|&s| PerturbationTable::generate(u64::from(s), base.perturbation_len()))
            .collect();

        group.throughput(Throughput::Elements(base.samplers as u64));

        for mode in [ExecutionMode::Sequential, ExecutionMode::Parallel] {
            let mut detector = MhgdDetector::new(DetectorConfig {
                execution: mode,
                ..base.clone()
            })
            .expect("valid config");
            let label = format!("{mode:?}").to_lowercase();
            group.bench_with_input(BenchmarkId::new(label, nt), &nt, |b, _| {
                b.iter(|| {
                    detector
                        .detect(black_box(&h), black_box(&y), 0.05, &seeds, &tables)
                        .expect("detection")
                })
            });
        }
    }

    group.finish();
}

/// Benchmark LDL vs Cholesky on a regularized Gram matrix
fn bench_inversion(c: &mut Criterion) {
    let mut group = c.benchmark_group("inversion");

    for &nt in [4usize, 8, 16, 32].iter() {
        let mut rng = StdRng::seed_from_u64(100 + nt as u64);
        let mut gram = rayleigh(nt, &mut rng).gram();
        gram.add_diagonal(0.1);

        for method in [InversionMethod::Ldl, InversionMethod::Cholesky] {
            let opts = InverseOptions::with_method(method);
            let label = format!("{method:?}").to_lowercase();
            group.bench_with_input(BenchmarkId::new(label, nt), &gram, |b, a| {
                b.iter(|| invert_hermitian(black_box(a), &opts).expect("invertible"))
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_detection, bench_inversion);
criterion_main!(benches);

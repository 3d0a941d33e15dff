//! Block codec throughput.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use esplog_core::{
    compress_block, decompress_block, FixedQuat, PrecisionProfile, PredictorState, RotationVector,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn motion(n: usize, jitter: f64) -> Vec<FixedQuat> {
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let mut q = FixedQuat::IDENTITY;
    (0..n)
        .map(|_| {
            let step = RotationVector::from_f64(
                0.01 + rng.gen_range(-jitter..=jitter),
                0.005 + rng.gen_range(-jitter..=jitter),
                rng.gen_range(-jitter..=jitter),
            );
            q = (q * FixedQuat::from_rotation_vector(step)).normalized();
            q
        })
        .collect()
}

fn bench_compress(c: &mut Criterion) {
    let mut group = c.benchmark_group("compress_block");
    for &(name, jitter, profile) in &[
        ("smooth", 0.0, PrecisionProfile::PREFERRED),
        ("jittered", 0.004, PrecisionProfile::FALLBACK),
    ] {
        let samples = motion(256, jitter);
        let mut out = vec![0u8; 8192];
        let mut scratch = vec![0i8; 3 * samples.len()];
        group.throughput(Throughput::Elements(samples.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), &samples, |b, samples| {
            b.iter(|| {
                compress_block(
                    &PredictorState::new(),
                    black_box(samples),
                    profile,
                    &mut out,
                    &mut scratch,
                )
                .unwrap()
            })
        });
    }
    group.finish();
}

fn bench_decompress(c: &mut Criterion) {
    let samples = motion(256, 0.004);
    let mut payload = vec![0u8; 8192];
    let mut scratch = vec![0i8; 3 * samples.len()];
    let block = compress_block(
        &PredictorState::new(),
        &samples,
        PrecisionProfile::FALLBACK,
        &mut payload,
        &mut scratch,
    )
    .unwrap();
    let payload = &payload[..block.bytes_written];
    let mut decoded = vec![FixedQuat::IDENTITY; samples.len()];

    let mut group = c.benchmark_group("decompress_block");
    group.throughput(Throughput::Elements(samples.len() as u64));
    group.bench_function("jittered", |b| {
        b.iter(|| decompress_block(&PredictorState::new(), black_box(payload), &mut decoded).unwrap())
    });
    group.finish();
}

criterion_group!(benches, bench_compress, bench_decompress);
criterion_main!(benches);

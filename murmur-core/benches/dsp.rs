use criterion::{black_box, criterion_group, criterion_main, Criterion};
use murmur_core::prelude::*;

const SR: f32 = 48_000.0;
const N: usize = 48_000;

fn bench_filters(c: &mut Criterion) {
    let noise = white(N, &mut Mulberry32::new(1));
    c.bench_function("svf_multi_lp_3x_1s", |b| {
        b.iter(|| svf_multi(black_box(&noise), 400.0, 0.6, SvfMode::Lowpass, 3, SR))
    });
    c.bench_function("reverb_1s", |b| b.iter(|| reverb(black_box(&noise), 0.8, 0.6, SR)));
}

fn bench_generators(c: &mut Criterion) {
    c.bench_function("pink_1s", |b| b.iter(|| pink(N, &mut Mulberry32::new(2), 3)));
    c.bench_function("aperiodic_1s", |b| {
        b.iter(|| aperiodic(N, 0.07, 0.6, 0.4, 1, &mut Mulberry32::new(3), SR))
    });
    c.bench_function("sine_fm_1s", |b| b.iter(|| sine(N, 55.0, 0.5, 0.01, 0.2, 0.0, SR)));
}

criterion_group!(benches, bench_filters, bench_generators);
criterion_main!(benches);

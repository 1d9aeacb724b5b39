use criterion::{black_box, criterion_group, criterion_main, Criterion};
use reelcast::encoding::rgba_to_yuv420;

fn bench_rgba_to_yuv420(c: &mut Criterion) {
    let rgba_720p = vec![128u8; 1280 * 720 * 4];
    c.bench_function("rgba_to_yuv420_720p", |b| {
        b.iter(|| rgba_to_yuv420(black_box(&rgba_720p), 1280, 720))
    });

    let rgba_1080p = vec![128u8; 1920 * 1080 * 4];
    c.bench_function("rgba_to_yuv420_1080p", |b| {
        b.iter(|| rgba_to_yuv420(black_box(&rgba_1080p), 1920, 1080))
    });
}

criterion_group!(benches, bench_rgba_to_yuv420);
criterion_main!(benches);

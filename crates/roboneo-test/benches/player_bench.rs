//! Benchmarks for expression playback

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use roboneo_anim::{Animation, FrameTiming, MemorySource};
use roboneo_core::{FrameBuffer, Rgb, Timestamp};

fn frames(n: usize) -> Vec<FrameBuffer> {
    (0..n)
        .map(|i| FrameBuffer::filled(Rgb::new(i as u8, 0, 0)))
        .collect()
}

fn load(cache_limit: usize) -> Animation {
    let source = MemorySource::from_frames("bench", &frames(24), FrameTiming::Fps(24.0));
    Animation::load(Box::new(source), cache_limit).unwrap()
}

fn bench_cached_advance(c: &mut Criterion) {
    let mut anim = load(128);
    anim.start(Timestamp::ZERO);
    let mut now = Timestamp::ZERO;

    c.bench_function("cached_advance", |b| {
        b.iter(|| {
            now = now.saturating_add(Duration::from_millis(42));
            black_box(anim.get_frame(now).is_ok())
        })
    });
}

fn bench_streaming_advance(c: &mut Criterion) {
    let mut anim = load(1);
    anim.start(Timestamp::ZERO);
    let mut now = Timestamp::ZERO;

    c.bench_function("streaming_advance", |b| {
        b.iter(|| {
            now = now.saturating_add(Duration::from_millis(42));
            black_box(anim.get_frame(now).is_ok())
        })
    });
}

fn bench_idle_poll(c: &mut Criterion) {
    let mut anim = load(128);
    anim.start(Timestamp::ZERO);

    c.bench_function("idle_poll", |b| {
        b.iter(|| black_box(anim.get_frame(black_box(Timestamp::ZERO)).is_ok()))
    });
}

criterion_group!(benches, bench_cached_advance, bench_streaming_advance, bench_idle_poll);
criterion_main!(benches);

//! Benchmarks for the Pixvault image pipeline.
//!
//! Run with: cargo bench -p pixvault-core

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{DynamicImage, Rgb, RgbImage};
use pixvault_core::config::ThumbnailConfig;
use pixvault_core::pipeline::{edit, Hasher, ThumbnailSynthesizer};
use pixvault_core::{CropRequest, HueRequest};

fn gradient(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    }))
}

fn benchmark_content_digest(c: &mut Criterion) {
    let data = vec![0xA5u8; 4 * 1024 * 1024];

    c.bench_function("content_digest_4mb", |b| {
        b.iter(|| Hasher::content_hash_from_bytes(black_box(&data)))
    });
}

fn benchmark_thumbnail(c: &mut Criterion) {
    let img = gradient(1920, 1080);
    let synthesizer = ThumbnailSynthesizer::new(ThumbnailConfig::default()).unwrap();

    c.bench_function("thumbnail_jpeg_100px", |b| {
        b.iter(|| synthesizer.synthesize(black_box(&img)))
    });

    let tight = ThumbnailSynthesizer::new(ThumbnailConfig {
        max_edge: 400,
        max_bytes: 4_096,
        ..ThumbnailConfig::default()
    })
    .unwrap();
    c.bench_function("thumbnail_jpeg_quality_loop", |b| {
        b.iter(|| tight.synthesize(black_box(&img)))
    });
}

fn benchmark_hue_shift(c: &mut Criterion) {
    let img = gradient(1024, 768);
    let request = HueRequest { delta: 45.0 };

    c.bench_function("hue_shift_1024x768", |b| {
        b.iter(|| edit::apply_hue(black_box(&img), &request))
    });
}

fn benchmark_crop(c: &mut Criterion) {
    let img = gradient(1920, 1080);
    let request = CropRequest {
        top: 10.0,
        bottom: 10.0,
        left: 20.0,
        right: 5.0,
    };

    c.bench_function("crop_1920x1080", |b| {
        b.iter(|| edit::apply_crop(black_box(&img), &request))
    });
}

criterion_group!(
    benches,
    benchmark_content_digest,
    benchmark_thumbnail,
    benchmark_hue_shift,
    benchmark_crop,
);
criterion_main!(benches);

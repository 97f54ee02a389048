// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for document processing in the sortierwerk-document
// crate. Benchmarks the page-image hot path: downscale plus JPEG
// re-encoding, the work every refined image and flattened page goes through.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use image::{DynamicImage, Rgb, RgbImage};

use sortierwerk_document::ImageProcessor;
use sortierwerk_document::image::processor::REFINED_JPEG_QUALITY;

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// Build a synthetic "scanned page": light background with darker line
/// bands, enough structure that JPEG encoding does realistic work.
fn synthetic_page(width: u32, height: u32) -> DynamicImage {
    let mut img = RgbImage::from_pixel(width, height, Rgb([235u8, 235, 230]));
    for y in (40..height.saturating_sub(40)).step_by(28) {
        for dy in 0..12 {
            for x in 60..width.saturating_sub(60) {
                img.put_pixel(x, y + dy, Rgb([40u8, 40, 45]));
            }
        }
    }
    DynamicImage::ImageRgb8(img)
}

/// Benchmark the downscale-and-encode path on a 2480x3508 page (A4 at
/// 300 DPI) shrunk to the default 1920px redistribution width.
fn bench_shrink_and_encode(c: &mut Criterion) {
    let page = synthetic_page(2480, 3508);

    c.bench_function("shrink_to_width + jpeg (A4 @ 300dpi)", |b| {
        b.iter(|| {
            let processor = ImageProcessor::from_dynamic(black_box(page.clone()));
            let bytes = processor
                .shrink_to_width(1920)
                .to_jpeg_bytes(REFINED_JPEG_QUALITY)
                .expect("JPEG encoding");
            black_box(bytes);
        });
    });
}

criterion_group!(benches, bench_shrink_and_encode);
criterion_main!(benches);

// Preprocessing benchmark - full get_pixel_data pipeline and its stages
//
// Run with: cargo bench --bench preprocessing_benchmark

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{ImageBuffer, Rgba, RgbaImage};
use vision_utils_common::{ColorFormat, DataLayout, PixelBuffer};
use vision_utils_preprocess::{
    color, get_pixel_data, hwc_to_chw, plan, NormalizationPreset, NormalizationSpec, Normalizer,
    PixelDataOptions, ResizeOptions,
};

fn test_image(width: u32, height: u32) -> RgbaImage {
    ImageBuffer::from_fn(width, height, |x, y| {
        Rgba([
            ((x + y) % 256) as u8,
            ((x * 2) % 256) as u8,
            ((y * 2) % 256) as u8,
            255,
        ])
    })
}

/// Letterbox to a square YOLO input, ImageNet-normalized NCHW
fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    let source = test_image(1920, 1080);

    // 224x224 (classification), 640x640 (YOLO), 1280x1280 (large)
    for (size, name) in [(224, "224x224"), (640, "640x640"), (1280, "1280x1280")] {
        let options = PixelDataOptions::default()
            .with_resize(ResizeOptions::letterbox(size))
            .with_normalization(NormalizationSpec::preset(NormalizationPreset::Imagenet))
            .with_layout(DataLayout::Nchw);

        group.bench_with_input(BenchmarkId::new("letterbox_imagenet_nchw", name), &options, |b, opts| {
            b.iter(|| {
                let result = get_pixel_data(black_box(&source), opts).unwrap();
                black_box(result);
            });
        });
    }

    group.finish();
}

/// Stages in isolation at 640x640
fn bench_stages(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline_stages");
    let input_size = 640u32;
    let image = test_image(input_size, input_size);
    let buffer = PixelBuffer::from_rgba_image(image).unwrap();

    group.bench_function("plan_letterbox", |b| {
        let options = ResizeOptions::letterbox(input_size).with_stride(32);
        b.iter(|| black_box(plan(1920, 1080, black_box(&options)).unwrap()));
    });

    for format in [ColorFormat::Rgb, ColorFormat::Hsv, ColorFormat::Lab] {
        group.bench_with_input(BenchmarkId::new("color", format), &format, |b, f| {
            b.iter(|| black_box(color::convert(black_box(&buffer), *f).unwrap()));
        });
    }

    let rgb = color::convert(&buffer, ColorFormat::Rgb).unwrap();
    let normalizer = Normalizer::new(&NormalizationSpec::preset(NormalizationPreset::Imagenet)).unwrap();
    group.bench_function("normalize_imagenet", |b| {
        b.iter(|| black_box(normalizer.normalize(black_box(rgb.data()), 3).unwrap()));
    });

    let normalized = normalizer.normalize(rgb.data(), 3).unwrap();
    group.bench_function("hwc_to_chw", |b| {
        b.iter(|| {
            let n = input_size as usize;
            black_box(hwc_to_chw(black_box(&normalized), n, n, 3).unwrap())
        });
    });

    group.finish();
}

criterion_group!(benches, bench_pipeline, bench_stages);
criterion_main!(benches);

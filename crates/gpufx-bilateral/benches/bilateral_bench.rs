//! Benchmarks for the bilateral filter on the CPU backend.
//!
//! Run with: `cargo bench -p gpufx-bilateral`

use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use gpufx_bilateral::{BilateralGaussianFilter, bilateral_reference};
use gpufx_compute::{ComputeContext, CpuContext};

fn image(w: u32, h: u32, c: u32) -> Vec<f32> {
    (0..w * h * c).map(|i| ((i * 7919) % 997) as f32 / 997.0).collect()
}

/// Radius sweep at a fixed image size.
fn bench_radius(c: &mut Criterion) {
    let ctx = Arc::new(CpuContext::new());
    let Ok(device) = ctx.default_device() else { return };
    let (w, h) = (256u32, 256u32);
    let data = image(w, h, 3);

    let mut group = c.benchmark_group("bilateral_radius");
    group.throughput(Throughput::Elements((w * h) as u64));

    for radius in [1u32, 3, 7] {
        let mut filter = BilateralGaussianFilter::new(ctx.clone());
        if filter.set_radius(radius).is_err() || filter.set_scalar(0.1).is_err() || filter.compile().is_err() {
            continue;
        }
        let Ok(src) = ctx.upload(&device, &data, w, h, 3) else { continue };
        let Ok(mut dst) = ctx.allocate(&device, w, h, 3) else { continue };

        group.bench_with_input(BenchmarkId::new("rgb_256", radius), &radius, |b, _| {
            b.iter(|| filter.compute(&device, black_box(&src), &mut dst))
        });
    }

    group.finish();
}

/// Image size sweep at radius 2, plus the f64 reference for scale.
fn bench_size(c: &mut Criterion) {
    let ctx = Arc::new(CpuContext::new());
    let Ok(device) = ctx.default_device() else { return };
    let mut filter = BilateralGaussianFilter::new(ctx.clone());
    if filter.set_radius(2).is_err() || filter.set_scalar(0.1).is_err() || filter.compile().is_err() {
        return;
    }

    let mut group = c.benchmark_group("bilateral_size");
    for size in [64u32, 256, 1024] {
        let data = image(size, size, 1);
        let Ok(src) = ctx.upload(&device, &data, size, size, 1) else { continue };
        let Ok(mut dst) = ctx.allocate(&device, size, size, 1) else { continue };

        group.throughput(Throughput::Elements((size * size) as u64));
        group.bench_with_input(BenchmarkId::new("kernel", size), &size, |b, _| {
            b.iter(|| filter.compute(&device, black_box(&src), &mut dst))
        });
        if size <= 256 {
            group.bench_with_input(BenchmarkId::new("reference_f64", size), &data, |b, d| {
                b.iter(|| bilateral_reference(black_box(d), size, size, 1, 2, 0.1))
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_radius, bench_size);
criterion_main!(benches);

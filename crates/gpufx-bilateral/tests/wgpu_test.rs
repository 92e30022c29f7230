//! GPU tests. Skipped when no adapter is present.

#![cfg(feature = "wgpu")]

use std::sync::Arc;

use gpufx_bilateral::{BilateralError, BilateralGaussianFilter, bilateral_reference};
use gpufx_compute::{ComputeContext, DispatchErrorCode, WgpuContext};

fn gpu() -> Option<Arc<WgpuContext>> {
    if !WgpuContext::is_available() {
        println!("no wgpu adapter, skipping");
        return None;
    }
    WgpuContext::new().ok().map(Arc::new)
}

#[test]
fn test_gpu_matches_reference() {
    let Some(ctx) = gpu() else { return };
    let device = ctx.device();

    let (w, h) = (37u32, 21u32);
    let data: Vec<f32> = (0..w * h * 3).map(|i| ((i * 7919) % 997) as f32 / 997.0).collect();

    let mut filter = BilateralGaussianFilter::new(ctx.clone());
    filter.set_radius(3).unwrap();
    filter.set_scalar(0.2).unwrap();
    filter.compile().unwrap();

    let src = ctx.upload(&device, &data, w, h, 3).unwrap();
    let mut dst = ctx.allocate(&device, w, h, 3).unwrap();
    let stats = filter.compute(&device, &src, &mut dst).unwrap();
    assert_eq!(stats.texels_written, (w * h) as u64);

    let out = ctx.download(&device, &dst).unwrap();
    let reference = bilateral_reference(&data, w, h, 3, 3, 0.2);
    for (i, (&g, &r)) in out.iter().zip(&reference).enumerate() {
        assert!((g as f64 - r).abs() < 1e-4, "mismatch at {}: {} vs {}", i, g, r);
    }
}

#[test]
fn test_gpu_constant_image_unchanged() {
    let Some(ctx) = gpu() else { return };
    let device = ctx.device();

    let mut filter = BilateralGaussianFilter::new(ctx.clone());
    filter.set_radius(5).unwrap();
    filter.set_scalar(0.01).unwrap();
    filter.compile().unwrap();

    let data = vec![0.42f32; 40 * 40];
    let src = ctx.upload(&device, &data, 40, 40, 1).unwrap();
    let mut dst = ctx.allocate(&device, 40, 40, 1).unwrap();
    filter.compute(&device, &src, &mut dst).unwrap();
    assert_eq!(ctx.download(&device, &dst).unwrap(), data);
}

#[test]
fn test_gpu_foreign_device_rejected() {
    let Some(ctx) = gpu() else { return };
    let Ok(other) = WgpuContext::new() else { return };
    let foreign = other.device();

    let mut filter = BilateralGaussianFilter::new(ctx.clone());
    filter.set_radius(1).unwrap();
    filter.set_scalar(0.5).unwrap();
    filter.compile().unwrap();

    let src = other.allocate(&foreign, 8, 8, 1).unwrap();
    let mut dst = other.allocate(&foreign, 8, 8, 1).unwrap();
    let err = filter.compute(&foreign, &src, &mut dst).unwrap_err();
    assert!(matches!(
        err,
        BilateralError::DeviceDispatchFailed { code: DispatchErrorCode::ForeignDevice, .. }
    ));
}

#[test]
fn test_gpu_concurrent_compile_and_compute() {
    let Some(ctx) = gpu() else { return };
    let (w, h) = (29u32, 17u32);

    std::thread::scope(|s| {
        for radius in 1..=3u32 {
            let ctx = ctx.clone();
            s.spawn(move || {
                let device = ctx.device();
                let data: Vec<f32> = (0..w * h).map(|i| ((i * 31 + radius) % 97) as f32 / 97.0).collect();
                let reference = bilateral_reference(&data, w, h, 1, radius, 0.3);

                let mut filter = BilateralGaussianFilter::new(ctx.clone());
                filter.set_radius(radius).unwrap();
                filter.set_scalar(0.3).unwrap();
                let src = ctx.upload(&device, &data, w, h, 1).unwrap();
                for _ in 0..4 {
                    filter.compile().unwrap();
                    let mut dst = ctx.allocate(&device, w, h, 1).unwrap();
                    filter.compute(&device, &src, &mut dst).unwrap();
                    let out = ctx.download(&device, &dst).unwrap();
                    for (i, (&g, &r)) in out.iter().zip(&reference).enumerate() {
                        assert!((g as f64 - r).abs() < 1e-4, "radius {}: mismatch at {}: {} vs {}", radius, i, g, r);
                    }
                }
            });
        }
    });
}

//! Kernel-side bilateral math.
//!
//! [`bilateral_host`] is the host rendition of the WGSL entry point in
//! [`crate::shaders`]; both must stay in lockstep. [`bilateral_reference`] is
//! an independent f64 implementation used to check them.
//!
//! For output pixel `(x, y)` and every in-bounds neighbour `q` in the
//! `(2r+1)^2` window:
//!
//! ```text
//! w_space(q) = exp(-(dx^2 + dy^2) / (2 sigma^2)),   sigma = r / 2
//! w_range(q) = exp(-|I(q) - I(c)|^2 / (2 s^2)),    s = range scalar
//! out        = I(c) + sum(w (I(q) - I(c))) / sum(w)
//! ```
//!
//! `|.|` is the Euclidean distance over all channels, so every channel of a
//! neighbour shares one weight. Out-of-bounds samples are skipped, not
//! clamped. A zero weight sum falls back to the centre sample.

use gpufx_compute::{Invocation, KernelParams, KernelSource, WorkGroupShape};

use crate::params::{FilterParameters, range_coefficient, spatial_coefficient};
use crate::shaders;

/// Kernel source for a work-group shape.
pub fn kernel_source(shape: WorkGroupShape) -> KernelSource {
    KernelSource {
        label: format!("bilateral_gaussian_{shape}"),
        wgsl: shaders::render(shape),
        entry_point: shaders::ENTRY_POINT.to_string(),
        workgroup: shape,
        host: bilateral_host,
    }
}

/// Pack dispatch uniforms: dims `[w, h, c, radius]`, spatial and range
/// coefficients in `params[0..2]`.
pub fn pack_params(width: u32, height: u32, channels: u32, params: &FilterParameters) -> KernelParams {
    let mut kp = KernelParams::new(width, height, channels);
    kp.dims[3] = params.radius();
    kp.params[0] = spatial_coefficient(params.radius());
    kp.params[1] = range_coefficient(params.range_scalar());
    kp
}

/// Host rendition of `bilateral_gaussian`.
pub fn bilateral_host(id: Invocation, p: &KernelParams, src: &[f32]) -> Option<[f32; 4]> {
    let (w, h, c) = (p.width(), p.height(), p.channels() as usize);
    if id.x >= w || id.y >= h {
        return None;
    }

    let r = p.dims[3] as i64;
    let spatial_coeff = p.params[0];
    let range_coeff = p.params[1];
    let base = (id.y as usize * w as usize + id.x as usize) * c;

    let mut center = [0.0f32; 4];
    center[..c].copy_from_slice(&src[base..base + c]);

    let mut acc = [0.0f32; 4];
    let mut wsum = 0.0f32;
    for dy in -r..=r {
        let sy = id.y as i64 + dy;
        if sy < 0 || sy >= h as i64 {
            continue;
        }
        for dx in -r..=r {
            let sx = id.x as i64 + dx;
            if sx < 0 || sx >= w as i64 {
                continue;
            }

            let nb = (sy as usize * w as usize + sx as usize) * c;
            let mut diff = [0.0f32; 4];
            for ch in 0..c {
                diff[ch] = src[nb + ch] - center[ch];
            }

            let d2: f32 = diff.iter().map(|d| d * d).sum();
            let w_space = (-((dx * dx + dy * dy) as f32) * spatial_coeff).exp();
            let w_range = if d2 == 0.0 { 1.0 } else { (-d2 * range_coeff).exp() };
            let wt = w_space * w_range;
            wsum += wt;
            for ch in 0..c {
                acc[ch] += wt * diff[ch];
            }
        }
    }

    let mut out = center;
    if wsum > 0.0 {
        for ch in 0..c {
            out[ch] = center[ch] + acc[ch] / wsum;
        }
    }
    Some(out)
}

/// Double-precision bilateral filter over a whole interleaved image.
///
/// Uses the same formulas as the kernel but evaluates the Gaussians directly
/// from `sigma` and `range_scalar` instead of the packed coefficients.
pub fn bilateral_reference(
    src: &[f32],
    width: u32,
    height: u32,
    channels: u32,
    radius: u32,
    range_scalar: f64,
) -> Vec<f64> {
    let (w, h, c) = (width as i64, height as i64, channels as usize);
    let r = radius as i64;
    let sigma = radius as f64 / 2.0;
    let mut out = vec![0.0f64; src.len()];

    for y in 0..h {
        for x in 0..w {
            let base = (y * w + x) as usize * c;
            let center: Vec<f64> = src[base..base + c].iter().map(|&v| v as f64).collect();

            let mut acc = vec![0.0f64; c];
            let mut wsum = 0.0f64;
            for dy in -r..=r {
                for dx in -r..=r {
                    let (sx, sy) = (x + dx, y + dy);
                    if sx < 0 || sy < 0 || sx >= w || sy >= h {
                        continue;
                    }
                    let nb = (sy * w + sx) as usize * c;
                    let diff: Vec<f64> = (0..c).map(|ch| src[nb + ch] as f64 - center[ch]).collect();
                    let d2: f64 = diff.iter().map(|d| d * d).sum();

                    let w_space = if radius == 0 {
                        1.0
                    } else {
                        (-((dx * dx + dy * dy) as f64) / (2.0 * sigma * sigma)).exp()
                    };
                    let w_range = if d2 == 0.0 {
                        1.0
                    } else {
                        (-d2 / (2.0 * range_scalar * range_scalar)).exp()
                    };
                    let wt = w_space * w_range;
                    wsum += wt;
                    for ch in 0..c {
                        acc[ch] += wt * diff[ch];
                    }
                }
            }

            for ch in 0..c {
                out[base + ch] = if wsum > 0.0 { center[ch] + acc[ch] / wsum } else { center[ch] };
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn params(w: u32, h: u32, c: u32, radius: u32, s: f32) -> KernelParams {
        pack_params(w, h, c, &FilterParameters::new(radius, s).unwrap())
    }

    #[test]
    fn test_masks_out_of_range() {
        let p = params(4, 3, 1, 1, 10.0);
        let src = vec![0.0; 12];
        assert!(bilateral_host(Invocation { x: 4, y: 0 }, &p, &src).is_none());
        assert!(bilateral_host(Invocation { x: 0, y: 3 }, &p, &src).is_none());
        assert!(bilateral_host(Invocation { x: 3, y: 2 }, &p, &src).is_some());
    }

    #[test]
    fn test_radius_zero_is_identity() {
        let src = [0.1, 0.9, 0.4, 0.7];
        let p = params(2, 2, 1, 0, 0.01);
        for (i, &v) in src.iter().enumerate() {
            let id = Invocation { x: i as u32 % 2, y: i as u32 / 2 };
            assert_eq!(bilateral_host(id, &p, &src).unwrap()[0], v);
        }
    }

    #[test]
    fn test_host_matches_reference() {
        let (w, h) = (6u32, 5u32);
        let src: Vec<f32> = (0..w * h).map(|i| ((i * 37) % 11) as f32 * 0.1).collect();
        let p = params(w, h, 1, 2, 0.3);
        let reference = bilateral_reference(&src, w, h, 1, 2, 0.3);
        for y in 0..h {
            for x in 0..w {
                let got = bilateral_host(Invocation { x, y }, &p, &src).unwrap()[0];
                let want = reference[(y * w + x) as usize];
                assert_relative_eq!(got as f64, want, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn test_channels_share_one_weight() {
        // Centre (0, 0) with one neighbour at distance 5 in colour space (3, 4).
        let src = [0.0, 0.0, 3.0, 4.0];
        let p = params(2, 1, 2, 1, 5.0);
        let out = bilateral_host(Invocation { x: 0, y: 0 }, &p, &src).unwrap();

        let wt = (-2.0f64).exp() * (-25.0f64 / 50.0).exp();
        let expect_r = 3.0 * wt / (1.0 + wt);
        let expect_g = 4.0 * wt / (1.0 + wt);
        assert_relative_eq!(out[0] as f64, expect_r, epsilon = 1e-5);
        assert_relative_eq!(out[1] as f64, expect_g, epsilon = 1e-5);
    }

    #[test]
    fn test_kernel_source_validates() {
        let source = kernel_source(WorkGroupShape::DEFAULT);
        assert_eq!(source.entry_point, "bilateral_gaussian");
        gpufx_compute::backend::validate_kernel(&source).unwrap();
    }
}

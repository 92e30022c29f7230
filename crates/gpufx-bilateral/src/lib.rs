//! Edge-preserving bilateral Gaussian smoothing as a compute kernel.
//!
//! Each output pixel is a weighted average of its `(2r+1)^2` neighbourhood.
//! The weight of a neighbour is the product of a spatial Gaussian (distance
//! in pixels) and a range Gaussian (distance in colour), so noise inside a
//! flat region is smoothed while strong edges survive.
//!
//! The filter compiles its kernel once against a
//! [`ComputeContext`](gpufx_compute::ComputeContext) and is then dispatched
//! over source/destination pairs on any device of that context. Radius and
//! range scalar are uniforms, so changing them never needs a recompile.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use gpufx_bilateral::BilateralGaussianFilter;
//! use gpufx_compute::{ComputeContext, CpuContext, HostImage};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let ctx = Arc::new(CpuContext::new());
//! let device = ctx.default_device()?;
//!
//! let mut filter = BilateralGaussianFilter::new(ctx.clone());
//! filter.set_radius(3)?;
//! filter.set_scalar(0.1)?;
//! filter.compile()?;
//!
//! let image = HostImage::filled(64, 64, 3, 0.5);
//! let src = ctx.upload(&device, image.data(), 64, 64, 3)?;
//! let mut dst = ctx.allocate(&device, 64, 64, 3)?;
//! filter.compute(&device, &src, &mut dst)?;
//! # Ok(())
//! # }
//! ```

mod error;
mod filter;
pub mod kernel;
pub mod params;
pub mod shaders;

pub use error::{BilateralError, BilateralResult};
pub use filter::{BilateralGaussianFilter, FilterState};
pub use kernel::{bilateral_host, bilateral_reference, kernel_source};
pub use params::{FilterConfig, FilterParameters, MAX_RADIUS};

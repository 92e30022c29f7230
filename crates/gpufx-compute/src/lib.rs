//! Compute abstraction layer for gpufx image filters.
//!
//! A filter compiles its kernel against a [`ComputeContext`] once and then
//! dispatches it over image pairs on any [`ComputeDevice`] of that context.
//! Kernels are written in WGSL; every kernel also ships a host rendition so
//! the CPU backend can run the exact same work-group grid without a GPU.
//!
//! # Architecture
//!
//! ```text
//! Filter (owns Arc<Kernel>)
//!     └── ComputeContext (compile / dispatch / upload / download)
//!             ├── CpuContext  (naga validation + rayon pools as devices)
//!             └── WgpuContext (compute pipelines on a wgpu queue)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use gpufx_compute::{ComputeContext, CpuContext};
//!
//! let ctx = CpuContext::new();
//! let device = ctx.default_device()?;
//! let kernel = ctx.compile(&source)?;
//! let src = ctx.upload(&device, &data, 64, 64, 1)?;
//! let mut dst = ctx.allocate(&device, 64, 64, 1)?;
//! ctx.dispatch(&device, &kernel, grid, &params, &src, &mut dst)?;
//! ```

pub mod backend;
pub mod config;
pub mod image;

pub use backend::{
    Backend, BackendInfo, CompiledKernel, ComputeContext, ComputeDevice, CpuConfig, CpuContext,
    CpuDevice, CpuImage, CpuKernel, DeviceLimits, DispatchGrid, DispatchStats, HostEntryFn,
    ImageHandle, Invocation, KernelParams, KernelSource, WorkGroupShape, describe_backends,
    detect_backends, select_best_backend,
};
pub use image::{HostImage, PixelFormat};

#[cfg(feature = "wgpu")]
pub use backend::{WgpuConfig, WgpuContext, WgpuDevice, WgpuImage, WgpuKernel};

use thiserror::Error;

/// Backend-reported reason a dispatch was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchErrorCode {
    /// Image pixel format is not supported by the kernel or device.
    UnsupportedFormat,
    /// Device ran out of memory or the image exceeds a buffer limit.
    OutOfResources,
    /// Kernel, images or grid do not belong together.
    InvalidBinding,
    /// Device belongs to a different context.
    ForeignDevice,
    /// Device was lost or the queue failed.
    DeviceLost,
}

impl std::fmt::Display for DispatchErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::UnsupportedFormat => "unsupported format",
            Self::OutOfResources => "out of resources",
            Self::InvalidBinding => "invalid binding",
            Self::ForeignDevice => "foreign device",
            Self::DeviceLost => "device lost",
        };
        f.write_str(s)
    }
}

/// Compute operation errors
#[derive(Error, Debug)]
pub enum ComputeError {
    #[error("No suitable GPU adapter found")]
    NoAdapter,

    #[error("Backend not available: {0}")]
    BackendNotAvailable(String),

    #[error("Failed to create device: {0}")]
    DeviceCreation(String),

    #[error("Failed to create buffer: {0}")]
    BufferCreation(String),

    #[error("Failed to compile shader: {0}")]
    ShaderCompilation(String),

    #[error("Buffer size mismatch: expected {expected}, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    #[error("Invalid dimensions: {0}x{1}")]
    InvalidDimensions(u32, u32),

    #[error("Unsupported channel count: {0}")]
    UnsupportedFormat(u32),

    #[error("Dispatch failed ({code}): {message}")]
    Dispatch { code: DispatchErrorCode, message: String },
}

impl ComputeError {
    /// Shorthand for a dispatch rejection.
    pub fn dispatch(code: DispatchErrorCode, message: impl Into<String>) -> Self {
        Self::Dispatch { code, message: message.into() }
    }
}

pub type ComputeResult<T> = Result<T, ComputeError>;

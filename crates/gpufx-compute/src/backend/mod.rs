//! Compute backends.
//!
//! Provides the CPU (rayon) and wgpu backends behind one set of traits.

mod gpu_primitives;
mod program;
mod workgroup;
mod detect;
mod cpu_backend;

#[cfg(feature = "wgpu")]
mod wgpu_backend;

pub use gpu_primitives::{CompiledKernel, ComputeContext, ComputeDevice, DispatchStats, ImageHandle, KernelParams};
pub use program::{HostEntryFn, Invocation, KernelSource, validate as validate_kernel};
pub use workgroup::{DeviceLimits, DispatchGrid, WorkGroupShape, MAX_INVOCATIONS_PER_WORKGROUP, MAX_WORKGROUP_SIDE};
pub use detect::{detect_backends, select_best_backend, describe_backends, BackendInfo};
pub use cpu_backend::{CpuConfig, CpuContext, CpuDevice, CpuImage, CpuKernel};

#[cfg(feature = "wgpu")]
pub use wgpu_backend::{WgpuConfig, WgpuContext, WgpuDevice, WgpuImage, WgpuKernel};

/// Available compute backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    /// Auto-select best available (wgpu > CPU).
    #[default]
    Auto,
    /// CPU backend using rayon for parallelization.
    Cpu,
    /// wgpu backend (Vulkan/Metal/DX12).
    Wgpu,
}

impl Backend {
    /// Check if this backend is available on current system.
    pub fn is_available(&self) -> bool {
        match self {
            Self::Auto => true,
            Self::Cpu => true,
            #[cfg(feature = "wgpu")]
            Self::Wgpu => WgpuContext::is_available(),
            #[cfg(not(feature = "wgpu"))]
            Self::Wgpu => false,
        }
    }

    /// Get human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Cpu => "cpu",
            Self::Wgpu => "wgpu",
        }
    }
}

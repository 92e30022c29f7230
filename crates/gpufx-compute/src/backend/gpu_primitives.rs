//! Backend abstraction: contexts compile kernels, devices run them.

use bytemuck::{Pod, Zeroable};

use crate::image::PixelFormat;
use crate::ComputeResult;
use super::program::KernelSource;
use super::workgroup::{DeviceLimits, DispatchGrid, WorkGroupShape};

/// Handle to an image in device memory.
pub trait ImageHandle: Send + Sync {
    /// Image dimensions (width, height, channels).
    fn dimensions(&self) -> (u32, u32, u32);

    /// Width.
    fn width(&self) -> u32 { self.dimensions().0 }

    /// Height.
    fn height(&self) -> u32 { self.dimensions().1 }

    /// Channel count.
    fn channels(&self) -> u32 { self.dimensions().2 }

    /// Pixel format, `None` for channel counts no kernel supports.
    fn format(&self) -> Option<PixelFormat> {
        PixelFormat::from_channels(self.channels())
    }

    /// Size in bytes of device memory used.
    fn size_bytes(&self) -> u64 {
        let (w, h, c) = self.dimensions();
        (w as u64) * (h as u64) * (c as u64) * 4 // f32
    }
}

/// Compiled, device-loadable kernel entry point.
pub trait CompiledKernel: Send + Sync {
    /// Entry point name.
    fn entry_point(&self) -> &str;

    /// Local size the kernel was compiled for.
    fn workgroup_shape(&self) -> WorkGroupShape;
}

/// Dispatch target.
pub trait ComputeDevice: Send + Sync {
    /// Human-readable device name.
    fn name(&self) -> &str;

    /// Device limits.
    fn limits(&self) -> &DeviceLimits;
}

/// Uniform block handed to every kernel.
///
/// Layout matches the WGSL struct `{ dims: vec4<u32>, params: array<vec4<f32>, 4> }`.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct KernelParams {
    /// Image dimensions [width, height, channels, extra].
    pub dims: [u32; 4],
    /// Operation-specific parameters.
    pub params: [f32; 16],
}

impl KernelParams {
    pub fn new(width: u32, height: u32, channels: u32) -> Self {
        Self {
            dims: [width, height, channels, 0],
            params: [0.0; 16],
        }
    }

    pub fn width(&self) -> u32 { self.dims[0] }
    pub fn height(&self) -> u32 { self.dims[1] }
    pub fn channels(&self) -> u32 { self.dims[2] }

    /// (width, height, channels) the kernel will index with.
    pub fn image_dimensions(&self) -> (u32, u32, u32) {
        (self.dims[0], self.dims[1], self.dims[2])
    }
}

/// What a dispatch did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchStats {
    /// Work-groups launched.
    pub workgroups: u64,
    /// Invocations launched (workgroups * shape area).
    pub invocations: u64,
    /// Texels written to the destination.
    pub texels_written: u64,
}

/// A compute backend instance.
///
/// Kernels are compiled against the context; images and dispatches are
/// bound to one of its devices.
pub trait ComputeContext: Send + Sync {
    type Device: ComputeDevice;
    type Image: ImageHandle;
    type Kernel: CompiledKernel;

    /// Backend name.
    fn name(&self) -> &'static str;

    /// Compile a kernel. Blocks until the backend accepts or rejects it.
    fn compile(&self, source: &KernelSource) -> ComputeResult<Self::Kernel>;

    /// Run `kernel` over `grid`, reading `src` and writing `dst`.
    ///
    /// Returns once `dst` is fully written and readable.
    fn dispatch(
        &self,
        device: &Self::Device,
        kernel: &Self::Kernel,
        grid: DispatchGrid,
        params: &KernelParams,
        src: &Self::Image,
        dst: &mut Self::Image,
    ) -> ComputeResult<DispatchStats>;

    /// Upload image data to device.
    fn upload(&self, device: &Self::Device, data: &[f32], width: u32, height: u32, channels: u32) -> ComputeResult<Self::Image>;

    /// Download image data from device.
    fn download(&self, device: &Self::Device, image: &Self::Image) -> ComputeResult<Vec<f32>>;

    /// Allocate a zeroed image.
    fn allocate(&self, device: &Self::Device, width: u32, height: u32, channels: u32) -> ComputeResult<Self::Image>;
}

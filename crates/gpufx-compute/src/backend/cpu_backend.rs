//! CPU backend using rayon for parallelization.
//!
//! Kernels are validated with naga exactly as the GPU backend would see them,
//! then executed through their host rendition over the same work-group grid.

use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, trace};

use super::gpu_primitives::{CompiledKernel, ComputeContext, ComputeDevice, DispatchStats, ImageHandle, KernelParams};
use super::program::{self, HostEntryFn, Invocation, KernelSource};
use super::workgroup::{DeviceLimits, DispatchGrid, WorkGroupShape};
use crate::{ComputeError, ComputeResult, DispatchErrorCode, config};

// =============================================================================
// CpuImage Handle
// =============================================================================

/// CPU image handle - data stored in RAM.
#[derive(Clone, Debug)]
pub struct CpuImage {
    data: Vec<f32>,
    width: u32,
    height: u32,
    channels: u32,
}

impl CpuImage {
    pub fn new(data: Vec<f32>, width: u32, height: u32, channels: u32) -> Self {
        Self { data, width, height, channels }
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }
}

impl ImageHandle for CpuImage {
    fn dimensions(&self) -> (u32, u32, u32) {
        (self.width, self.height, self.channels)
    }
}

// =============================================================================
// CpuKernel
// =============================================================================

/// Validated kernel bound to its host rendition.
#[derive(Debug)]
pub struct CpuKernel {
    entry_point: String,
    shape: WorkGroupShape,
    host: HostEntryFn,
}

impl CompiledKernel for CpuKernel {
    fn entry_point(&self) -> &str { &self.entry_point }
    fn workgroup_shape(&self) -> WorkGroupShape { self.shape }
}

// =============================================================================
// CpuDevice
// =============================================================================

/// A dedicated rayon pool acting as a compute device.
#[derive(Clone)]
pub struct CpuDevice {
    name: String,
    pool: Arc<rayon::ThreadPool>,
    limits: DeviceLimits,
}

impl CpuDevice {
    /// Create a device backed by `threads` worker threads.
    pub fn with_threads(threads: usize) -> ComputeResult<Self> {
        let threads = threads.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("gpufx-cpu-{i}"))
            .build()
            .map_err(|e| ComputeError::DeviceCreation(e.to_string()))?;

        // Get system RAM (fallback to 4GB if detection fails)
        let available = sys_info::mem_info()
            .map(|m| m.avail * 1024)
            .unwrap_or(4 * 1024 * 1024 * 1024);
        let available = config::memory_override().unwrap_or(available);

        Ok(Self {
            name: format!("cpu ({threads} threads)"),
            pool: Arc::new(pool),
            limits: DeviceLimits {
                max_workgroups_per_dim: u32::MAX,
                max_buffer_bytes: available / 2,
                available_memory: available,
            },
        })
    }

    /// Replace the detected limits.
    pub fn with_limits(mut self, limits: DeviceLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Worker thread count.
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl ComputeDevice for CpuDevice {
    fn name(&self) -> &str { &self.name }
    fn limits(&self) -> &DeviceLimits { &self.limits }
}

impl std::fmt::Debug for CpuDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpuDevice")
            .field("name", &self.name)
            .field("threads", &self.threads())
            .finish()
    }
}

// =============================================================================
// CpuContext
// =============================================================================

/// CPU context configuration.
#[derive(Clone, Debug)]
pub struct CpuConfig {
    /// Threads for [`CpuContext::default_device`] (None = all cores).
    pub threads: Option<usize>,
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self { threads: config::threads_override() }
    }
}

/// CPU compute context.
#[derive(Debug, Default)]
pub struct CpuContext {
    config: CpuConfig,
}

impl CpuContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CpuConfig) -> Self {
        Self { config }
    }

    /// Device using the configured thread count.
    pub fn default_device(&self) -> ComputeResult<CpuDevice> {
        let threads = self.config.threads.unwrap_or_else(rayon::current_num_threads);
        CpuDevice::with_threads(threads)
    }

    fn check_device_fits(device: &CpuDevice, width: u32, height: u32, channels: u32) -> ComputeResult<()> {
        if width == 0 || height == 0 {
            return Err(ComputeError::InvalidDimensions(width, height));
        }
        if !device.limits.fits_buffer(width, height, channels) {
            return Err(ComputeError::dispatch(
                DispatchErrorCode::OutOfResources,
                format!("{width}x{height}x{channels} exceeds {} buffer limit", device.name),
            ));
        }
        Ok(())
    }
}

impl ComputeContext for CpuContext {
    type Device = CpuDevice;
    type Image = CpuImage;
    type Kernel = CpuKernel;

    fn name(&self) -> &'static str { "cpu" }

    fn compile(&self, source: &KernelSource) -> ComputeResult<CpuKernel> {
        debug!(label = %source.label, entry = %source.entry_point, shape = %source.workgroup, "cpu compile");
        program::validate(source)?;
        Ok(CpuKernel {
            entry_point: source.entry_point.clone(),
            shape: source.workgroup,
            host: source.host,
        })
    }

    fn dispatch(
        &self,
        device: &CpuDevice,
        kernel: &CpuKernel,
        grid: DispatchGrid,
        params: &KernelParams,
        src: &CpuImage,
        dst: &mut CpuImage,
    ) -> ComputeResult<DispatchStats> {
        let (w, h, c) = dst.dimensions();
        if w == 0 || h == 0 {
            return Err(ComputeError::InvalidDimensions(w, h));
        }
        if src.dimensions() != (w, h, c) {
            return Err(ComputeError::dispatch(
                DispatchErrorCode::InvalidBinding,
                format!("src {:?} vs dst {:?}", src.dimensions(), (w, h, c)),
            ));
        }
        if dst.format().is_none() {
            return Err(ComputeError::dispatch(
                DispatchErrorCode::UnsupportedFormat,
                format!("{c} channels"),
            ));
        }
        if params.image_dimensions() != (w, h, c) {
            return Err(ComputeError::dispatch(
                DispatchErrorCode::InvalidBinding,
                format!("params describe {:?}, images are {:?}", params.image_dimensions(), (w, h, c)),
            ));
        }
        if grid.shape != kernel.shape || !grid.covers(w, h) {
            return Err(ComputeError::dispatch(
                DispatchErrorCode::InvalidBinding,
                format!("grid {grid:?} does not match kernel {} over {w}x{h}", kernel.shape),
            ));
        }
        Self::check_device_fits(device, w, h, c)?;

        trace!(entry = %kernel.entry_point, groups_x = grid.groups_x, groups_y = grid.groups_y, device = %device.name, "cpu dispatch");

        let host = kernel.host;
        let band_rows = grid.shape.y() as usize;
        let row_len = (w * c) as usize;
        let global_w = grid.global_width();
        let c = c as usize;
        let src_data = src.data.as_slice();

        // One band per work-group row; invocations past the image edge still
        // run and must be masked by the kernel.
        let written: u64 = device.pool.install(|| {
            dst.data
                .par_chunks_mut(row_len * band_rows)
                .enumerate()
                .map(|(band, chunk)| {
                    let mut written = 0u64;
                    for ly in 0..band_rows {
                        let y = (band * band_rows + ly) as u32;
                        for x in 0..global_w {
                            let Some(texel) = host(Invocation { x, y }, params, src_data) else {
                                continue;
                            };
                            let offset = (ly * w as usize + x as usize) * c;
                            if x < w && offset + c <= chunk.len() {
                                chunk[offset..offset + c].copy_from_slice(&texel[..c]);
                                written += 1;
                            }
                        }
                    }
                    written
                })
                .sum()
        });

        Ok(DispatchStats {
            workgroups: grid.workgroups(),
            invocations: grid.invocations(),
            texels_written: written,
        })
    }

    fn upload(&self, device: &CpuDevice, data: &[f32], width: u32, height: u32, channels: u32) -> ComputeResult<CpuImage> {
        let expected = (width as usize) * (height as usize) * (channels as usize);
        if data.len() != expected {
            return Err(ComputeError::BufferSizeMismatch { expected, actual: data.len() });
        }
        Self::check_device_fits(device, width, height, channels)?;
        Ok(CpuImage::new(data.to_vec(), width, height, channels))
    }

    fn download(&self, _device: &CpuDevice, image: &CpuImage) -> ComputeResult<Vec<f32>> {
        Ok(image.data.clone())
    }

    fn allocate(&self, device: &CpuDevice, width: u32, height: u32, channels: u32) -> ComputeResult<CpuImage> {
        Self::check_device_fits(device, width, height, channels)?;
        let size = (width as usize) * (height as usize) * (channels as usize);
        Ok(CpuImage::new(vec![0.0; size], width, height, channels))
    }
}

//! wgpu backend implementation.
//!
//! Kernels become compute pipelines on one wgpu device; images are storage
//! buffers of interleaved f32 samples.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, trace, warn};
use wgpu::util::DeviceExt;

use super::gpu_primitives::{CompiledKernel, ComputeContext, ComputeDevice, DispatchStats, ImageHandle, KernelParams};
use super::program::{self, KernelSource};
use super::workgroup::{DeviceLimits, DispatchGrid, WorkGroupShape};
use crate::{ComputeError, ComputeResult, DispatchErrorCode, config};

// =============================================================================
// WgpuImage Handle
// =============================================================================

/// GPU buffer handle for image data.
pub struct WgpuImage {
    buffer: wgpu::Buffer,
    width: u32,
    height: u32,
    channels: u32,
    size_bytes: u64,
}

impl ImageHandle for WgpuImage {
    fn dimensions(&self) -> (u32, u32, u32) {
        (self.width, self.height, self.channels)
    }

    fn size_bytes(&self) -> u64 { self.size_bytes }
}

// =============================================================================
// WgpuKernel
// =============================================================================

/// Compute pipeline for one entry point.
pub struct WgpuKernel {
    entry_point: String,
    shape: WorkGroupShape,
    pipeline: wgpu::ComputePipeline,
}

impl CompiledKernel for WgpuKernel {
    fn entry_point(&self) -> &str { &self.entry_point }
    fn workgroup_shape(&self) -> WorkGroupShape { self.shape }
}

// =============================================================================
// WgpuDevice
// =============================================================================

/// Queue handle of a [`WgpuContext`].
#[derive(Clone)]
pub struct WgpuDevice {
    name: String,
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    limits: DeviceLimits,
}

impl ComputeDevice for WgpuDevice {
    fn name(&self) -> &str { &self.name }
    fn limits(&self) -> &DeviceLimits { &self.limits }
}

impl std::fmt::Debug for WgpuDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuDevice").field("name", &self.name).finish()
    }
}

// =============================================================================
// WgpuContext
// =============================================================================

/// wgpu context configuration.
#[derive(Clone, Debug)]
pub struct WgpuConfig {
    pub power_preference: wgpu::PowerPreference,
    pub force_fallback_adapter: bool,
}

impl Default for WgpuConfig {
    fn default() -> Self {
        let power_preference = if config::low_power_requested() {
            wgpu::PowerPreference::LowPower
        } else {
            wgpu::PowerPreference::HighPerformance
        };
        Self {
            power_preference,
            force_fallback_adapter: false,
        }
    }
}

/// GPU context holding device and queue.
pub struct WgpuContext {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    adapter_info: wgpu::AdapterInfo,
    limits: DeviceLimits,
    /// Error scopes live on the device, not the thread; held from push to pop.
    scope_lock: Mutex<()>,
}

impl WgpuContext {
    /// Check if wgpu is available.
    pub fn is_available() -> bool {
        pollster::block_on(async {
            let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
                backends: wgpu::Backends::all(),
                ..Default::default()
            });
            instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::HighPerformance,
                    compatible_surface: None,
                    force_fallback_adapter: false,
                })
                .await
                .is_some()
        })
    }

    /// Create new GPU context with default settings.
    pub fn new() -> ComputeResult<Self> {
        Self::with_config(WgpuConfig::default())
    }

    /// Create context with explicit config.
    pub fn with_config(config: WgpuConfig) -> ComputeResult<Self> {
        pollster::block_on(Self::new_async(config))
    }

    async fn new_async(config: WgpuConfig) -> ComputeResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: config.power_preference,
                compatible_surface: None,
                force_fallback_adapter: config.force_fallback_adapter,
            })
            .await
            .ok_or(ComputeError::NoAdapter)?;

        let adapter_limits = adapter.limits();
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("gpufx_device"),
                required_features: wgpu::Features::empty(),
                required_limits: adapter_limits.clone(),
                memory_hints: wgpu::MemoryHints::Performance,
                ..Default::default()
            }, None)
            .await
            .map_err(|e| ComputeError::DeviceCreation(e.to_string()))?;

        let adapter_info = adapter.get_info();
        let limits = DeviceLimits {
            max_workgroups_per_dim: adapter_limits.max_compute_workgroups_per_dimension,
            max_buffer_bytes: adapter_limits
                .max_buffer_size
                .min(adapter_limits.max_storage_buffer_binding_size as u64),
            available_memory: estimate_vram(&adapter_info, adapter_limits.max_buffer_size),
        };

        debug!(adapter = %adapter_info.name, backend = ?adapter_info.backend, "wgpu context ready");

        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            adapter_info,
            limits,
            scope_lock: Mutex::new(()),
        })
    }

    /// Handle to this context's queue.
    pub fn device(&self) -> WgpuDevice {
        WgpuDevice {
            name: self.adapter_info.name.clone(),
            device: Arc::clone(&self.device),
            queue: Arc::clone(&self.queue),
            limits: self.limits.clone(),
        }
    }

    /// Get adapter info (GPU name, vendor, etc.)
    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.adapter_info
    }

    fn owns(&self, device: &WgpuDevice) -> ComputeResult<()> {
        if Arc::ptr_eq(&self.device, &device.device) {
            Ok(())
        } else {
            Err(ComputeError::dispatch(
                DispatchErrorCode::ForeignDevice,
                format!("{} does not belong to this context", device.name),
            ))
        }
    }

    fn check_fits(&self, width: u32, height: u32, channels: u32) -> ComputeResult<()> {
        if width == 0 || height == 0 {
            return Err(ComputeError::InvalidDimensions(width, height));
        }
        if !self.limits.fits_buffer(width, height, channels) {
            return Err(ComputeError::dispatch(
                DispatchErrorCode::OutOfResources,
                format!("{width}x{height}x{channels} exceeds max buffer {} bytes", self.limits.max_buffer_bytes),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for WgpuContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuContext")
            .field("device", &self.adapter_info.name)
            .field("backend", &self.adapter_info.backend)
            .finish()
    }
}

impl ComputeContext for WgpuContext {
    type Device = WgpuDevice;
    type Image = WgpuImage;
    type Kernel = WgpuKernel;

    fn name(&self) -> &'static str { "wgpu" }

    fn compile(&self, source: &KernelSource) -> ComputeResult<WgpuKernel> {
        debug!(label = %source.label, entry = %source.entry_point, shape = %source.workgroup, "wgpu compile");

        // naga first: its diagnostics carry source spans
        program::validate(source)?;

        let _scope = self.scope_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(source.label.as_str()),
            source: wgpu::ShaderSource::Wgsl(source.wgsl.as_str().into()),
        });
        let pipeline = self.device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(source.label.as_str()),
            layout: None, // Auto layout
            module: &module,
            entry_point: Some(source.entry_point.as_str()),
            compilation_options: Default::default(),
            cache: None,
        });
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            warn!(label = %source.label, "pipeline creation failed");
            return Err(ComputeError::ShaderCompilation(format!("{}: {err}", source.label)));
        }

        Ok(WgpuKernel {
            entry_point: source.entry_point.clone(),
            shape: source.workgroup,
            pipeline,
        })
    }

    fn dispatch(
        &self,
        device: &WgpuDevice,
        kernel: &WgpuKernel,
        grid: DispatchGrid,
        params: &KernelParams,
        src: &WgpuImage,
        dst: &mut WgpuImage,
    ) -> ComputeResult<DispatchStats> {
        self.owns(device)?;

        let (w, h, c) = dst.dimensions();
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
        if !self.limits.fits_grid(&grid) {
            return Err(ComputeError::dispatch(
                DispatchErrorCode::OutOfResources,
                format!("{}x{} work-groups exceed device limit", grid.groups_x, grid.groups_y),
            ));
        }

        trace!(entry = %kernel.entry_point, groups_x = grid.groups_x, groups_y = grid.groups_y, "wgpu dispatch");

        let _scope = self.scope_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let params_buf = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("kernel_params"),
            contents: bytemuck::bytes_of(params),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let layout = kernel.pipeline.get_bind_group_layout(0);
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("kernel_bind_group"),
            layout: &layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: src.buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: dst.buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 2, resource: params_buf.as_entire_binding() },
            ],
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("compute_encoder"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("compute_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&kernel.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(grid.groups_x, grid.groups_y, 1);
        }

        device.queue.submit(std::iter::once(encoder.finish()));
        self.device.poll(wgpu::Maintain::Wait);

        let validation = pollster::block_on(self.device.pop_error_scope());
        let oom = pollster::block_on(self.device.pop_error_scope());
        if let Some(err) = oom {
            return Err(ComputeError::dispatch(DispatchErrorCode::OutOfResources, err.to_string()));
        }
        if let Some(err) = validation {
            return Err(ComputeError::dispatch(DispatchErrorCode::InvalidBinding, err.to_string()));
        }

        Ok(DispatchStats {
            workgroups: grid.workgroups(),
            invocations: grid.invocations(),
            // Masking happens on the device; every in-range texel is stored once.
            texels_written: w as u64 * h as u64,
        })
    }

    fn upload(&self, device: &WgpuDevice, data: &[f32], width: u32, height: u32, channels: u32) -> ComputeResult<WgpuImage> {
        self.owns(device)?;
        let expected = (width as usize) * (height as usize) * (channels as usize);
        if data.len() != expected {
            return Err(ComputeError::BufferSizeMismatch { expected, actual: data.len() });
        }
        self.check_fits(width, height, channels)?;

        let size_bytes = (data.len() * 4) as u64;
        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("image_buffer"),
            contents: bytemuck::cast_slice(data),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST,
        });

        Ok(WgpuImage { buffer, width, height, channels, size_bytes })
    }

    fn download(&self, device: &WgpuDevice, image: &WgpuImage) -> ComputeResult<Vec<f32>> {
        self.owns(device)?;
        let size = image.size_bytes;

        // Create staging buffer
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("staging_buffer"),
            size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        // Copy to staging
        let mut encoder = self.device.create_command_encoder(&Default::default());
        encoder.copy_buffer_to_buffer(&image.buffer, 0, &staging, 0, size);
        device.queue.submit(std::iter::once(encoder.finish()));

        // Map and read
        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |r| { let _ = tx.send(r); });
        self.device.poll(wgpu::Maintain::Wait);

        rx.recv()
            .map_err(|_| ComputeError::dispatch(DispatchErrorCode::DeviceLost, "map channel closed"))?
            .map_err(|e| ComputeError::dispatch(DispatchErrorCode::DeviceLost, format!("map failed: {e}")))?;

        let data = slice.get_mapped_range();
        let result: Vec<f32> = bytemuck::cast_slice(&data).to_vec();
        drop(data);
        staging.unmap();

        Ok(result)
    }

    fn allocate(&self, device: &WgpuDevice, width: u32, height: u32, channels: u32) -> ComputeResult<WgpuImage> {
        self.owns(device)?;
        self.check_fits(width, height, channels)?;
        let size_bytes = (width as u64) * (height as u64) * (channels as u64) * 4;

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("output_buffer"),
            size: size_bytes,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Ok(WgpuImage { buffer, width, height, channels, size_bytes })
    }
}

// =============================================================================
// VRAM Detection
// =============================================================================

fn estimate_vram(info: &wgpu::AdapterInfo, max_buffer_bytes: u64) -> u64 {
    if let Some(bytes) = config::memory_override() {
        return bytes;
    }

    let from_buffer = max_buffer_bytes.saturating_mul(2);

    let estimated = match info.device_type {
        wgpu::DeviceType::DiscreteGpu => from_buffer.clamp(2u64 << 30, 24u64 << 30),
        wgpu::DeviceType::IntegratedGpu => from_buffer.clamp(512u64 << 20, 4u64 << 30),
        wgpu::DeviceType::VirtualGpu => from_buffer.clamp(1u64 << 30, 8u64 << 30),
        _ => from_buffer.clamp(256u64 << 20, 2u64 << 30),
    };

    // 80% safe margin
    estimated.saturating_mul(80) / 100
}

//! The bilateral Gaussian filter component.
//!
//! Lifecycle is a two-state machine:
//!
//! ```text
//! Uninitialized --compile()--> Compiled --compile()--> Compiled
//!                                  |
//!                              compute() (only legal here)
//! ```
//!
//! The compiled kernel sits behind `RwLock<Option<Arc<_>>>`. `compute()`
//! clones the `Arc` and dispatches with that clone, so a concurrent
//! `compile()` swaps the slot without touching a kernel that is in flight.
//! Setters take `&mut self`, which keeps configuration and dispatch on one
//! instance from overlapping; `compute()` still snapshots the parameters
//! before dispatching.

use std::sync::{Arc, PoisonError, RwLock};

use gpufx_compute::{ComputeContext, DispatchErrorCode, DispatchStats, HostImage, ImageHandle, WorkGroupShape};
use tracing::{debug, trace, warn};

use crate::kernel;
use crate::params::{self, FilterConfig, FilterParameters};
use crate::{BilateralError, BilateralResult};

/// Lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterState {
    /// No kernel yet; `compute()` fails with `NotCompiled`.
    Uninitialized,
    /// A kernel is loaded.
    Compiled,
}

/// Edge-preserving bilateral Gaussian smoothing on a compute context.
pub struct BilateralGaussianFilter<C: ComputeContext> {
    context: Arc<C>,
    radius: Option<u32>,
    range_scalar: Option<f32>,
    shape: WorkGroupShape,
    kernel: RwLock<Option<Arc<C::Kernel>>>,
}

impl<C: ComputeContext> BilateralGaussianFilter<C> {
    /// Bind a filter to a context. Parameters start unset.
    ///
    /// The work-group shape is 16x16 unless `GPUFX_WORKGROUP` overrides it.
    pub fn new(context: Arc<C>) -> Self {
        Self::with_workgroup_shape(context, FilterConfig::from_env().workgroup)
    }

    /// Bind a filter with a non-default work-group shape.
    pub fn with_workgroup_shape(context: Arc<C>, shape: WorkGroupShape) -> Self {
        Self {
            context,
            radius: None,
            range_scalar: None,
            shape,
            kernel: RwLock::new(None),
        }
    }

    /// Bind a filter from a config, validating any initial parameters.
    pub fn with_config(context: Arc<C>, config: FilterConfig) -> BilateralResult<Self> {
        let mut filter = Self::with_workgroup_shape(context, config.workgroup);
        if let Some(radius) = config.radius {
            filter.set_radius(radius)?;
        }
        if let Some(scalar) = config.range_scalar {
            filter.set_scalar(scalar)?;
        }
        Ok(filter)
    }

    /// Set the spatial half-width in pixels. 0 is a pass-through.
    pub fn set_radius(&mut self, value: u32) -> BilateralResult<()> {
        self.radius = Some(params::validate_radius(value)?);
        Ok(())
    }

    /// Set the range sensitivity. Must be finite and > 0.
    pub fn set_scalar(&mut self, value: f32) -> BilateralResult<()> {
        self.range_scalar = Some(params::validate_range_scalar(value)?);
        Ok(())
    }

    /// Set both parameters at once.
    pub fn set_parameters(&mut self, params: FilterParameters) {
        self.radius = Some(params.radius());
        self.range_scalar = Some(params.range_scalar());
    }

    pub fn radius(&self) -> Option<u32> { self.radius }
    pub fn range_scalar(&self) -> Option<f32> { self.range_scalar }
    pub fn workgroup_shape(&self) -> WorkGroupShape { self.shape }
    pub fn context(&self) -> &Arc<C> { &self.context }

    /// Spatial sigma for the current radius.
    pub fn spatial_sigma(&self) -> Option<f32> {
        self.radius.map(params::spatial_sigma)
    }

    /// Both parameters, if set.
    pub fn parameters(&self) -> BilateralResult<FilterParameters> {
        let radius = self
            .radius
            .ok_or_else(|| BilateralError::InvalidParameter("radius not set".into()))?;
        let scalar = self
            .range_scalar
            .ok_or_else(|| BilateralError::InvalidParameter("range scalar not set".into()))?;
        FilterParameters::new(radius, scalar)
    }

    pub fn state(&self) -> FilterState {
        if self.current_kernel().is_some() {
            FilterState::Compiled
        } else {
            FilterState::Uninitialized
        }
    }

    pub fn is_compiled(&self) -> bool {
        self.state() == FilterState::Compiled
    }

    /// Compile the kernel and swap it in.
    ///
    /// On failure the previous kernel, if any, stays loaded.
    pub fn compile(&self) -> BilateralResult<()> {
        let source = kernel::kernel_source(self.shape);
        debug!(backend = self.context.name(), shape = %self.shape, "compiling bilateral kernel");

        let compiled = self.context.compile(&source).map_err(|e| {
            warn!(backend = self.context.name(), error = %e, "bilateral kernel rejected");
            BilateralError::compilation(e)
        })?;

        // The slot only ever holds a complete Arc, so a poisoned lock is safe to reuse.
        let mut slot = self.kernel.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(Arc::new(compiled));
        Ok(())
    }

    /// Filter `src` into `dst` on `device`.
    ///
    /// `dst` is untouched when an error is returned before dispatch
    /// (`NotCompiled`, `InvalidParameter`, `DimensionMismatch`, unsupported
    /// channel count).
    pub fn compute(&self, device: &C::Device, src: &C::Image, dst: &mut C::Image) -> BilateralResult<DispatchStats> {
        let kernel = self.current_kernel().ok_or(BilateralError::NotCompiled)?;
        let params = self.parameters()?;

        let (w, h, c) = src.dimensions();
        if dst.dimensions() != (w, h, c) {
            warn!(src = ?src.dimensions(), dst = ?dst.dimensions(), "bilateral size mismatch");
            return Err(BilateralError::DimensionMismatch {
                src: src.dimensions(),
                dst: dst.dimensions(),
            });
        }
        if src.format().is_none() {
            return Err(BilateralError::DeviceDispatchFailed {
                code: DispatchErrorCode::UnsupportedFormat,
                message: format!("{c} channels"),
            });
        }

        let grid = self.shape.grid_for(w, h);
        let uniforms = kernel::pack_params(w, h, c, &params);
        trace!(
            width = w,
            height = h,
            channels = c,
            radius = params.radius(),
            range_scalar = params.range_scalar(),
            groups_x = grid.groups_x,
            groups_y = grid.groups_y,
            "bilateral dispatch"
        );

        self.context
            .dispatch(device, &kernel, grid, &uniforms, src, dst)
            .map_err(BilateralError::dispatch)
    }

    /// Upload `image`, filter it and download the result.
    pub fn apply(&self, device: &C::Device, image: &HostImage) -> BilateralResult<HostImage> {
        let (w, h, c) = image.dimensions();
        let src = self.context.upload(device, image.data(), w, h, c)?;
        let mut dst = self.context.allocate(device, w, h, c)?;
        self.compute(device, &src, &mut dst)?;
        let data = self.context.download(device, &dst)?;
        Ok(HostImage::from_f32(data, w, h, c)?)
    }

    fn current_kernel(&self) -> Option<Arc<C::Kernel>> {
        self.kernel
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl<C: ComputeContext> std::fmt::Debug for BilateralGaussianFilter<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BilateralGaussianFilter")
            .field("backend", &self.context.name())
            .field("radius", &self.radius)
            .field("range_scalar", &self.range_scalar)
            .field("shape", &self.shape)
            .field("state", &self.state())
            .finish()
    }
}

//! Work-group shapes, dispatch grids and device limits.

use crate::{ComputeError, ComputeResult};

/// Upper bound on invocations per work-group (WebGPU default limit).
pub const MAX_INVOCATIONS_PER_WORKGROUP: u32 = 256;

/// Upper bound on either side of a work-group.
pub const MAX_WORKGROUP_SIDE: u32 = 32;

/// Fixed 2-D local work-group size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkGroupShape {
    x: u32,
    y: u32,
}

impl WorkGroupShape {
    /// 16x16: one warp-multiple of invocations, square footprint for
    /// neighbourhood reads.
    pub const DEFAULT: Self = Self { x: 16, y: 16 };

    /// Create a shape, rejecting empty or oversized groups.
    pub fn new(x: u32, y: u32) -> ComputeResult<Self> {
        if x == 0 || y == 0 || x > MAX_WORKGROUP_SIDE || y > MAX_WORKGROUP_SIDE {
            return Err(ComputeError::InvalidDimensions(x, y));
        }
        if x * y > MAX_INVOCATIONS_PER_WORKGROUP {
            return Err(ComputeError::InvalidDimensions(x, y));
        }
        Ok(Self { x, y })
    }

    pub fn x(&self) -> u32 { self.x }
    pub fn y(&self) -> u32 { self.y }

    /// Invocations per group.
    pub fn invocations(&self) -> u32 {
        self.x * self.y
    }

    /// Grid of groups that covers a `width x height` image.
    pub fn grid_for(&self, width: u32, height: u32) -> DispatchGrid {
        DispatchGrid {
            shape: *self,
            groups_x: width.div_ceil(self.x),
            groups_y: height.div_ceil(self.y),
        }
    }
}

impl Default for WorkGroupShape {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl std::fmt::Display for WorkGroupShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.x, self.y)
    }
}

/// Work-group counts for one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchGrid {
    pub shape: WorkGroupShape,
    pub groups_x: u32,
    pub groups_y: u32,
}

impl DispatchGrid {
    /// Global width in invocations (multiple of the shape).
    pub fn global_width(&self) -> u32 {
        self.groups_x * self.shape.x
    }

    /// Global height in invocations (multiple of the shape).
    pub fn global_height(&self) -> u32 {
        self.groups_y * self.shape.y
    }

    /// Total work-groups.
    pub fn workgroups(&self) -> u64 {
        self.groups_x as u64 * self.groups_y as u64
    }

    /// Total invocations launched.
    pub fn invocations(&self) -> u64 {
        self.workgroups() * self.shape.invocations() as u64
    }

    /// Whether the grid covers a `width x height` image.
    pub fn covers(&self, width: u32, height: u32) -> bool {
        self.global_width() >= width && self.global_height() >= height
    }
}

/// Device resource limits.
#[derive(Debug, Clone)]
pub struct DeviceLimits {
    /// Maximum work-groups per grid dimension.
    pub max_workgroups_per_dim: u32,
    /// Maximum buffer size in bytes.
    pub max_buffer_bytes: u64,
    /// Available device memory in bytes.
    pub available_memory: u64,
}

impl Default for DeviceLimits {
    fn default() -> Self {
        Self {
            max_workgroups_per_dim: 65535,
            max_buffer_bytes: 256 * 1024 * 1024, // 256 MB
            available_memory: 2 * 1024 * 1024 * 1024, // 2 GB
        }
    }
}

impl DeviceLimits {
    /// Check if an image buffer fits the device.
    pub fn fits_buffer(&self, width: u32, height: u32, channels: u32) -> bool {
        let bytes = (width as u64) * (height as u64) * (channels as u64) * 4;
        bytes <= self.max_buffer_bytes
    }

    /// Check if a grid fits the device.
    pub fn fits_grid(&self, grid: &DispatchGrid) -> bool {
        grid.groups_x <= self.max_workgroups_per_dim && grid.groups_y <= self.max_workgroups_per_dim
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_rounds_up() {
        let grid = WorkGroupShape::DEFAULT.grid_for(1000, 1000);
        assert_eq!(grid.groups_x, 63); // 62.5 -> 63
        assert_eq!(grid.groups_y, 63);
        assert_eq!(grid.global_width(), 1008);
        assert!(grid.covers(1000, 1000));
    }

    #[test]
    fn test_single_group() {
        let grid = WorkGroupShape::DEFAULT.grid_for(5, 5);
        assert_eq!(grid.workgroups(), 1);
        assert_eq!(grid.invocations(), 256);
    }

    #[test]
    fn test_exact_multiple() {
        let shape = WorkGroupShape::new(8, 4).unwrap();
        let grid = shape.grid_for(64, 32);
        assert_eq!((grid.groups_x, grid.groups_y), (8, 8));
        assert_eq!(grid.invocations(), 64 * 32);
    }

    #[test]
    fn test_shape_bounds() {
        assert!(WorkGroupShape::new(0, 8).is_err());
        assert!(WorkGroupShape::new(33, 1).is_err());
        assert!(WorkGroupShape::new(32, 16).is_err());
        assert!(WorkGroupShape::new(32, 8).is_ok());
    }

    #[test]
    fn test_limits() {
        let limits = DeviceLimits::default();
        assert!(limits.fits_buffer(1024, 1024, 4));
        assert!(!limits.fits_buffer(16384, 16384, 4));
        assert!(limits.fits_grid(&WorkGroupShape::DEFAULT.grid_for(4096, 4096)));
    }
}

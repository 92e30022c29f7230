//! Environment overrides.
//!
//! # Environment Variables
//!
//! - `GPUFX_BACKEND` - Force backend selection (`cpu`, `wgpu`, `auto`)
//! - `GPUFX_THREADS` - Default thread count for CPU devices
//! - `GPUFX_WORKGROUP` - Default work-group shape as `WxH` (e.g. `16x16`)
//! - `GPUFX_GPU_POWER` - wgpu adapter power preference (`low`, `high`)
//! - `GPUFX_GPU_MEMORY_MB` - Override the device memory estimate

use std::env;

use crate::backend::{Backend, WorkGroupShape};

/// Get backend override from environment.
pub fn backend_override() -> Option<Backend> {
    env::var("GPUFX_BACKEND").ok().and_then(|v| parse_backend(&v))
}

/// Get CPU thread count override from environment.
pub fn threads_override() -> Option<usize> {
    env::var("GPUFX_THREADS")
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .filter(|&n| n > 0)
}

/// Get work-group shape override from environment.
pub fn workgroup_override() -> Option<WorkGroupShape> {
    env::var("GPUFX_WORKGROUP").ok().and_then(|v| parse_workgroup(&v))
}

/// Whether the low-power adapter was requested.
pub fn low_power_requested() -> bool {
    env::var("GPUFX_GPU_POWER")
        .map(|v| v.trim().eq_ignore_ascii_case("low"))
        .unwrap_or(false)
}

/// Get device memory override in bytes.
pub fn memory_override() -> Option<u64> {
    env::var("GPUFX_GPU_MEMORY_MB")
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(|mb| mb.saturating_mul(1024 * 1024))
}

// =============================================================================
// Parsers
// =============================================================================

/// Parse a backend name.
pub fn parse_backend(s: &str) -> Option<Backend> {
    match s.trim().to_ascii_lowercase().as_str() {
        "auto" => Some(Backend::Auto),
        "cpu" => Some(Backend::Cpu),
        "wgpu" | "gpu" => Some(Backend::Wgpu),
        _ => None,
    }
}

/// Parse a `WxH` work-group shape. Invalid shapes yield `None`.
pub fn parse_workgroup(s: &str) -> Option<WorkGroupShape> {
    let (w, h) = s.trim().split_once(['x', 'X'])?;
    let w = w.trim().parse().ok()?;
    let h = h.trim().parse().ok()?;
    WorkGroupShape::new(w, h).ok()
}

//! Kernel sources and WGSL front-end validation shared by all backends.

use naga::valid::{Capabilities, ModuleInfo, ValidationFlags, Validator};

use crate::{ComputeError, ComputeResult};
use super::gpu_primitives::KernelParams;
use super::workgroup::WorkGroupShape;

/// Global invocation id of one work-item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Invocation {
    pub x: u32,
    pub y: u32,
}

/// Host rendition of a kernel entry point.
///
/// Called once per invocation with the full source image. Returns the texel
/// to store at `(x, y)` (first `channels` lanes used), or `None` when the
/// invocation is masked out.
pub type HostEntryFn = fn(Invocation, &KernelParams, &[f32]) -> Option<[f32; 4]>;

/// Everything a backend needs to compile a kernel.
#[derive(Clone)]
pub struct KernelSource {
    /// Debug label.
    pub label: String,
    /// WGSL module text.
    pub wgsl: String,
    /// Compute entry point name.
    pub entry_point: String,
    /// Local size the WGSL declares.
    pub workgroup: WorkGroupShape,
    /// Host rendition used by the CPU backend.
    pub host: HostEntryFn,
}

impl std::fmt::Debug for KernelSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelSource")
            .field("label", &self.label)
            .field("entry_point", &self.entry_point)
            .field("workgroup", &self.workgroup)
            .field("wgsl_len", &self.wgsl.len())
            .finish()
    }
}

/// Parse and validate `source.wgsl`, then check the entry point.
///
/// Errors carry the rendered naga diagnostic.
pub fn validate(source: &KernelSource) -> ComputeResult<(naga::Module, ModuleInfo)> {
    let module = naga::front::wgsl::parse_str(&source.wgsl).map_err(|e| {
        ComputeError::ShaderCompilation(format!(
            "{}: {}",
            source.label,
            e.emit_to_string(&source.wgsl)
        ))
    })?;

    let info = Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .map_err(|e| {
            ComputeError::ShaderCompilation(format!(
                "{}: {}",
                source.label,
                e.emit_to_string(&source.wgsl)
            ))
        })?;

    let entry = module
        .entry_points
        .iter()
        .find(|ep| ep.name == source.entry_point)
        .ok_or_else(|| {
            ComputeError::ShaderCompilation(format!(
                "{}: entry point `{}` not found",
                source.label, source.entry_point
            ))
        })?;

    if entry.stage != naga::ShaderStage::Compute {
        return Err(ComputeError::ShaderCompilation(format!(
            "{}: entry point `{}` is not a compute stage",
            source.label, source.entry_point
        )));
    }

    let expected = [source.workgroup.x(), source.workgroup.y(), 1];
    if entry.workgroup_size != expected {
        return Err(ComputeError::ShaderCompilation(format!(
            "{}: entry point `{}` declares workgroup_size {:?}, expected {:?}",
            source.label, source.entry_point, entry.workgroup_size, expected
        )));
    }

    Ok((module, info))
}

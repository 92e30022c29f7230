//! Error types for the bilateral filter.

use gpufx_compute::{ComputeError, DispatchErrorCode};
use thiserror::Error;

/// Error type for filter configuration, compilation and dispatch.
#[derive(Error, Debug)]
pub enum BilateralError {
    /// Radius or range scalar out of range, or not set before `compute()`.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// `compute()` called before a successful `compile()`.
    #[error("kernel not compiled")]
    NotCompiled,

    /// Backend rejected the kernel source.
    #[error("kernel compilation failed: {0}")]
    CompilationFailed(String),

    /// Source and destination differ in size or channel count.
    #[error("size mismatch: source {src:?}, destination {dst:?}")]
    DimensionMismatch {
        src: (u32, u32, u32),
        dst: (u32, u32, u32),
    },

    /// Backend rejected or failed the dispatch.
    #[error("dispatch failed ({code}): {message}")]
    DeviceDispatchFailed {
        code: DispatchErrorCode,
        message: String,
    },

    /// Upload, download or allocation failure in a helper.
    #[error(transparent)]
    Compute(#[from] ComputeError),
}

impl BilateralError {
    /// Map a backend compile error.
    pub(crate) fn compilation(err: ComputeError) -> Self {
        match err {
            ComputeError::ShaderCompilation(msg) => Self::CompilationFailed(msg),
            other => Self::CompilationFailed(other.to_string()),
        }
    }

    /// Map a backend dispatch error.
    pub(crate) fn dispatch(err: ComputeError) -> Self {
        match err {
            ComputeError::Dispatch { code, message } => Self::DeviceDispatchFailed { code, message },
            ComputeError::UnsupportedFormat(c) => Self::DeviceDispatchFailed {
                code: DispatchErrorCode::UnsupportedFormat,
                message: format!("{c} channels"),
            },
            other => Self::DeviceDispatchFailed {
                code: DispatchErrorCode::InvalidBinding,
                message: other.to_string(),
            },
        }
    }
}

/// Result type for filter operations.
pub type BilateralResult<T> = Result<T, BilateralError>;

//! Filter parameters and configuration.

use gpufx_compute::{WorkGroupShape, config};

use crate::{BilateralError, BilateralResult};

/// Largest accepted radius. A 513x513 window per invocation is already far
/// past interactive cost on any device.
pub const MAX_RADIUS: u32 = 256;

/// Spatial Gaussian sigma for a radius: `radius / 2`.
///
/// At the window edge the spatial weight is `exp(-2)`, about 0.135.
pub fn spatial_sigma(radius: u32) -> f32 {
    radius as f32 / 2.0
}

/// `1 / (2 sigma^2)` for the spatial Gaussian, 0 for radius 0.
pub fn spatial_coefficient(radius: u32) -> f32 {
    if radius == 0 {
        return 0.0;
    }
    let sigma = spatial_sigma(radius) as f64;
    (1.0 / (2.0 * sigma * sigma)) as f32
}

/// `1 / (2 s^2)` for the range Gaussian, clamped to `f32::MAX`.
pub fn range_coefficient(range_scalar: f32) -> f32 {
    let s = range_scalar as f64;
    (1.0 / (2.0 * s * s)).min(f32::MAX as f64) as f32
}

/// Check a radius.
pub fn validate_radius(radius: u32) -> BilateralResult<u32> {
    if radius > MAX_RADIUS {
        return Err(BilateralError::InvalidParameter(format!(
            "radius {radius} exceeds {MAX_RADIUS}"
        )));
    }
    Ok(radius)
}

/// Check a range scalar.
pub fn validate_range_scalar(value: f32) -> BilateralResult<f32> {
    if !value.is_finite() || value <= 0.0 {
        return Err(BilateralError::InvalidParameter(format!(
            "range scalar must be finite and > 0, got {value}"
        )));
    }
    Ok(value)
}

/// Validated radius and range scalar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterParameters {
    radius: u32,
    range_scalar: f32,
}

impl FilterParameters {
    /// Validate and bundle both parameters.
    pub fn new(radius: u32, range_scalar: f32) -> BilateralResult<Self> {
        Ok(Self {
            radius: validate_radius(radius)?,
            range_scalar: validate_range_scalar(range_scalar)?,
        })
    }

    pub fn radius(&self) -> u32 { self.radius }
    pub fn range_scalar(&self) -> f32 { self.range_scalar }

    /// Spatial sigma derived from the radius.
    pub fn spatial_sigma(&self) -> f32 {
        spatial_sigma(self.radius)
    }
}

/// Filter construction options.
#[derive(Debug, Clone, Default)]
pub struct FilterConfig {
    /// Local work-group size baked into the kernel.
    pub workgroup: WorkGroupShape,
    /// Initial radius.
    pub radius: Option<u32>,
    /// Initial range scalar.
    pub range_scalar: Option<f32>,
}

impl FilterConfig {
    /// Defaults with the `GPUFX_WORKGROUP` override applied.
    pub fn from_env() -> Self {
        Self {
            workgroup: config::workgroup_override().unwrap_or_default(),
            ..Default::default()
        }
    }

    pub fn with_params(mut self, radius: u32, range_scalar: f32) -> Self {
        self.radius = Some(radius);
        self.range_scalar = Some(range_scalar);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_radius_zero_has_no_spatial_falloff() {
        assert_eq!(spatial_sigma(0), 0.0);
        assert_eq!(spatial_coefficient(0), 0.0);
    }

    #[test]
    fn test_spatial_coefficient() {
        // sigma = 2 -> 1 / 8
        assert_relative_eq!(spatial_coefficient(4), 0.125);
        // sigma = 0.5 -> 2
        assert_relative_eq!(spatial_coefficient(1), 2.0);
    }

    #[test]
    fn test_range_coefficient_clamps() {
        assert_relative_eq!(range_coefficient(50.0), 1.0 / 5000.0);
        assert_eq!(range_coefficient(1e-30), f32::MAX);
        assert!(range_coefficient(f32::MIN_POSITIVE).is_finite());
    }

    #[test]
    fn test_range_scalar_validation() {
        assert!(validate_range_scalar(0.0).is_err());
        assert!(validate_range_scalar(-1.0).is_err());
        assert!(validate_range_scalar(f32::NAN).is_err());
        assert!(validate_range_scalar(f32::INFINITY).is_err());
        assert!(validate_range_scalar(1e-6).is_ok());
    }

    #[test]
    fn test_parameters_new() {
        let p = FilterParameters::new(3, 10.0).unwrap();
        assert_eq!(p.radius(), 3);
        assert_eq!(p.spatial_sigma(), 1.5);
        assert!(FilterParameters::new(MAX_RADIUS + 1, 10.0).is_err());
        assert!(FilterParameters::new(1, 0.0).is_err());
    }
}

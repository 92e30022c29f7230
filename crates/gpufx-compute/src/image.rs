//! Host-side image representation.

use crate::{ComputeError, ComputeResult};

/// Interleaved f32 pixel layouts understood by the backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    R32F,
    Rg32F,
    Rgb32F,
    Rgba32F,
}

impl PixelFormat {
    /// Format for a channel count, if supported.
    pub fn from_channels(channels: u32) -> Option<Self> {
        match channels {
            1 => Some(Self::R32F),
            2 => Some(Self::Rg32F),
            3 => Some(Self::Rgb32F),
            4 => Some(Self::Rgba32F),
            _ => None,
        }
    }

    /// Number of interleaved channels.
    pub fn channels(&self) -> u32 {
        match self {
            Self::R32F => 1,
            Self::Rg32F => 2,
            Self::Rgb32F => 3,
            Self::Rgba32F => 4,
        }
    }
}

/// Image stored in host memory, used to move pixels to and from a device.
#[derive(Clone, PartialEq)]
pub struct HostImage {
    /// Raw pixel data (f32).
    pub(crate) data: Vec<f32>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Number of channels (1 to 4).
    pub channels: u32,
}

impl HostImage {
    /// Create from f32 data.
    pub fn from_f32(data: Vec<f32>, width: u32, height: u32, channels: u32) -> ComputeResult<Self> {
        if width == 0 || height == 0 {
            return Err(ComputeError::InvalidDimensions(width, height));
        }
        if PixelFormat::from_channels(channels).is_none() {
            return Err(ComputeError::UnsupportedFormat(channels));
        }
        let expected = (width as usize) * (height as usize) * (channels as usize);
        if data.len() != expected {
            return Err(ComputeError::BufferSizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { data, width, height, channels })
    }

    /// Create an image with every sample set to `value`.
    pub fn filled(width: u32, height: u32, channels: u32, value: f32) -> Self {
        let size = (width as usize) * (height as usize) * (channels as usize);
        Self {
            data: vec![value; size],
            width,
            height,
            channels,
        }
    }

    /// Create empty image filled with zeros.
    pub fn new(width: u32, height: u32, channels: u32) -> Self {
        Self::filled(width, height, channels, 0.0)
    }

    /// Get pixel data.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Get mutable pixel data.
    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Consume into raw samples.
    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    /// Sample at `(x, y, ch)`.
    pub fn get(&self, x: u32, y: u32, ch: u32) -> f32 {
        self.data[((y * self.width + x) * self.channels + ch) as usize]
    }

    /// Write sample at `(x, y, ch)`.
    pub fn set(&mut self, x: u32, y: u32, ch: u32, value: f32) {
        let idx = ((y * self.width + x) * self.channels + ch) as usize;
        self.data[idx] = value;
    }

    /// Image dimensions.
    pub fn dimensions(&self) -> (u32, u32, u32) {
        (self.width, self.height, self.channels)
    }

    /// Size in bytes.
    pub fn size_bytes(&self) -> usize {
        self.data.len() * 4
    }
}

impl std::fmt::Debug for HostImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("channels", &self.channels)
            .field("size_bytes", &self.size_bytes())
            .finish()
    }
}

//! Captured frames and their pixel layout

use crate::error::LayoutError;
use std::time::Instant;

/// Pixel layout of a frame buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// One luminance byte per pixel
    Gray,
    /// Three bytes per pixel, R then G then B
    Rgb,
}

impl PixelFormat {
    /// Bytes used by one pixel
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Gray => 1,
            PixelFormat::Rgb => 3,
        }
    }
}

/// One captured image.
///
/// A frame owns its pixel buffer and exposes it read-only; sources build a new
/// buffer for every frame, so nothing can change the pixels once the frame has
/// been handed to a session.
#[derive(Debug, Clone)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    format: PixelFormat,
    sequence: u64,
    captured_at: Instant,
}

impl Frame {
    /// Create a frame stamped with the current time
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: PixelFormat,
        sequence: u64,
    ) -> Result<Self, LayoutError> {
        Self::with_timestamp(data, width, height, format, sequence, Instant::now())
    }

    /// Create a frame with an explicit capture time
    pub fn with_timestamp(
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: PixelFormat,
        sequence: u64,
        captured_at: Instant,
    ) -> Result<Self, LayoutError> {
        if width == 0 || height == 0 {
            return Err(LayoutError::ZeroDimension { width, height });
        }
        let expected = width as usize * height as usize * format.bytes_per_pixel();
        if data.len() != expected {
            return Err(LayoutError::BufferSize {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            format,
            sequence,
            captured_at,
        })
    }

    /// Copy of this frame's pixels under a new sequence number and timestamp.
    /// Used by sources that replay the same image more than once.
    pub fn restamped(&self, sequence: u64) -> Self {
        Self {
            data: self.data.clone(),
            width: self.width,
            height: self.height,
            format: self.format,
            sequence,
            captured_at: Instant::now(),
        }
    }

    /// Pixel bytes, row-major with no padding
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Layout of [`Frame::data`]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Monotonically increasing per source
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// When the source produced the frame
    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    /// Number of pixels (width * height)
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

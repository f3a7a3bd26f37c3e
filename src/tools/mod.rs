//! Image-file helpers for `qrtool`
//!
//! Turns image files into [`Frame`]s so they can be decoded directly or
//! replayed through a full session as a virtual camera.

use crate::config::max_dim_from_env;
use crate::error::ToolError;
use crate::models::{Frame, PixelFormat};
use image::GenericImageView;
use std::path::Path;
use tracing::debug;

/// Load an image file as an RGB frame, downscaled to `QR_MAX_DIM` if set
pub fn load_frame<P: AsRef<Path>>(path: P, sequence: u64) -> Result<Frame, ToolError> {
    load_frame_with_max_dim(path, sequence, max_dim_from_env())
}

/// Load an image file as an RGB frame, bounding its longest side by `max_dim`
pub fn load_frame_with_max_dim<P: AsRef<Path>>(
    path: P,
    sequence: u64,
    max_dim: Option<u32>,
) -> Result<Frame, ToolError> {
    let path = path.as_ref();
    let img = image::open(path).map_err(|source| ToolError::Image {
        path: path.display().to_string(),
        source,
    })?;

    let (orig_w, orig_h) = img.dimensions();
    let rgb = match max_dim {
        Some(max_dim) if orig_w.max(orig_h) > max_dim => {
            debug!(
                path = %path.display(),
                from = ?(orig_w, orig_h),
                max_dim,
                "downscaling image"
            );
            img.resize(max_dim, max_dim, image::imageops::FilterType::Triangle)
                .to_rgb8()
        }
        _ => img.to_rgb8(),
    };

    let (width, height) = rgb.dimensions();
    Ok(Frame::new(rgb.into_raw(), width, height, PixelFormat::Rgb, sequence)?)
}

/// Load several image files as frames numbered from 1
pub fn load_frames<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<Frame>, ToolError> {
    paths
        .iter()
        .enumerate()
        .map(|(i, path)| load_frame(path, i as u64 + 1))
        .collect()
}

/// Write a frame to disk; the format follows the file extension
pub fn save_frame<P: AsRef<Path>>(frame: &Frame, path: P) -> Result<(), ToolError> {
    let path = path.as_ref();
    let color = match frame.format() {
        PixelFormat::Gray => image::ColorType::L8,
        PixelFormat::Rgb => image::ColorType::Rgb8,
    };
    image::save_buffer(path, frame.data(), frame.width(), frame.height(), color).map_err(
        |source| ToolError::Image {
            path: path.display().to_string(),
            source,
        },
    )
}

//! Luminance conversion for decode input
//! Y = 0.299*R + 0.587*G + 0.114*B
//! Uses fast integer arithmetic: Y = (76*R + 150*G + 29*B) >> 8
//!
//! Frames at or above `PARALLEL_THRESHOLD` pixels are converted row-parallel
//! with rayon; smaller frames use the unrolled scalar loop.

use crate::models::{Frame, PixelFormat};
use rayon::prelude::*;

/// Coefficients for grayscale conversion: Y = (76*R + 150*G + 29*B) >> 8
const COEF_R: u32 = 76;
const COEF_G: u32 = 150;
const COEF_B: u32 = 29;

/// Pixel count above which conversion is split across the rayon pool (~1 MP)
pub const PARALLEL_THRESHOLD: usize = 1024 * 1024;

#[inline(always)]
fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((COEF_R * r as u32 + COEF_G * g as u32 + COEF_B * b as u32) >> 8).min(255) as u8
}

/// Convert RGB image to grayscale
pub fn rgb_to_grayscale(rgb: &[u8], width: usize, height: usize) -> Vec<u8> {
    let mut gray = Vec::new();
    rgb_to_grayscale_into(rgb, width, height, &mut gray);
    gray
}

/// Convert RGB to grayscale into a reusable buffer.
///
/// `output` is resized to `width * height`; its capacity is kept between calls.
pub fn rgb_to_grayscale_into(rgb: &[u8], width: usize, height: usize, output: &mut Vec<u8>) {
    let pixel_count = width * height;
    debug_assert!(rgb.len() >= pixel_count * 3, "RGB buffer too small");
    output.clear();
    output.resize(pixel_count, 0);

    if pixel_count >= PARALLEL_THRESHOLD && width > 0 {
        output
            .par_chunks_mut(width)
            .zip(rgb.par_chunks(width * 3))
            .for_each(|(row, src)| convert_row(src, row));
    } else {
        convert_row(&rgb[..pixel_count * 3], output);
    }
}

/// Scalar conversion with manual 8x unrolling
fn convert_row(rgb: &[u8], gray: &mut [u8]) {
    let mut chunks = gray.chunks_exact_mut(8);
    let mut src = rgb.chunks_exact(24);
    for (out, px) in (&mut chunks).zip(&mut src) {
        for j in 0..8 {
            out[j] = luma(px[j * 3], px[j * 3 + 1], px[j * 3 + 2]);
        }
    }
    for (out, px) in chunks
        .into_remainder()
        .iter_mut()
        .zip(src.remainder().chunks_exact(3))
    {
        *out = luma(px[0], px[1], px[2]);
    }
}

/// Luminance plane of a frame, written into `output`
pub fn frame_luma_into(frame: &Frame, output: &mut Vec<u8>) {
    match frame.format() {
        PixelFormat::Gray => {
            output.clear();
            output.extend_from_slice(frame.data());
        }
        PixelFormat::Rgb => rgb_to_grayscale_into(
            frame.data(),
            frame.width() as usize,
            frame.height() as usize,
            output,
        ),
    }
}

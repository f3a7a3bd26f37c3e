use crate::config::ScanConfig;
use crate::decoder::FrameDecoder;
use crate::models::{DecodeResult, Frame};
use crate::utils::binarization::enhance_for_decode;
use crate::utils::grayscale::frame_luma_into;
use tracing::{debug, trace};

/// QR decoder: luminance conversion, symbol location, payload decoding.
///
/// Keeps its luminance buffer between calls so a session decoding a steady
/// stream of same-sized frames does not reallocate per frame.
pub struct QrDecoder {
    enhance: bool,
    luma: Vec<u8>,
}

impl QrDecoder {
    /// Create a decoder with the enhancement pass enabled
    pub fn new() -> Self {
        Self {
            enhance: true,
            luma: Vec::new(),
        }
    }

    /// Create a decoder following `config.enhance`
    pub fn from_config(config: &ScanConfig) -> Self {
        Self::new().with_enhance(config.enhance)
    }

    /// Enable or disable the contrast-stretch + Otsu retry
    pub fn with_enhance(mut self, enhance: bool) -> Self {
        self.enhance = enhance;
        self
    }

    /// Decode a luminance plane directly
    pub fn decode_luma(gray: &[u8], width: usize, height: usize) -> DecodeResult {
        if width == 0 || height == 0 || gray.len() < width * height {
            return DecodeResult::NotFound;
        }
        let mut prepared =
            rqrr::PreparedImage::prepare_from_greyscale(width, height, |x, y| gray[y * width + x]);
        let grids = prepared.detect_grids();
        if grids.is_empty() {
            return DecodeResult::NotFound;
        }
        trace!(grids = grids.len(), "candidate symbols located");

        let mut last_error = None;
        for grid in &grids {
            match grid.decode() {
                Ok((meta, content)) => {
                    debug!(meta = ?meta, "symbol decoded");
                    return DecodeResult::Decoded { text: content };
                }
                Err(err) => last_error = Some(err),
            }
        }

        match last_error {
            Some(err) => DecodeResult::DecodeError {
                reason: format!("{:?}", err),
            },
            None => DecodeResult::NotFound,
        }
    }
}

impl Default for QrDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder for QrDecoder {
    fn decode(&mut self, frame: &Frame) -> DecodeResult {
        let width = frame.width() as usize;
        let height = frame.height() as usize;
        frame_luma_into(frame, &mut self.luma);

        let first = Self::decode_luma(&self.luma, width, height);
        if !self.enhance || first.is_decoded() {
            return first;
        }

        enhance_for_decode(&mut self.luma);
        match Self::decode_luma(&self.luma, width, height) {
            DecodeResult::Decoded { text } => {
                debug!(sequence = frame.sequence(), "decoded after enhancement");
                DecodeResult::Decoded { text }
            }
            // A symbol seen by either pass but not recovered is the more useful report
            DecodeResult::NotFound => first,
            retry @ DecodeResult::DecodeError { .. } => match first {
                DecodeResult::DecodeError { .. } => first,
                _ => retry,
            },
        }
    }
}

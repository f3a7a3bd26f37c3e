//! Frame decoding
//!
//! A [`FrameDecoder`] turns one frame into a [`DecodeResult`]. The session
//! drives it from its decode worker and never shares it between threads.

/// QR decoder backed by `rqrr`
pub mod qr_decoder;

pub use qr_decoder::QrDecoder;

use crate::models::{DecodeResult, Frame};

/// Decodes a single frame.
///
/// Results must depend only on the frame's pixels; `&mut self` exists so
/// implementations can keep scratch buffers between calls. Implementations
/// must not panic on frames without a symbol or with damaged symbols.
pub trait FrameDecoder: Send {
    /// Look for a symbol in `frame` and decode it
    fn decode(&mut self, frame: &Frame) -> DecodeResult;
}

impl<F> FrameDecoder for F
where
    F: FnMut(&Frame) -> DecodeResult + Send,
{
    fn decode(&mut self, frame: &Frame) -> DecodeResult {
        self(frame)
    }
}

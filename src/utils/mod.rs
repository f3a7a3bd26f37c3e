//! Utility functions shared by the decoder and the session
//!
//! - Grayscale conversion (RGB to luminance)
//! - Minimal enhancement (contrast stretch, Otsu binarization)
//! - Single-slot mailboxes for frame handoff

pub mod binarization;
pub mod grayscale;
pub mod mailbox;

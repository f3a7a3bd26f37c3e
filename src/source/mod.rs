//! Frame sources
//!
//! A [`FrameSource`] is an opened camera (or something pretending to be one)
//! that hands out frames on demand. Sources are created by a
//! [`SourceOpener`] on the session's worker thread, so a source itself never
//! has to cross threads.
//!
//! - [`ReplaySource`] plays back a fixed list of frames (image files, tests)
//! - [`CameraOpener`] opens a live camera (feature `webcam`)

pub mod camera;
#[cfg_attr(not(feature = "webcam"), allow(dead_code))]
mod capture;
pub mod replay;

pub use camera::CameraOpener;
pub use replay::{ReplayOpener, ReplaySource};

use crate::config::DeviceSelector;
use crate::error::{DeviceError, FrameError};
use crate::models::Frame;
use std::time::Duration;

/// An exclusively opened frame producer.
pub trait FrameSource {
    /// Block until the next frame arrives or `timeout` elapses.
    ///
    /// Returns [`FrameError::DeviceLost`] once the device has failed; callers
    /// must not call again after that.
    fn next_frame(&mut self, timeout: Duration) -> Result<Frame, FrameError>;

    /// Release the device. Idempotent.
    fn close(&mut self);
}

/// Opens a [`FrameSource`] for a device selector.
pub trait SourceOpener: Send {
    /// Open the device `selector` names, ready to stream.
    fn open(&mut self, selector: &DeviceSelector) -> Result<Box<dyn FrameSource>, DeviceError>;
}

impl<F> SourceOpener for F
where
    F: FnMut(&DeviceSelector) -> Result<Box<dyn FrameSource>, DeviceError> + Send,
{
    fn open(&mut self, selector: &DeviceSelector) -> Result<Box<dyn FrameSource>, DeviceError> {
        self(selector)
    }
}

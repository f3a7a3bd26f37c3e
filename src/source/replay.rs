//! Image-list playback posing as a camera

use crate::config::DeviceSelector;
use crate::error::{DeviceError, FrameError};
use crate::models::Frame;
use crate::source::{FrameSource, SourceOpener};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// Plays back a fixed list of frames at a steady cadence.
///
/// Every delivered frame is a fresh copy with its own sequence number. Once the
/// list is exhausted (and looping is off) the source behaves like a stalled
/// camera: every call waits out its timeout and returns [`FrameError::Timeout`].
pub struct ReplaySource {
    frames: Vec<Frame>,
    interval: Duration,
    looping: bool,
    position: usize,
    next_sequence: u64,
    next_due: Instant,
    closed: bool,
}

impl ReplaySource {
    /// Play `frames` once, one every `interval`
    pub fn new(frames: Vec<Frame>, interval: Duration) -> Self {
        Self {
            frames,
            interval,
            looping: false,
            position: 0,
            next_sequence: 1,
            next_due: Instant::now(),
            closed: false,
        }
    }

    /// Restart from the first frame after the last one
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    fn exhausted(&self) -> bool {
        self.frames.is_empty() || (!self.looping && self.position >= self.frames.len())
    }
}

impl FrameSource for ReplaySource {
    fn next_frame(&mut self, timeout: Duration) -> Result<Frame, FrameError> {
        if self.closed {
            return Err(FrameError::DeviceLost {
                reason: "replay source closed".to_string(),
            });
        }
        if self.exhausted() {
            thread::sleep(timeout);
            return Err(FrameError::Timeout);
        }

        let now = Instant::now();
        if self.next_due > now {
            let wait = self.next_due - now;
            if wait > timeout {
                thread::sleep(timeout);
                return Err(FrameError::Timeout);
            }
            thread::sleep(wait);
        }

        let index = self.position % self.frames.len();
        let frame = self.frames[index].restamped(self.next_sequence);
        self.position += 1;
        self.next_sequence += 1;
        self.next_due = Instant::now() + self.interval;
        Ok(frame)
    }

    fn close(&mut self) {
        if !self.closed {
            debug!(delivered = self.next_sequence - 1, "replay source closed");
            self.closed = true;
        }
    }
}

/// Opener that ignores the selector and replays `frames`
pub struct ReplayOpener {
    frames: Vec<Frame>,
    interval: Duration,
    looping: bool,
}

impl ReplayOpener {
    /// Opener for a [`ReplaySource`] over `frames`
    pub fn new(frames: Vec<Frame>, interval: Duration) -> Self {
        Self {
            frames,
            interval,
            looping: false,
        }
    }

    /// See [`ReplaySource::looping`]
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }
}

impl SourceOpener for ReplayOpener {
    fn open(&mut self, selector: &DeviceSelector) -> Result<Box<dyn FrameSource>, DeviceError> {
        if self.frames.is_empty() {
            return Err(DeviceError::NotFound {
                selector: selector.to_string(),
            });
        }
        let frames = std::mem::take(&mut self.frames);
        Ok(Box::new(
            ReplaySource::new(frames, self.interval).looping(self.looping),
        ))
    }
}

//! Live preview handoff
//!
//! The session offers every acquired frame to a [`PreviewSink`]. Sinks run on
//! the session worker, so they must return immediately; the usual sink is a
//! [`PreviewMailbox`] that the display thread polls for the newest frame.

use crate::models::Frame;
use crate::utils::mailbox::Mailbox;
use std::sync::Arc;
use std::time::Duration;

/// Receives frames for display. `show` must not block.
pub trait PreviewSink: Send {
    /// Offer `frame` for display
    fn show(&self, frame: Arc<Frame>);
}

impl<F> PreviewSink for F
where
    F: Fn(Arc<Frame>) + Send,
{
    fn show(&self, frame: Arc<Frame>) {
        self(frame)
    }
}

/// Sink that discards every frame
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPreview;

impl PreviewSink for NullPreview {
    fn show(&self, _frame: Arc<Frame>) {}
}

/// Latest-frame mailbox shared between the session and a display surface.
///
/// Cloning yields another handle to the same slot. An unread frame is
/// replaced by the next one; the display always gets the newest frame and
/// dropped preview frames are expected.
#[derive(Clone, Default)]
pub struct PreviewMailbox {
    slot: Arc<Mailbox<Arc<Frame>>>,
}

impl PreviewMailbox {
    /// Empty mailbox
    pub fn new() -> Self {
        Self::default()
    }

    /// Newest frame not yet taken, if any
    pub fn take_latest(&self) -> Option<Arc<Frame>> {
        self.slot.take()
    }

    /// Wait up to `timeout` for a frame
    pub fn wait_latest(&self, timeout: Duration) -> Option<Arc<Frame>> {
        self.slot.take_timeout(timeout)
    }
}

impl PreviewSink for PreviewMailbox {
    fn show(&self, frame: Arc<Frame>) {
        self.slot.put(frame);
    }
}

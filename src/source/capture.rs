//! Push-to-pull adapter for capture backends
//!
//! Camera backends deliver frames on their own schedule, so the device is
//! owned by a dedicated capture thread that pushes every frame into a
//! single-slot mailbox. `next_frame` waits on that mailbox with the caller's
//! timeout. An unread frame is replaced by the next one, so a slow consumer
//! never builds a backlog.
//!
//! The backend is two closures: `open` runs once on the capture thread and
//! returns the grab closure, which is called once per frame with the sequence
//! number to stamp. Dropping the grab closure releases the device.

use crate::config::DeviceSelector;
use crate::error::{DeviceError, FrameError};
use crate::models::Frame;
use crate::source::FrameSource;
use crate::utils::mailbox::Mailbox;
use crossbeam_channel::{RecvTimeoutError, Sender, bounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

type Slot = Mailbox<Result<Frame, FrameError>>;

/// A [`FrameSource`] backed by a capture thread
pub(crate) struct CaptureSource {
    frames: Arc<Slot>,
    stop: Arc<AtomicBool>,
    capture: Option<JoinHandle<()>>,
    lost: bool,
    closed: bool,
}

impl CaptureSource {
    /// Start the capture thread and wait up to `open_timeout` for `open`.
    ///
    /// On every error path the capture thread has been joined before this
    /// returns, so a device that finishes opening late is released here.
    pub(crate) fn spawn<O, G>(
        selector: &DeviceSelector,
        open_timeout: Duration,
        open: O,
    ) -> Result<Self, DeviceError>
    where
        O: FnOnce() -> Result<G, DeviceError> + Send + 'static,
        G: FnMut(u64) -> Result<Frame, String>,
    {
        let frames: Arc<Slot> = Arc::new(Mailbox::new());
        let stop = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = bounded(1);

        let capture = {
            let frames = Arc::clone(&frames);
            let stop = Arc::clone(&stop);
            let label = selector.to_string();
            thread::Builder::new()
                .name("qr-camera-capture".to_string())
                .spawn(move || capture_loop(label, open, frames, stop, ready_tx))
                .map_err(|err| DeviceError::Backend(format!("capture thread: {}", err)))?
        };

        match ready_rx.recv_timeout(open_timeout) {
            Ok(Ok(())) => {
                info!(%selector, "camera opened");
                Ok(Self {
                    frames,
                    stop,
                    capture: Some(capture),
                    lost: false,
                    closed: false,
                })
            }
            Ok(Err(err)) => {
                join_capture(capture);
                Err(err)
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(%selector, ?open_timeout, "camera did not open in time");
                stop.store(true, Ordering::Release);
                // The pending open has to return before the device can be released
                join_capture(capture);
                Err(DeviceError::Busy {
                    selector: selector.to_string(),
                })
            }
            Err(RecvTimeoutError::Disconnected) => {
                join_capture(capture);
                Err(DeviceError::Backend(
                    "capture thread exited during open".to_string(),
                ))
            }
        }
    }
}

impl FrameSource for CaptureSource {
    fn next_frame(&mut self, timeout: Duration) -> Result<Frame, FrameError> {
        if self.closed || self.lost {
            return Err(FrameError::DeviceLost {
                reason: "camera already released".to_string(),
            });
        }
        match self.frames.take_timeout(timeout) {
            Some(Ok(frame)) => Ok(frame),
            Some(Err(err)) => {
                self.lost = true;
                Err(err)
            }
            None => {
                let finished = self.capture.as_ref().is_none_or(|h| h.is_finished());
                if finished && self.frames.is_empty() {
                    self.lost = true;
                    Err(FrameError::DeviceLost {
                        reason: "capture thread stopped".to_string(),
                    })
                } else {
                    Err(FrameError::Timeout)
                }
            }
        }
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.capture.take() {
            join_capture(handle);
        }
        let _ = self.frames.take();
        debug!("camera released");
    }
}

impl Drop for CaptureSource {
    fn drop(&mut self) {
        self.close();
    }
}

fn join_capture(handle: JoinHandle<()>) {
    if handle.join().is_err() {
        warn!("camera capture thread panicked");
    }
}

fn capture_loop<O, G>(
    label: String,
    open: O,
    frames: Arc<Slot>,
    stop: Arc<AtomicBool>,
    ready: Sender<Result<(), DeviceError>>,
) where
    O: FnOnce() -> Result<G, DeviceError>,
    G: FnMut(u64) -> Result<Frame, String>,
{
    let mut grab = match open() {
        Ok(grab) => grab,
        Err(err) => {
            let _ = ready.send(Err(err));
            return;
        }
    };
    if stop.load(Ordering::Acquire) || ready.send(Ok(())).is_err() {
        return;
    }

    let mut sequence = 1u64;
    while !stop.load(Ordering::Acquire) {
        match grab(sequence) {
            Ok(frame) => {
                frames.put(Ok(frame));
                sequence += 1;
            }
            Err(reason) => {
                warn!(%label, %reason, "camera capture failed");
                frames.put(Err(FrameError::DeviceLost { reason }));
                break;
            }
        }
    }
}

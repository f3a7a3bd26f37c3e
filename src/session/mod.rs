//! Scan sessions
//!
//! A [`ScanSession`] runs once on its own worker thread:
//!
//! ```text
//! Idle -> Starting -> Running -> Finishing -> Terminated
//!            |                                   ^
//!            +------- open failed ---------------+
//! ```
//!
//! While `Running` it pulls frames from its [`FrameSource`], offers each one
//! to the preview sink and to the decode worker (latest frame wins), and stops
//! on the first decoded symbol, a cancel request or a lost device. Whatever
//! the exit, the source is closed exactly once and then the decode worker is
//! joined, both before `Terminated` is published.

/// Controller and cancel handle given to the application
pub mod controller;
mod decode_worker;

pub use controller::{CancelToken, SessionController};

use crate::config::ScanConfig;
use crate::decoder::{FrameDecoder, QrDecoder};
use crate::error::FrameError;
use crate::models::{SessionOutcome, SessionState};
use crate::preview::{NullPreview, PreviewSink};
use crate::source::{FrameSource, SourceOpener};
use decode_worker::DecodeWorker;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{debug, error, info, trace, warn};

/// State visible to both the controller and the worker: the lifecycle state,
/// the cancel flag and the write-once outcome.
pub(crate) struct SessionShared {
    state: AtomicU8,
    cancel: AtomicBool,
    outcome: OnceLock<SessionOutcome>,
}

impl SessionShared {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(SessionState::Idle as u8),
            cancel: AtomicBool::new(false),
            outcome: OnceLock::new(),
        }
    }

    pub(crate) fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire)).unwrap_or(SessionState::Terminated)
    }

    fn transition(&self, to: SessionState) {
        let from = self.state.swap(to as u8, Ordering::AcqRel);
        debug!(from = ?SessionState::from_u8(from), to = ?to, "session state");
    }

    /// Idle -> Starting; false if the session was cancelled first
    fn try_begin(&self) -> bool {
        self.state
            .compare_exchange(
                SessionState::Idle as u8,
                SessionState::Starting as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub(crate) fn request_cancel(&self) {
        if self.state() == SessionState::Terminated {
            return;
        }
        self.cancel.store(true, Ordering::Release);
        // Never started: terminate in place, no device was ever touched
        if self
            .state
            .compare_exchange(
                SessionState::Idle as u8,
                SessionState::Terminated as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
        {
            let _ = self.outcome.set(SessionOutcome::Cancelled);
            debug!("session cancelled before start");
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    /// Record the outcome (first writer wins) and publish `Terminated`
    fn finish(&self, outcome: SessionOutcome) -> SessionOutcome {
        if self.outcome.set(outcome).is_err() {
            trace!("session outcome already recorded");
        }
        self.transition(SessionState::Terminated);
        self.outcome().unwrap_or(SessionOutcome::Cancelled)
    }

    pub(crate) fn outcome(&self) -> Option<SessionOutcome> {
        match self.outcome.get() {
            Some(outcome) => Some(outcome.clone()),
            // Between the Idle -> Terminated swap of a pre-start cancel and its write
            None if self.state() == SessionState::Terminated => Some(SessionOutcome::Cancelled),
            None => None,
        }
    }
}

/// Closes the wrapped source exactly once: explicitly, or on drop if the
/// worker unwinds before reaching `Finishing`.
struct SourceGuard {
    source: Box<dyn FrameSource>,
    closed: bool,
}

impl SourceGuard {
    fn new(source: Box<dyn FrameSource>) -> Self {
        Self {
            source,
            closed: false,
        }
    }

    fn source(&mut self) -> &mut dyn FrameSource {
        self.source.as_mut()
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.source.close();
        }
    }
}

impl Drop for SourceGuard {
    fn drop(&mut self) {
        self.close();
    }
}

/// One scan attempt. Built through [`ScanSession::builder`], driven through the
/// returned [`SessionController`]; never reused.
pub struct ScanSession {
    opener: Box<dyn SourceOpener>,
    decoder: Box<dyn FrameDecoder>,
    preview: Box<dyn PreviewSink>,
    config: ScanConfig,
    shared: Arc<SessionShared>,
}

impl ScanSession {
    /// Start building a session that will open its device through `opener`
    pub fn builder(opener: impl SourceOpener + 'static) -> ScanSessionBuilder {
        ScanSessionBuilder {
            opener: Box::new(opener),
            decoder: None,
            preview: Box::new(NullPreview),
            config: ScanConfig::default(),
        }
    }

    /// Worker body. The controller has already moved the state to `Starting`.
    fn run(self) -> SessionOutcome {
        let ScanSession {
            mut opener,
            decoder,
            preview,
            config,
            shared,
        } = self;
        if shared.is_cancelled() {
            return shared.finish(SessionOutcome::Cancelled);
        }

        let decode = match DecodeWorker::spawn(decoder, config.decode_budget) {
            Ok(worker) => worker,
            Err(err) => {
                error!(error = %err, "failed to spawn decode worker");
                return shared.finish(SessionOutcome::DeviceUnavailable);
            }
        };

        let source = match opener.open(&config.device) {
            Ok(source) => source,
            Err(err) => {
                warn!(device = %config.device, error = %err, "camera unavailable");
                decode.shutdown();
                return shared.finish(SessionOutcome::DeviceUnavailable);
            }
        };
        let mut guard = SourceGuard::new(source);
        info!(device = %config.device, "scan session running");
        shared.transition(SessionState::Running);

        let outcome = capture_loop(&shared, &config, preview.as_ref(), guard.source(), &decode);

        shared.transition(SessionState::Finishing);
        // A decode still running cannot be interrupted; release the camera
        // before waiting it out
        guard.close();
        decode.shutdown();
        info!(%outcome, "scan session finished");
        shared.finish(outcome)
    }
}

fn capture_loop(
    shared: &SessionShared,
    config: &ScanConfig,
    preview: &dyn PreviewSink,
    source: &mut dyn FrameSource,
    decode: &DecodeWorker,
) -> SessionOutcome {
    let timeout = config.frame_timeout;
    let mut last_sequence = None;

    loop {
        if shared.is_cancelled() {
            return SessionOutcome::Cancelled;
        }
        if let Some(text) = decode.poll_decoded() {
            return SessionOutcome::Success { text };
        }

        match source.next_frame(timeout) {
            Ok(frame) => {
                let sequence = frame.sequence();
                if last_sequence.is_some_and(|last| sequence <= last) {
                    warn!(sequence, ?last_sequence, "out-of-order frame dropped");
                    continue;
                }
                last_sequence = Some(sequence);

                let frame = Arc::new(frame);
                preview.show(Arc::clone(&frame));
                decode.submit(frame);
            }
            Err(FrameError::Timeout) => {
                trace!(?timeout, "no frame within timeout");
            }
            Err(FrameError::DeviceLost { reason }) => {
                warn!(%reason, "camera lost during scan");
                return SessionOutcome::DeviceLost;
            }
        }
    }
}

/// Assembles a [`ScanSession`] and hands back its controller
pub struct ScanSessionBuilder {
    opener: Box<dyn SourceOpener>,
    decoder: Option<Box<dyn FrameDecoder>>,
    preview: Box<dyn PreviewSink>,
    config: ScanConfig,
}

impl ScanSessionBuilder {
    /// Replace the default [`QrDecoder`]
    pub fn decoder(mut self, decoder: impl FrameDecoder + 'static) -> Self {
        self.decoder = Some(Box::new(decoder));
        self
    }

    /// Where preview frames go (defaults to [`NullPreview`])
    pub fn preview(mut self, preview: impl PreviewSink + 'static) -> Self {
        self.preview = Box::new(preview);
        self
    }

    /// Timeouts, budget and device (defaults to [`ScanConfig::default`])
    pub fn config(mut self, config: ScanConfig) -> Self {
        self.config = config;
        self
    }

    /// Create the session in `Idle`; nothing runs until `start()`
    pub fn build(self) -> SessionController {
        let decoder: Box<dyn FrameDecoder> = match self.decoder {
            Some(decoder) => decoder,
            None => Box::new(QrDecoder::from_config(&self.config)),
        };
        let shared = Arc::new(SessionShared::new());
        SessionController::new(ScanSession {
            opener: self.opener,
            decoder,
            preview: self.preview,
            config: self.config,
            shared,
        })
    }
}

use super::{ScanSession, SessionShared};
use crate::error::SessionError;
use crate::models::{SessionOutcome, SessionState};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error};

/// Cloneable cancel handle, usable from any thread
#[derive(Clone)]
pub struct CancelToken {
    shared: Arc<SessionShared>,
}

impl CancelToken {
    /// Ask the session to stop. Safe to call any number of times, in any
    /// state; does nothing once the session has terminated.
    pub fn cancel(&self) {
        self.shared.request_cancel();
    }

    /// True once the outcome has been published
    pub fn is_terminated(&self) -> bool {
        self.shared.state() == SessionState::Terminated
    }
}

/// The application's handle on one scan session.
///
/// `start()` returns immediately; `await_outcome()` is the one blocking call
/// and returns only after the camera has been released and every worker
/// thread joined. Dropping a running controller cancels and joins it.
pub struct SessionController {
    shared: Arc<SessionShared>,
    session: Option<ScanSession>,
    worker: Option<JoinHandle<SessionOutcome>>,
}

impl SessionController {
    pub(crate) fn new(session: ScanSession) -> Self {
        Self {
            shared: Arc::clone(&session.shared),
            session: Some(session),
            worker: None,
        }
    }

    /// Spawn the session worker.
    ///
    /// A session cancelled before this call stays `Terminated(Cancelled)` and
    /// never opens its device.
    pub fn start(&mut self) -> Result<(), SessionError> {
        let session = self.session.take().ok_or(SessionError::AlreadyStarted)?;
        if !self.shared.try_begin() {
            debug!("start ignored, session already terminated");
            return Ok(());
        }
        debug!("session starting");

        match thread::Builder::new()
            .name("qr-scan-session".to_string())
            .spawn(move || session.run())
        {
            Ok(handle) => {
                self.worker = Some(handle);
                Ok(())
            }
            Err(err) => {
                error!(error = %err, "failed to spawn scan session");
                self.shared.finish(SessionOutcome::DeviceUnavailable);
                Err(SessionError::Spawn(err))
            }
        }
    }

    /// Request cancellation; see [`CancelToken::cancel`]
    pub fn cancel(&self) {
        self.shared.request_cancel();
    }

    /// Cancel handle that can outlive `&self` and move to other threads
    pub fn cancel_token(&self) -> CancelToken {
        CancelToken {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Block until the session terminates and return its outcome.
    ///
    /// Calling this on a session that was never started cancels it. Later
    /// calls return the same outcome without blocking.
    pub fn await_outcome(&mut self) -> SessionOutcome {
        if let Some(handle) = self.worker.take() {
            return match handle.join() {
                Ok(outcome) => outcome,
                Err(_) => {
                    // Unwinding already closed the source and joined the decoder
                    error!("scan session worker panicked");
                    self.shared.finish(SessionOutcome::DeviceLost)
                }
            };
        }
        if self.shared.state() == SessionState::Idle {
            self.shared.request_cancel();
        }
        self.shared.outcome().unwrap_or(SessionOutcome::Cancelled)
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// Outcome if the session has terminated, without blocking
    pub fn outcome(&self) -> Option<SessionOutcome> {
        self.shared.outcome()
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.shared.request_cancel();
            let _ = self.await_outcome();
        }
    }
}

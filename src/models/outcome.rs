//! Per-frame decode results and session-level outcomes

use std::fmt;

/// Result of decoding a single frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeResult {
    /// A QR symbol was located and its payload decoded
    Decoded {
        /// Decoded payload
        text: String,
    },
    /// No symbol in the frame (the common case)
    NotFound,
    /// A symbol was located but its data could not be recovered
    DecodeError {
        /// Human-readable cause
        reason: String,
    },
}

impl DecodeResult {
    /// True for [`DecodeResult::Decoded`]
    pub fn is_decoded(&self) -> bool {
        matches!(self, DecodeResult::Decoded { .. })
    }
}

/// Terminal result of a scan session; set exactly once
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// A frame decoded to `text`
    Success {
        /// Decoded payload
        text: String,
    },
    /// The user closed the scan
    Cancelled,
    /// The camera could not be opened
    DeviceUnavailable,
    /// The camera failed or disappeared mid-session
    DeviceLost,
}

impl SessionOutcome {
    /// Decoded text, if the session succeeded
    pub fn text(&self) -> Option<&str> {
        match self {
            SessionOutcome::Success { text } => Some(text),
            _ => None,
        }
    }

    /// True for the device faults the caller should report to the user
    pub fn is_fault(&self) -> bool {
        matches!(
            self,
            SessionOutcome::DeviceUnavailable | SessionOutcome::DeviceLost
        )
    }
}

impl fmt::Display for SessionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionOutcome::Success { text } => write!(f, "decoded {} chars", text.chars().count()),
            SessionOutcome::Cancelled => f.write_str("cancelled"),
            SessionOutcome::DeviceUnavailable => f.write_str("camera unavailable"),
            SessionOutcome::DeviceLost => f.write_str("camera lost"),
        }
    }
}

/// Lifecycle of a scan session.
///
/// The camera is open exactly while the state is `Starting`, `Running` or
/// `Finishing`; it is closed before `Terminated` is published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    /// Built, not started
    Idle = 0,
    /// Opening the camera
    Starting = 1,
    /// Acquiring and decoding frames
    Running = 2,
    /// Releasing the camera and joining workers
    Finishing = 3,
    /// Outcome published
    Terminated = 4,
}

impl SessionState {
    /// Inverse of `state as u8`
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(SessionState::Idle),
            1 => Some(SessionState::Starting),
            2 => Some(SessionState::Running),
            3 => Some(SessionState::Finishing),
            4 => Some(SessionState::Terminated),
            _ => None,
        }
    }

    /// True while the session may hold the camera
    pub fn holds_device(&self) -> bool {
        matches!(
            self,
            SessionState::Starting | SessionState::Running | SessionState::Finishing
        )
    }
}

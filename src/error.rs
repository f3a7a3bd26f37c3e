//! Error types for scan sessions
//!
//! Session-level faults never cross the worker boundary as errors: they are
//! folded into [`SessionOutcome`](crate::SessionOutcome). The types here cover
//! the seams where a `Result` is the right shape (opening a device, pulling a
//! frame, building a frame, configuring a session).

use thiserror::Error;

/// A camera could not be acquired.
#[derive(Error, Debug)]
pub enum DeviceError {
    /// Nothing matches the selector
    #[error("No camera device matches '{selector}'")]
    NotFound {
        /// Selector as given
        selector: String,
    },

    /// Held by another process, or did not open in time
    #[error("Camera '{selector}' is busy in another application")]
    Busy {
        /// Selector as given
        selector: String,
    },

    /// The OS refused access
    #[error("Permission denied opening camera '{selector}'")]
    PermissionDenied {
        /// Selector as given
        selector: String,
    },

    /// Any other backend failure, with the backend's message
    #[error("Camera backend error: {0}")]
    Backend(String),
}

/// Failure of a single `next_frame` call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Transient; the caller may ask again
    #[error("No frame arrived before the timeout")]
    Timeout,

    /// Terminal for the source
    #[error("Camera was lost: {reason}")]
    DeviceLost {
        /// Backend's description of the failure
        reason: String,
    },
}

/// Pixel buffer does not match the declared frame layout.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    /// Width or height is zero
    #[error("Frame dimensions must be non-zero (got {width}x{height})")]
    ZeroDimension {
        /// Declared width
        width: u32,
        /// Declared height
        height: u32,
    },

    /// Buffer length is not width * height * bytes per pixel
    #[error("Frame buffer holds {actual} bytes, layout needs {expected}")]
    BufferSize {
        /// Bytes the layout needs
        expected: usize,
        /// Bytes supplied
        actual: usize,
    },
}

/// Misuse of a [`SessionController`](crate::SessionController).
#[derive(Error, Debug)]
pub enum SessionError {
    /// `start()` called a second time
    #[error("Scan session was already started")]
    AlreadyStarted,

    /// The worker thread could not be created
    #[error("Failed to spawn scan worker: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Invalid configuration value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// `value` could not be parsed for `key`
    #[error("Invalid value '{value}' for {key}")]
    InvalidValue {
        /// Setting or environment variable name
        key: String,
        /// Rejected input
        value: String,
    },
}

/// Failures of the image-file helpers used by the tools.
#[derive(Error, Debug)]
pub enum ToolError {
    /// The file could not be read or decoded as an image
    #[error("Failed to load image {path}: {source}")]
    Image {
        /// File that failed
        path: String,
        /// Underlying `image` error
        #[source]
        source: image::ImageError,
    },

    /// The decoded image did not make a valid frame
    #[error(transparent)]
    Layout(#[from] LayoutError),
}

/// Top-level error
#[derive(Error, Debug)]
pub enum ScanError {
    /// Controller misuse or worker spawn failure
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Bad setting
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Image-file helper failure
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, ScanError>;

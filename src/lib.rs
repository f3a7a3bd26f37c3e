//! RustQR Scan - camera-driven QR code scan sessions
//!
//! A scan session acquires frames from a camera, shows each one to a live
//! preview, decodes QR symbols on a background worker and stops on the first
//! decoded symbol, a cancel request or a camera fault. The camera is released
//! and every worker joined before the outcome is handed back.
//!
//! ```no_run
//! use rust_qr_scan::{PreviewMailbox, ScanConfig, SessionOutcome, open_scan_session};
//!
//! let preview = PreviewMailbox::new();
//! let mut session = open_scan_session(ScanConfig::default(), preview.clone());
//! session.start().expect("spawn scan worker");
//! // A display thread polls `preview.take_latest()` and may call
//! // `session.cancel_token().cancel()` when the user closes the view.
//! match session.await_outcome() {
//!     SessionOutcome::Success { text } => println!("{}", text),
//!     SessionOutcome::Cancelled => {}
//!     fault => eprintln!("Scan failed: {}", fault),
//! }
//! ```

#![warn(missing_docs)]
#![allow(clippy::missing_docs_in_private_items)]

/// Session configuration and device selection
pub mod config;
/// Frame decoders (QR via `rqrr`)
pub mod decoder;
/// Error types
pub mod error;
/// Core data structures (Frame, outcomes, session state)
pub mod models;
/// Preview sinks and the latest-frame mailbox
pub mod preview;
/// Scan session state machine and controller
pub mod session;
/// Frame sources (replay, camera)
pub mod source;
/// Image-file helpers for the CLI
pub mod tools;
/// Utility functions (grayscale, enhancement, mailboxes)
pub mod utils;

pub use config::{DeviceSelector, ScanConfig};
pub use decoder::{FrameDecoder, QrDecoder};
pub use error::{
    ConfigError, DeviceError, FrameError, LayoutError, Result, ScanError, SessionError, ToolError,
};
pub use models::{DecodeResult, Frame, PixelFormat, SessionOutcome, SessionState};
pub use preview::{NullPreview, PreviewMailbox, PreviewSink};
pub use session::{CancelToken, ScanSession, ScanSessionBuilder, SessionController};
pub use source::{CameraOpener, FrameSource, ReplayOpener, ReplaySource, SourceOpener};

/// Open a scan session on the configured camera with the default QR decoder.
///
/// Cheap and synchronous: nothing touches the camera until
/// [`SessionController::start`].
pub fn open_scan_session(config: ScanConfig, preview: impl PreviewSink + 'static) -> SessionController {
    ScanSession::builder(CameraOpener::from_config(&config))
        .preview(preview)
        .config(config)
        .build()
}

/// Initialize tracing for the library
///
/// This should be called by the application entry point (CLI or GUI).
pub fn init_tracing() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::debug!("global tracing subscriber already installed");
    }
}

//! Live camera capture
//!
//! The nokhwa stream lives on a capture thread that feeds a single-slot
//! mailbox, which turns it into the pull-style [`FrameSource`] the session
//! expects.

use crate::config::{DeviceSelector, ScanConfig};
use crate::error::DeviceError;
use crate::source::{FrameSource, SourceOpener};
use std::time::Duration;

/// Opens the configured camera.
///
/// Without the `webcam` feature there is no camera backend and every open
/// fails with [`DeviceError::Backend`].
pub struct CameraOpener {
    open_timeout: Duration,
}

impl CameraOpener {
    /// Opener that gives a camera `open_timeout` to start streaming
    pub fn new(open_timeout: Duration) -> Self {
        Self { open_timeout }
    }

    /// Opener using [`ScanConfig::open_timeout`]
    pub fn from_config(config: &ScanConfig) -> Self {
        Self::new(config.open_timeout)
    }
}

impl Default for CameraOpener {
    fn default() -> Self {
        Self::from_config(&ScanConfig::default())
    }
}

impl SourceOpener for CameraOpener {
    fn open(&mut self, selector: &DeviceSelector) -> Result<Box<dyn FrameSource>, DeviceError> {
        open_camera(selector, self.open_timeout)
    }
}

#[cfg(not(feature = "webcam"))]
fn open_camera(
    selector: &DeviceSelector,
    _open_timeout: Duration,
) -> Result<Box<dyn FrameSource>, DeviceError> {
    tracing::warn!(%selector, "camera requested but support was not compiled in");
    Err(DeviceError::Backend(
        "camera support not compiled in (enable the `webcam` feature)".to_string(),
    ))
}

#[cfg(feature = "webcam")]
fn open_camera(
    selector: &DeviceSelector,
    open_timeout: Duration,
) -> Result<Box<dyn FrameSource>, DeviceError> {
    webcam::open(selector, open_timeout).map(|s| Box::new(s) as Box<dyn FrameSource>)
}

#[cfg(feature = "webcam")]
mod webcam {
    use crate::config::DeviceSelector;
    use crate::error::DeviceError;
    use crate::models::{Frame, PixelFormat};
    use crate::source::capture::CaptureSource;
    use nokhwa::Camera;
    use nokhwa::pixel_format::RgbFormat;
    use nokhwa::utils::{ApiBackend, CameraIndex, RequestedFormat, RequestedFormatType};
    use std::time::Duration;
    use tracing::debug;

    pub(super) fn open(
        selector: &DeviceSelector,
        open_timeout: Duration,
    ) -> Result<CaptureSource, DeviceError> {
        let index = resolve_index(selector)?;
        let label = selector.to_string();
        CaptureSource::spawn(selector, open_timeout, move || {
            let mut stream = Stream::open(index, &label)?;
            Ok(move |sequence: u64| stream.grab(sequence))
        })
    }

    /// An open nokhwa stream, stopped on drop
    struct Stream {
        camera: Camera,
        label: String,
    }

    impl Stream {
        fn open(index: CameraIndex, label: &str) -> Result<Self, DeviceError> {
            let requested =
                RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
            let mut camera = Camera::new(index, requested)
                .map_err(|err| classify_open_error(label, err.to_string()))?;
            camera
                .open_stream()
                .map_err(|err| classify_open_error(label, err.to_string()))?;
            Ok(Self {
                camera,
                label: label.to_string(),
            })
        }

        fn grab(&mut self, sequence: u64) -> Result<Frame, String> {
            let image = self
                .camera
                .frame()
                .and_then(|buffer| buffer.decode_image::<RgbFormat>())
                .map_err(|err| err.to_string())?;
            let (width, height) = (image.width(), image.height());
            Frame::new(image.into_raw(), width, height, PixelFormat::Rgb, sequence)
                .map_err(|err| err.to_string())
        }
    }

    impl Drop for Stream {
        fn drop(&mut self) {
            if let Err(err) = self.camera.stop_stream() {
                debug!(label = %self.label, error = %err, "stop_stream failed");
            }
        }
    }

    fn resolve_index(selector: &DeviceSelector) -> Result<CameraIndex, DeviceError> {
        match selector {
            DeviceSelector::Default => Ok(CameraIndex::Index(0)),
            DeviceSelector::Index(i) => Ok(CameraIndex::Index(*i)),
            DeviceSelector::Name(name) => {
                let devices = nokhwa::query(ApiBackend::Auto)
                    .map_err(|err| DeviceError::Backend(err.to_string()))?;
                devices
                    .iter()
                    .find(|info| info.human_name() == *name)
                    .map(|info| info.index().clone())
                    .ok_or_else(|| DeviceError::NotFound {
                        selector: name.clone(),
                    })
            }
        }
    }

    fn classify_open_error(label: &str, message: String) -> DeviceError {
        let lower = message.to_ascii_lowercase();
        if lower.contains("permission") || lower.contains("denied") {
            DeviceError::PermissionDenied {
                selector: label.to_string(),
            }
        } else if lower.contains("busy") {
            DeviceError::Busy {
                selector: label.to_string(),
            }
        } else if lower.contains("not found") || lower.contains("no device") {
            DeviceError::NotFound {
                selector: label.to_string(),
            }
        } else {
            DeviceError::Backend(message)
        }
    }
}

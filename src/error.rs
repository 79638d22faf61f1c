//! Error taxonomy for a capture session.
//!
//! Every variant is caught at the session boundary: it ends the session with a
//! full teardown and is reported through the status handle, never to the trigger.

use thiserror::Error;

use crate::media::CaptureMode;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("No system audio track. Enable 'Share tab audio' when picking the display.")]
    NoSystemAudio,

    #[error("No supported {0} MIME type found on this host")]
    UnsupportedFormat(CaptureMode),

    #[error("Audio graph construction failed: {0}")]
    GraphConstruction(String),

    #[error("Recording engine error: {0}")]
    Engine(String),
}

impl CaptureError {
    /// Stable machine-readable code, used by the status API.
    pub fn code(&self) -> &'static str {
        match self {
            Self::PermissionDenied(_) => "PERMISSION_DENIED",
            Self::DeviceUnavailable(_) => "DEVICE_UNAVAILABLE",
            Self::NoSystemAudio => "NO_SYSTEM_AUDIO",
            Self::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            Self::GraphConstruction(_) => "GRAPH_CONSTRUCTION_ERROR",
            Self::Engine(_) => "ENGINE_ERROR",
        }
    }
}

pub type CaptureResult<T> = Result<T, CaptureError>;

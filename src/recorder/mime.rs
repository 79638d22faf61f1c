//! MIME type negotiation against the host recording engine.

use tracing::info;

use super::engine::RecordingEngine;
use crate::error::{CaptureError, CaptureResult};
use crate::media::CaptureMode;

pub const VIDEO_MIME_PREFERENCES: [&str; 3] = ["video/webm;codecs=vp9", "video/webm", "video/mp4"];
pub const AUDIO_MIME_PREFERENCES: [&str; 3] = ["audio/webm;codecs=opus", "audio/webm", "audio/mp4"];

pub fn preferences(mode: CaptureMode) -> &'static [&'static str] {
    match mode {
        CaptureMode::Video => &VIDEO_MIME_PREFERENCES,
        CaptureMode::Audio => &AUDIO_MIME_PREFERENCES,
    }
}

/// First preferred type the engine supports, in priority order.
pub fn negotiate(mode: CaptureMode, engine: &dyn RecordingEngine) -> CaptureResult<&'static str> {
    let mime = preferences(mode)
        .iter()
        .copied()
        .find(|mime| engine.is_type_supported(mime))
        .ok_or(CaptureError::UnsupportedFormat(mode))?;

    info!("Using MIME type: {}", mime);
    Ok(mime)
}

/// File extension of the container a MIME type describes.
pub fn container_extension(mime: &str) -> &'static str {
    let essence = mime.split(';').next().unwrap_or(mime).trim();
    match essence {
        "video/mp4" | "audio/mp4" => "mp4",
        _ => "webm",
    }
}

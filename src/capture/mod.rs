//! Source acquisition: microphone first, then the display/tab capture.
//!
//! Both requests may suspend while the user answers a permission prompt. Every
//! track handed back is adopted by the session's [`SessionResources`] before the
//! next step runs, so a failure later on still releases it.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::{CaptureError, CaptureResult};
use crate::media::{CaptureMode, MediaStream, MediaTrack};
use crate::recorder::SessionResources;

/// What to ask the display picker for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayConstraints {
    pub video: bool,
    pub audio: bool,
}

impl DisplayConstraints {
    pub fn for_mode(mode: CaptureMode) -> Self {
        Self {
            video: mode.wants_display_video(),
            // System audio is always required, whatever the mode.
            audio: true,
        }
    }
}

/// Device/capture subsystem of the host.
#[async_trait]
pub trait CaptureDevices: Send + Sync {
    /// Audio-only microphone stream.
    async fn request_microphone(&self) -> CaptureResult<MediaStream>;

    /// Display or tab stream.
    async fn request_display(&self, constraints: DisplayConstraints) -> CaptureResult<MediaStream>;
}

/// Sources held by a session once acquisition succeeds.
#[derive(Debug, Clone)]
pub struct AcquiredSources {
    pub microphone: MediaStream,
    pub display: MediaStream,
}

impl AcquiredSources {
    pub fn microphone_track(&self) -> CaptureResult<&MediaTrack> {
        self.microphone.first_audio_track().ok_or_else(|| {
            CaptureError::DeviceUnavailable("microphone stream has no audio track".to_string())
        })
    }

    pub fn system_audio_track(&self) -> CaptureResult<&MediaTrack> {
        self.display
            .first_audio_track()
            .ok_or(CaptureError::NoSystemAudio)
    }
}

pub struct SourceAcquirer<'a> {
    devices: &'a dyn CaptureDevices,
}

impl<'a> SourceAcquirer<'a> {
    pub fn new(devices: &'a dyn CaptureDevices) -> Self {
        Self { devices }
    }

    pub async fn acquire(
        &self,
        mode: CaptureMode,
        resources: &mut SessionResources,
    ) -> CaptureResult<AcquiredSources> {
        let microphone = self.devices.request_microphone().await?;
        adopt_all(&microphone, resources);
        if microphone.first_audio_track().is_none() {
            // Nothing to mix; don't put up the display picker.
            return Err(CaptureError::DeviceUnavailable(
                "microphone stream has no audio track".to_string(),
            ));
        }
        info!(
            "Mic acquired ({} audio track(s))",
            microphone.audio_track_count()
        );

        let display = self
            .devices
            .request_display(DisplayConstraints::for_mode(mode))
            .await?;
        adopt_all(&display, resources);
        // Evaluated outside `info!`, whose expansion shadows `display` with
        // `tracing::field::display`.
        let (display_audio, display_video) =
            (display.audio_track_count(), display.video_track_count());
        info!(
            "Display stream acquired ({} audio, {} video track(s))",
            display_audio, display_video
        );

        let sources = AcquiredSources {
            microphone,
            display,
        };

        if let Err(e) = sources.system_audio_track() {
            warn!("Display stream carries no system audio");
            return Err(e);
        }
        if mode.wants_display_video() && sources.display.video_track_count() == 0 {
            return Err(CaptureError::DeviceUnavailable(
                "display stream has no video track".to_string(),
            ));
        }

        Ok(sources)
    }
}

fn adopt_all(stream: &MediaStream, resources: &mut SessionResources) {
    for track in stream.tracks() {
        resources.adopt_track(track);
    }
}

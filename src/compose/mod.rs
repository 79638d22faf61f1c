//! Assembles the stream handed to the recording engine.
//!
//! Whatever the mode, the composite carries exactly one video track and one
//! audio track, so the engine and container never depend on the mode.

pub mod placeholder;

pub use placeholder::{DrawingSurface, PlaceholderVideo, Rgb, SurfaceFactory};

use tracing::info;

use crate::audio::AudioGraph;
use crate::capture::AcquiredSources;
use crate::error::{CaptureError, CaptureResult};
use crate::media::{CaptureMode, MediaStream};
use crate::recorder::SessionResources;

pub struct StreamComposer<'a> {
    surfaces: &'a dyn SurfaceFactory,
}

impl<'a> StreamComposer<'a> {
    pub fn new(surfaces: &'a dyn SurfaceFactory) -> Self {
        Self { surfaces }
    }

    pub fn compose(
        &self,
        mode: CaptureMode,
        sources: &AcquiredSources,
        graph: &AudioGraph,
        resources: &mut SessionResources,
    ) -> CaptureResult<MediaStream> {
        let video = match mode {
            CaptureMode::Video => sources.display.first_video_track().cloned().ok_or_else(|| {
                CaptureError::DeviceUnavailable("display stream has no video track".to_string())
            })?,
            CaptureMode::Audio => PlaceholderVideo::synthesize(self.surfaces, resources)?,
        };

        let composite = MediaStream::new(vec![video, graph.output.clone()]);
        debug_assert_eq!(composite.audio_track_count(), 1);
        debug_assert_eq!(composite.video_track_count(), 1);

        info!(
            "Composite stream ready for {} mode: video '{}', audio '{}'",
            mode,
            composite
                .first_video_track()
                .map(|t| t.label())
                .unwrap_or_default(),
            graph.output.label()
        );

        Ok(composite)
    }
}

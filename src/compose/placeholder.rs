//! Placeholder video track for audio-only sessions.
//!
//! Containers such as WebM expect a video track on a mixed stream, so audio mode
//! captures a 1x1 black surface at one frame per second instead of the display.

use tracing::debug;

use crate::error::{CaptureError, CaptureResult};
use crate::media::{MediaStream, MediaTrack};
use crate::recorder::SessionResources;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const BLACK: Rgb = Rgb(0, 0, 0);
}

/// Ephemeral drawing surfaces offered by the host.
pub trait SurfaceFactory: Send + Sync {
    fn create_surface(&self, width: u32, height: u32) -> CaptureResult<Box<dyn DrawingSurface>>;
}

pub trait DrawingSurface: Send {
    fn fill(&mut self, color: Rgb);

    /// Capture the surface as a live video stream.
    fn capture_stream(&self, frame_rate: u32) -> CaptureResult<MediaStream>;
}

pub struct PlaceholderVideo;

impl PlaceholderVideo {
    pub const WIDTH: u32 = 1;
    pub const HEIGHT: u32 = 1;
    pub const FRAME_RATE: u32 = 1;
    pub const COLOR: Rgb = Rgb::BLACK;

    pub fn synthesize(
        surfaces: &dyn SurfaceFactory,
        resources: &mut SessionResources,
    ) -> CaptureResult<MediaTrack> {
        debug!("Creating placeholder video track for compatibility");

        let mut surface = surfaces
            .create_surface(Self::WIDTH, Self::HEIGHT)
            .map_err(as_graph_error)?;
        surface.fill(Self::COLOR);

        let stream = surface
            .capture_stream(Self::FRAME_RATE)
            .map_err(as_graph_error)?;
        for track in stream.tracks() {
            resources.adopt_track(track);
        }

        stream.first_video_track().cloned().ok_or_else(|| {
            CaptureError::GraphConstruction("placeholder surface produced no video track".into())
        })
    }
}

fn as_graph_error(err: CaptureError) -> CaptureError {
    match err {
        CaptureError::GraphConstruction(_) => err,
        other => CaptureError::GraphConstruction(other.to_string()),
    }
}

//! In-memory drawing surface for the placeholder video track.

use std::sync::Arc;

use super::NativeTrack;
use crate::compose::{DrawingSurface, Rgb, SurfaceFactory};
use crate::error::{CaptureError, CaptureResult};
use crate::media::{MediaStream, MediaTrack, TrackKind};

pub struct NativeSurfaces;

impl SurfaceFactory for NativeSurfaces {
    fn create_surface(&self, width: u32, height: u32) -> CaptureResult<Box<dyn DrawingSurface>> {
        if width == 0 || height == 0 {
            return Err(CaptureError::GraphConstruction(format!(
                "cannot create a {width}x{height} surface"
            )));
        }
        Ok(Box::new(NativeSurface {
            width,
            height,
            pixels: vec![Rgb::BLACK; (width * height) as usize],
        }))
    }
}

pub struct NativeSurface {
    width: u32,
    height: u32,
    pixels: Vec<Rgb>,
}

impl NativeSurface {
    pub fn pixels(&self) -> &[Rgb] {
        &self.pixels
    }
}

impl DrawingSurface for NativeSurface {
    fn fill(&mut self, color: Rgb) {
        self.pixels.iter_mut().for_each(|p| *p = color);
    }

    fn capture_stream(&self, frame_rate: u32) -> CaptureResult<MediaStream> {
        if frame_rate == 0 {
            return Err(CaptureError::GraphConstruction(
                "surface capture needs a nonzero frame rate".to_string(),
            ));
        }
        let track = MediaTrack::new(
            TrackKind::Video,
            format!("placeholder-{}x{}@{}fps", self.width, self.height, frame_rate),
            Arc::new(NativeTrack::new(None)),
        );
        Ok(MediaStream::new(vec![track]))
    }
}

//! The host environment a session runs against.
//!
//! Every platform capability is behind a trait so the session lifecycle can be
//! driven by the native backend or by test doubles.

pub mod native;

use std::sync::Arc;

use crate::audio::AudioBackend;
use crate::capture::CaptureDevices;
use crate::compose::SurfaceFactory;
use crate::recorder::RecordingEngine;

#[derive(Clone)]
pub struct MediaHost {
    pub devices: Arc<dyn CaptureDevices>,
    pub audio: Arc<dyn AudioBackend>,
    pub surfaces: Arc<dyn SurfaceFactory>,
    pub engine: Arc<dyn RecordingEngine>,
}

impl MediaHost {
    pub fn new(
        devices: Arc<dyn CaptureDevices>,
        audio: Arc<dyn AudioBackend>,
        surfaces: Arc<dyn SurfaceFactory>,
        engine: Arc<dyn RecordingEngine>,
    ) -> Self {
        Self {
            devices,
            audio,
            surfaces,
            engine,
        }
    }
}

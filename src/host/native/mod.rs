//! Native host: cpal capture, in-process mixing, Opus/WebM recording.
//!
//! Tracks produced here carry a [`PullSource`] so the audio graph and the
//! recorder can read samples from them. Tracks from any other host are
//! rejected by the native graph and recorder.

pub mod devices;
pub mod engine;
pub mod graph;
pub mod surface;
pub mod webm;

pub use devices::CpalDevices;
pub use engine::{WebmOpusEngine, WebmOpusSettings};
pub use graph::NativeAudioBackend;
pub use surface::NativeSurfaces;

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};

use super::MediaHost;
use crate::media::{MediaTrack, TrackHandle};

/// Rate every native graph and recorder runs at.
pub const NATIVE_SAMPLE_RATE: u32 = 48_000;

/// Mono f32 samples that can be drained by a consumer.
pub trait PullSource: Send + Sync {
    fn sample_rate(&self) -> u32;

    /// Take whatever is ready. With `flush`, also hand out partial data held
    /// back for alignment.
    fn pull(&self, flush: bool) -> Vec<f32>;
}

/// Buffer filled by a capture callback.
pub struct CaptureFeed {
    sample_rate: u32,
    samples: Mutex<Vec<f32>>,
}

impl CaptureFeed {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            samples: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, data: &[f32]) {
        if let Ok(mut samples) = self.samples.lock() {
            samples.extend_from_slice(data);
        }
    }
}

impl PullSource for CaptureFeed {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn pull(&self, _flush: bool) -> Vec<f32> {
        match self.samples.lock() {
            Ok(mut samples) => std::mem::take(&mut *samples),
            Err(_) => Vec::new(),
        }
    }
}

pub struct NativeTrack {
    live: AtomicBool,
    source: Option<Arc<dyn PullSource>>,
    stop_signal: Mutex<Option<mpsc::Sender<()>>>,
}

impl NativeTrack {
    pub fn new(source: Option<Arc<dyn PullSource>>) -> Self {
        Self {
            live: AtomicBool::new(true),
            source,
            stop_signal: Mutex::new(None),
        }
    }

    /// Signal sent to the thread owning the platform stream when the track stops.
    pub fn with_stop_signal(self, signal: mpsc::Sender<()>) -> Self {
        if let Ok(mut slot) = self.stop_signal.lock() {
            *slot = Some(signal);
        }
        self
    }

    pub fn source(&self) -> Option<&Arc<dyn PullSource>> {
        self.source.as_ref()
    }

    pub fn from_track(track: &MediaTrack) -> Option<&NativeTrack> {
        track.handle().as_any().downcast_ref::<NativeTrack>()
    }
}

impl TrackHandle for NativeTrack {
    fn stop(&self) {
        self.live.store(false, Ordering::SeqCst);
        if let Ok(mut slot) = self.stop_signal.lock() {
            if let Some(signal) = slot.take() {
                let _ = signal.send(());
            }
        }
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Everything a session needs, backed by the local machine.
pub fn native_host(settings: WebmOpusSettings) -> MediaHost {
    MediaHost::new(
        Arc::new(CpalDevices::new()),
        Arc::new(NativeAudioBackend::new(NATIVE_SAMPLE_RATE)),
        Arc::new(NativeSurfaces),
        Arc::new(WebmOpusEngine::new(settings)),
    )
}

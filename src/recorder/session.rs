//! The single in-flight recording attempt.
//!
//! [`Session::open`] runs acquisition, mixing, composition and engine start
//! strictly in order. If any step fails, everything registered so far is
//! released before the error is returned, so a failed open leaves nothing live.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::engine::{MediaRecorder, RecorderEvent, RecorderState};
use super::mime;
use super::resources::SessionResources;
use crate::audio::{AudioGraph, AudioMixer};
use crate::capture::SourceAcquirer;
use crate::compose::StreamComposer;
use crate::error::CaptureResult;
use crate::host::MediaHost;
use crate::media::CaptureMode;
use crate::save::{suggested_name, Blob, FinishedRecording};

pub struct Session {
    mode: CaptureMode,
    mime_type: &'static str,
    chunks: Vec<Vec<u8>>,
    graph: AudioGraph,
    recorder: Box<dyn MediaRecorder>,
    events: mpsc::UnboundedReceiver<RecorderEvent>,
    resources: SessionResources,
}

struct OpenedParts {
    mime_type: &'static str,
    graph: AudioGraph,
    recorder: Box<dyn MediaRecorder>,
    events: mpsc::UnboundedReceiver<RecorderEvent>,
}

impl Session {
    pub async fn open(host: MediaHost, mode: CaptureMode) -> CaptureResult<Self> {
        info!("=== START: {} ===", mode);

        let mut resources = SessionResources::new();
        match Self::build(&host, mode, &mut resources).await {
            Ok(parts) => Ok(Self {
                mode,
                mime_type: parts.mime_type,
                chunks: Vec::new(),
                graph: parts.graph,
                recorder: parts.recorder,
                events: parts.events,
                resources,
            }),
            Err(e) => {
                let released = resources.release_all();
                warn!(
                    "Start failed: {} ({} resource(s) released)",
                    e, released
                );
                Err(e)
            }
        }
    }

    async fn build(
        host: &MediaHost,
        mode: CaptureMode,
        resources: &mut SessionResources,
    ) -> CaptureResult<OpenedParts> {
        let sources = SourceAcquirer::new(host.devices.as_ref())
            .acquire(mode, resources)
            .await?;

        let graph = AudioMixer::build(
            host.audio.as_ref(),
            sources.microphone_track()?,
            sources.system_audio_track()?,
            resources,
        )?;

        let composite =
            StreamComposer::new(host.surfaces.as_ref()).compose(mode, &sources, &graph, resources)?;

        let mime_type = mime::negotiate(mode, host.engine.as_ref())?;

        let handle = host.engine.create(&composite, mime_type)?;
        let mut recorder = handle.recorder;
        // Dropped on error: the engine never produced output we keep.
        recorder.start()?;

        Ok(OpenedParts {
            mime_type,
            graph,
            recorder,
            events: handle.events,
        })
    }

    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    pub fn mime_type(&self) -> &'static str {
        self.mime_type
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn byte_len(&self) -> usize {
        self.chunks.iter().map(Vec::len).sum()
    }

    /// Append a data segment in arrival order. Empty segments are dropped.
    pub fn append_chunk(&mut self, data: Vec<u8>) -> bool {
        if data.is_empty() {
            return false;
        }
        debug!("Chunk size: {}", data.len());
        self.chunks.push(data);
        true
    }

    pub fn request_stop(&mut self) {
        if self.recorder.state() != RecorderState::Inactive {
            self.recorder.stop();
        }
    }

    pub(crate) async fn next_event(&mut self) -> Option<RecorderEvent> {
        self.events.recv().await
    }

    /// Concatenate everything collected so far into the output blob.
    pub fn take_recording(&mut self) -> FinishedRecording {
        let blob = Blob::from_chunks(std::mem::take(&mut self.chunks), self.mime_type);
        FinishedRecording {
            mode: self.mode,
            blob,
            suggested_name: suggested_name(self.mode, chrono::Utc::now().timestamp_millis()),
        }
    }

    /// Stop the engine if it is still running and release every resource.
    /// Returns how many release hooks ran.
    pub fn teardown(mut self) -> usize {
        info!("Cleaning up...");
        self.request_stop();
        let released = self.resources.release_all();
        if !self.graph.context.is_closed() {
            warn!("Audio context still open after teardown");
        }
        info!("Cleanup complete ({} resource(s) released)", released);
        released
    }
}

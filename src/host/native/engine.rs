//! Opus-in-WebM recording engine.
//!
//! Reads the composite stream's audio track, encodes 20 ms Opus frames and
//! emits one data segment per timeslice: the WebM header with the first
//! segment, then a cluster per segment. On stop, the remaining samples are
//! flushed (padded to a whole frame) before the stop event.

use opus::{Application, Bitrate, Channels, Encoder};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use super::webm::{Packet, WebmMuxer};
use super::{NativeTrack, PullSource, NATIVE_SAMPLE_RATE};
use crate::audio::AudioMixer;
use crate::error::{CaptureError, CaptureResult};
use crate::media::MediaStream;
use crate::recorder::{MediaRecorder, RecorderEvent, RecorderHandle, RecorderState, RecordingEngine};

pub const SUPPORTED_MIME_TYPES: [&str; 2] = ["audio/webm;codecs=opus", "audio/webm"];

const FRAME_MS: u64 = 20;
const FRAME_SAMPLES: usize = (NATIVE_SAMPLE_RATE as usize / 1000) * FRAME_MS as usize;
/// Encoder lookahead at 48 kHz, written as the Opus pre-skip.
const PRE_SKIP: u16 = 312;
const MAX_PACKET: usize = 4000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebmOpusSettings {
    /// How often a data segment is emitted while recording.
    pub timeslice: Duration,
    pub bitrate: i32,
}

impl Default for WebmOpusSettings {
    fn default() -> Self {
        Self {
            timeslice: Duration::from_millis(1000),
            bitrate: 64_000,
        }
    }
}

pub struct WebmOpusEngine {
    settings: WebmOpusSettings,
}

impl WebmOpusEngine {
    pub fn new(settings: WebmOpusSettings) -> Self {
        Self { settings }
    }
}

impl RecordingEngine for WebmOpusEngine {
    fn is_type_supported(&self, mime: &str) -> bool {
        SUPPORTED_MIME_TYPES.contains(&mime)
    }

    fn create(&self, stream: &MediaStream, mime: &str) -> CaptureResult<RecorderHandle> {
        if !self.is_type_supported(mime) {
            return Err(CaptureError::Engine(format!("unsupported MIME type {mime}")));
        }

        let track = stream
            .first_audio_track()
            .ok_or_else(|| CaptureError::Engine("stream has no audio track".to_string()))?;
        let source = NativeTrack::from_track(track)
            .and_then(NativeTrack::source)
            .cloned()
            .ok_or_else(|| {
                CaptureError::Engine(format!(
                    "audio track '{}' is not readable by the native recorder",
                    track.label()
                ))
            })?;

        let worker = EncoderWorker::new(source, self.settings.bitrate)?;
        let (events_tx, events) = mpsc::unbounded_channel();

        debug!("Created {} recorder on track '{}'", mime, track.label());
        Ok(RecorderHandle {
            recorder: Box::new(WebmOpusRecorder {
                timeslice: self.settings.timeslice,
                worker: Some(worker),
                events: events_tx,
                stop_tx: None,
                state: RecorderState::Inactive,
            }),
            events,
        })
    }
}

pub struct WebmOpusRecorder {
    timeslice: Duration,
    worker: Option<EncoderWorker>,
    events: mpsc::UnboundedSender<RecorderEvent>,
    stop_tx: Option<oneshot::Sender<()>>,
    state: RecorderState,
}

impl MediaRecorder for WebmOpusRecorder {
    fn start(&mut self) -> CaptureResult<()> {
        let worker = self
            .worker
            .take()
            .ok_or_else(|| CaptureError::Engine("recorder already started".to_string()))?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| CaptureError::Engine(format!("no async runtime: {e}")))?;

        let (stop_tx, stop_rx) = oneshot::channel();
        runtime.spawn(run_encoder(worker, self.timeslice, stop_rx, self.events.clone()));

        self.stop_tx = Some(stop_tx);
        self.state = RecorderState::Recording;
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        self.state = RecorderState::Inactive;
    }

    fn state(&self) -> RecorderState {
        self.state
    }
}

async fn run_encoder(
    mut worker: EncoderWorker,
    timeslice: Duration,
    mut stop_rx: oneshot::Receiver<()>,
    events: mpsc::UnboundedSender<RecorderEvent>,
) {
    let _ = events.send(RecorderEvent::Start);

    let mut ticker = tokio::time::interval(timeslice.max(Duration::from_millis(1)));
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match worker.encode_pending(false) {
                    Ok(segment) => {
                        let _ = events.send(RecorderEvent::DataAvailable(segment));
                    }
                    Err(e) => {
                        error!("Encoder failed: {}", e);
                        let _ = events.send(RecorderEvent::Error(e.to_string()));
                        return;
                    }
                }
            }
            // Stop requested, or the recorder was dropped.
            _ = &mut stop_rx => break,
        }
    }

    match worker.encode_pending(true) {
        Ok(segment) => {
            let _ = events.send(RecorderEvent::DataAvailable(segment));
            info!(
                "Encoder flushed: {} frame(s), {:.1}s",
                worker.frames_encoded,
                worker.frames_encoded as f64 * FRAME_MS as f64 / 1000.0
            );
            let _ = events.send(RecorderEvent::Stop);
        }
        Err(e) => {
            let _ = events.send(RecorderEvent::Error(e.to_string()));
        }
    }
}

struct EncoderWorker {
    source: Arc<dyn PullSource>,
    encoder: Encoder,
    muxer: WebmMuxer,
    pending: Vec<f32>,
    packet_buffer: Vec<u8>,
    frames_encoded: u64,
    header_written: bool,
}

impl EncoderWorker {
    fn new(source: Arc<dyn PullSource>, bitrate: i32) -> CaptureResult<Self> {
        let mut encoder = Encoder::new(NATIVE_SAMPLE_RATE, Channels::Mono, Application::Voip)
            .map_err(|e| CaptureError::Engine(format!("Opus encoder init failed: {e}")))?;
        encoder
            .set_bitrate(Bitrate::Bits(bitrate))
            .map_err(|e| CaptureError::Engine(format!("Failed to set bitrate: {e}")))?;

        Ok(Self {
            source,
            encoder,
            muxer: WebmMuxer::new(NATIVE_SAMPLE_RATE, 1, PRE_SKIP),
            pending: Vec::new(),
            packet_buffer: vec![0u8; MAX_PACKET],
            frames_encoded: 0,
            header_written: false,
        })
    }

    /// Encode every whole frame available. The result may be empty.
    fn encode_pending(&mut self, flush: bool) -> CaptureResult<Vec<u8>> {
        let raw = self.source.pull(flush);
        self.pending.extend(AudioMixer::resample(
            &raw,
            self.source.sample_rate(),
            NATIVE_SAMPLE_RATE,
        ));

        if flush && self.pending.len() % FRAME_SAMPLES != 0 {
            let padded = self.pending.len().div_ceil(FRAME_SAMPLES) * FRAME_SAMPLES;
            self.pending.resize(padded, 0.0);
        }

        let mut packets = Vec::new();
        while self.pending.len() >= FRAME_SAMPLES {
            let frame: Vec<f32> = self.pending.drain(..FRAME_SAMPLES).collect();
            let size = self
                .encoder
                .encode_float(&frame, &mut self.packet_buffer)
                .map_err(|e| CaptureError::Engine(format!("Opus encoding failed: {e}")))?;
            packets.push(Packet {
                timestamp_ms: self.frames_encoded * FRAME_MS,
                data: self.packet_buffer[..size].to_vec(),
            });
            self.frames_encoded += 1;
        }

        let mut segment = Vec::new();
        if !self.header_written && (!packets.is_empty() || flush) {
            segment.extend(self.muxer.header());
            self.header_written = true;
        }
        segment.extend(self.muxer.clusters(&packets));
        Ok(segment)
    }
}

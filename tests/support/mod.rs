//! Scriptable stand-ins for every host collaborator.
//!
//! Each fake records what the session did to it so tests can check ordering,
//! counts and release behavior without real devices.

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::any::Any;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;

use interview_recorder::audio::{AudioBackend, AudioContext, NodeId};
use interview_recorder::capture::{CaptureDevices, DisplayConstraints};
use interview_recorder::compose::{DrawingSurface, Rgb, SurfaceFactory};
use interview_recorder::error::{CaptureError, CaptureResult};
use interview_recorder::host::MediaHost;
use interview_recorder::media::{MediaStream, MediaTrack, TrackHandle, TrackKind};
use interview_recorder::recorder::{
    MediaRecorder, RecorderEvent, RecorderHandle, RecorderState, RecordingEngine,
    RecordingMachine, SessionController, SessionPhase, SessionStatus, SessionStatusHandle,
};
use interview_recorder::save::{FinishedRecording, RecordingSink};

/// Every track any fake handed out, so tests can check each was stopped once.
#[derive(Default)]
pub struct TrackLedger {
    tracks: Mutex<Vec<(String, Arc<CountingTrack>)>>,
}

impl TrackLedger {
    pub fn make(&self, kind: TrackKind, label: &str) -> MediaTrack {
        let handle = Arc::new(CountingTrack::default());
        self.tracks
            .lock()
            .unwrap()
            .push((label.to_string(), handle.clone()));
        MediaTrack::new(kind, label, handle)
    }

    pub fn count(&self) -> usize {
        self.tracks.lock().unwrap().len()
    }

    pub fn stop_counts(&self) -> Vec<(String, usize)> {
        self.tracks
            .lock()
            .unwrap()
            .iter()
            .map(|(label, t)| (label.clone(), t.stops()))
            .collect()
    }

    pub fn all_stopped_once(&self) -> bool {
        self.stop_counts().iter().all(|(_, n)| *n == 1)
    }

    pub fn none_stopped(&self) -> bool {
        self.stop_counts().iter().all(|(_, n)| *n == 0)
    }
}

#[derive(Default)]
pub struct CountingTrack {
    stops: AtomicUsize,
}

impl CountingTrack {
    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl TrackHandle for CountingTrack {
    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }

    fn is_live(&self) -> bool {
        self.stops() == 0
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// What the microphone request yields.
#[derive(Clone)]
pub enum MicScript {
    Granted,
    /// A stream that carries no audio track.
    Empty,
    Fails(CaptureError),
}

/// What the display request yields.
#[derive(Clone)]
pub enum DisplayScript {
    Granted { audio: bool, video: bool },
    Fails(CaptureError),
}

pub struct FakeDevices {
    ledger: Arc<TrackLedger>,
    mic: Mutex<MicScript>,
    display: Mutex<DisplayScript>,
    /// When set, the microphone request waits for a permit before answering.
    pub mic_gate: Option<Arc<Notify>>,
    pub mic_requests: AtomicUsize,
    pub display_requests: AtomicUsize,
    pub last_constraints: Mutex<Option<DisplayConstraints>>,
}

impl FakeDevices {
    pub fn set_mic(&self, script: MicScript) {
        *self.mic.lock().unwrap() = script;
    }

    pub fn set_display(&self, script: DisplayScript) {
        *self.display.lock().unwrap() = script;
    }

    pub fn mic_requests(&self) -> usize {
        self.mic_requests.load(Ordering::SeqCst)
    }

    pub fn display_requests(&self) -> usize {
        self.display_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptureDevices for FakeDevices {
    async fn request_microphone(&self) -> CaptureResult<MediaStream> {
        self.mic_requests.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.mic_gate {
            gate.notified().await;
        }
        let script = self.mic.lock().unwrap().clone();
        match script {
            MicScript::Granted => Ok(MediaStream::new(vec![self
                .ledger
                .make(TrackKind::Audio, "mic")])),
            MicScript::Empty => Ok(MediaStream::default()),
            MicScript::Fails(err) => Err(err),
        }
    }

    async fn request_display(&self, constraints: DisplayConstraints) -> CaptureResult<MediaStream> {
        self.display_requests.fetch_add(1, Ordering::SeqCst);
        *self.last_constraints.lock().unwrap() = Some(constraints);
        let script = self.display.lock().unwrap().clone();
        match script {
            DisplayScript::Granted { audio, video } => {
                let mut tracks = Vec::new();
                if video && constraints.video {
                    tracks.push(self.ledger.make(TrackKind::Video, "screen"));
                }
                if audio {
                    tracks.push(self.ledger.make(TrackKind::Audio, "system"));
                }
                Ok(MediaStream::new(tracks))
            }
            DisplayScript::Fails(err) => Err(err),
        }
    }
}

pub struct FakeContext {
    ledger: Arc<TrackLedger>,
    pub closes: AtomicUsize,
    pub sources: Mutex<Vec<String>>,
    pub connections: Mutex<Vec<(NodeId, NodeId)>>,
    next_node: AtomicUsize,
}

impl FakeContext {
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl AudioContext for FakeContext {
    fn create_source(&self, track: &MediaTrack) -> CaptureResult<NodeId> {
        self.sources.lock().unwrap().push(track.label().to_string());
        Ok(self.next_node.fetch_add(1, Ordering::SeqCst))
    }

    fn create_destination(&self) -> CaptureResult<NodeId> {
        Ok(self.next_node.fetch_add(1, Ordering::SeqCst))
    }

    fn connect(&self, from: NodeId, to: NodeId) -> CaptureResult<()> {
        self.connections.lock().unwrap().push((from, to));
        Ok(())
    }

    fn destination_track(&self, _destination: NodeId) -> CaptureResult<MediaTrack> {
        Ok(self.ledger.make(TrackKind::Audio, "mixed"))
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closes() > 0
    }
}

pub struct FakeAudio {
    ledger: Arc<TrackLedger>,
    pub fail: AtomicBool,
    pub contexts: Mutex<Vec<Arc<FakeContext>>>,
}

impl FakeAudio {
    pub fn contexts(&self) -> Vec<Arc<FakeContext>> {
        self.contexts.lock().unwrap().clone()
    }

    pub fn all_closed_once(&self) -> bool {
        self.contexts().iter().all(|c| c.closes() == 1)
    }
}

impl AudioBackend for FakeAudio {
    fn create_context(&self) -> CaptureResult<Arc<dyn AudioContext>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CaptureError::GraphConstruction(
                "audio subsystem unavailable".to_string(),
            ));
        }
        let context = Arc::new(FakeContext {
            ledger: self.ledger.clone(),
            closes: AtomicUsize::new(0),
            sources: Mutex::new(Vec::new()),
            connections: Mutex::new(Vec::new()),
            next_node: AtomicUsize::new(0),
        });
        self.contexts.lock().unwrap().push(context.clone());
        Ok(context)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceRecord {
    pub width: u32,
    pub height: u32,
    pub fill: Option<Rgb>,
    pub frame_rate: Option<u32>,
}

pub struct FakeSurfaces {
    ledger: Arc<TrackLedger>,
    pub fail: AtomicBool,
    pub records: Arc<Mutex<Vec<SurfaceRecord>>>,
}

impl SurfaceFactory for FakeSurfaces {
    fn create_surface(&self, width: u32, height: u32) -> CaptureResult<Box<dyn DrawingSurface>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CaptureError::DeviceUnavailable(
                "no drawing surface available".to_string(),
            ));
        }
        let mut records = self.records.lock().unwrap();
        records.push(SurfaceRecord {
            width,
            height,
            fill: None,
            frame_rate: None,
        });
        Ok(Box::new(FakeSurface {
            ledger: self.ledger.clone(),
            records: self.records.clone(),
            index: records.len() - 1,
        }))
    }
}

struct FakeSurface {
    ledger: Arc<TrackLedger>,
    records: Arc<Mutex<Vec<SurfaceRecord>>>,
    index: usize,
}

impl DrawingSurface for FakeSurface {
    fn fill(&mut self, color: Rgb) {
        self.records.lock().unwrap()[self.index].fill = Some(color);
    }

    fn capture_stream(&self, frame_rate: u32) -> CaptureResult<MediaStream> {
        self.records.lock().unwrap()[self.index].frame_rate = Some(frame_rate);
        Ok(MediaStream::new(vec![self
            .ledger
            .make(TrackKind::Video, "placeholder")]))
    }
}

/// The only sender of the current recorder's event channel. Emptying it
/// closes the channel.
type EventSlot = Arc<Mutex<Option<mpsc::UnboundedSender<RecorderEvent>>>>;

fn send_event(slot: &EventSlot, event: RecorderEvent) {
    if let Some(tx) = slot.lock().unwrap().as_ref() {
        let _ = tx.send(event);
    }
}

/// Shape of the stream a recorder was created over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedRecorder {
    pub mime_type: String,
    pub audio_tracks: usize,
    pub video_tracks: usize,
    pub labels: Vec<String>,
}

pub struct FakeEngine {
    pub supported: Mutex<Vec<String>>,
    pub queried: Mutex<Vec<String>>,
    pub created: Mutex<Vec<CreatedRecorder>>,
    pub fail_start: AtomicBool,
    /// When set, `stop` leaves the final `Stop` event to the test.
    pub defer_stop: AtomicBool,
    pub stop_calls: Arc<AtomicUsize>,
    events: EventSlot,
}

impl FakeEngine {
    pub fn support(&self, types: &[&str]) {
        *self.supported.lock().unwrap() = types.iter().map(|t| t.to_string()).collect();
    }

    pub fn create_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    pub fn last_created(&self) -> Option<CreatedRecorder> {
        self.created.lock().unwrap().last().cloned()
    }

    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    /// Push an event as if the running recorder emitted it.
    pub fn emit(&self, event: RecorderEvent) {
        send_event(&self.events, event);
    }

    /// Drop the event channel's only sender, as a crashed recorder would.
    pub fn close_events(&self) {
        self.events.lock().unwrap().take();
    }
}

impl RecordingEngine for FakeEngine {
    fn is_type_supported(&self, mime: &str) -> bool {
        self.queried.lock().unwrap().push(mime.to_string());
        self.supported.lock().unwrap().iter().any(|t| t == mime)
    }

    fn create(&self, stream: &MediaStream, mime: &str) -> CaptureResult<RecorderHandle> {
        self.created.lock().unwrap().push(CreatedRecorder {
            mime_type: mime.to_string(),
            audio_tracks: stream.audio_track_count(),
            video_tracks: stream.video_track_count(),
            labels: stream.tracks().iter().map(|t| t.label().to_string()).collect(),
        });

        let (tx, events) = mpsc::unbounded_channel();
        *self.events.lock().unwrap() = Some(tx);
        Ok(RecorderHandle {
            recorder: Box::new(FakeRecorder {
                state: RecorderState::Inactive,
                fail_start: self.fail_start.load(Ordering::SeqCst),
                defer_stop: self.defer_stop.load(Ordering::SeqCst),
                stop_calls: self.stop_calls.clone(),
                events: self.events.clone(),
            }),
            events,
        })
    }
}

/// Stop behaves like a real recorder with nothing buffered: it emits `Stop`.
struct FakeRecorder {
    state: RecorderState,
    fail_start: bool,
    defer_stop: bool,
    stop_calls: Arc<AtomicUsize>,
    events: EventSlot,
}

impl MediaRecorder for FakeRecorder {
    fn start(&mut self) -> CaptureResult<()> {
        if self.fail_start {
            return Err(CaptureError::Engine("encoder refused to start".to_string()));
        }
        self.state = RecorderState::Recording;
        send_event(&self.events, RecorderEvent::Start);
        Ok(())
    }

    fn stop(&mut self) {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        self.state = RecorderState::Inactive;
        if !self.defer_stop {
            send_event(&self.events, RecorderEvent::Stop);
        }
    }

    fn state(&self) -> RecorderState {
        self.state
    }
}

#[derive(Default)]
pub struct CollectingSink {
    pub fail: AtomicBool,
    pub delivered: Mutex<Vec<FinishedRecording>>,
}

impl CollectingSink {
    pub fn delivered(&self) -> Vec<FinishedRecording> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordingSink for CollectingSink {
    async fn deliver(&self, recording: &FinishedRecording) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("disk full"));
        }
        self.delivered.lock().unwrap().push(recording.clone());
        Ok(())
    }
}

pub const ALL_TYPES: [&str; 6] = [
    "video/webm;codecs=vp9",
    "video/webm",
    "video/mp4",
    "audio/webm;codecs=opus",
    "audio/webm",
    "audio/mp4",
];

/// A full set of fakes sharing one track ledger.
pub struct Harness {
    pub ledger: Arc<TrackLedger>,
    pub devices: Arc<FakeDevices>,
    pub audio: Arc<FakeAudio>,
    pub surfaces: Arc<FakeSurfaces>,
    pub engine: Arc<FakeEngine>,
    pub sink: Arc<CollectingSink>,
}

impl Harness {
    /// Everything granted, every MIME type supported.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Like [`Harness::new`], but the microphone request blocks until `gate` is notified.
    pub fn gated(gate: Arc<Notify>) -> Self {
        Self::build(Some(gate))
    }

    fn build(mic_gate: Option<Arc<Notify>>) -> Self {
        let ledger = Arc::new(TrackLedger::default());
        let engine = FakeEngine {
            supported: Mutex::new(Vec::new()),
            queried: Mutex::new(Vec::new()),
            created: Mutex::new(Vec::new()),
            fail_start: AtomicBool::new(false),
            defer_stop: AtomicBool::new(false),
            stop_calls: Arc::new(AtomicUsize::new(0)),
            events: Arc::new(Mutex::new(None)),
        };
        engine.support(&ALL_TYPES);

        Self {
            devices: Arc::new(FakeDevices {
                ledger: ledger.clone(),
                mic: Mutex::new(MicScript::Granted),
                display: Mutex::new(DisplayScript::Granted {
                    audio: true,
                    video: true,
                }),
                mic_gate,
                mic_requests: AtomicUsize::new(0),
                display_requests: AtomicUsize::new(0),
                last_constraints: Mutex::new(None),
            }),
            audio: Arc::new(FakeAudio {
                ledger: ledger.clone(),
                fail: AtomicBool::new(false),
                contexts: Mutex::new(Vec::new()),
            }),
            surfaces: Arc::new(FakeSurfaces {
                ledger: ledger.clone(),
                fail: AtomicBool::new(false),
                records: Arc::new(Mutex::new(Vec::new())),
            }),
            engine: Arc::new(engine),
            sink: Arc::new(CollectingSink::default()),
            ledger,
        }
    }

    pub fn host(&self) -> MediaHost {
        MediaHost::new(
            self.devices.clone(),
            self.audio.clone(),
            self.surfaces.clone(),
            self.engine.clone(),
        )
    }

    pub fn spawn(&self) -> (SessionController, JoinHandle<()>) {
        RecordingMachine::spawn(self.host(), self.sink.clone())
    }
}

const WAIT_LIMIT: Duration = Duration::from_secs(5);

/// Poll `check` until it holds, failing the test after a few seconds.
pub async fn eventually<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let polled = tokio::time::timeout(WAIT_LIMIT, async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(polled.is_ok(), "timed out waiting for {what}");
}

pub async fn wait_for_phase(status: &SessionStatusHandle, phase: SessionPhase) -> SessionStatus {
    eventually(phase.as_str(), move || async move { status.phase().await == phase }).await;
    status.get().await
}

/// Wait until a failed session has been cleaned up and reported.
pub async fn wait_for_failure(status: &SessionStatusHandle) -> SessionStatus {
    eventually("failure to be reported", move || async move {
        let s = status.get().await;
        s.phase == SessionPhase::Idle && s.last_error.is_some()
    })
    .await;
    status.get().await
}

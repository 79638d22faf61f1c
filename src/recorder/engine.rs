//! Recording engine collaborator: turns a composite stream into container bytes.

use tokio::sync::mpsc;

use crate::error::CaptureResult;
use crate::media::MediaStream;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Inactive,
    Recording,
}

/// Events a recorder emits, delivered in order on its event channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecorderEvent {
    Start,
    /// A segment of encoded output. May be empty.
    DataAvailable(Vec<u8>),
    /// All buffered data has been flushed as `DataAvailable` events.
    Stop,
    Error(String),
}

pub trait RecordingEngine: Send + Sync {
    fn is_type_supported(&self, mime: &str) -> bool;

    /// Construct a recorder. Only called with a type the engine reported as supported.
    fn create(&self, stream: &MediaStream, mime: &str) -> CaptureResult<RecorderHandle>;
}

pub trait MediaRecorder: Send {
    fn start(&mut self) -> CaptureResult<()>;

    /// Ask the recorder to flush and finish. Completion is signalled by [`RecorderEvent::Stop`].
    fn stop(&mut self);

    fn state(&self) -> RecorderState;
}

pub struct RecorderHandle {
    pub recorder: Box<dyn MediaRecorder>,
    pub events: mpsc::UnboundedReceiver<RecorderEvent>,
}

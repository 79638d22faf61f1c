pub mod engine;
pub mod mime;
pub mod recording_machine;
pub mod resources;
pub mod session;
pub mod status;

pub use engine::{MediaRecorder, RecorderEvent, RecorderHandle, RecorderState, RecordingEngine};
pub use recording_machine::{RecordingMachine, SessionController, TriggerOutcome};
pub use resources::SessionResources;
pub use session::Session;
pub use status::{ReportedError, SessionPhase, SessionStatus, SessionStatusHandle};

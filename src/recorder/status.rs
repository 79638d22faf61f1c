//! Session status types and shared state handle.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::CaptureError;
use crate::media::CaptureMode;

/// Phase of the capture session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Idle,
    Starting,
    Recording,
    Stopping,
    Failed,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Recording => "recording",
            Self::Stopping => "stopping",
            Self::Failed => "failed",
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Idle)
    }
}

/// An error as surfaced to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportedError {
    pub code: String,
    pub message: String,
}

impl From<&CaptureError> for ReportedError {
    fn from(err: &CaptureError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

/// Current session state, readable by the trigger surface.
#[derive(Debug, Clone)]
pub struct SessionStatus {
    pub phase: SessionPhase,
    pub mode: Option<CaptureMode>,
    pub mime_type: Option<String>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub chunk_count: usize,
    pub byte_count: usize,
    pub last_error: Option<ReportedError>,
    pub last_recording: Option<String>,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self {
            phase: SessionPhase::Idle,
            mode: None,
            mime_type: None,
            started_at: None,
            chunk_count: 0,
            byte_count: 0,
            last_error: None,
            last_recording: None,
        }
    }
}

impl SessionStatus {
    /// Duration since recording started, in seconds.
    pub fn duration_seconds(&self) -> Option<u64> {
        self.started_at.map(|started| {
            let elapsed = chrono::Utc::now() - started;
            elapsed.num_seconds().max(0) as u64
        })
    }
}

/// Shared read handle over the session status.
///
/// Only the recording machine writes through it; everything else reads.
#[derive(Clone, Default)]
pub struct SessionStatusHandle {
    inner: Arc<Mutex<SessionStatus>>,
}

impl SessionStatusHandle {
    pub async fn get(&self) -> SessionStatus {
        self.inner.lock().await.clone()
    }

    pub async fn phase(&self) -> SessionPhase {
        self.inner.lock().await.phase
    }

    pub(crate) async fn starting(&self, mode: CaptureMode) {
        let mut state = self.inner.lock().await;
        state.phase = SessionPhase::Starting;
        state.mode = Some(mode);
        state.mime_type = None;
        state.started_at = None;
        state.chunk_count = 0;
        state.byte_count = 0;
        state.last_error = None;
    }

    pub(crate) async fn recording(&self, mime_type: &str) {
        let mut state = self.inner.lock().await;
        state.phase = SessionPhase::Recording;
        state.mime_type = Some(mime_type.to_string());
        state.started_at = Some(chrono::Utc::now());
    }

    pub(crate) async fn chunk(&self, size: usize) {
        let mut state = self.inner.lock().await;
        state.chunk_count += 1;
        state.byte_count += size;
    }

    pub(crate) async fn stopping(&self) {
        self.inner.lock().await.phase = SessionPhase::Stopping;
    }

    pub(crate) async fn failed(&self, err: &CaptureError) {
        let mut state = self.inner.lock().await;
        state.phase = SessionPhase::Failed;
        state.last_error = Some(err.into());
    }

    pub(crate) async fn delivered(&self, name: &str) {
        self.inner.lock().await.last_recording = Some(name.to_string());
    }

    /// Back to idle. Session fields are cleared; the last error and last
    /// delivered recording stay visible.
    pub(crate) async fn idle(&self) {
        let mut state = self.inner.lock().await;
        let last_error = state.last_error.take();
        let last_recording = state.last_recording.take();
        *state = SessionStatus {
            last_error,
            last_recording,
            ..SessionStatus::default()
        };
    }
}

//! Live media primitives shared by every stage of a capture session.
//!
//! A [`MediaTrack`] is a cheap, cloneable view of a live track. Cloning never
//! transfers ownership of the underlying capture: whoever registered the track's
//! release hook is the only party allowed to stop it.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// What the user asked to record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    /// Microphone + system audio, placeholder video.
    Audio,
    /// Microphone + system audio + captured display video.
    Video,
}

impl CaptureMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }

    pub fn wants_display_video(&self) -> bool {
        matches!(self, Self::Video)
    }
}

impl fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaptureMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "audio" => Ok(Self::Audio),
            "video" => Ok(Self::Video),
            other => Err(format!("unknown capture mode '{other}' (expected audio or video)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

/// Platform side of a live track.
///
/// `stop` must be idempotent at the platform level, but the session only ever
/// calls it once per acquired track.
pub trait TrackHandle: Send + Sync {
    fn stop(&self);

    fn is_live(&self) -> bool;

    /// Lets a host downcast tracks it produced back to its own type.
    fn as_any(&self) -> &dyn Any;
}

#[derive(Clone)]
pub struct MediaTrack {
    id: String,
    kind: TrackKind,
    label: String,
    handle: Arc<dyn TrackHandle>,
}

impl MediaTrack {
    pub fn new(
        kind: TrackKind,
        label: impl Into<String>,
        handle: Arc<dyn TrackHandle>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            label: label.into(),
            handle,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_live(&self) -> bool {
        self.handle.is_live()
    }

    pub fn handle(&self) -> &Arc<dyn TrackHandle> {
        &self.handle
    }

    /// Stop the underlying capture. Only release hooks call this.
    pub(crate) fn stop(&self) {
        self.handle.stop();
    }
}

impl fmt::Debug for MediaTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaTrack")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("label", &self.label)
            .field("live", &self.is_live())
            .finish()
    }
}

/// An ordered set of tracks, as handed out by a device request or assembled by
/// the composer.
#[derive(Debug, Clone, Default)]
pub struct MediaStream {
    tracks: Vec<MediaTrack>,
}

impl MediaStream {
    pub fn new(tracks: Vec<MediaTrack>) -> Self {
        Self { tracks }
    }

    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    pub fn audio_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter(|t| t.kind == TrackKind::Audio)
    }

    pub fn video_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter(|t| t.kind == TrackKind::Video)
    }

    pub fn first_audio_track(&self) -> Option<&MediaTrack> {
        self.audio_tracks().next()
    }

    pub fn first_video_track(&self) -> Option<&MediaTrack> {
        self.video_tracks().next()
    }

    pub fn audio_track_count(&self) -> usize {
        self.audio_tracks().count()
    }

    pub fn video_track_count(&self) -> usize {
        self.video_tracks().count()
    }
}

//! Audio-processing graph abstraction.
//!
//! Mirrors the shape of a browser audio graph: a context owns nodes, source
//! nodes wrap live tracks, and a destination node exposes one output track.
//! Closing the context is separate from stopping the tracks it wraps.

use std::sync::Arc;

use crate::error::CaptureResult;
use crate::media::MediaTrack;

pub type NodeId = usize;

/// Host audio subsystem.
pub trait AudioBackend: Send + Sync {
    fn create_context(&self) -> CaptureResult<Arc<dyn AudioContext>>;
}

pub trait AudioContext: Send + Sync {
    fn create_source(&self, track: &MediaTrack) -> CaptureResult<NodeId>;

    fn create_destination(&self) -> CaptureResult<NodeId>;

    fn connect(&self, from: NodeId, to: NodeId) -> CaptureResult<()>;

    /// The single track carrying everything connected into `destination`.
    fn destination_track(&self, destination: NodeId) -> CaptureResult<MediaTrack>;

    fn close(&self);

    fn is_closed(&self) -> bool;
}

/// A built mixing graph, owned by the session for its whole lifetime.
pub struct AudioGraph {
    pub context: Arc<dyn AudioContext>,
    pub destination: NodeId,
    pub output: MediaTrack,
}

//! In-process audio graph.
//!
//! Source nodes wrap native tracks; the destination resamples each connected
//! input to the context rate and sums them sample by sample.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

use super::{NativeTrack, PullSource};
use crate::audio::{AudioBackend, AudioContext, AudioMixer, NodeId};
use crate::error::{CaptureError, CaptureResult};
use crate::media::{MediaTrack, TrackKind};

pub struct NativeAudioBackend {
    sample_rate: u32,
}

impl NativeAudioBackend {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }
}

impl AudioBackend for NativeAudioBackend {
    fn create_context(&self) -> CaptureResult<Arc<dyn AudioContext>> {
        if self.sample_rate == 0 {
            return Err(CaptureError::GraphConstruction(
                "audio context sample rate must be nonzero".to_string(),
            ));
        }
        Ok(Arc::new(NativeAudioContext::new(self.sample_rate)))
    }
}

enum Node {
    Source(Arc<dyn PullSource>),
    Destination(Arc<MixDestination>),
}

pub struct NativeAudioContext {
    sample_rate: u32,
    nodes: Mutex<Vec<Node>>,
    closed: AtomicBool,
}

impl NativeAudioContext {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            nodes: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    fn nodes(&self) -> CaptureResult<std::sync::MutexGuard<'_, Vec<Node>>> {
        if self.is_closed() {
            return Err(CaptureError::GraphConstruction(
                "audio context is closed".to_string(),
            ));
        }
        self.nodes
            .lock()
            .map_err(|_| CaptureError::GraphConstruction("audio context poisoned".to_string()))
    }
}

impl AudioContext for NativeAudioContext {
    fn create_source(&self, track: &MediaTrack) -> CaptureResult<NodeId> {
        if track.kind() != TrackKind::Audio {
            return Err(CaptureError::GraphConstruction(format!(
                "track '{}' is not an audio track",
                track.label()
            )));
        }
        let source = NativeTrack::from_track(track)
            .and_then(NativeTrack::source)
            .cloned()
            .ok_or_else(|| {
                CaptureError::GraphConstruction(format!(
                    "track '{}' is not readable by the native audio context",
                    track.label()
                ))
            })?;

        let mut nodes = self.nodes()?;
        nodes.push(Node::Source(source));
        Ok(nodes.len() - 1)
    }

    fn create_destination(&self) -> CaptureResult<NodeId> {
        let mut nodes = self.nodes()?;
        nodes.push(Node::Destination(Arc::new(MixDestination::new(
            self.sample_rate,
        ))));
        Ok(nodes.len() - 1)
    }

    fn connect(&self, from: NodeId, to: NodeId) -> CaptureResult<()> {
        let nodes = self.nodes()?;
        match (nodes.get(from), nodes.get(to)) {
            (Some(Node::Source(source)), Some(Node::Destination(destination))) => {
                destination.add_input(source.clone());
                debug!("Connected node {} -> {}", from, to);
                Ok(())
            }
            _ => Err(CaptureError::GraphConstruction(format!(
                "cannot connect node {from} to node {to}"
            ))),
        }
    }

    fn destination_track(&self, destination: NodeId) -> CaptureResult<MediaTrack> {
        let nodes = self.nodes()?;
        match nodes.get(destination) {
            Some(Node::Destination(mix)) => {
                let source: Arc<dyn PullSource> = mix.clone();
                Ok(MediaTrack::new(
                    TrackKind::Audio,
                    "mixed-audio",
                    Arc::new(NativeTrack::new(Some(source))),
                ))
            }
            _ => Err(CaptureError::GraphConstruction(format!(
                "node {destination} is not a destination"
            ))),
        }
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Ok(mut nodes) = self.nodes.lock() {
            for node in nodes.drain(..) {
                if let Node::Destination(mix) = node {
                    mix.disconnect_all();
                }
            }
        }
        debug!("Audio context closed");
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

struct MixInput {
    source: Arc<dyn PullSource>,
    pending: Vec<f32>,
}

/// Destination node: additive mix of every connected input.
pub struct MixDestination {
    sample_rate: u32,
    inputs: Mutex<Vec<MixInput>>,
}

impl MixDestination {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            inputs: Mutex::new(Vec::new()),
        }
    }

    fn add_input(&self, source: Arc<dyn PullSource>) {
        if let Ok(mut inputs) = self.inputs.lock() {
            inputs.push(MixInput {
                source,
                pending: Vec::new(),
            });
        }
    }

    fn disconnect_all(&self) {
        if let Ok(mut inputs) = self.inputs.lock() {
            inputs.clear();
        }
    }
}

impl PullSource for MixDestination {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Emits only as many samples as every input can cover, unless flushing or
    /// one input lags by more than a second, in which case gaps are silence.
    fn pull(&self, flush: bool) -> Vec<f32> {
        let Ok(mut inputs) = self.inputs.lock() else {
            return Vec::new();
        };
        if inputs.is_empty() {
            return Vec::new();
        }

        for input in inputs.iter_mut() {
            let raw = input.source.pull(flush);
            let resampled = AudioMixer::resample(&raw, input.source.sample_rate(), self.sample_rate);
            input.pending.extend(resampled);
        }

        let shortest = inputs.iter().map(|i| i.pending.len()).min().unwrap_or(0);
        let longest = inputs.iter().map(|i| i.pending.len()).max().unwrap_or(0);
        let lag_limit = self.sample_rate as usize;
        let take = if flush || longest - shortest > lag_limit {
            longest
        } else {
            shortest
        };

        let blocks: Vec<Vec<f32>> = inputs
            .iter_mut()
            .map(|input| {
                let n = take.min(input.pending.len());
                input.pending.drain(..n).collect()
            })
            .collect();

        let mut mixed = AudioMixer::mix(&blocks);
        mixed.resize(take, 0.0);
        mixed
    }
}

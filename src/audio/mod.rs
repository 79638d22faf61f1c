pub mod audio_graph;
pub mod audio_mixer;

pub use audio_graph::{AudioBackend, AudioContext, AudioGraph, NodeId};
pub use audio_mixer::AudioMixer;

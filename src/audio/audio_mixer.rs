//! Mixes the microphone and the system audio into one track.
//!
//! [`AudioMixer::build`] wires the graph through the host's [`AudioBackend`].
//! The sample-level helpers are what the native backend uses inside its
//! destination node: a plain additive sum, no gain control or normalization.

use tracing::info;

use super::audio_graph::{AudioBackend, AudioGraph};
use crate::error::CaptureResult;
use crate::media::MediaTrack;
use crate::recorder::SessionResources;

pub struct AudioMixer;

impl AudioMixer {
    /// Build the mixing graph: two source nodes into one destination node.
    ///
    /// The context's close hook and the destination track's stop hook are
    /// registered with `resources` as soon as each exists.
    pub fn build(
        backend: &dyn AudioBackend,
        microphone: &MediaTrack,
        system: &MediaTrack,
        resources: &mut SessionResources,
    ) -> CaptureResult<AudioGraph> {
        let context = backend.create_context()?;
        {
            let context = context.clone();
            resources.push("audio context", move || context.close());
        }

        let mic_node = context.create_source(microphone)?;
        let system_node = context.create_source(system)?;
        let destination = context.create_destination()?;

        context.connect(mic_node, destination)?;
        context.connect(system_node, destination)?;

        let output = context.destination_track(destination)?;
        resources.adopt_track(&output);

        info!(
            "Audio graph built: '{}' + '{}' -> '{}'",
            microphone.label(),
            system.label(),
            output.label()
        );

        Ok(AudioGraph {
            context,
            destination,
            output,
        })
    }

    /// Sum equally long-or-not sample blocks. Shorter inputs count as silence.
    pub fn mix(sources: &[Vec<f32>]) -> Vec<f32> {
        let max_len = sources.iter().map(Vec::len).max().unwrap_or(0);
        let mut mixed = vec![0.0f32; max_len];

        for source in sources {
            for (out, &sample) in mixed.iter_mut().zip(source.iter()) {
                *out += sample;
            }
        }

        mixed
    }

    /// Resample audio from one sample rate to another using linear interpolation.
    pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
        if from_rate == to_rate || samples.is_empty() {
            return samples.to_vec();
        }

        let ratio = from_rate as f64 / to_rate as f64;
        let new_len = (samples.len() as f64 / ratio).ceil() as usize;
        let mut resampled = Vec::with_capacity(new_len);

        for i in 0..new_len {
            let src_pos = i as f64 * ratio;
            let src_idx = src_pos as usize;
            let frac = src_pos - src_idx as f64;

            let sample = if src_idx + 1 < samples.len() {
                samples[src_idx] as f64 * (1.0 - frac) + samples[src_idx + 1] as f64 * frac
            } else if src_idx < samples.len() {
                samples[src_idx] as f64
            } else {
                0.0
            };

            resampled.push(sample as f32);
        }

        resampled
    }

    /// Average interleaved frames down to mono.
    pub fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
        if channels <= 1 {
            return interleaved.to_vec();
        }
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    }
}

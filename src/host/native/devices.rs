//! Microphone and system audio capture via cpal.
//!
//! System audio comes from a PipeWire/PulseAudio monitor source, which exposes
//! the system's output (speakers/headphones) as an input device. When no
//! monitor exists the display stream simply carries no audio track.
//!
//! cpal streams are not `Send`, so each capture lives on its own thread that
//! builds the stream, reports readiness, and drops the stream when the track's
//! stop signal arrives.

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::{mpsc, Arc};
use tracing::{debug, error, info, warn};

use super::{CaptureFeed, NativeTrack};
use crate::audio::AudioMixer;
use crate::capture::{CaptureDevices, DisplayConstraints};
use crate::error::{CaptureError, CaptureResult};
use crate::media::{MediaStream, MediaTrack, TrackKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputSelector {
    DefaultMicrophone,
    SystemMonitor,
}

impl InputSelector {
    fn label(&self) -> &'static str {
        match self {
            Self::DefaultMicrophone => "microphone",
            Self::SystemMonitor => "system-audio",
        }
    }

    fn find_device(&self) -> Option<cpal::Device> {
        let host = cpal::default_host();
        match self {
            Self::DefaultMicrophone => host.default_input_device(),
            Self::SystemMonitor => find_monitor_device(&host),
        }
    }
}

/// Find a PipeWire/PulseAudio monitor source.
fn find_monitor_device(host: &cpal::Host) -> Option<cpal::Device> {
    for device in host.input_devices().ok()? {
        if let Ok(name) = device.name() {
            if name.to_lowercase().contains("monitor") {
                info!("Found system audio monitor: {}", name);
                return Some(device);
            }
        }
    }
    None
}

#[derive(Default)]
pub struct CpalDevices;

impl CpalDevices {
    pub fn new() -> Self {
        Self
    }

    async fn open(selector: InputSelector) -> CaptureResult<Option<MediaTrack>> {
        tokio::task::spawn_blocking(move || spawn_capture(selector))
            .await
            .map_err(|e| {
                CaptureError::DeviceUnavailable(format!("{} capture task failed: {e}", selector.label()))
            })?
    }
}

#[async_trait]
impl CaptureDevices for CpalDevices {
    async fn request_microphone(&self) -> CaptureResult<MediaStream> {
        let track = Self::open(InputSelector::DefaultMicrophone)
            .await?
            .ok_or_else(|| {
                CaptureError::DeviceUnavailable(
                    "No input device available for microphone capture".to_string(),
                )
            })?;
        Ok(MediaStream::new(vec![track]))
    }

    async fn request_display(&self, constraints: DisplayConstraints) -> CaptureResult<MediaStream> {
        if constraints.video {
            return Err(CaptureError::DeviceUnavailable(
                "screen video capture is not available on the native host".to_string(),
            ));
        }

        if !constraints.audio {
            return Ok(MediaStream::default());
        }

        match Self::open(InputSelector::SystemMonitor).await? {
            Some(track) => Ok(MediaStream::new(vec![track])),
            None => {
                warn!(
                    "No system audio monitor source found. \
                     Ensure PipeWire is running and a monitor source is available."
                );
                Ok(MediaStream::default())
            }
        }
    }
}

type Ready = CaptureResult<Option<(Arc<CaptureFeed>, String)>>;

/// Start a capture thread for `selector` and wait until its stream is playing.
fn spawn_capture(selector: InputSelector) -> CaptureResult<Option<MediaTrack>> {
    let (ready_tx, ready_rx) = mpsc::channel::<Ready>();
    let (stop_tx, stop_rx) = mpsc::channel::<()>();

    std::thread::Builder::new()
        .name(format!("capture-{}", selector.label()))
        .spawn(move || run_capture(selector, ready_tx, stop_rx))
        .map_err(|e| {
            CaptureError::DeviceUnavailable(format!("failed to spawn capture thread: {e}"))
        })?;

    let ready = ready_rx.recv().map_err(|_| {
        CaptureError::DeviceUnavailable(format!("{} capture thread exited early", selector.label()))
    })?;

    Ok(ready?.map(|(feed, device_name)| {
        let source: Arc<dyn super::PullSource> = feed;
        let handle = NativeTrack::new(Some(source)).with_stop_signal(stop_tx);
        MediaTrack::new(TrackKind::Audio, device_name, Arc::new(handle))
    }))
}

fn run_capture(selector: InputSelector, ready: mpsc::Sender<Ready>, stop: mpsc::Receiver<()>) {
    let Some(device) = selector.find_device() else {
        let _ = ready.send(Ok(None));
        return;
    };

    let device_name = device
        .name()
        .unwrap_or_else(|_| selector.label().to_string());

    let config = match device.default_input_config() {
        Ok(config) => config,
        Err(e) => {
            let _ = ready.send(Err(CaptureError::DeviceUnavailable(format!(
                "{device_name}: {e}"
            ))));
            return;
        }
    };

    let channels = config.channels() as usize;
    let feed = Arc::new(CaptureFeed::new(config.sample_rate().0));
    let stream_config = config.config();

    let feed_for_callback = feed.clone();
    let err_label = device_name.clone();
    let stream = device.build_input_stream(
        &stream_config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            feed_for_callback.push(&AudioMixer::downmix(data, channels));
        },
        move |err| error!("{} stream error: {}", err_label, err),
        None,
    );

    let stream = match stream {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(map_build_error(&device_name, e)));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready.send(Err(CaptureError::DeviceUnavailable(format!(
            "{device_name}: failed to start stream: {e}"
        ))));
        return;
    }

    info!(
        "{} capture started on '{}' ({}Hz, {} channel(s))",
        selector.label(),
        device_name,
        stream_config.sample_rate.0,
        channels
    );
    if ready.send(Ok(Some((feed, device_name.clone())))).is_err() {
        return;
    }

    // Returns on the stop signal or when the track is dropped.
    let _ = stop.recv();
    drop(stream);
    debug!("{} capture on '{}' stopped", selector.label(), device_name);
}

fn map_build_error(device_name: &str, err: cpal::BuildStreamError) -> CaptureError {
    match err {
        cpal::BuildStreamError::BackendSpecific { err }
            if err.description.to_lowercase().contains("permission") =>
        {
            CaptureError::PermissionDenied(format!("{device_name}: {}", err.description))
        }
        other => CaptureError::DeviceUnavailable(format!("{device_name}: {other}")),
    }
}

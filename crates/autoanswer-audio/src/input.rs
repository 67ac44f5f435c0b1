//! OS-level audio input via CPAL.
//!
//! Implements the gate's `AudioInput` seam for a bare-metal console: the capture
//! probe opens a real input stream on the default device, and enumeration lists
//! every input the host knows, with the default one keyed `"default"`.

use crate::error::{AudioError, AudioResult};
use async_trait::async_trait;
use autoanswer_core::{
    AudioInput, CaptureConstraints, CaptureStream, DeviceId, MediaDevice, PlatformError,
};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::mpsc as std_mpsc;
use std::thread;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// A live CPAL input stream parked on its own thread (cpal `Stream` is !Send on
/// some platforms). Dropping the sender or calling `stop_all_tracks` ends it.
pub struct CpalCapture {
    channels: u16,
    stop_tx: std_mpsc::Sender<()>,
}

impl CaptureStream for CpalCapture {
    fn track_count(&self) -> usize {
        usize::from(self.channels.min(1))
    }

    fn stop_all_tracks(self: Box<Self>) {
        // The capture thread also exits when the sender is dropped.
        let _ = self.stop_tx.send(());
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CpalAudioInput;

impl CpalAudioInput {
    pub fn new() -> Self {
        Self
    }

    /// Open the default input on a dedicated thread and keep it until told to stop.
    fn open_default_input() -> AudioResult<CpalCapture> {
        let (ready_tx, ready_rx) = std_mpsc::channel::<AudioResult<u16>>();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();

        thread::Builder::new()
            .name("autoanswer-capture-probe".to_string())
            .spawn(move || {
                let opened = (|| -> AudioResult<(cpal::Stream, u16)> {
                    let device = cpal::default_host()
                        .default_input_device()
                        .ok_or(AudioError::NoInputDevice)?;
                    let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
                    let config = device.default_input_config()?;
                    debug!(device = %name, ?config, "opening capture probe stream");
                    let channels = config.channels();
                    let stream = device.build_input_stream(
                        &config.into(),
                        |_data: &[f32], _: &cpal::InputCallbackInfo| {},
                        |err| warn!("capture probe stream error: {}", err),
                        None,
                    )?;
                    stream.play()?;
                    Ok((stream, channels))
                })();

                match opened {
                    Ok((stream, channels)) => {
                        if ready_tx.send(Ok(channels)).is_err() {
                            return;
                        }
                        // Blocks until stop or until the capture handle is dropped.
                        let _ = stop_rx.recv();
                        drop(stream);
                        debug!("capture probe stream released");
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                    }
                }
            })?;

        let channels = ready_rx.recv().map_err(|_| AudioError::ThreadGone)??;
        Ok(CpalCapture { channels, stop_tx })
    }

    fn list_input_devices() -> AudioResult<Vec<MediaDevice>> {
        let host = cpal::default_host();
        let default_name = host.default_input_device().and_then(|d| d.name().ok());

        let mut devices = Vec::new();
        if let Some(name) = &default_name {
            devices.push(MediaDevice::audio_input(
                DeviceId::DEFAULT,
                format!("Default - {name}"),
            ));
        }
        for device in host.input_devices()? {
            if let Ok(name) = device.name() {
                devices.push(MediaDevice::audio_input(name.clone(), name));
            }
        }
        Ok(devices)
    }
}

#[async_trait]
impl AudioInput for CpalAudioInput {
    async fn request_capture(
        &self,
        constraints: CaptureConstraints,
    ) -> Result<Box<dyn CaptureStream>, PlatformError> {
        if constraints.video {
            return Err(PlatformError::Other("video capture is not supported".to_string()));
        }
        let (tx, rx) = oneshot::channel();
        tokio::task::spawn_blocking(move || {
            let _ = tx.send(Self::open_default_input());
        });
        let capture = rx
            .await
            .map_err(|_| PlatformError::from(AudioError::ThreadGone))??;
        info!(channels = capture.channels, "microphone capture granted");
        Ok(Box::new(capture))
    }

    async fn enumerate_devices(&self) -> Result<Vec<MediaDevice>, PlatformError> {
        let devices = tokio::task::spawn_blocking(Self::list_input_devices)
            .await
            .map_err(|e| PlatformError::Other(e.to_string()))??;
        debug!(count = devices.len(), "enumerated input devices");
        Ok(devices)
    }
}

//! **Device Prober**: is there a microphone the platform can actually use?
//!
//! A probe always starts by requesting an audio-only capture stream, which forces
//! the permission prompt, and releases it right away. Then one of two paths runs:
//!
//! - **simple**: wait (250 ms steps, 5 s budget) for the voice client to populate its
//!   input list past the empty / single-placeholder state, then require that the
//!   client's call-setup listener bound a microphone.
//! - **workaround**: for virtual desktops that advertise one bogus device. Pick the
//!   OS `default` input (else the first one), patch it into the voice client's device
//!   map if missing, nudge the client to recompute, and wait (100 ms steps, 2 s
//!   budget) for its current microphone id to match.

use crate::error::ProbeError;
use crate::host::{AudioInput, CaptureConstraints, HostContext, VoiceClient};
use crate::model::{DeviceId, MediaDevice, MediaDeviceKind};
use crate::retry::RetrySchedule;
use std::sync::Arc;
use tracing::{debug, error, info};

/// `Ok` is `Ready(deviceId)`, `Err` is `Failed(reason)`.
pub type ProbeResult = Result<DeviceId, ProbeError>;

/// Which probing strategy to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeMode {
    Simple,
    Workaround,
}

impl ProbeMode {
    pub fn from_workaround_flag(enabled: bool) -> Self {
        if enabled {
            ProbeMode::Workaround
        } else {
            ProbeMode::Simple
        }
    }
}

pub struct DeviceProber {
    audio: Arc<dyn AudioInput>,
    voice: Arc<dyn VoiceClient>,
    device_list: RetrySchedule,
    convergence: RetrySchedule,
}

impl DeviceProber {
    pub fn new(audio: Arc<dyn AudioInput>, voice: Arc<dyn VoiceClient>) -> Self {
        Self {
            audio,
            voice,
            device_list: RetrySchedule::device_list(),
            convergence: RetrySchedule::convergence(),
        }
    }

    pub fn from_context(ctx: &HostContext) -> Self {
        Self::new(Arc::clone(&ctx.audio), Arc::clone(&ctx.voice))
    }

    /// Override the polling schedules (tests, slow hosts).
    pub fn with_schedules(mut self, device_list: RetrySchedule, convergence: RetrySchedule) -> Self {
        self.device_list = device_list;
        self.convergence = convergence;
        self
    }

    /// Run one probe.
    pub async fn probe(&self, mode: ProbeMode) -> ProbeResult {
        let result = match self.request_permission().await {
            Ok(()) => match mode {
                ProbeMode::Simple => self.probe_simple().await,
                ProbeMode::Workaround => self.probe_workaround().await,
            },
            Err(e) => Err(e),
        };

        match &result {
            Ok(id) => info!(device = %id, ?mode, "microphone found"),
            Err(e) => error!(error = %e, kind = e.kind(), ?mode, "microphone probe failed"),
        }
        result
    }

    async fn request_permission(&self) -> Result<(), ProbeError> {
        let stream = self
            .audio
            .request_capture(CaptureConstraints::audio_only())
            .await?;
        debug!(tracks = stream.track_count(), "capture granted; releasing");
        stream.stop_all_tracks();
        Ok(())
    }

    async fn probe_simple(&self) -> ProbeResult {
        let voice = &self.voice;
        let ids = self
            .device_list
            .poll(|| async move {
                let ids = voice.available_input_device_ids();
                is_populated(&ids).then_some(ids)
            })
            .await
            .map_err(|elapsed| {
                ProbeError::NoDeviceFound(format!(
                    "input devices still empty after {}ms",
                    elapsed.waited.as_millis()
                ))
            })?;
        debug!(?ids, "voice client input devices populated");

        // The OS may list devices while the platform itself never bound one.
        self.voice
            .recorded_input_device_id()
            .filter(|id| !id.is_placeholder())
            .ok_or_else(|| {
                ProbeError::NoDeviceFound("Voice client has not bound a microphone".to_string())
            })
    }

    async fn probe_workaround(&self) -> ProbeResult {
        let devices = self.audio.enumerate_devices().await?;
        let candidate = select_candidate(&devices).cloned().ok_or_else(|| {
            ProbeError::NoDeviceFound("no audio inputs enumerated".to_string())
        })?;
        let expected = candidate.device_id.clone();
        debug!(device = %expected, "workaround candidate selected");

        let known_usable = self
            .voice
            .input_device(&expected)
            .map(|d| d.is_usable())
            .unwrap_or(false);
        if !known_usable {
            info!(device = %expected, "patching voice client device map");
            self.voice.insert_input_device(patchable(candidate));
        }
        if self.voice.current_microphone_id().as_ref() != Some(&expected) {
            self.voice.refresh_active_input();
        }

        let voice = &self.voice;
        let target = &expected;
        self.convergence
            .poll(|| async move {
                voice
                    .current_microphone_id()
                    .filter(|current| current == target)
            })
            .await
            .map_err(|elapsed| ProbeError::Timeout {
                expected: expected.to_string(),
                waited: elapsed.waited,
            })
    }
}

/// More than nothing, and more than the lone empty-string placeholder.
fn is_populated(ids: &[DeviceId]) -> bool {
    match ids {
        [] => false,
        [only] => !only.is_placeholder(),
        _ => true,
    }
}

/// The `default` input if the OS lists one, else the first input.
pub fn select_candidate(devices: &[MediaDevice]) -> Option<&MediaDevice> {
    let inputs = || {
        devices
            .iter()
            .filter(|d| d.kind == MediaDeviceKind::AudioInput && !d.device_id.is_placeholder())
    };
    inputs()
        .find(|d| d.device_id.as_str() == DeviceId::DEFAULT)
        .or_else(|| inputs().next())
}

/// OS labels can be blank; the device map needs one to treat the entry as usable.
fn patchable(mut device: MediaDevice) -> MediaDevice {
    if device.label.trim().is_empty() {
        device.label = format!("Microphone ({})", device.device_id);
    }
    device
}

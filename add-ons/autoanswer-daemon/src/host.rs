//! Console host: in-memory worker and action log, service configuration from a
//! JSON file, and either the OS audio stack or simulated devices.

use crate::settings::DaemonSettings;
use autoanswer_audio::{CpalAudioInput, RodioAnnouncementPlayer};
use autoanswer_core::host::memory::{
    MemoryAudioInput, MemoryNotifier, MemoryPlayer, MemoryVoiceClient, MemoryWorker,
    RecordingActions,
};
use autoanswer_core::{
    AnnouncementPlayer, AudioInput, DeploymentDefaults, DeviceId, FileConfigSource, HostContext,
    MediaDevice, MediaDeviceKind, PendingAction, PendingActionKind, VoiceClient,
};
use std::sync::Arc;
use tracing::{info, warn};

pub struct ConsoleHost {
    pub worker: Arc<MemoryWorker>,
    pub actions: Arc<RecordingActions>,
    pub voice: MemoryVoiceClient,
    pub context: HostContext,
}

impl ConsoleHost {
    pub async fn build(settings: &DaemonSettings) -> Self {
        let worker = Arc::new(MemoryWorker::new());
        for activity in &settings.activities {
            worker.add_activity(activity.clone());
        }
        worker.set_current_activity(&settings.initial_activity);
        worker.set_voice_enabled(settings.voice_enabled);

        let (audio, player): (Arc<dyn AudioInput>, Arc<dyn AnnouncementPlayer>) =
            if settings.simulate_audio {
                let mic = MediaDevice::audio_input(DeviceId::DEFAULT, "Default - Simulated Microphone");
                (
                    Arc::new(MemoryAudioInput::with_devices(vec![mic])),
                    Arc::new(MemoryPlayer::new()),
                )
            } else {
                (Arc::new(CpalAudioInput::new()), Arc::new(RodioAnnouncementPlayer::new()))
            };

        let voice = MemoryVoiceClient::default();
        seed_voice_client(audio.as_ref(), &voice).await;

        let actions = Arc::new(RecordingActions::new(Arc::clone(&worker)));
        let context = HostContext {
            worker: worker.clone(),
            actions: actions.clone(),
            notifier: Arc::new(MemoryNotifier::new()),
            player,
            config: Arc::new(FileConfigSource::new(&settings.service_config_path)),
            audio,
            voice: Arc::new(voice.clone()),
            defaults: DeploymentDefaults::from_env(),
        };
        Self {
            worker,
            actions,
            voice,
            context,
        }
    }

    /// Carry out the host action a pre-hook was gating, unless the gate aborted it.
    pub fn complete(&self, pending: &PendingAction) {
        if pending.is_aborted() {
            info!(action = ?pending.kind(), "host action aborted by gate");
            return;
        }
        match pending.kind() {
            PendingActionKind::SetActivity { activity_sid } => {
                match self.worker.apply_activity(activity_sid) {
                    Ok(()) => info!(activity = %activity_sid, "worker activity changed"),
                    Err(e) => warn!(activity = %activity_sid, error = %e, "activity change failed"),
                }
            }
            PendingActionKind::StartOutboundCall { destination } => {
                info!(destination = %destination, "outbound call started")
            }
            PendingActionKind::AcceptTask { sid } => info!(sid = %sid, "task accepted"),
        }
    }
}

/// Mirror what a voice client does at startup: learn the inputs and bind the
/// default (or first) one.
async fn seed_voice_client(audio: &dyn AudioInput, voice: &MemoryVoiceClient) {
    let devices = match audio.enumerate_devices().await {
        Ok(devices) => devices,
        Err(e) => {
            warn!(error = %e, "input enumeration failed; voice client starts without devices");
            return;
        }
    };
    let inputs: Vec<MediaDevice> = devices
        .into_iter()
        .filter(|d| d.kind == MediaDeviceKind::AudioInput && d.is_usable())
        .collect();
    voice.set_available(inputs.iter().map(|d| d.device_id.clone()).collect());
    for device in &inputs {
        voice.insert_input_device(device.clone());
    }
    let bound = inputs
        .iter()
        .find(|d| d.device_id.as_str() == DeviceId::DEFAULT)
        .or_else(|| inputs.first())
        .map(|d| d.device_id.clone());
    info!(inputs = inputs.len(), bound = ?bound, "voice client seeded");
    voice.record_bound_device(bound.clone());
    voice.set_current_microphone(bound);
}

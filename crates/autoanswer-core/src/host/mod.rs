//! Host platform collaborators.
//!
//! The gate never reaches for a global host manager. Every component receives a
//! `HostContext` holding the collaborators below as trait objects, so the same
//! state machine runs against the real console, the daemon harness, or the
//! in-memory fakes in [`memory`].

pub mod memory;

use crate::config::{DeploymentDefaults, DeviceCheckConfig, ServiceConfiguration};
use crate::error::PlatformError;
use crate::model::{
    voice_channel_enabled, DeviceId, MediaDevice, Reservation, WorkerActivity, WorkerChannel,
};
use crate::notifications::{NotificationParams, NotificationTemplate};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Marker attached to actions the gate issues on its own behalf, so other
/// integrations listening on the same hooks can tell them apart from operator clicks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionOrigin {
    AudioDeviceCheck,
}

/// Named actions the gate asks the host to perform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "payload")]
pub enum HostAction {
    AcceptTask {
        sid: String,
        is_auto_accept: bool,
    },
    SelectTask {
        sid: String,
    },
    SetActivity {
        activity_sid: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        origin: Option<ActionOrigin>,
    },
}

impl HostAction {
    pub fn name(&self) -> &'static str {
        match self {
            HostAction::AcceptTask { .. } => "AcceptTask",
            HostAction::SelectTask { .. } => "SelectTask",
            HostAction::SetActivity { .. } => "SetActivity",
        }
    }
}

/// The host action a pre-hook is gating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PendingActionKind {
    AcceptTask { sid: String },
    SetActivity { activity_sid: String },
    StartOutboundCall { destination: String },
}

/// An in-flight host action that the handler may cancel before it returns.
///
/// Cloning shares the abort flag; the host keeps one clone and checks
/// [`PendingAction::is_aborted`] once the handler has finished.
#[derive(Debug, Clone)]
pub struct PendingAction {
    kind: PendingActionKind,
    aborted: Arc<AtomicBool>,
}

impl PendingAction {
    pub fn new(kind: PendingActionKind) -> Self {
        Self {
            kind,
            aborted: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn kind(&self) -> &PendingActionKind {
        &self.kind
    }

    pub fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }
}

/// Play request for the announcement tone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackRequest {
    pub url: String,
    pub repeatable: bool,
}

impl PlaybackRequest {
    pub fn once(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            repeatable: false,
        }
    }
}

/// Constraints for a capture request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConstraints {
    pub audio: bool,
    pub video: bool,
}

impl CaptureConstraints {
    pub const fn audio_only() -> Self {
        Self {
            audio: true,
            video: false,
        }
    }
}

/// A granted capture stream. The prober only needs it to exist, then stops it.
pub trait CaptureStream: Send {
    fn track_count(&self) -> usize;

    /// Stop every track and release the underlying device.
    fn stop_all_tracks(self: Box<Self>);
}

/// The agent's worker session.
#[async_trait]
pub trait WorkerSession: Send + Sync {
    fn current_activity(&self) -> Option<WorkerActivity>;

    fn activity(&self, sid: &str) -> Option<WorkerActivity>;

    fn channels(&self) -> Vec<WorkerChannel>;

    /// Whether the worker's voice task channel is enabled.
    fn is_voice_enabled(&self) -> bool {
        voice_channel_enabled(&self.channels())
    }

    /// Reservations currently offered to the worker, any status.
    fn reservations(&self) -> Vec<Reservation>;

    /// Latest state of one reservation.
    fn reservation(&self, sid: &str) -> Option<Reservation> {
        self.reservations().into_iter().find(|r| r.sid == sid)
    }

    fn pending_reservations(&self) -> Vec<Reservation> {
        self.reservations().into_iter().filter(|r| r.is_pending()).collect()
    }

    async fn reject_reservation(&self, sid: &str) -> Result<(), PlatformError>;
}

/// The host's action framework.
#[async_trait]
pub trait ActionInvoker: Send + Sync {
    async fn invoke(&self, action: HostAction) -> Result<(), PlatformError>;
}

/// The host's notification bar.
pub trait Notifier: Send + Sync {
    fn register(&self, template: NotificationTemplate);

    fn show(&self, id: &str, params: &NotificationParams) -> Result<(), PlatformError>;
}

/// Plays a media URL.
pub trait AnnouncementPlayer: Send + Sync {
    fn play(&self, request: &PlaybackRequest) -> Result<(), PlatformError>;
}

/// Source of the host's service configuration document.
pub trait ConfigSource: Send + Sync {
    fn service_configuration(&self) -> ServiceConfiguration;
}

/// OS-level audio I/O: permission-gated capture and device enumeration.
#[async_trait]
pub trait AudioInput: Send + Sync {
    async fn request_capture(
        &self,
        constraints: CaptureConstraints,
    ) -> Result<Box<dyn CaptureStream>, PlatformError>;

    async fn enumerate_devices(&self) -> Result<Vec<MediaDevice>, PlatformError>;
}

/// The platform voice client's internal device state.
///
/// `refresh_active_input` only nudges the platform; the recomputed microphone id
/// shows up in `current_microphone_id` some time later.
pub trait VoiceClient: Send + Sync {
    /// Keys of the platform's available-input-devices collection.
    fn available_input_device_ids(&self) -> Vec<DeviceId>;

    /// Microphone id recorded by the platform's call-setup listener, if any.
    fn recorded_input_device_id(&self) -> Option<DeviceId>;

    /// Entry of the platform's internal device map.
    fn input_device(&self, id: &DeviceId) -> Option<MediaDevice>;

    fn insert_input_device(&self, device: MediaDevice);

    fn refresh_active_input(&self);

    fn current_microphone_id(&self) -> Option<DeviceId>;
}

/// Everything the gate needs from the host, injected at construction.
#[derive(Clone)]
pub struct HostContext {
    pub worker: Arc<dyn WorkerSession>,
    pub actions: Arc<dyn ActionInvoker>,
    pub notifier: Arc<dyn Notifier>,
    pub player: Arc<dyn AnnouncementPlayer>,
    pub config: Arc<dyn ConfigSource>,
    pub audio: Arc<dyn AudioInput>,
    pub voice: Arc<dyn VoiceClient>,
    pub defaults: DeploymentDefaults,
}

impl HostContext {
    /// Fresh configuration snapshot for one evaluation.
    pub fn device_check_config(&self) -> DeviceCheckConfig {
        DeviceCheckConfig::resolve(&self.config.service_configuration(), &self.defaults)
    }
}

impl std::fmt::Debug for HostContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostContext")
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abort_flag_is_shared_between_clones() {
        let pending = PendingAction::new(PendingActionKind::SetActivity {
            activity_sid: "WAavailable".into(),
        });
        let host_copy = pending.clone();
        assert!(!host_copy.is_aborted());
        pending.abort();
        assert!(host_copy.is_aborted());
    }

    #[test]
    fn set_activity_serializes_origin_marker() {
        let action = HostAction::SetActivity {
            activity_sid: "WAerror".into(),
            origin: Some(ActionOrigin::AudioDeviceCheck),
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["action"], "SetActivity");
        assert_eq!(json["payload"]["origin"], "audio-device-check");
    }
}

//! Host-owned data the gate reads: reservations, activities, task channels, devices.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an audio input device as the platform reports it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(pub String);

impl DeviceId {
    /// The id some platforms use for the OS default input.
    pub const DEFAULT: &'static str = "default";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The empty-string entry reported before real devices are populated.
    pub fn is_placeholder(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Kind of device returned by OS-level enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaDeviceKind {
    AudioInput,
    AudioOutput,
    VideoInput,
}

/// One entry of an OS-level device enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaDevice {
    pub device_id: DeviceId,
    pub kind: MediaDeviceKind,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub group_id: String,
}

impl MediaDevice {
    pub fn audio_input(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            device_id: DeviceId::new(id),
            kind: MediaDeviceKind::AudioInput,
            label: label.into(),
            group_id: String::new(),
        }
    }

    /// A device entry the platform can actually bind: non-placeholder id and a label.
    pub fn is_usable(&self) -> bool {
        !self.device_id.is_placeholder() && !self.label.trim().is_empty()
    }
}

/// Channel the task arrived on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Voice,
    Chat,
    Sms,
    Email,
    #[serde(untagged)]
    Other(String),
}

impl ChannelKind {
    pub fn is_voice(&self) -> bool {
        matches!(self, ChannelKind::Voice)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Pending,
    Accepted,
    Rejected,
    Timeout,
    Canceled,
    Rescinded,
    Wrapping,
    Completed,
}

/// An offer of a unit of work to this agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub sid: String,
    pub status: ReservationStatus,
    pub channel: ChannelKind,
    /// True for the agent's own outbound dial before the callee answers.
    #[serde(default)]
    pub is_initial_outbound_attempt: bool,
}

impl Reservation {
    pub fn voice(sid: impl Into<String>) -> Self {
        Self {
            sid: sid.into(),
            status: ReservationStatus::Pending,
            channel: ChannelKind::Voice,
            is_initial_outbound_attempt: false,
        }
    }

    pub fn with_channel(mut self, channel: ChannelKind) -> Self {
        self.channel = channel;
        self
    }

    pub fn outbound_attempt(mut self) -> Self {
        self.is_initial_outbound_attempt = true;
        self
    }

    pub fn is_pending(&self) -> bool {
        self.status == ReservationStatus::Pending
    }
}

/// A named availability state of the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerActivity {
    pub sid: String,
    pub name: String,
    pub available: bool,
}

impl WorkerActivity {
    pub fn new(sid: impl Into<String>, name: impl Into<String>, available: bool) -> Self {
        Self {
            sid: sid.into(),
            name: name.into(),
            available,
        }
    }
}

/// One of the worker's task channels (voice, chat, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerChannel {
    pub task_channel_unique_name: String,
    pub available: bool,
}

/// Voice is enabled when the `voice` channel exists and is available.
pub fn voice_channel_enabled(channels: &[WorkerChannel]) -> bool {
    channels
        .iter()
        .find(|c| c.task_channel_unique_name == "voice")
        .map(|c| c.available)
        .unwrap_or(false)
}

//! Service configuration models and the per-evaluation `DeviceCheckConfig` snapshot.
//!
//! The host exposes a nested, loosely-typed configuration document. Every field the
//! gate reads is optional there; this module resolves it into a flat struct with
//! documented defaults each time a trigger is evaluated, so upstream edits take effect
//! without a restart.
//!
//! | Host path | Default | Effect |
//! |-----------|---------|--------|
//! | ui_attributes.audioDeviceCheckPlugin.isDeviceCheckEnabled | false | Gate accepts, activity changes and outbound calls on a probe. |
//! | ui_attributes.audioDeviceCheckPlugin.isWorkaroundEnabled | false | Reconcile the platform device map before trusting it. |
//! | ui_attributes.audioDeviceCheckPlugin.audioDeviceErrorActivitySid | none | Activity to move the worker to when the probe fails. |
//! | taskrouter_offline_activity_sid | none | Fallback activity when no error activity is set. |
//! | ui_attributes.announceMedia (or annouceMedia) | deployment default | Tone played after an auto-accept. |
//! | ui_attributes.activityHandlerPlugin | absent | Companion integration owning the busy transition on outbound calls. |

use crate::error::{GateError, GateResult};
use crate::host::ConfigSource;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding the announcement tone at runtime.
pub const ANNOUNCE_MEDIA_ENV: &str = "AUTOANSWER_ANNOUNCE_MEDIA";

/// Announcement tone baked in at build time, if the build environment set one.
pub const BUILD_ANNOUNCE_MEDIA: Option<&str> = option_env!("AUTOANSWER_ANNOUNCE_MEDIA");

/// Plugin section of the host's `ui_attributes`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceCheckSettings {
    #[serde(default)]
    pub is_device_check_enabled: Option<bool>,
    #[serde(default)]
    pub is_workaround_enabled: Option<bool>,
    #[serde(default)]
    pub audio_device_error_activity_sid: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiAttributes {
    #[serde(default)]
    pub audio_device_check_plugin: Option<DeviceCheckSettings>,
    /// Older deployments spell this key `annouceMedia`.
    #[serde(default, alias = "annouceMedia")]
    pub announce_media: Option<String>,
    /// Any value here means the activity-handler integration is installed.
    #[serde(default)]
    pub activity_handler_plugin: Option<serde_json::Value>,
}

/// The host's service configuration document (only the parts the gate reads).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfiguration {
    #[serde(default)]
    pub ui_attributes: UiAttributes,
    #[serde(default)]
    pub taskrouter_offline_activity_sid: Option<String>,
}

impl ServiceConfiguration {
    pub fn from_json(raw: &str) -> GateResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Values supplied by the deployment rather than the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploymentDefaults {
    pub announce_media_url: Option<String>,
}

impl DeploymentDefaults {
    /// `AUTOANSWER_ANNOUNCE_MEDIA` at runtime, else the build-time value.
    pub fn from_env() -> Self {
        let announce_media_url = std::env::var(ANNOUNCE_MEDIA_ENV)
            .ok()
            .and_then(non_empty)
            .or_else(|| BUILD_ANNOUNCE_MEDIA.map(str::to_string).and_then(non_empty));
        Self { announce_media_url }
    }
}

/// Flat snapshot resolved for a single evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceCheckConfig {
    pub is_device_check_enabled: bool,
    pub is_workaround_enabled: bool,
    pub error_activity_sid: Option<String>,
    pub offline_activity_sid: Option<String>,
    pub announce_media_url: Option<String>,
    pub activity_automation_present: bool,
}

impl DeviceCheckConfig {
    /// Resolve the host document into a snapshot. Empty strings count as unset.
    pub fn resolve(service: &ServiceConfiguration, defaults: &DeploymentDefaults) -> Self {
        let ui = &service.ui_attributes;
        let plugin = ui.audio_device_check_plugin.clone().unwrap_or_default();
        Self {
            is_device_check_enabled: plugin.is_device_check_enabled.unwrap_or(false),
            is_workaround_enabled: plugin.is_workaround_enabled.unwrap_or(false),
            error_activity_sid: plugin.audio_device_error_activity_sid.and_then(non_empty),
            offline_activity_sid: service.taskrouter_offline_activity_sid.clone().and_then(non_empty),
            announce_media_url: ui
                .announce_media
                .clone()
                .and_then(non_empty)
                .or_else(|| defaults.announce_media_url.clone()),
            activity_automation_present: is_present(ui.activity_handler_plugin.as_ref()),
        }
    }
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn is_present(value: Option<&serde_json::Value>) -> bool {
    match value {
        None | Some(serde_json::Value::Null) | Some(serde_json::Value::Bool(false)) => false,
        Some(serde_json::Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

/// Reads a JSON service configuration file on every snapshot.
///
/// A missing file yields the empty document (feature off); a malformed one is
/// logged and also treated as empty so a bad edit never crashes the session.
#[derive(Debug, Clone)]
pub struct FileConfigSource {
    path: PathBuf,
}

impl FileConfigSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> GateResult<ServiceConfiguration> {
        if !self.path.exists() {
            return Ok(ServiceConfiguration::default());
        }
        let raw = std::fs::read_to_string(&self.path)?;
        ServiceConfiguration::from_json(&raw)
            .map_err(|e| GateError::Config(format!("{}: {}", self.path.display(), e)))
    }
}

impl ConfigSource for FileConfigSource {
    fn service_configuration(&self) -> ServiceConfiguration {
        match self.read() {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::warn!(error = %e, "service configuration unreadable; device check disabled");
                ServiceConfiguration::default()
            }
        }
    }
}

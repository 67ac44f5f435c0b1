//! Error types for the device-readiness gate

use std::time::Duration;
use thiserror::Error;

/// Result type alias for gate operations
pub type GateResult<T> = Result<T, GateError>;

/// Why a microphone probe failed.
///
/// Every variant is recovered inside the orchestrator; none of them escape a
/// trigger handler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// The operator declined or the browser blocked microphone access.
    #[error("Microphone permission denied: {0}")]
    PermissionDenied(String),

    /// No usable input device after the retry budget was spent.
    #[error("No microphone found: {0}")]
    NoDeviceFound(String),

    /// The platform device map never converged on the chosen device.
    #[error("Input device reconciliation timed out after {waited:?} (expected '{expected}')")]
    Timeout { expected: String, waited: Duration },
}

impl ProbeError {
    /// Short machine-friendly label used in structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ProbeError::PermissionDenied(_) => "permission_denied",
            ProbeError::NoDeviceFound(_) => "no_device_found",
            ProbeError::Timeout { .. } => "timeout",
        }
    }
}

/// Failures reported by host platform collaborators.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Device not found: {0}")]
    NotFound(String),

    #[error("Action '{action}' failed: {reason}")]
    Action { action: String, reason: String },

    #[error("Platform error: {0}")]
    Other(String),
}

impl From<PlatformError> for ProbeError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::PermissionDenied(msg) => ProbeError::PermissionDenied(msg),
            PlatformError::NotFound(msg) => ProbeError::NoDeviceFound(msg),
            // Anything else the audio layer throws still means we have no usable microphone.
            other => ProbeError::NoDeviceFound(other.to_string()),
        }
    }
}

/// Crate-level error
#[derive(Error, Debug)]
pub enum GateError {
    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error(transparent)]
    Platform(#[from] PlatformError),

    /// No corrective activity is configured; not a fault of the check itself.
    #[error("Configuration gap: {0}")]
    ConfigurationGap(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Event channel closed: {0}")]
    ChannelClosed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

//! Error types for the audio adapters

use autoanswer_core::PlatformError;
use thiserror::Error;

/// Result type alias for audio adapter operations
pub type AudioResult<T> = Result<T, AudioError>;

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("No input device available")]
    NoInputDevice,

    #[error("Audio device error: {0}")]
    AudioDevice(String),

    /// The OS refused to open the microphone (privacy settings, exclusive use).
    #[error("Microphone access refused: {0}")]
    AccessRefused(String),

    #[error("Audio stream error: {0}")]
    AudioStream(String),

    #[error("Audio playback error: {0}")]
    Playback(String),

    #[error("Media fetch error: {0}")]
    Fetch(String),

    #[error("Capture thread ended before reporting")]
    ThreadGone,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<cpal::DevicesError> for AudioError {
    fn from(err: cpal::DevicesError) -> Self {
        AudioError::AudioDevice(err.to_string())
    }
}

impl From<cpal::DefaultStreamConfigError> for AudioError {
    fn from(err: cpal::DefaultStreamConfigError) -> Self {
        match err {
            cpal::DefaultStreamConfigError::DeviceNotAvailable => AudioError::NoInputDevice,
            other => AudioError::AudioDevice(other.to_string()),
        }
    }
}

impl From<cpal::BuildStreamError> for AudioError {
    fn from(err: cpal::BuildStreamError) -> Self {
        match err {
            cpal::BuildStreamError::DeviceNotAvailable => AudioError::NoInputDevice,
            // Blocked microphone access surfaces as a backend error on every host.
            cpal::BuildStreamError::BackendSpecific { err } => AudioError::AccessRefused(err.to_string()),
            other => AudioError::AudioStream(other.to_string()),
        }
    }
}

impl From<cpal::PlayStreamError> for AudioError {
    fn from(err: cpal::PlayStreamError) -> Self {
        match err {
            cpal::PlayStreamError::DeviceNotAvailable => AudioError::NoInputDevice,
            other => AudioError::AudioStream(other.to_string()),
        }
    }
}

impl From<AudioError> for PlatformError {
    fn from(err: AudioError) -> Self {
        match err {
            AudioError::NoInputDevice => PlatformError::NotFound("no audio input device".to_string()),
            AudioError::AccessRefused(msg) => PlatformError::PermissionDenied(msg),
            other => PlatformError::Other(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_onto_platform_errors() {
        assert!(matches!(
            PlatformError::from(AudioError::NoInputDevice),
            PlatformError::NotFound(_)
        ));
        assert!(matches!(
            PlatformError::from(AudioError::AccessRefused("denied".into())),
            PlatformError::PermissionDenied(_)
        ));
        assert!(matches!(
            PlatformError::from(AudioError::Playback("x".into())),
            PlatformError::Other(_)
        ));
    }
}

//! # autoanswer-audio - Bare-Metal Audio Adapters
//!
//! Host adapters for running the readiness gate on a console without a browser:
//!
//! - [`CpalAudioInput`] opens the default microphone for the capture probe and
//!   lists input devices (cpal).
//! - [`RodioAnnouncementPlayer`] plays the announcement tone after an auto-accept
//!   (rodio, media fetched with reqwest).

pub mod error;
pub mod input;
pub mod playback;

pub use error::{AudioError, AudioResult};
pub use input::{CpalAudioInput, CpalCapture};
pub use playback::{fetch_media, RodioAnnouncementPlayer};

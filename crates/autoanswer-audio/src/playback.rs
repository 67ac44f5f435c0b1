//! Announcement playback through the default output device.
//!
//! `play` returns as soon as the request is accepted; fetching, decoding and
//! playing happen on a detached thread so the gate never waits on the speaker.

use crate::error::{AudioError, AudioResult};
use autoanswer_core::{AnnouncementPlayer, PlatformError, PlaybackRequest};
use rodio::{Decoder, OutputStream, Sink, Source};
use std::io::Cursor;
use std::path::Path;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Load announcement bytes from an http(s) URL, a `file://` URL or a plain path.
/// Blocking; never call from inside the async runtime.
pub fn fetch_media(url: &str) -> AudioResult<Vec<u8>> {
    if url.starts_with("http://") || url.starts_with("https://") {
        let client = reqwest::blocking::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| AudioError::Fetch(e.to_string()))?;
        let res = client
            .get(url)
            .send()
            .map_err(|e| AudioError::Fetch(e.to_string()))?;
        if !res.status().is_success() {
            return Err(AudioError::Fetch(format!("{} returned {}", url, res.status())));
        }
        let bytes = res.bytes().map_err(|e| AudioError::Fetch(e.to_string()))?;
        return Ok(bytes.to_vec());
    }
    let path = url.strip_prefix("file://").unwrap_or(url);
    Ok(std::fs::read(Path::new(path))?)
}

/// Decode and play on the default output device, blocking until the sink drains.
fn play_blocking(bytes: Vec<u8>, repeatable: bool) -> AudioResult<()> {
    let (_stream, handle) =
        OutputStream::try_default().map_err(|e| AudioError::Playback(e.to_string()))?;
    let sink = Sink::try_new(&handle).map_err(|e| AudioError::Playback(e.to_string()))?;
    let source = Decoder::new(Cursor::new(bytes))
        .map_err(|e| AudioError::Playback(format!("Decode failed: {}", e)))?
        .convert_samples::<f32>();
    if repeatable {
        sink.append(source.repeat_infinite());
    } else {
        sink.append(source);
    }
    sink.sleep_until_end();
    Ok(())
}

/// Fire-and-forget announcement player backed by rodio.
#[derive(Debug, Default, Clone, Copy)]
pub struct RodioAnnouncementPlayer;

impl RodioAnnouncementPlayer {
    pub fn new() -> Self {
        Self
    }
}

impl AnnouncementPlayer for RodioAnnouncementPlayer {
    fn play(&self, request: &PlaybackRequest) -> Result<(), PlatformError> {
        let url = request.url.trim().to_string();
        if url.is_empty() {
            return Err(PlatformError::Other("announcement URL is empty".to_string()));
        }
        let repeatable = request.repeatable;

        thread::Builder::new()
            .name("autoanswer-announcement".to_string())
            .spawn(move || {
                debug!(url = %url, "fetching announcement");
                let played = fetch_media(&url).and_then(|bytes| play_blocking(bytes, repeatable));
                match played {
                    Ok(()) => info!(url = %url, "announcement finished"),
                    Err(e) => warn!(url = %url, error = %e, "announcement playback failed"),
                }
            })
            .map_err(|e| PlatformError::from(AudioError::Io(e)))?;
        Ok(())
    }
}

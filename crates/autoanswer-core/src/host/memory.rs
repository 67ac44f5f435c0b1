//! In-memory host platform.
//!
//! A complete stand-in for the console: worker session, action framework,
//! notifications, playback, configuration, OS audio and the voice client's device
//! state. The voice client reacts to `refresh_active_input` asynchronously, like the
//! real platform listener does, which is what the workaround probe has to wait for.

use super::{
    ActionInvoker, AnnouncementPlayer, AudioInput, CaptureConstraints, CaptureStream,
    ConfigSource, HostAction, HostContext, Notifier, PlaybackRequest, VoiceClient, WorkerSession,
};
use crate::config::{DeploymentDefaults, ServiceConfiguration};
use crate::error::PlatformError;
use crate::model::{
    DeviceId, MediaDevice, MediaDeviceKind, Reservation, ReservationStatus, WorkerActivity,
    WorkerChannel,
};
use crate::notifications::{NotificationParams, NotificationTemplate};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tracing::{debug, info};

fn read<T: Clone>(lock: &RwLock<T>) -> T {
    lock.read().unwrap_or_else(|e| e.into_inner()).clone()
}

fn write<T>(lock: &RwLock<T>, value: T) {
    *lock.write().unwrap_or_else(|e| e.into_inner()) = value;
}

fn push<T>(lock: &Mutex<Vec<T>>, value: T) {
    lock.lock().unwrap_or_else(|e| e.into_inner()).push(value);
}

fn snapshot<T: Clone>(lock: &Mutex<Vec<T>>) -> Vec<T> {
    lock.lock().unwrap_or_else(|e| e.into_inner()).clone()
}

// -----------------------------------------------------------------------------
// Worker
// -----------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryWorker {
    activities: DashMap<String, WorkerActivity>,
    current: RwLock<Option<String>>,
    channels: RwLock<Vec<WorkerChannel>>,
    reservations: DashMap<String, Reservation>,
}

impl MemoryWorker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_activity(&self, activity: WorkerActivity) {
        self.activities.insert(activity.sid.clone(), activity);
    }

    pub fn set_current_activity(&self, sid: &str) {
        write(&self.current, Some(sid.to_string()));
    }

    pub fn set_voice_enabled(&self, enabled: bool) {
        let mut channels = self.channels.write().unwrap_or_else(|e| e.into_inner());
        match channels.iter().position(|c| c.task_channel_unique_name == "voice") {
            Some(idx) => channels[idx].available = enabled,
            None => channels.push(WorkerChannel {
                task_channel_unique_name: "voice".to_string(),
                available: enabled,
            }),
        }
    }

    pub fn offer(&self, reservation: Reservation) {
        self.reservations.insert(reservation.sid.clone(), reservation);
    }

    fn set_status(&self, sid: &str, status: ReservationStatus) -> Result<(), PlatformError> {
        let mut entry = self
            .reservations
            .get_mut(sid)
            .ok_or_else(|| PlatformError::NotFound(format!("reservation {sid}")))?;
        entry.status = status;
        Ok(())
    }

    /// Move to `sid`. Leaving availability cancels every pending reservation,
    /// as the routing backend does.
    pub fn apply_activity(&self, sid: &str) -> Result<(), PlatformError> {
        let activity = self
            .activity(sid)
            .ok_or_else(|| PlatformError::NotFound(format!("activity {sid}")))?;
        self.set_current_activity(sid);
        if !activity.available {
            for mut r in self.reservations.iter_mut() {
                if r.status == ReservationStatus::Pending {
                    r.status = ReservationStatus::Canceled;
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl WorkerSession for MemoryWorker {
    fn current_activity(&self) -> Option<WorkerActivity> {
        read(&self.current).and_then(|sid| self.activity(&sid))
    }

    fn activity(&self, sid: &str) -> Option<WorkerActivity> {
        self.activities.get(sid).map(|a| a.clone())
    }

    fn channels(&self) -> Vec<WorkerChannel> {
        read(&self.channels)
    }

    fn reservations(&self) -> Vec<Reservation> {
        let mut all: Vec<Reservation> = self.reservations.iter().map(|r| r.clone()).collect();
        all.sort_by(|a, b| a.sid.cmp(&b.sid));
        all
    }

    fn reservation(&self, sid: &str) -> Option<Reservation> {
        self.reservations.get(sid).map(|r| r.clone())
    }

    async fn reject_reservation(&self, sid: &str) -> Result<(), PlatformError> {
        let current = self
            .reservation(sid)
            .ok_or_else(|| PlatformError::NotFound(format!("reservation {sid}")))?;
        if !current.is_pending() {
            return Err(PlatformError::Action {
                action: "reject".to_string(),
                reason: format!("reservation {sid} is {:?}", current.status),
            });
        }
        self.set_status(sid, ReservationStatus::Rejected)
    }
}

// -----------------------------------------------------------------------------
// Actions
// -----------------------------------------------------------------------------

/// Records every action and applies it to the worker.
#[derive(Debug)]
pub struct RecordingActions {
    worker: Arc<MemoryWorker>,
    log: Mutex<Vec<HostAction>>,
}

impl RecordingActions {
    pub fn new(worker: Arc<MemoryWorker>) -> Self {
        Self {
            worker,
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn invoked(&self) -> Vec<HostAction> {
        snapshot(&self.log)
    }

    pub fn accepted(&self, sid: &str) -> bool {
        self.invoked()
            .iter()
            .any(|a| matches!(a, HostAction::AcceptTask { sid: s, .. } if s == sid))
    }
}

#[async_trait]
impl ActionInvoker for RecordingActions {
    async fn invoke(&self, action: HostAction) -> Result<(), PlatformError> {
        info!(action = action.name(), "host action invoked");
        push(&self.log, action.clone());
        match action {
            HostAction::AcceptTask { sid, .. } => {
                self.worker.set_status(&sid, ReservationStatus::Accepted)
            }
            HostAction::SetActivity { activity_sid, .. } => self.worker.apply_activity(&activity_sid),
            HostAction::SelectTask { .. } => Ok(()),
        }
    }
}

// -----------------------------------------------------------------------------
// Notifications, playback, configuration
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShownNotification {
    pub id: String,
    pub text: String,
    pub shown_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct MemoryNotifier {
    templates: DashMap<String, NotificationTemplate>,
    shown: Mutex<Vec<ShownNotification>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn template(&self, id: &str) -> Option<NotificationTemplate> {
        self.templates.get(id).map(|t| t.clone())
    }

    pub fn shown(&self) -> Vec<ShownNotification> {
        snapshot(&self.shown)
    }
}

impl Notifier for MemoryNotifier {
    fn register(&self, template: NotificationTemplate) {
        self.templates.insert(template.id.clone(), template);
    }

    fn show(&self, id: &str, params: &NotificationParams) -> Result<(), PlatformError> {
        let template = self
            .template(id)
            .ok_or_else(|| PlatformError::NotFound(format!("notification template {id}")))?;
        let text = template.render(params);
        info!(id, %text, "notification shown");
        push(
            &self.shown,
            ShownNotification {
                id: id.to_string(),
                text,
                shown_at: Utc::now(),
            },
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryPlayer {
    played: Mutex<Vec<PlaybackRequest>>,
}

impl MemoryPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn played(&self) -> Vec<PlaybackRequest> {
        snapshot(&self.played)
    }
}

impl AnnouncementPlayer for MemoryPlayer {
    fn play(&self, request: &PlaybackRequest) -> Result<(), PlatformError> {
        debug!(url = %request.url, "announcement queued");
        push(&self.played, request.clone());
        Ok(())
    }
}

/// Configuration held in memory; `replace` models an upstream change.
#[derive(Debug, Default)]
pub struct MemoryConfig {
    inner: RwLock<ServiceConfiguration>,
}

impl MemoryConfig {
    pub fn new(service: ServiceConfiguration) -> Self {
        Self {
            inner: RwLock::new(service),
        }
    }

    pub fn replace(&self, service: ServiceConfiguration) {
        write(&self.inner, service);
    }
}

impl ConfigSource for MemoryConfig {
    fn service_configuration(&self) -> ServiceConfiguration {
        read(&self.inner)
    }
}

// -----------------------------------------------------------------------------
// OS audio
// -----------------------------------------------------------------------------

struct MemoryStream {
    tracks: usize,
    stopped: Arc<AtomicUsize>,
}

impl CaptureStream for MemoryStream {
    fn track_count(&self) -> usize {
        self.tracks
    }

    fn stop_all_tracks(self: Box<Self>) {
        self.stopped.fetch_add(self.tracks, Ordering::SeqCst);
    }
}

/// OS audio layer with a scripted permission answer and device list.
#[derive(Debug, Default)]
pub struct MemoryAudioInput {
    denied: RwLock<Option<String>>,
    devices: RwLock<Vec<MediaDevice>>,
    capture_requests: AtomicUsize,
    stopped_tracks: Arc<AtomicUsize>,
}

impl MemoryAudioInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_devices(devices: Vec<MediaDevice>) -> Self {
        let audio = Self::default();
        audio.set_devices(devices);
        audio
    }

    pub fn set_devices(&self, devices: Vec<MediaDevice>) {
        write(&self.devices, devices);
    }

    pub fn deny_permission(&self, reason: impl Into<String>) {
        write(&self.denied, Some(reason.into()));
    }

    pub fn capture_requests(&self) -> usize {
        self.capture_requests.load(Ordering::SeqCst)
    }

    pub fn stopped_tracks(&self) -> usize {
        self.stopped_tracks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioInput for MemoryAudioInput {
    async fn request_capture(
        &self,
        constraints: CaptureConstraints,
    ) -> Result<Box<dyn CaptureStream>, PlatformError> {
        self.capture_requests.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = read(&self.denied) {
            return Err(PlatformError::PermissionDenied(reason));
        }
        let inputs = read(&self.devices)
            .iter()
            .filter(|d| d.kind == MediaDeviceKind::AudioInput)
            .count();
        if constraints.audio && inputs == 0 {
            return Err(PlatformError::NotFound("Requested device not found".to_string()));
        }
        Ok(Box::new(MemoryStream {
            tracks: usize::from(constraints.audio) + usize::from(constraints.video),
            stopped: Arc::clone(&self.stopped_tracks),
        }))
    }

    async fn enumerate_devices(&self) -> Result<Vec<MediaDevice>, PlatformError> {
        Ok(read(&self.devices))
    }
}

// -----------------------------------------------------------------------------
// Voice client
// -----------------------------------------------------------------------------

#[derive(Debug, Default)]
struct VoiceState {
    available: RwLock<Vec<DeviceId>>,
    device_map: DashMap<DeviceId, MediaDevice>,
    recorded: RwLock<Option<DeviceId>>,
    current: RwLock<Option<DeviceId>>,
}

impl VoiceState {
    /// What the platform listener settles on: `default` if usable, else the first usable entry.
    fn preferred_input(&self) -> Option<DeviceId> {
        let default = DeviceId::new(DeviceId::DEFAULT);
        if self.device_map.get(&default).map(|d| d.is_usable()).unwrap_or(false) {
            return Some(default);
        }
        let mut usable: Vec<DeviceId> = self
            .device_map
            .iter()
            .filter(|d| d.is_usable())
            .map(|d| d.key().clone())
            .collect();
        usable.sort_by(|a, b| a.0.cmp(&b.0));
        usable.into_iter().next()
    }
}

/// Voice client device state.
///
/// `listener_delay` is how long the internal listener takes to publish the
/// recomputed microphone id; `None` means it never does.
#[derive(Debug, Clone)]
pub struct MemoryVoiceClient {
    state: Arc<VoiceState>,
    listener_delay: Option<Duration>,
}

impl Default for MemoryVoiceClient {
    fn default() -> Self {
        Self::new(Some(Duration::from_millis(50)))
    }
}

impl MemoryVoiceClient {
    pub fn new(listener_delay: Option<Duration>) -> Self {
        Self {
            state: Arc::new(VoiceState::default()),
            listener_delay,
        }
    }

    pub fn set_available(&self, ids: Vec<DeviceId>) {
        write(&self.state.available, ids);
    }

    /// Populate the available collection after `delay`, like a slow platform start.
    pub fn populate_after(&self, delay: Duration, ids: Vec<DeviceId>) {
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            write(&state.available, ids);
        });
    }

    pub fn record_bound_device(&self, id: Option<DeviceId>) {
        write(&self.state.recorded, id);
    }

    pub fn set_current_microphone(&self, id: Option<DeviceId>) {
        write(&self.state.current, id);
    }
}

impl VoiceClient for MemoryVoiceClient {
    fn available_input_device_ids(&self) -> Vec<DeviceId> {
        read(&self.state.available)
    }

    fn recorded_input_device_id(&self) -> Option<DeviceId> {
        read(&self.state.recorded)
    }

    fn input_device(&self, id: &DeviceId) -> Option<MediaDevice> {
        self.state.device_map.get(id).map(|d| d.clone())
    }

    fn insert_input_device(&self, device: MediaDevice) {
        self.state.device_map.insert(device.device_id.clone(), device);
    }

    fn refresh_active_input(&self) {
        let Some(delay) = self.listener_delay else {
            debug!("voice client listener is stalled; refresh ignored");
            return;
        };
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let chosen = state.preferred_input();
            debug!(device = ?chosen, "voice client recomputed active input");
            write(&state.current, chosen);
        });
    }

    fn current_microphone_id(&self) -> Option<DeviceId> {
        read(&self.state.current)
    }
}

// -----------------------------------------------------------------------------
// Assembled host
// -----------------------------------------------------------------------------

pub const AVAILABLE: &str = "WAavailable";
pub const OFFLINE: &str = "WAoffline";
pub const UNAVAILABLE: &str = "WAunavailable";
pub const MIC_ERROR: &str = "WAmicerror";

/// Every fake, with concrete handles kept for inspection.
#[derive(Clone)]
pub struct MemoryHost {
    pub worker: Arc<MemoryWorker>,
    pub actions: Arc<RecordingActions>,
    pub notifier: Arc<MemoryNotifier>,
    pub player: Arc<MemoryPlayer>,
    pub config: Arc<MemoryConfig>,
    pub audio: Arc<MemoryAudioInput>,
    pub voice: MemoryVoiceClient,
    pub defaults: DeploymentDefaults,
}

impl MemoryHost {
    /// Worker available with voice enabled, stock activities, one working microphone,
    /// and an empty service configuration.
    pub fn new() -> Self {
        let worker = Arc::new(MemoryWorker::new());
        worker.add_activity(WorkerActivity::new(AVAILABLE, "Available", true));
        worker.add_activity(WorkerActivity::new(OFFLINE, "Offline", false));
        worker.add_activity(WorkerActivity::new(UNAVAILABLE, "Unavailable", false));
        worker.add_activity(WorkerActivity::new(MIC_ERROR, "Microphone Error", false));
        worker.set_current_activity(AVAILABLE);
        worker.set_voice_enabled(true);

        let mic = MediaDevice::audio_input(DeviceId::DEFAULT, "Default - Built-in Microphone");
        let voice = MemoryVoiceClient::default();
        voice.set_available(vec![mic.device_id.clone()]);
        voice.insert_input_device(mic.clone());
        voice.record_bound_device(Some(mic.device_id.clone()));
        voice.set_current_microphone(Some(mic.device_id.clone()));

        Self {
            actions: Arc::new(RecordingActions::new(Arc::clone(&worker))),
            worker,
            notifier: Arc::new(MemoryNotifier::new()),
            player: Arc::new(MemoryPlayer::new()),
            config: Arc::new(MemoryConfig::default()),
            audio: Arc::new(MemoryAudioInput::with_devices(vec![mic])),
            voice,
            defaults: DeploymentDefaults::default(),
        }
    }

    pub fn with_voice_client(mut self, voice: MemoryVoiceClient) -> Self {
        self.voice = voice;
        self
    }

    pub fn context(&self) -> HostContext {
        HostContext {
            worker: self.worker.clone(),
            actions: self.actions.clone(),
            notifier: self.notifier.clone(),
            player: self.player.clone(),
            config: self.config.clone(),
            audio: self.audio.clone(),
            voice: Arc::new(self.voice.clone()),
            defaults: self.defaults.clone(),
        }
    }
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn leaving_availability_cancels_pending_reservations() {
        let host = MemoryHost::new();
        host.worker.offer(Reservation::voice("WR1"));
        host.actions
            .invoke(HostAction::SetActivity {
                activity_sid: OFFLINE.into(),
                origin: None,
            })
            .await
            .unwrap();
        assert_eq!(host.worker.current_activity().unwrap().sid, OFFLINE);
        assert_eq!(host.worker.reservation("WR1").unwrap().status, ReservationStatus::Canceled);
    }

    #[tokio::test]
    async fn only_pending_reservations_can_be_rejected() {
        let host = MemoryHost::new();
        host.worker.offer(Reservation::voice("WR1"));
        host.worker.reject_reservation("WR1").await.unwrap();
        assert!(host.worker.reject_reservation("WR1").await.is_err());
        assert!(host.worker.reject_reservation("WRmissing").await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn voice_listener_publishes_after_delay() {
        let voice = MemoryVoiceClient::new(Some(Duration::from_millis(300)));
        voice.insert_input_device(MediaDevice::audio_input("usb-1", "USB Mic"));
        voice.refresh_active_input();
        assert_eq!(voice.current_microphone_id(), None);
        tokio::time::sleep(Duration::from_millis(301)).await;
        assert_eq!(voice.current_microphone_id(), Some(DeviceId::new("usb-1")));
    }

    #[tokio::test]
    async fn denied_permission_surfaces_as_platform_error() {
        let audio = MemoryAudioInput::with_devices(vec![MediaDevice::audio_input("a", "Mic")]);
        audio.deny_permission("NotAllowedError");
        let err = audio.request_capture(CaptureConstraints::audio_only()).await.err().unwrap();
        assert!(matches!(err, PlatformError::PermissionDenied(_)));
    }
}

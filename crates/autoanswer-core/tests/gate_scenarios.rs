//! End-to-end gate behaviour against the in-memory host.
//!
//! ## Scenarios
//! 1. Voice reservation, check on, microphone fine: auto-accepted.
//! 2. Voice reservation, probe fails, error activity set: SetActivity, never AcceptTask.
//! 3. Non-voice or check disabled: no probe, auto-accepted.
//! 4. Initial outbound attempt: never auto-accepted, probe or not.
//! 5. Activity change with voice channel off: no probe, change proceeds.
//! 6. Activity change with broken microphone: aborted, worker demoted.
//! 7. Outbound call with and without the activity-handler integration.
//! 8. Host NoInputDevice notification.
//! 9. Startup replay of pending reservations, skipping ones an earlier recovery cancelled.
//! 10. Auto-accept follow-up: select + announcement.

use autoanswer_core::host::memory::{MemoryHost, AVAILABLE, MIC_ERROR, OFFLINE};
use autoanswer_core::{
    AcceptTaskPayload, ActionOrigin, ChannelKind, DeploymentDefaults, DeviceCheckSettings,
    Disposition, EventOrchestrator, HostAction, NotificationEvent, OutboundCallRequest,
    PendingAction, PendingActionKind, PlaybackRequest, RecoveryOutcome, Reservation,
    ReservationStatus, ServiceConfiguration, SetActivityRequest, Trigger, WorkerSession,
};

#[derive(Default)]
struct Setup {
    enabled: bool,
    error_activity: Option<&'static str>,
    offline: Option<&'static str>,
    automation: bool,
    announce: Option<&'static str>,
}

fn configure(host: &MemoryHost, setup: Setup) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let mut service = ServiceConfiguration::default();
    service.ui_attributes.audio_device_check_plugin = Some(DeviceCheckSettings {
        is_device_check_enabled: Some(setup.enabled),
        is_workaround_enabled: Some(false),
        audio_device_error_activity_sid: setup.error_activity.map(str::to_string),
    });
    service.taskrouter_offline_activity_sid = setup.offline.map(str::to_string);
    service.ui_attributes.announce_media = setup.announce.map(str::to_string);
    if setup.automation {
        service.ui_attributes.activity_handler_plugin = Some(serde_json::json!({ "enabled": true }));
    }
    host.config.replace(service);
}

/// Voice client that never binds a microphone: the simple probe ends in NoDeviceFound.
fn break_microphone(host: &MemoryHost) {
    host.voice.record_bound_device(None);
}

fn set_activity(sid: &str) -> (Trigger, PendingAction) {
    let pending = PendingAction::new(PendingActionKind::SetActivity {
        activity_sid: sid.to_string(),
    });
    let trigger = Trigger::BeforeSetActivity(SetActivityRequest {
        activity_sid: sid.to_string(),
        activity_available: Some(sid == AVAILABLE),
        pending: pending.clone(),
    });
    (trigger, pending)
}

fn outbound_call() -> (Trigger, PendingAction) {
    let pending = PendingAction::new(PendingActionKind::StartOutboundCall {
        destination: "+15550100".into(),
    });
    let trigger = Trigger::BeforeStartOutboundCall(OutboundCallRequest {
        destination: "+15550100".into(),
        pending: pending.clone(),
    });
    (trigger, pending)
}

#[tokio::test]
async fn healthy_microphone_auto_accepts_voice_reservation() {
    let host = MemoryHost::new();
    configure(&host, Setup { enabled: true, ..Default::default() });
    let r = Reservation::voice("WR100");
    host.worker.offer(r.clone());

    let d = EventOrchestrator::new(host.context())
        .handle(Trigger::ReservationCreated(r))
        .await;

    assert_eq!(d, Disposition::AutoAccepted { sid: "WR100".into() });
    assert_eq!(host.audio.capture_requests(), 1);
    assert_eq!(
        host.actions.invoked(),
        vec![HostAction::AcceptTask { sid: "WR100".into(), is_auto_accept: true }]
    );
    assert_eq!(host.worker.reservation("WR100").unwrap().status, ReservationStatus::Accepted);
}

#[tokio::test(start_paused = true)]
async fn failed_probe_moves_worker_to_error_activity_and_never_accepts() {
    let host = MemoryHost::new();
    configure(
        &host,
        Setup { enabled: true, error_activity: Some(MIC_ERROR), offline: Some(OFFLINE), ..Default::default() },
    );
    break_microphone(&host);
    let orch = EventOrchestrator::new(host.context());
    orch.start().await;

    let r = Reservation::voice("WTxxx");
    host.worker.offer(r.clone());
    let d = orch.handle(Trigger::ReservationCreated(r)).await;

    assert_eq!(d, Disposition::Recovered(RecoveryOutcome::ActivityChanged(MIC_ERROR.into())));
    let actions = host.actions.invoked();
    assert!(actions.contains(&HostAction::SetActivity {
        activity_sid: MIC_ERROR.into(),
        origin: Some(ActionOrigin::AudioDeviceCheck),
    }));
    assert!(!host.actions.accepted("WTxxx"));
    // Leaving availability cancelled the offer on the host side.
    assert_eq!(host.worker.reservation("WTxxx").unwrap().status, ReservationStatus::Canceled);
    assert_eq!(host.notifier.shown().len(), 1);
}

#[tokio::test]
async fn non_voice_or_disabled_skips_probe_and_accepts() {
    let host = MemoryHost::new();
    configure(&host, Setup { enabled: true, ..Default::default() });
    break_microphone(&host);
    let chat = Reservation::voice("WRchat").with_channel(ChannelKind::Chat);
    host.worker.offer(chat.clone());
    let orch = EventOrchestrator::new(host.context());

    assert_eq!(
        orch.handle(Trigger::ReservationCreated(chat)).await,
        Disposition::AutoAccepted { sid: "WRchat".into() }
    );

    configure(&host, Setup { enabled: false, ..Default::default() });
    let voice = Reservation::voice("WRvoice");
    host.worker.offer(voice.clone());
    assert_eq!(
        orch.handle(Trigger::ReservationCreated(voice)).await,
        Disposition::AutoAccepted { sid: "WRvoice".into() }
    );
    assert_eq!(host.audio.capture_requests(), 0);
}

#[tokio::test]
async fn initial_outbound_attempt_is_never_auto_accepted() {
    let host = MemoryHost::new();
    let orch = EventOrchestrator::new(host.context());

    let unchecked = Reservation::voice("WRout1").outbound_attempt();
    assert_eq!(
        orch.handle(Trigger::ReservationCreated(unchecked)).await,
        Disposition::LeftForAgent { sid: "WRout1".into() }
    );

    configure(&host, Setup { enabled: true, ..Default::default() });
    let checked = Reservation::voice("WRout2").outbound_attempt();
    assert_eq!(
        orch.handle(Trigger::ReservationCreated(checked)).await,
        Disposition::LeftForAgent { sid: "WRout2".into() }
    );
    assert_eq!(host.audio.capture_requests(), 1);
    assert!(host.actions.invoked().is_empty());
}

#[tokio::test]
async fn activity_change_with_voice_disabled_proceeds_without_probe() {
    let host = MemoryHost::new();
    configure(&host, Setup { enabled: true, error_activity: Some(MIC_ERROR), ..Default::default() });
    host.worker.set_voice_enabled(false);
    host.audio.deny_permission("NotAllowedError");

    let (trigger, pending) = set_activity(AVAILABLE);
    let d = EventOrchestrator::new(host.context()).handle(trigger).await;

    assert_eq!(d, Disposition::Proceed);
    assert!(!pending.is_aborted());
    assert_eq!(host.audio.capture_requests(), 0);
}

#[tokio::test]
async fn activity_change_with_denied_microphone_is_aborted() {
    let host = MemoryHost::new();
    host.worker.set_current_activity(OFFLINE);
    configure(&host, Setup { enabled: true, error_activity: Some(MIC_ERROR), ..Default::default() });
    host.audio.deny_permission("NotAllowedError");
    let orch = EventOrchestrator::new(host.context());
    orch.start().await;

    let (trigger, pending) = set_activity(AVAILABLE);
    let d = orch.handle(trigger).await;

    assert_eq!(d, Disposition::Aborted(RecoveryOutcome::ActivityChanged(MIC_ERROR.into())));
    assert!(pending.is_aborted());
    assert_eq!(host.worker.current_activity().unwrap().sid, MIC_ERROR);
    let shown = host.notifier.shown();
    assert_eq!(shown.len(), 1);
    assert!(shown[0].text.contains("NotAllowedError"));
}

#[tokio::test]
async fn outbound_call_gated_unless_activity_handler_present() {
    let host = MemoryHost::new();
    configure(&host, Setup { enabled: true, offline: Some(OFFLINE), ..Default::default() });
    host.audio.deny_permission("NotAllowedError");
    let orch = EventOrchestrator::new(host.context());

    let (trigger, pending) = outbound_call();
    assert_eq!(
        orch.handle(trigger).await,
        Disposition::Aborted(RecoveryOutcome::ActivityChanged(OFFLINE.into()))
    );
    assert!(pending.is_aborted());

    host.worker.set_current_activity(AVAILABLE);
    configure(
        &host,
        Setup { enabled: true, offline: Some(OFFLINE), automation: true, ..Default::default() },
    );
    let (trigger, pending) = outbound_call();
    assert_eq!(orch.handle(trigger).await, Disposition::Proceed);
    assert!(!pending.is_aborted());
    assert_eq!(host.audio.capture_requests(), 1);
}

#[tokio::test]
async fn host_no_input_device_notification_recovers_when_integration_present() {
    let host = MemoryHost::new();
    let orch = EventOrchestrator::new(host.context());
    let no_input = || Trigger::BeforeAddNotification(NotificationEvent { id: "NoInputDevice".into() });

    configure(&host, Setup { enabled: true, offline: Some(OFFLINE), ..Default::default() });
    assert_eq!(orch.handle(no_input()).await, Disposition::Ignored);

    // Integration installed but the device check switched off.
    configure(
        &host,
        Setup { enabled: false, offline: Some(OFFLINE), automation: true, ..Default::default() },
    );
    assert_eq!(orch.handle(no_input()).await, Disposition::Ignored);
    assert_eq!(host.worker.current_activity().unwrap().sid, AVAILABLE);
    assert!(host.actions.invoked().is_empty());

    configure(
        &host,
        Setup { enabled: true, offline: Some(OFFLINE), automation: true, ..Default::default() },
    );
    let other = Trigger::BeforeAddNotification(NotificationEvent { id: "TransferFailed".into() });
    assert_eq!(orch.handle(other).await, Disposition::Ignored);
    assert_eq!(
        orch.handle(no_input()).await,
        Disposition::Recovered(RecoveryOutcome::ActivityChanged(OFFLINE.into()))
    );
    // No error object: nothing extra shown.
    assert!(host.notifier.shown().is_empty());
}

#[tokio::test]
async fn startup_replays_pending_reservations_only() {
    let host = MemoryHost::new();
    configure(&host, Setup { enabled: true, ..Default::default() });
    host.worker.offer(Reservation::voice("WRa"));
    host.worker.offer(Reservation::voice("WRb").outbound_attempt());
    let mut done = Reservation::voice("WRc");
    done.status = ReservationStatus::Accepted;
    host.worker.offer(done);

    let d = EventOrchestrator::new(host.context()).start().await;

    assert_eq!(
        d,
        Disposition::Replayed(vec![
            Disposition::AutoAccepted { sid: "WRa".into() },
            Disposition::LeftForAgent { sid: "WRb".into() },
        ])
    );
    assert!(host.notifier.template("inputDeviceError").is_some());
}

#[tokio::test]
async fn startup_replay_rejects_when_no_activity_configured() {
    let host = MemoryHost::new();
    configure(&host, Setup { enabled: true, ..Default::default() });
    break_microphone(&host);
    host.voice.set_available(vec![]);
    host.worker.offer(Reservation::voice("WRmissed"));

    tokio::time::pause();
    let d = EventOrchestrator::new(host.context()).start().await;

    assert_eq!(
        d,
        Disposition::Replayed(vec![Disposition::Recovered(RecoveryOutcome::ReservationRejected(
            "WRmissed".into()
        ))])
    );
    assert_eq!(host.worker.reservation("WRmissed").unwrap().status, ReservationStatus::Rejected);
    assert_eq!(host.worker.current_activity().unwrap().sid, AVAILABLE);
}

#[tokio::test]
async fn startup_replay_skips_reservations_cancelled_by_earlier_recovery() {
    let host = MemoryHost::new();
    configure(&host, Setup { enabled: true, error_activity: Some(MIC_ERROR), ..Default::default() });
    break_microphone(&host);
    host.worker.offer(Reservation::voice("WRfirst"));
    host.worker.offer(Reservation::voice("WRsecond"));

    let d = EventOrchestrator::new(host.context()).start().await;

    assert_eq!(
        d,
        Disposition::Replayed(vec![
            Disposition::Recovered(RecoveryOutcome::ActivityChanged(MIC_ERROR.into())),
            Disposition::Ignored,
        ])
    );
    assert_eq!(host.notifier.shown().len(), 1);
    let activity_changes = host
        .actions
        .invoked()
        .iter()
        .filter(|a| matches!(a, HostAction::SetActivity { .. }))
        .count();
    assert_eq!(activity_changes, 1);
    assert_eq!(host.audio.capture_requests(), 1);
    assert_eq!(host.worker.reservation("WRsecond").unwrap().status, ReservationStatus::Canceled);
}

#[tokio::test]
async fn auto_accept_follow_up_selects_and_announces() {
    let mut host = MemoryHost::new();
    host.defaults = DeploymentDefaults {
        announce_media_url: Some("https://cdn.example.com/default.mp3".into()),
    };
    let orch = EventOrchestrator::new(host.context());
    let accepted = || {
        Trigger::TaskAccepted(AcceptTaskPayload { sid: "WR5".into(), is_auto_accept: true })
    };

    assert_eq!(
        orch.handle(accepted()).await,
        Disposition::Selected { sid: "WR5".into(), announced: true }
    );
    configure(&host, Setup { announce: Some("https://media.example.com/beep.wav"), ..Default::default() });
    orch.handle(accepted()).await;

    assert_eq!(
        host.player.played(),
        vec![
            PlaybackRequest::once("https://cdn.example.com/default.mp3"),
            PlaybackRequest::once("https://media.example.com/beep.wav"),
        ]
    );
    assert_eq!(
        host.actions.invoked(),
        vec![
            HostAction::SelectTask { sid: "WR5".into() },
            HostAction::SelectTask { sid: "WR5".into() },
        ]
    );
}

#[tokio::test]
async fn follow_up_without_any_media_still_selects() {
    let host = MemoryHost::new();
    let d = EventOrchestrator::new(host.context())
        .handle(Trigger::TaskAccepted(AcceptTaskPayload { sid: "WR6".into(), is_auto_accept: true }))
        .await;
    assert_eq!(d, Disposition::Selected { sid: "WR6".into(), announced: false });
    assert!(host.player.played().is_empty());
}

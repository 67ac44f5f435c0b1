//! **Event Orchestrator**: route host lifecycle events through the gate.
//!
//! ```text
//! trigger ──▶ requires_check? ──no──▶ proceed (auto-accept where applicable)
//!                   │yes
//!                   ▼
//!               probe() ──ok──▶ proceed
//!                   │err
//!                   ▼
//!        abort pending action (pre-hooks) ──▶ recover()
//! ```
//!
//! Handlers share nothing but the injected host context. Each reads a fresh
//! configuration snapshot. Pre-hooks can only abort while they are running, so
//! the abort flag is set before recovery starts.

use crate::error::{GateError, GateResult};
use crate::host::{HostAction, HostContext, PendingAction, PlaybackRequest};
use crate::model::Reservation;
use crate::notifications::{input_device_error_template, HOST_NO_INPUT_DEVICE};
use crate::prober::{DeviceProber, ProbeMode, ProbeResult};
use crate::readiness::{requires_check, CheckTrigger};
use crate::recovery::{FailureRecovery, RecoveryOutcome};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// Payload of the host's `afterAcceptTask` hook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptTaskPayload {
    pub sid: String,
    /// Set by whoever invoked the accept; only auto-accepts get the follow-up.
    #[serde(default)]
    pub is_auto_accept: bool,
}

/// Payload of the host's `beforeSetActivity` hook.
#[derive(Debug, Clone)]
pub struct SetActivityRequest {
    pub activity_sid: String,
    /// Availability of the target as the host reports it; looked up when absent.
    pub activity_available: Option<bool>,
    pub pending: PendingAction,
}

/// Payload of the host's `beforeStartOutboundCall` hook.
#[derive(Debug, Clone)]
pub struct OutboundCallRequest {
    pub destination: String,
    pub pending: PendingAction,
}

/// Payload of the host's `beforeAddNotification` hook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub id: String,
}

/// Every event the gate reacts to.
#[derive(Debug, Clone)]
pub enum Trigger {
    ReservationCreated(Reservation),
    /// Sweep reservations that were already pending when the gate started.
    PluginLoadReplay,
    TaskAccepted(AcceptTaskPayload),
    BeforeSetActivity(SetActivityRequest),
    BeforeStartOutboundCall(OutboundCallRequest),
    BeforeAddNotification(NotificationEvent),
}

impl Trigger {
    pub fn name(&self) -> &'static str {
        match self {
            Trigger::ReservationCreated(_) => "reservationCreated",
            Trigger::PluginLoadReplay => "pluginLoadReplay",
            Trigger::TaskAccepted(_) => "afterAcceptTask",
            Trigger::BeforeSetActivity(_) => "beforeSetActivity",
            Trigger::BeforeStartOutboundCall(_) => "beforeStartOutboundCall",
            Trigger::BeforeAddNotification(_) => "beforeAddNotification",
        }
    }
}

/// What a handler decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// The original action goes ahead untouched.
    Proceed,
    /// Guard did not apply; nothing done.
    Ignored,
    AutoAccepted { sid: String },
    /// The agent's own outbound attempt; accepting is left to the dial flow.
    LeftForAgent { sid: String },
    /// Auto-accepted task selected; `announced` is false when no tone was played.
    Selected { sid: String, announced: bool },
    /// Pending action cancelled, then recovery ran.
    Aborted(RecoveryOutcome),
    /// Recovery ran with nothing to abort.
    Recovered(RecoveryOutcome),
    ActionFailed { action: String, reason: String },
    Replayed(Vec<Disposition>),
}

pub struct EventOrchestrator {
    ctx: HostContext,
    prober: DeviceProber,
    recovery: FailureRecovery,
}

impl EventOrchestrator {
    pub fn new(ctx: HostContext) -> Self {
        Self {
            prober: DeviceProber::from_context(&ctx),
            recovery: FailureRecovery::new(ctx.clone()),
            ctx,
        }
    }

    pub fn with_prober(mut self, prober: DeviceProber) -> Self {
        self.prober = prober;
        self
    }

    /// Register the notification template and replay reservations missed before startup.
    pub async fn start(&self) -> Disposition {
        self.ctx.notifier.register(input_device_error_template());
        info!("audio device check registered");
        self.handle(Trigger::PluginLoadReplay).await
    }

    /// Single dispatch point for every trigger.
    pub async fn handle(&self, trigger: Trigger) -> Disposition {
        debug!(trigger = trigger.name(), "handling trigger");
        match trigger {
            Trigger::ReservationCreated(r) => self.on_reservation_created(r).await,
            Trigger::PluginLoadReplay => self.on_plugin_load_replay().await,
            Trigger::TaskAccepted(p) => self.on_task_accepted(p).await,
            Trigger::BeforeSetActivity(req) => self.on_before_set_activity(req).await,
            Trigger::BeforeStartOutboundCall(req) => self.on_before_start_outbound_call(req).await,
            Trigger::BeforeAddNotification(ev) => self.on_before_add_notification(ev).await,
        }
    }

    async fn probe(&self, workaround: bool) -> ProbeResult {
        self.prober.probe(ProbeMode::from_workaround_flag(workaround)).await
    }

    async fn on_reservation_created(&self, reservation: Reservation) -> Disposition {
        let config = self.ctx.device_check_config();
        let voice_enabled = self.ctx.worker.is_voice_enabled();

        if requires_check(CheckTrigger::Reservation(&reservation), &config, voice_enabled) {
            if let Err(e) = self.probe(config.is_workaround_enabled).await {
                error!(sid = %reservation.sid, error = %e, "input device check failed; not accepting reservation");
                let outcome = self.recovery.recover(Some(&e), Some(&reservation)).await;
                return Disposition::Recovered(outcome);
            }
        }

        if reservation.is_initial_outbound_attempt {
            debug!(sid = %reservation.sid, "outbound attempt; leaving accept to the dial flow");
            return Disposition::LeftForAgent { sid: reservation.sid };
        }

        let accept = HostAction::AcceptTask {
            sid: reservation.sid.clone(),
            is_auto_accept: true,
        };
        match self.ctx.actions.invoke(accept).await {
            Ok(()) => {
                info!(sid = %reservation.sid, "reservation auto-accepted");
                Disposition::AutoAccepted { sid: reservation.sid }
            }
            Err(e) => {
                error!(sid = %reservation.sid, error = %e, "auto-accept failed");
                Disposition::ActionFailed {
                    action: "AcceptTask".to_string(),
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn on_plugin_load_replay(&self) -> Disposition {
        let pending = self.ctx.worker.pending_reservations();
        if !pending.is_empty() {
            info!(count = pending.len(), "replaying reservations pending at startup");
        }
        let mut results = Vec::with_capacity(pending.len());
        for snapshot in pending {
            // An earlier recovery may have moved the worker and cancelled the rest.
            let Some(reservation) = self
                .ctx
                .worker
                .reservation(&snapshot.sid)
                .filter(Reservation::is_pending)
            else {
                debug!(sid = %snapshot.sid, "reservation no longer pending; skipping replay");
                results.push(Disposition::Ignored);
                continue;
            };
            results.push(self.on_reservation_created(reservation).await);
        }
        Disposition::Replayed(results)
    }

    async fn on_task_accepted(&self, payload: AcceptTaskPayload) -> Disposition {
        if !payload.is_auto_accept {
            return Disposition::Ignored;
        }

        let select = HostAction::SelectTask {
            sid: payload.sid.clone(),
        };
        if let Err(e) = self.ctx.actions.invoke(select).await {
            warn!(sid = %payload.sid, error = %e, "SelectTask failed after auto-accept");
        }

        let announced = match self.ctx.device_check_config().announce_media_url {
            Some(url) => match self.ctx.player.play(&PlaybackRequest::once(&url)) {
                Ok(()) => true,
                Err(e) => {
                    warn!(%url, error = %e, "announcement playback failed");
                    false
                }
            },
            None => {
                warn!(sid = %payload.sid, "no announcement media configured");
                false
            }
        };
        Disposition::Selected {
            sid: payload.sid,
            announced,
        }
    }

    async fn on_before_set_activity(&self, req: SetActivityRequest) -> Disposition {
        let target_available = req.activity_available.unwrap_or_else(|| {
            self.ctx
                .worker
                .activity(&req.activity_sid)
                .map(|a| a.available)
                .unwrap_or(false)
        });
        let config = self.ctx.device_check_config();
        let trigger = CheckTrigger::ActivityChange { target_available };
        if !requires_check(trigger, &config, self.ctx.worker.is_voice_enabled()) {
            return Disposition::Proceed;
        }

        match self.probe(config.is_workaround_enabled).await {
            Ok(_) => Disposition::Proceed,
            Err(e) => {
                error!(activity = %req.activity_sid, error = %e, "input device check failed; preventing activity change");
                req.pending.abort();
                Disposition::Aborted(self.recovery.recover(Some(&e), None).await)
            }
        }
    }

    async fn on_before_start_outbound_call(&self, req: OutboundCallRequest) -> Disposition {
        let config = self.ctx.device_check_config();
        if config.is_device_check_enabled && config.activity_automation_present {
            debug!("activity handler present; outbound failures handled via NoInputDevice notification");
        }
        if !requires_check(CheckTrigger::OutboundCall, &config, self.ctx.worker.is_voice_enabled()) {
            return Disposition::Proceed;
        }

        match self.probe(config.is_workaround_enabled).await {
            Ok(_) => Disposition::Proceed,
            Err(e) => {
                error!(destination = %req.destination, error = %e, "input device check failed; preventing outbound call");
                req.pending.abort();
                Disposition::Aborted(self.recovery.recover(Some(&e), None).await)
            }
        }
    }

    async fn on_before_add_notification(&self, event: NotificationEvent) -> Disposition {
        let config = self.ctx.device_check_config();
        if !config.activity_automation_present || !config.is_device_check_enabled {
            return Disposition::Ignored;
        }
        if event.id != HOST_NO_INPUT_DEVICE {
            return Disposition::Ignored;
        }
        warn!("host reported no input device");
        Disposition::Recovered(self.recovery.recover(None, None).await)
    }

    /// Serve triggers one at a time from `rx` until every sender is dropped.
    pub async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<Dispatch>) {
        info!("orchestrator event loop started");
        while let Some(Dispatch { trigger, reply }) = rx.recv().await {
            let disposition = self.handle(trigger).await;
            if let Some(reply) = reply {
                // Host stopped waiting; the decision already took effect.
                let _ = reply.send(disposition);
            }
        }
        info!("orchestrator event loop stopped");
    }

    /// Spawn [`run`](Self::run) on the current runtime and return a handle to feed it.
    pub fn spawn(self, buffer: usize) -> (OrchestratorHandle, tokio::task::JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(buffer);
        let task = tokio::spawn(Arc::new(self).run(rx));
        (OrchestratorHandle { tx }, task)
    }
}

/// A trigger queued for the event loop, with an optional reply slot.
#[derive(Debug)]
pub struct Dispatch {
    pub trigger: Trigger,
    pub reply: Option<oneshot::Sender<Disposition>>,
}

#[derive(Debug, Clone)]
pub struct OrchestratorHandle {
    tx: mpsc::Sender<Dispatch>,
}

impl OrchestratorHandle {
    /// Queue a trigger and wait for its disposition.
    pub async fn dispatch(&self, trigger: Trigger) -> GateResult<Disposition> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Dispatch {
                trigger,
                reply: Some(reply),
            })
            .await
            .map_err(|e| GateError::ChannelClosed(e.to_string()))?;
        rx.await
            .map_err(|e| GateError::ChannelClosed(e.to_string()))
    }

    /// Queue a trigger without waiting.
    pub async fn notify(&self, trigger: Trigger) -> GateResult<()> {
        self.tx
            .send(Dispatch { trigger, reply: None })
            .await
            .map_err(|e| GateError::ChannelClosed(e.to_string()))
    }
}

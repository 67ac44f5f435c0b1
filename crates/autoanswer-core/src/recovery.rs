//! **Failure Recovery Handler**: put the worker somewhere safe after a failed probe.
//!
//! Precedence: configured error activity, then the offline activity (only while the
//! worker is available), then rejecting the one reservation that triggered the
//! probe (only while available). Anything else is a configuration gap and is
//! logged, never raised.

use crate::error::{GateError, ProbeError};
use crate::host::{ActionOrigin, HostAction, HostContext};
use crate::model::Reservation;
use crate::notifications::{error_params, INPUT_DEVICE_ERROR};
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// Worker moved to this activity; the host cancels pending reservations with it.
    ActivityChanged(String),
    ReservationRejected(String),
    /// Nothing safe to do; the worker stays where it is.
    Unresolved,
}

pub struct FailureRecovery {
    ctx: HostContext,
}

impl FailureRecovery {
    pub fn new(ctx: HostContext) -> Self {
        Self { ctx }
    }

    pub async fn recover(
        &self,
        failure: Option<&ProbeError>,
        reservation: Option<&Reservation>,
    ) -> RecoveryOutcome {
        if let Some(err) = failure {
            if let Err(e) = self.ctx.notifier.show(INPUT_DEVICE_ERROR, &error_params(err)) {
                warn!(error = %e, "could not show input device notification");
            }
        }

        let config = self.ctx.device_check_config();
        let worker_available = self
            .ctx
            .worker
            .current_activity()
            .map(|a| a.available)
            .unwrap_or(false);

        if let Some(sid) = config.error_activity_sid {
            return self.set_activity(sid).await;
        }

        if worker_available {
            if let Some(sid) = config.offline_activity_sid {
                warn!(activity = %sid, "audioDeviceErrorActivitySid not defined; setting worker offline instead");
                return self.set_activity(sid).await;
            }
            if let Some(r) = reservation {
                warn!(sid = %r.sid, "no fallback activity configured; rejecting reservation");
                return match self.ctx.worker.reject_reservation(&r.sid).await {
                    Ok(()) => RecoveryOutcome::ReservationRejected(r.sid.clone()),
                    Err(e) => {
                        error!(sid = %r.sid, error = %e, "reservation reject failed");
                        RecoveryOutcome::Unresolved
                    }
                };
            }
        }

        let gap = GateError::ConfigurationGap(
            "neither audioDeviceErrorActivitySid nor an offline activity is defined; \
             worker activity cannot be changed while the input device error persists"
                .to_string(),
        );
        warn!(error = %gap, worker_available, "input device failure left unresolved");
        RecoveryOutcome::Unresolved
    }

    async fn set_activity(&self, activity_sid: String) -> RecoveryOutcome {
        let action = HostAction::SetActivity {
            activity_sid: activity_sid.clone(),
            origin: Some(ActionOrigin::AudioDeviceCheck),
        };
        match self.ctx.actions.invoke(action).await {
            Ok(()) => {
                info!(activity = %activity_sid, "worker activity changed after input device failure");
                RecoveryOutcome::ActivityChanged(activity_sid)
            }
            Err(e) => {
                error!(activity = %activity_sid, error = %e, "SetActivity failed during recovery");
                RecoveryOutcome::Unresolved
            }
        }
    }
}

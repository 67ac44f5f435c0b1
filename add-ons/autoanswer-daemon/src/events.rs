//! Host lifecycle events as they arrive on stdin, one JSON object per line.
//!
//! ```text
//! {"event":"reservationCreated","sid":"WR1","channel":"voice"}
//! {"event":"afterAcceptTask","sid":"WR1","isAutoAccept":true}
//! {"event":"beforeSetActivity","activitySid":"available"}
//! {"event":"beforeStartOutboundCall","destination":"+15550100"}
//! {"event":"beforeAddNotification","id":"NoInputDevice"}
//! {"event":"pluginLoadReplay"}
//! ```

use autoanswer_core::{
    AcceptTaskPayload, ChannelKind, NotificationEvent, OutboundCallRequest, PendingAction,
    PendingActionKind, Reservation, SetActivityRequest, Trigger,
};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum HostEvent {
    #[serde(rename_all = "camelCase")]
    ReservationCreated {
        sid: String,
        #[serde(default = "voice_channel")]
        channel: ChannelKind,
        #[serde(default)]
        initial_outbound_attempt: bool,
    },
    PluginLoadReplay,
    #[serde(rename_all = "camelCase")]
    AfterAcceptTask {
        sid: String,
        #[serde(default)]
        is_auto_accept: bool,
    },
    #[serde(rename_all = "camelCase")]
    BeforeSetActivity {
        activity_sid: String,
        #[serde(default)]
        activity_available: Option<bool>,
    },
    BeforeStartOutboundCall { destination: String },
    BeforeAddNotification { id: String },
}

fn voice_channel() -> ChannelKind {
    ChannelKind::Voice
}

/// A decoded event ready for the gate. `pending` is the host's copy of the
/// abort flag for pre-action hooks.
#[derive(Debug)]
pub struct Decoded {
    pub trigger: Trigger,
    pub reservation: Option<Reservation>,
    pub pending: Option<PendingAction>,
}

impl HostEvent {
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }

    pub fn into_trigger(self) -> Decoded {
        match self {
            HostEvent::ReservationCreated {
                sid,
                channel,
                initial_outbound_attempt,
            } => {
                let mut reservation = Reservation::voice(sid).with_channel(channel);
                if initial_outbound_attempt {
                    reservation = reservation.outbound_attempt();
                }
                Decoded {
                    trigger: Trigger::ReservationCreated(reservation.clone()),
                    reservation: Some(reservation),
                    pending: None,
                }
            }
            HostEvent::PluginLoadReplay => Decoded {
                trigger: Trigger::PluginLoadReplay,
                reservation: None,
                pending: None,
            },
            HostEvent::AfterAcceptTask {
                sid,
                is_auto_accept,
            } => Decoded {
                trigger: Trigger::TaskAccepted(AcceptTaskPayload {
                    sid,
                    is_auto_accept,
                }),
                reservation: None,
                pending: None,
            },
            HostEvent::BeforeSetActivity {
                activity_sid,
                activity_available,
            } => {
                let pending = PendingAction::new(PendingActionKind::SetActivity {
                    activity_sid: activity_sid.clone(),
                });
                Decoded {
                    trigger: Trigger::BeforeSetActivity(SetActivityRequest {
                        activity_sid,
                        activity_available,
                        pending: pending.clone(),
                    }),
                    reservation: None,
                    pending: Some(pending),
                }
            }
            HostEvent::BeforeStartOutboundCall { destination } => {
                let pending = PendingAction::new(PendingActionKind::StartOutboundCall {
                    destination: destination.clone(),
                });
                Decoded {
                    trigger: Trigger::BeforeStartOutboundCall(OutboundCallRequest {
                        destination,
                        pending: pending.clone(),
                    }),
                    reservation: None,
                    pending: Some(pending),
                }
            }
            HostEvent::BeforeAddNotification { id } => Decoded {
                trigger: Trigger::BeforeAddNotification(NotificationEvent { id }),
                reservation: None,
                pending: None,
            },
        }
    }
}

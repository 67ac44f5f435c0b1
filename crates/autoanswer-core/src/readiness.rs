//! **Readiness Evaluator**: does this trigger need a microphone probe at all?

use crate::config::DeviceCheckConfig;
use crate::model::Reservation;

/// What is asking for a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckTrigger<'a> {
    /// A reservation was offered (or replayed at startup).
    Reservation(&'a Reservation),
    /// The worker asked to change activity.
    ActivityChange { target_available: bool },
    /// The worker asked to place an outbound call.
    OutboundCall,
}

/// True only when every rule for the trigger holds.
///
/// Outbound calls are skipped when the activity-handler integration is present:
/// it moves the worker to its busy activity in the same pre-hook, and aborting
/// the call here would strand the worker there. The host's own `NoInputDevice`
/// notification covers that case instead.
pub fn requires_check(
    trigger: CheckTrigger<'_>,
    config: &DeviceCheckConfig,
    worker_voice_enabled: bool,
) -> bool {
    if !config.is_device_check_enabled {
        return false;
    }
    match trigger {
        CheckTrigger::Reservation(reservation) => reservation.channel.is_voice(),
        CheckTrigger::ActivityChange { target_available } => target_available && worker_voice_enabled,
        CheckTrigger::OutboundCall => !config.activity_automation_present,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChannelKind;

    fn enabled() -> DeviceCheckConfig {
        DeviceCheckConfig {
            is_device_check_enabled: true,
            ..Default::default()
        }
    }

    #[test]
    fn disabled_feature_never_checks() {
        let cfg = DeviceCheckConfig::default();
        let r = Reservation::voice("WR1");
        assert!(!requires_check(CheckTrigger::Reservation(&r), &cfg, true));
        assert!(!requires_check(CheckTrigger::ActivityChange { target_available: true }, &cfg, true));
        assert!(!requires_check(CheckTrigger::OutboundCall, &cfg, true));
    }

    #[test]
    fn only_voice_reservations_are_checked() {
        let voice = Reservation::voice("WR1");
        let chat = Reservation::voice("WR2").with_channel(ChannelKind::Chat);
        assert!(requires_check(CheckTrigger::Reservation(&voice), &enabled(), false));
        assert!(!requires_check(CheckTrigger::Reservation(&chat), &enabled(), true));
    }

    #[test]
    fn activity_change_needs_available_target_and_voice_channel() {
        let cfg = enabled();
        assert!(requires_check(CheckTrigger::ActivityChange { target_available: true }, &cfg, true));
        assert!(!requires_check(CheckTrigger::ActivityChange { target_available: false }, &cfg, true));
        assert!(!requires_check(CheckTrigger::ActivityChange { target_available: true }, &cfg, false));
    }

    #[test]
    fn outbound_call_deferred_to_activity_automation() {
        let mut cfg = enabled();
        assert!(requires_check(CheckTrigger::OutboundCall, &cfg, false));
        cfg.activity_automation_present = true;
        assert!(!requires_check(CheckTrigger::OutboundCall, &cfg, true));
    }
}

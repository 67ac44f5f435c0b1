//! # autoanswer-core - Microphone Readiness Gate
//!
//! Auto-answers inbound voice reservations for a contact-center agent, but only
//! once a usable microphone is confirmed, and moves the agent out of
//! availability when it is not.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Event Orchestrator                       │
//! │  reservationCreated · afterAcceptTask · beforeSetActivity    │
//! │  beforeStartOutboundCall · beforeAddNotification · replay    │
//! │         │                   │                    │           │
//! │  ┌──────▼───────┐   ┌───────▼──────┐   ┌─────────▼──────┐   │
//! │  │  Readiness   │ → │ Device Prober│ → │ Failure        │   │
//! │  │  Evaluator   │   │ (retry/poll) │   │ Recovery       │   │
//! │  └──────────────┘   └──────────────┘   └────────────────┘   │
//! └──────────────────────────────│───────────────────────────────┘
//!                          HostContext
//!     worker · actions · notifier · player · config · audio · voice
//! ```

pub mod config;
pub mod error;
pub mod host;
pub mod model;
pub mod notifications;
pub mod orchestrator;
pub mod prober;
pub mod readiness;
pub mod recovery;
pub mod retry;

pub use config::{
    DeploymentDefaults, DeviceCheckConfig, DeviceCheckSettings, FileConfigSource,
    ServiceConfiguration, UiAttributes,
};
pub use error::{GateError, GateResult, PlatformError, ProbeError};
pub use host::{
    ActionInvoker, ActionOrigin, AnnouncementPlayer, AudioInput, CaptureConstraints,
    CaptureStream, ConfigSource, HostAction, HostContext, Notifier, PendingAction,
    PendingActionKind, PlaybackRequest, VoiceClient, WorkerSession,
};
pub use model::{
    ChannelKind, DeviceId, MediaDevice, MediaDeviceKind, Reservation, ReservationStatus,
    WorkerActivity, WorkerChannel,
};
pub use notifications::{NotificationParams, NotificationSeverity, NotificationTemplate};
pub use orchestrator::{
    AcceptTaskPayload, Disposition, Dispatch, EventOrchestrator, NotificationEvent,
    OrchestratorHandle, OutboundCallRequest, SetActivityRequest, Trigger,
};
pub use prober::{DeviceProber, ProbeMode, ProbeResult};
pub use readiness::{requires_check, CheckTrigger};
pub use recovery::{FailureRecovery, RecoveryOutcome};
pub use retry::{Elapsed, RetrySchedule};

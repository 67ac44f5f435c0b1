//! Autoanswer Console Daemon
//!
//! Runs the microphone readiness gate against a console host: lifecycle events
//! arrive as JSON lines on stdin, decisions are logged, and host actions are
//! applied to an in-memory worker.

mod events;
mod host;
mod settings;

use autoanswer_core::{AcceptTaskPayload, Disposition, EventOrchestrator, OrchestratorHandle, Trigger};
use events::{Decoded, HostEvent};
use host::ConsoleHost;
use settings::DaemonSettings;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present (before any env::var calls)
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[autoanswer-daemon] .env not loaded: {} (using system environment)", e);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let settings = DaemonSettings::load()?;
    let console = ConsoleHost::build(&settings).await;

    tracing::info!(
        service_config = %settings.service_config_path,
        simulate_audio = settings.simulate_audio,
        initial_activity = %settings.initial_activity,
        "Autoanswer daemon started"
    );

    let orchestrator = EventOrchestrator::new(console.context.clone());
    let replayed = orchestrator.start().await;
    tracing::info!(disposition = ?replayed, "startup replay finished");

    let (handle, task) = orchestrator.spawn(settings.event_buffer);
    follow_up_accepts(&handle, &replayed).await;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        handle_line(&console, &handle, &line).await;
                    }
                    Ok(None) => {
                        tracing::info!("stdin closed; shutting down daemon");
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "stdin read failed; shutting down daemon");
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("CTRL-C received; shutting down daemon");
                break;
            }
        }
    }

    drop(handle);
    task.await?;
    Ok(())
}

/// Feed one stdin line through the gate and act on the outcome as the host
/// would: run the gated action unless aborted, then follow every auto-accept
/// with `afterAcceptTask`. Returns every disposition produced, in order.
async fn handle_line(
    console: &ConsoleHost,
    handle: &OrchestratorHandle,
    line: &str,
) -> Vec<Disposition> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Vec::new();
    }
    let event = match HostEvent::parse(line) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, line, "unrecognised host event");
            return Vec::new();
        }
    };

    let Decoded {
        trigger,
        reservation,
        pending,
    } = event.into_trigger();
    let name = trigger.name();
    if let Some(reservation) = reservation {
        console.worker.offer(reservation);
    }

    let disposition = match handle.dispatch(trigger).await {
        Ok(disposition) => disposition,
        Err(e) => {
            tracing::error!(error = %e, trigger = name, "gate unavailable");
            return Vec::new();
        }
    };
    log_disposition(name, &disposition);
    if let Some(pending) = &pending {
        console.complete(pending);
    }

    let mut produced = follow_up_accepts(handle, &disposition).await;
    produced.insert(0, disposition);
    produced
}

/// Sids auto-accepted by a disposition, including those inside a replay.
fn auto_accepted(disposition: &Disposition) -> Vec<String> {
    match disposition {
        Disposition::AutoAccepted { sid } => vec![sid.clone()],
        Disposition::Replayed(all) => all.iter().flat_map(auto_accepted).collect(),
        _ => Vec::new(),
    }
}

/// The host fires `afterAcceptTask` once an accept it was asked for lands.
async fn follow_up_accepts(handle: &OrchestratorHandle, disposition: &Disposition) -> Vec<Disposition> {
    let mut produced = Vec::new();
    for sid in auto_accepted(disposition) {
        let trigger = Trigger::TaskAccepted(AcceptTaskPayload {
            sid,
            is_auto_accept: true,
        });
        let name = trigger.name();
        match handle.dispatch(trigger).await {
            Ok(follow_up) => {
                log_disposition(name, &follow_up);
                produced.push(follow_up);
            }
            Err(e) => tracing::error!(error = %e, trigger = name, "gate unavailable"),
        }
    }
    produced
}

fn log_disposition(trigger: &str, disposition: &Disposition) {
    match disposition {
        Disposition::ActionFailed { action, reason } => {
            tracing::warn!(trigger, action = %action, reason = %reason, "host action failed")
        }
        _ => tracing::info!(trigger, ?disposition, "gate decision"),
    }
}

mod entrypoint;
mod host_link;

use crate::host_link::{HostEvent, SessionEvent};
use anyhow::{Context, Result};
use clap::Parser;
use nitara_core::config::AgentConfig;
use nitara_core::host::UserTurn;
use nitara_core::persona::PersonaRegistry;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::fmt::time::ChronoLocal;

/// Voice worker for the Nitara front end.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Host runtime WebSocket URL (overrides HOST_WS_URL).
    #[arg(long)]
    host_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Load Configuration ---
    let mut config = AgentConfig::from_env().context("Failed to load application configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    // --- 3. Parse Command-Line Arguments ---
    let args = Cli::parse();
    if let Some(url) = args.host_url {
        config.host_ws_url = url;
    }

    tracing::info!("Configuration loaded successfully. Starting voice worker...");

    tokio::select! {
        result = run_worker(config) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl-C, shutting down...");
            Ok(())
        }
    }
}

/// Accepts session jobs from the host runtime and spawns one independent
/// task per session. Sessions share nothing but the outgoing command
/// channel; within a session, turns are strictly sequential.
async fn run_worker(config: AgentConfig) -> Result<()> {
    // Failing to reach the host runtime is the only fatal condition.
    let link = host_link::connect(&config.host_ws_url, config.host_token.as_ref())
        .await
        .context("Failed to establish host runtime connection")?;
    tracing::info!("connected to host runtime at {}", config.host_ws_url);

    let registry = Arc::new(PersonaRegistry::load(&config.persona_paths()));
    let config = Arc::new(config);

    let host_link::HostLink {
        commands,
        mut events,
    } = link;
    let mut sessions: HashMap<String, mpsc::Sender<SessionEvent>> = HashMap::new();

    while let Some(event) = events.recv().await {
        match event {
            HostEvent::SessionStarted(job) => {
                if sessions.contains_key(&job.session_id) {
                    tracing::warn!(session = %job.session_id, "duplicate session start ignored");
                    continue;
                }
                let (turn_tx, turn_rx) = mpsc::channel(host_link::TURN_CAPACITY);
                sessions.insert(job.session_id.clone(), turn_tx);

                let handle = host_link::SessionHandle::new(
                    job.session_id.clone(),
                    commands.clone(),
                    turn_rx,
                );
                let publisher =
                    host_link::DataPublisher::new(job.session_id.clone(), commands.clone());
                let config = config.clone();
                let registry = registry.clone();
                tokio::spawn(async move {
                    if let Err(e) =
                        entrypoint::run_session(&config, &registry, job, handle, publisher).await
                    {
                        tracing::error!("session failed: {e:#}");
                    }
                });
            }
            HostEvent::UserTurn {
                session_id,
                transcript,
            } => {
                let stale = match sessions.get(&session_id) {
                    Some(turns) => turns
                        .send(SessionEvent::Turn(UserTurn { transcript }))
                        .await
                        .is_err(),
                    None => {
                        tracing::warn!(session = %session_id, "turn for unknown session");
                        false
                    }
                };
                if stale {
                    sessions.remove(&session_id);
                }
            }
            HostEvent::SessionEnded { session_id } => {
                if let Some(turns) = sessions.remove(&session_id) {
                    let _ = turns.send(SessionEvent::Ended).await;
                }
            }
        }
    }

    tracing::info!("host runtime link closed");
    Ok(())
}

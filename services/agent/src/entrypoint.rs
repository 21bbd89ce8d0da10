//! Per-session composition.
//!
//! A session job flows through the core components in dependency order:
//! metadata resolution, persona selection, capability negotiation,
//! turn-taking configuration, and finally the adapter turn loop. Everything
//! here runs on the session's single sequential task.

use anyhow::Result;
use nitara_core::backend::{self, ChatBackend, DirectBackend, OrchestratorBackend};
use nitara_core::capability::{self, clean_keywords};
use nitara_core::config::AgentConfig;
use nitara_core::history::HistoryItem;
use nitara_core::host::{HostSession, SessionJob, SessionSettings};
use nitara_core::metadata::{self, MetadataDoc};
use nitara_core::orchestrator::{DirectiveSink, OrchestratorAdapter};
use nitara_core::persona::{BackendStrategy, PersonaRegistry};
use nitara_core::session::turn_taking_params;
use std::sync::Arc;

/// Composes one session and runs it until the host reports it ended.
pub async fn run_session<H, D>(
    config: &AgentConfig,
    registry: &PersonaRegistry,
    job: SessionJob,
    mut host: H,
    publisher: D,
) -> Result<()>
where
    H: HostSession,
    D: DirectiveSink + 'static,
{
    let connection = MetadataDoc::parse(job.participant_metadata.as_deref());
    let session = MetadataDoc::parse(job.room_metadata.as_deref());
    let mut ctx = metadata::resolve(&connection, &session);

    // Persona selection happens exactly once; it never changes mid-session.
    let persona = registry.select(ctx.persona_id.as_deref());
    if persona.force_deep_mode {
        ctx.deep_mode = true;
    }
    tracing::info!(
        session = %job.session_id,
        persona = %persona.id,
        voice = %ctx.voice_preset,
        thread = %ctx.thread_id,
        project = ctx.project_id.as_deref().unwrap_or(""),
        deep = ctx.deep_mode,
        channel = ?job.channel,
        "session starting"
    );

    let keywords = clean_keywords(&backend::fetch_keywords(&config.backend_url).await);
    let selection = capability::default_registry(config.deepgram_api_key.clone())
        .negotiate(&keywords)
        .await;
    let turn_taking = turn_taking_params(selection.tier(), job.channel);
    let voice_id = registry.voice_for(persona, &ctx.voice_preset);

    host.configure(SessionSettings {
        recognizer: selection.into_spec(),
        turn_taking,
        voice_id,
        instructions: persona.instructions.clone(),
    })
    .await?;

    let directives: Arc<dyn DirectiveSink> = Arc::new(publisher);
    match persona.strategy {
        BackendStrategy::Direct => match &config.direct_llm {
            Some(gateway) => {
                let backend = DirectBackend::new(
                    &gateway.base_url,
                    gateway.api_key.clone(),
                    &gateway.model,
                    &persona.instructions,
                );
                turn_loop(OrchestratorAdapter::new(backend, ctx, Some(directives)), host).await
            }
            None => {
                // No gateway configured: focused personas fall back to the
                // shared orchestrator rather than failing the session.
                tracing::info!("direct gateway not configured; falling back to routed strategy");
                let backend = OrchestratorBackend::new(&config.backend_url);
                turn_loop(OrchestratorAdapter::new(backend, ctx, Some(directives)), host).await
            }
        },
        BackendStrategy::Routed => {
            let backend = OrchestratorBackend::new(&config.backend_url);
            turn_loop(OrchestratorAdapter::new(backend, ctx, Some(directives)), host).await
        }
    }
}

/// The sequential turn loop. The first turn is always the greeting case:
/// history is empty until the user has spoken. A turn's backend call never
/// starts before the previous reply has been spoken.
async fn turn_loop<B, H>(mut adapter: OrchestratorAdapter<B>, mut host: H) -> Result<()>
where
    B: ChatBackend,
    H: HostSession,
{
    let mut history: Vec<HistoryItem> = Vec::new();
    loop {
        let reply = adapter.produce_reply(&history).await;
        host.speak(&reply).await?;
        history.push(HistoryItem::assistant(reply));

        match host.next_turn().await {
            Some(turn) => history.push(HistoryItem::user(turn.transcript)),
            None => break,
        }
    }
    tracing::info!("session ended");
    Ok(())
}

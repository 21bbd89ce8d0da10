//! The orchestrator adapter: the bridge between the host runtime's
//! pull-based produce-next-reply operation and the single-shot backend call.
//!
//! One adapter exists per session. It owns the session context, and the
//! continuity token inside it is written in exactly one place: when a
//! backend response carries a new thread id. Every failure mode resolves to
//! a fixed fallback phrase, so the produced reply is never empty and no
//! turn failure ever ends the session.

use crate::backend::{BackendError, ChatBackend, ChatRequest, OpenCanvas};
use crate::history::{HistoryItem, last_user_text};
use crate::metadata::SessionContext;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde_json::json;
use std::sync::Arc;

/// Topic for reliable canvas-directive publication on the session's data
/// channel.
pub const CANVAS_TOPIC: &str = "nitara.canvas";

/// Side channel used to publish UI directives alongside the spoken reply.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DirectiveSink: Send + Sync {
    async fn publish(&self, topic: &str, payload: serde_json::Value) -> anyhow::Result<()>;
}

/// Spoken when the backend produced an empty reply.
const EMPTY_REPLY_ACK: &str = "Done.";
/// Spoken when the backend call exceeded its timeout. No retry: the call
/// may already be running an expensive, non-idempotent operation.
const TIMEOUT_REPLY: &str =
    "That's still processing. Check your dashboard or ask me again shortly.";
/// Spoken when the opening turn failed before anything else was said.
const OPENING_FALLBACK: &str = "Hey, I'm here. What would you like to work on?";
/// Spoken when a mid-session turn failed.
const ERROR_FALLBACK: &str = "Something went wrong on my end. Could you try again?";

pub struct OrchestratorAdapter<B: ChatBackend> {
    backend: B,
    context: SessionContext,
    directives: Option<Arc<dyn DirectiveSink>>,
}

impl<B: ChatBackend> OrchestratorAdapter<B> {
    pub fn new(
        backend: B,
        context: SessionContext,
        directives: Option<Arc<dyn DirectiveSink>>,
    ) -> Self {
        Self {
            backend,
            context,
            directives,
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    fn build_request(&self, history: &[HistoryItem]) -> ChatRequest {
        let mut request = match last_user_text(history) {
            Some(content) => ChatRequest::turn(content),
            None => ChatRequest::greeting(),
        };
        if !self.context.thread_id.is_empty() {
            request.thread_id = Some(self.context.thread_id.clone());
        }
        request.project_id = self.context.project_id.clone();
        if self.context.deep_mode {
            request.deep_mode = Some(true);
        }
        request
    }

    async fn publish_directive(&self, directive: OpenCanvas) {
        let Some(sink) = &self.directives else {
            return;
        };
        let payload = json!({
            "type": "open_canvas",
            "canvas": directive.canvas,
            "params": directive.params,
        });
        // A lost directive is not worth failing a spoken turn over.
        if let Err(e) = sink.publish(CANVAS_TOPIC, payload).await {
            tracing::warn!("failed to publish open_canvas directive: {e}");
        }
    }

    /// Produces the next spoken reply for the supplied history.
    ///
    /// Exactly one backend call is issued per invocation, and the adapter is
    /// driven by the session's single sequential task, so there is never
    /// more than one call in flight. The returned reply is always non-empty.
    pub async fn produce_reply(&mut self, history: &[HistoryItem]) -> String {
        let request = self.build_request(history);
        let opening_turn = request.is_greeting();
        if !opening_turn {
            tracing::info!("orchestrator request: {:.100}", request.content);
        }

        match self.backend.chat(&request).await {
            Ok(response) => {
                if let Some(thread_id) = &response.thread_id {
                    if !thread_id.is_empty() {
                        self.context.thread_id = thread_id.clone();
                    }
                }
                if let Some(directive) = response.open_canvas {
                    self.publish_directive(directive).await;
                }
                let content = if response.content.is_empty() {
                    EMPTY_REPLY_ACK.to_string()
                } else {
                    response.content
                };
                tracing::info!("orchestrator response: {:.100}", content);
                content
            }
            Err(BackendError::Timeout) => {
                tracing::error!("orchestrator request timed out");
                TIMEOUT_REPLY.to_string()
            }
            Err(e) => {
                tracing::error!("orchestrator request failed: {e}");
                if opening_turn {
                    OPENING_FALLBACK.to_string()
                } else {
                    ERROR_FALLBACK.to_string()
                }
            }
        }
    }
}

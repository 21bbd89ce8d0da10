//! Wire contract and HTTP clients for the conversational backend.
//!
//! The backend is a black box reached with a single POST per turn. Two
//! strategies exist: the routed strategy goes through the shared
//! orchestrator endpoint and carries continuity via the backend-assigned
//! thread id; the direct strategy talks to an OpenAI-compatible chat
//! gateway, which is stateless, so continuity is carried client-side in a
//! running transcript.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// Timeout for routed turns; the deep reasoning path can run for minutes.
pub const ROUTED_TIMEOUT: Duration = Duration::from_secs(600);
/// Timeout for direct gateway turns.
pub const DIRECT_TIMEOUT: Duration = Duration::from_secs(120);
/// Timeout for the best-effort keyword fetch; never blocks session start.
const KEYWORDS_TIMEOUT: Duration = Duration::from_secs(5);

/// Marks a request as the session-opening turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatIntent {
    #[serde(rename = "greeting")]
    Greeting,
}

/// Wire request for one conversational turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub content: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deep_mode: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<ChatIntent>,
}

impl ChatRequest {
    /// A regular turn carrying the user's words.
    pub fn turn(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source: "voice".to_string(),
            thread_id: None,
            project_id: None,
            deep_mode: None,
            intent: None,
        }
    }

    /// The session-opening turn: greeting intent, empty content.
    pub fn greeting() -> Self {
        Self {
            intent: Some(ChatIntent::Greeting),
            ..Self::turn("")
        }
    }

    pub fn is_greeting(&self) -> bool {
        self.intent == Some(ChatIntent::Greeting)
    }
}

fn empty_params() -> serde_json::Value {
    json!({})
}

/// Directive payload instructing the UI to open a canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenCanvas {
    #[serde(default)]
    pub canvas: String,
    #[serde(default = "empty_params")]
    pub params: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub open_canvas: Option<OpenCanvas>,
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend request timed out")]
    Timeout,
    #[error("backend returned HTTP {status}: {detail}")]
    Status { status: u16, detail: String },
    #[error("malformed backend response: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("backend transport failure: {0}")]
    Transport(#[source] reqwest::Error),
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BackendError::Timeout
        } else {
            BackendError::Transport(err)
        }
    }
}

/// One conversational turn against the backend. The orchestrator adapter
/// issues exactly one call per produced reply.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn chat(&mut self, request: &ChatRequest) -> Result<ChatResponse, BackendError>;
}

/// Routed strategy: POSTs each turn to the shared orchestrator endpoint.
///
/// The connection pool is session-scoped and reused across turns; it is
/// only ever touched by the session's single sequential task.
pub struct OrchestratorBackend {
    client: Client,
    base_url: String,
}

impl OrchestratorBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ChatBackend for OrchestratorBackend {
    async fn chat(&mut self, request: &ChatRequest) -> Result<ChatResponse, BackendError> {
        let url = format!("{}/api/orchestrator/chat", self.base_url);
        let response = self
            .client
            .post(&url)
            .timeout(ROUTED_TIMEOUT)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                detail,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(BackendError::Malformed)
    }
}

#[derive(Debug, Deserialize)]
struct CompletionsResponse {
    choices: Vec<CompletionsChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionsChoice {
    message: CompletionsMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionsMessage {
    content: String,
}

/// Opening prompt for direct sessions; the gateway has no greeting intent.
const DIRECT_GREETING_PROMPT: &str =
    "The caller just joined the session. Greet them warmly and open the conversation.";

/// Direct strategy: talks to an OpenAI-compatible chat gateway, bypassing
/// the shared orchestrator. Used by focused single-purpose personas.
pub struct DirectBackend {
    client: Client,
    base_url: String,
    api_key: SecretString,
    model: String,
    instructions: String,
    transcript: Vec<(&'static str, String)>,
}

impl DirectBackend {
    pub fn new(
        base_url: impl Into<String>,
        api_key: SecretString,
        model: impl Into<String>,
        instructions: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key,
            model: model.into(),
            instructions: instructions.into(),
            transcript: Vec::new(),
        }
    }

    fn user_text(request: &ChatRequest) -> String {
        if request.is_greeting() {
            DIRECT_GREETING_PROMPT.to_string()
        } else {
            request.content.clone()
        }
    }

    /// Assembles the messages array: instructions, the running transcript,
    /// then the incoming user text.
    fn completion_messages(&self, user_text: &str) -> serde_json::Value {
        let mut messages = vec![json!({"role": "system", "content": self.instructions})];
        for (role, text) in &self.transcript {
            messages.push(json!({"role": role, "content": text}));
        }
        messages.push(json!({"role": "user", "content": user_text}));
        serde_json::Value::Array(messages)
    }

    fn record_exchange(&mut self, user_text: String, assistant_text: String) {
        self.transcript.push(("user", user_text));
        self.transcript.push(("assistant", assistant_text));
    }
}

#[async_trait]
impl ChatBackend for DirectBackend {
    async fn chat(&mut self, request: &ChatRequest) -> Result<ChatResponse, BackendError> {
        let user_text = Self::user_text(request);
        let body = json!({
            "model": self.model,
            "messages": self.completion_messages(&user_text),
            "temperature": 0.7,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .timeout(DIRECT_TIMEOUT)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                detail,
            });
        }

        let body = response.text().await?;
        let parsed: CompletionsResponse =
            serde_json::from_str(&body).map_err(BackendError::Malformed)?;
        let content = parsed
            .choices
            .first()
            .map(|choice| choice.message.content.clone())
            .unwrap_or_default();

        self.record_exchange(user_text, content.clone());
        Ok(ChatResponse {
            thread_id: None,
            content,
            open_canvas: None,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct KeywordsResponse {
    #[serde(default)]
    keywords: Vec<String>,
}

/// Fetches domain keywords for recognizer boosting. Best-effort: any
/// failure or non-success status degrades to an empty list.
pub async fn fetch_keywords(base_url: &str) -> Vec<String> {
    let url = format!("{base_url}/api/voice/keywords");
    match Client::new().get(&url).timeout(KEYWORDS_TIMEOUT).send().await {
        Ok(response) if response.status().is_success() => {
            match response.json::<KeywordsResponse>().await {
                Ok(parsed) => parsed.keywords,
                Err(e) => {
                    tracing::warn!("malformed keywords response: {e}");
                    Vec::new()
                }
            }
        }
        Ok(response) => {
            tracing::warn!("keyword fetch returned HTTP {}", response.status());
            Vec::new()
        }
        Err(e) => {
            tracing::warn!("keyword fetch failed: {e}");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serialization_omits_absent_fields() {
        let request = ChatRequest::turn("hello");
        let wire = serde_json::to_value(&request).expect("serialize");
        assert_eq!(
            wire,
            json!({"content": "hello", "source": "voice"})
        );
    }

    #[test]
    fn greeting_request_carries_the_intent_and_empty_content() {
        let request = ChatRequest::greeting();
        let wire = serde_json::to_value(&request).expect("serialize");
        assert_eq!(
            wire,
            json!({"content": "", "source": "voice", "intent": "greeting"})
        );
    }

    #[test]
    fn request_serialization_includes_set_fields() {
        let mut request = ChatRequest::turn("status?");
        request.thread_id = Some("t1".to_string());
        request.project_id = Some("p1".to_string());
        request.deep_mode = Some(true);

        let wire = serde_json::to_value(&request).expect("serialize");
        assert_eq!(
            wire,
            json!({
                "content": "status?",
                "source": "voice",
                "thread_id": "t1",
                "project_id": "p1",
                "deep_mode": true,
            })
        );
    }

    #[test]
    fn response_deserialization_tolerates_missing_fields() {
        let response: ChatResponse = serde_json::from_str("{}").expect("deserialize");
        assert_eq!(response.thread_id, None);
        assert_eq!(response.content, "");
        assert!(response.open_canvas.is_none());
    }

    #[test]
    fn canvas_params_default_to_an_empty_object() {
        let response: ChatResponse =
            serde_json::from_str(r#"{"content":"ok","open_canvas":{"canvas":"portfolio"}}"#)
                .expect("deserialize");
        let directive = response.open_canvas.expect("directive");
        assert_eq!(directive.canvas, "portfolio");
        assert_eq!(directive.params, json!({}));
    }

    #[test]
    fn direct_messages_start_with_instructions_and_end_with_the_user() {
        let backend = DirectBackend::new(
            "http://gateway",
            SecretString::from("key".to_string()),
            "claude-sonnet-4-20250514",
            "Profiler instructions.",
        );

        let messages = backend.completion_messages("tell me more");
        assert_eq!(
            messages,
            json!([
                {"role": "system", "content": "Profiler instructions."},
                {"role": "user", "content": "tell me more"},
            ])
        );
    }

    #[test]
    fn direct_transcript_is_carried_across_turns() {
        let mut backend = DirectBackend::new(
            "http://gateway",
            SecretString::from("key".to_string()),
            "claude-sonnet-4-20250514",
            "Profiler instructions.",
        );
        backend.record_exchange("hi".to_string(), "hello!".to_string());

        let messages = backend.completion_messages("next question");
        assert_eq!(
            messages,
            json!([
                {"role": "system", "content": "Profiler instructions."},
                {"role": "user", "content": "hi"},
                {"role": "assistant", "content": "hello!"},
                {"role": "user", "content": "next question"},
            ])
        );
    }

    #[test]
    fn greeting_turns_synthesize_an_opening_prompt_on_the_direct_path() {
        assert_eq!(
            DirectBackend::user_text(&ChatRequest::greeting()),
            DIRECT_GREETING_PROMPT
        );
        assert_eq!(
            DirectBackend::user_text(&ChatRequest::turn("hello")),
            "hello"
        );
    }
}

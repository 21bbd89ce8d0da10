//! WebSocket link to the host conversational runtime.
//!
//! One socket per worker. A writer task serializes outgoing commands, a
//! reader task decodes incoming events; the worker loop routes events to
//! per-session channels. Each session sees the link only through its
//! [`SessionHandle`] and [`DataPublisher`], which keeps session tasks fully
//! independent of each other.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use nitara_core::capability::RecognizerSpec;
use nitara_core::host::{HostError, HostSession, SessionJob, SessionSettings, UserTurn};
use nitara_core::orchestrator::DirectiveSink;
use nitara_core::session::TurnDetectionMode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;

/// Channel capacity for both directions of the link.
const LINK_CAPACITY: usize = 256;
/// Per-session turn buffer; turns arrive at conversation pace.
pub const TURN_CAPACITY: usize = 32;

/// Events the host runtime sends to the worker.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEvent {
    SessionStarted(SessionJob),
    UserTurn {
        session_id: String,
        transcript: String,
    },
    SessionEnded {
        session_id: String,
    },
}

/// Commands the worker sends to the host runtime.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostCommand {
    ConfigureSession {
        session_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        recognizer: Option<RecognizerSpec>,
        turn_detection: TurnDetectionMode,
        min_endpointing_delay: f64,
        max_endpointing_delay: f64,
        voice_id: String,
        instructions: String,
    },
    Speak {
        session_id: String,
        text: String,
    },
    PublishData {
        session_id: String,
        topic: String,
        reliable: bool,
        payload: serde_json::Value,
    },
}

pub struct HostLink {
    pub commands: mpsc::Sender<HostCommand>,
    pub events: mpsc::Receiver<HostEvent>,
}

/// Connects to the host runtime's worker socket and spawns the read/write
/// tasks. This is the only call whose failure is fatal to the process.
pub async fn connect(ws_url: &str, token: Option<&SecretString>) -> Result<HostLink> {
    let mut request = ws_url
        .into_client_request()
        .context("invalid host runtime URL")?;
    if let Some(token) = token {
        let value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
            .context("invalid host runtime token")?;
        request.headers_mut().insert(AUTHORIZATION, value);
    }

    let (ws_stream, _) = tokio_tungstenite::connect_async(request).await?;
    let (mut write, mut read) = ws_stream.split();

    let (command_tx, mut command_rx) = mpsc::channel::<HostCommand>(LINK_CAPACITY);
    let (event_tx, event_rx) = mpsc::channel::<HostEvent>(LINK_CAPACITY);

    tokio::spawn(async move {
        while let Some(command) = command_rx.recv().await {
            match serde_json::to_string(&command) {
                Ok(text) => {
                    if let Err(e) = write.send(Message::Text(text)).await {
                        tracing::error!("failed to send host command: {e}");
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!("failed to serialize host command: {e}");
                }
            }
        }
    });

    tokio::spawn(async move {
        while let Some(message) = read.next().await {
            let message = match message {
                Ok(message) => message,
                Err(e) => {
                    tracing::error!("failed to read host message: {e}");
                    break;
                }
            };
            match message {
                Message::Text(text) => match serde_json::from_str::<HostEvent>(&text) {
                    Ok(event) => {
                        if event_tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!("failed to deserialize host event: {e}, text=> {text:?}");
                    }
                },
                Message::Binary(bin) => {
                    tracing::warn!("unexpected binary message: {} bytes", bin.len());
                }
                Message::Close(reason) => {
                    tracing::info!("host runtime closed the link: {reason:?}");
                    break;
                }
                _ => {}
            }
        }
    });

    Ok(HostLink {
        commands: command_tx,
        events: event_rx,
    })
}

/// Turn-stream events routed to one session task.
#[derive(Debug)]
pub enum SessionEvent {
    Turn(UserTurn),
    Ended,
}

/// One session's view of the link.
pub struct SessionHandle {
    session_id: String,
    commands: mpsc::Sender<HostCommand>,
    turns: mpsc::Receiver<SessionEvent>,
}

impl SessionHandle {
    pub fn new(
        session_id: String,
        commands: mpsc::Sender<HostCommand>,
        turns: mpsc::Receiver<SessionEvent>,
    ) -> Self {
        Self {
            session_id,
            commands,
            turns,
        }
    }

    async fn send(&self, command: HostCommand) -> Result<(), HostError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| HostError::Closed)
    }
}

#[async_trait]
impl HostSession for SessionHandle {
    async fn configure(&mut self, settings: SessionSettings) -> Result<(), HostError> {
        self.send(HostCommand::ConfigureSession {
            session_id: self.session_id.clone(),
            recognizer: settings.recognizer,
            turn_detection: settings.turn_taking.mode,
            min_endpointing_delay: settings.turn_taking.min_endpointing_delay.as_secs_f64(),
            max_endpointing_delay: settings.turn_taking.max_endpointing_delay.as_secs_f64(),
            voice_id: settings.voice_id,
            instructions: settings.instructions,
        })
        .await
    }

    async fn next_turn(&mut self) -> Option<UserTurn> {
        match self.turns.recv().await {
            Some(SessionEvent::Turn(turn)) => Some(turn),
            Some(SessionEvent::Ended) | None => None,
        }
    }

    async fn speak(&mut self, text: &str) -> Result<(), HostError> {
        self.send(HostCommand::Speak {
            session_id: self.session_id.clone(),
            text: text.to_string(),
        })
        .await
    }
}

/// Reliable named-topic publisher for one session's data channel.
#[derive(Clone)]
pub struct DataPublisher {
    session_id: String,
    commands: mpsc::Sender<HostCommand>,
}

impl DataPublisher {
    pub fn new(session_id: String, commands: mpsc::Sender<HostCommand>) -> Self {
        Self {
            session_id,
            commands,
        }
    }
}

#[async_trait]
impl DirectiveSink for DataPublisher {
    async fn publish(&self, topic: &str, payload: serde_json::Value) -> Result<()> {
        self.commands
            .send(HostCommand::PublishData {
                session_id: self.session_id.clone(),
                topic: topic.to_string(),
                reliable: true,
                payload,
            })
            .await
            .map_err(|_| anyhow::anyhow!("host runtime link closed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nitara_core::session::ChannelKind;
    use serde_json::json;

    #[test]
    fn session_started_events_carry_the_job_inline() {
        let event: HostEvent = serde_json::from_str(
            r#"{
                "type": "session_started",
                "session_id": "room-1",
                "channel": "telephony",
                "participant_metadata": "{\"personaId\":\"nitara-profiler\"}"
            }"#,
        )
        .expect("deserialize");

        match event {
            HostEvent::SessionStarted(job) => {
                assert_eq!(job.session_id, "room-1");
                assert_eq!(job.channel, ChannelKind::Telephony);
                assert!(job.participant_metadata.is_some());
                assert_eq!(job.room_metadata, None);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn speak_commands_serialize_with_a_type_tag() {
        let command = HostCommand::Speak {
            session_id: "room-1".to_string(),
            text: "Hello.".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&command).expect("serialize"),
            json!({"type": "speak", "session_id": "room-1", "text": "Hello."})
        );
    }

    #[tokio::test]
    async fn session_handle_yields_turns_until_the_session_ends() {
        let (command_tx, _command_rx) = mpsc::channel(8);
        let (turn_tx, turn_rx) = mpsc::channel(8);
        let mut handle = SessionHandle::new("room-1".to_string(), command_tx, turn_rx);

        turn_tx
            .send(SessionEvent::Turn(UserTurn {
                transcript: "hello".to_string(),
            }))
            .await
            .expect("send turn");
        turn_tx.send(SessionEvent::Ended).await.expect("send end");

        assert_eq!(
            handle.next_turn().await,
            Some(UserTurn {
                transcript: "hello".to_string()
            })
        );
        assert_eq!(handle.next_turn().await, None);
    }

    #[tokio::test]
    async fn speaking_on_a_closed_link_reports_the_closure() {
        let (command_tx, command_rx) = mpsc::channel(8);
        drop(command_rx);
        let (_turn_tx, turn_rx) = mpsc::channel(8);
        let mut handle = SessionHandle::new("room-1".to_string(), command_tx, turn_rx);

        assert!(matches!(
            handle.speak("anyone there?").await,
            Err(HostError::Closed)
        ));
    }

    #[tokio::test]
    async fn the_publisher_sends_reliable_named_topic_data() {
        let (command_tx, mut command_rx) = mpsc::channel(8);
        let publisher = DataPublisher::new("room-1".to_string(), command_tx);

        publisher
            .publish("nitara.canvas", json!({"type": "open_canvas"}))
            .await
            .expect("publish");

        let command = command_rx.recv().await.expect("command");
        assert_eq!(
            command,
            HostCommand::PublishData {
                session_id: "room-1".to_string(),
                topic: "nitara.canvas".to_string(),
                reliable: true,
                payload: json!({"type": "open_canvas"}),
            }
        );
    }
}

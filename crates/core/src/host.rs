//! The narrow interface to the host conversational runtime.
//!
//! The runtime owns audio capture, voice-activity detection, barge-in, and
//! speech synthesis. This crate only ever sees it through these types: a
//! session job coming in, a one-time configuration push going out, then a
//! strictly sequential stream of completed user turns.

use crate::capability::RecognizerSpec;
use crate::session::{ChannelKind, TurnTakingParams};
use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("host runtime link closed")]
    Closed,
    #[error("host command failed: {0}")]
    Command(String),
}

/// An incoming session handed to the worker by the host runtime. The two
/// metadata documents are passed through verbatim and parsed leniently
/// downstream.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SessionJob {
    pub session_id: String,
    #[serde(default)]
    pub channel: ChannelKind,
    /// Connection-scoped metadata (the joining participant's).
    #[serde(default)]
    pub participant_metadata: Option<String>,
    /// Session-scoped metadata (the room's).
    #[serde(default)]
    pub room_metadata: Option<String>,
}

/// Settings pushed to the host runtime before the first turn.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    /// Negotiated recognizer; `None` means the runtime's built-in default.
    pub recognizer: Option<RecognizerSpec>,
    pub turn_taking: TurnTakingParams,
    pub voice_id: String,
    pub instructions: String,
}

/// A completed user turn as transcribed by the host runtime.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserTurn {
    pub transcript: String,
}

/// One live session, as seen from the orchestration side.
#[async_trait]
pub trait HostSession: Send {
    /// Pushes recognizer choice, endpointing, voice identity, and
    /// instructions. Called once, before the first turn.
    async fn configure(&mut self, settings: SessionSettings) -> Result<(), HostError>;

    /// The next completed user turn; `None` once the session has ended.
    async fn next_turn(&mut self) -> Option<UserTurn>;

    /// Renders a reply as speech.
    async fn speak(&mut self, text: &str) -> Result<(), HostError>;
}

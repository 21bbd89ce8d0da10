//! Conversation history as the host runtime delivers it.
//!
//! History entries are tagged variants: an author role plus content that is
//! either a plain string or a sequence of typed parts. The orchestrator only
//! ever needs the most recent user-authored text, extracted by a reverse
//! scan with a uniform accessor.

use serde::{Deserialize, Serialize};

/// The author of a history entry: "user", "assistant", "system".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
    System,
}

/// One part of a multi-part message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TurnPart {
    #[serde(rename = "text")]
    Text(TextPart),
    #[serde(rename = "audio")]
    Audio(AudioPart),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextPart {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioPart {
    #[serde(default)]
    pub transcript: Option<String>,
}

/// Message content is either a plain string or a sequence of parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TurnContent {
    Text(String),
    Parts(Vec<TurnPart>),
}

impl TurnContent {
    /// Flattens the content to text. Multi-part content keeps only the
    /// text-bearing parts, joined with single spaces.
    pub fn text(&self) -> String {
        match self {
            TurnContent::Text(text) => text.clone(),
            TurnContent::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    TurnPart::Text(part) => Some(part.text.as_str()),
                    TurnPart::Audio(_) => None,
                })
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryItem {
    pub role: TurnRole,
    pub content: TurnContent,
}

impl HistoryItem {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: TurnContent::Text(text.into()),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: TurnContent::Text(text.into()),
        }
    }
}

/// Scans the history from the most recent entry backward and returns the
/// text of the first user-authored entry. `None` means there is nothing to
/// respond to yet: the session-opening turn.
pub fn last_user_text(history: &[HistoryItem]) -> Option<String> {
    history
        .iter()
        .rev()
        .find(|item| item.role == TurnRole::User)
        .map(|item| item.content.text())
        .filter(|text| !text.is_empty())
}

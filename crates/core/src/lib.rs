//! Core orchestration library for the Nitara voice front end.
//!
//! The host conversational runtime owns audio capture, barge-in detection,
//! and speech synthesis; the backend orchestrator owns reasoning, tools, and
//! memory. This crate is the control logic between them: persona selection,
//! speech-recognition capability negotiation, turn-taking configuration, and
//! the adapter that bridges the runtime's pull-based produce-next-reply
//! operation onto single-shot backend calls.

pub mod backend;
pub mod capability;
pub mod config;
pub mod history;
pub mod host;
pub mod metadata;
pub mod orchestrator;
pub mod persona;
pub mod session;

pub use backend::{ChatBackend, ChatRequest, ChatResponse};
pub use capability::{CapabilityRegistry, SttSelection, SttTier};
pub use history::HistoryItem;
pub use metadata::{MetadataDoc, SessionContext};
pub use orchestrator::{DirectiveSink, OrchestratorAdapter};
pub use persona::{BackendStrategy, PersonaDescriptor, PersonaRegistry};
pub use session::{ChannelKind, TurnTakingParams};

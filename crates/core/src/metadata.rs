//! Session metadata resolution.
//!
//! A session arrives with two independently-produced metadata documents: one
//! scoped to the connection (the joining participant) and one scoped to the
//! session itself (the room). Either may be absent or malformed; both are
//! parsed leniently and merged into a single [`SessionContext`] seed.

use serde::Deserialize;

/// Voice preset applied when the metadata names none.
pub const DEFAULT_VOICE_PRESET: &str = "nova";

/// One metadata document as delivered by the host runtime.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MetadataDoc {
    pub voice_preset: Option<String>,
    pub thread_id: Option<String>,
    pub project_id: Option<String>,
    pub deep_mode: Option<bool>,
    pub persona_id: Option<String>,
}

impl MetadataDoc {
    /// Lenient parse: an absent or malformed document contributes no values
    /// rather than failing the session.
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::default();
        };
        match serde_json::from_str(raw) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::debug!("ignoring malformed metadata document: {e}");
                Self::default()
            }
        }
    }
}

/// Per-conversation state derived from the merged metadata.
///
/// `thread_id` is the backend continuity token: empty until the backend
/// assigns one, and from then on written only by the orchestrator adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionContext {
    pub thread_id: String,
    pub project_id: Option<String>,
    pub deep_mode: bool,
    pub voice_preset: String,
    pub persona_id: Option<String>,
}

fn pick(primary: &Option<String>, secondary: &Option<String>) -> Option<String> {
    primary
        .clone()
        .or_else(|| secondary.clone())
        .filter(|value| !value.is_empty())
}

/// Merges the two metadata documents into a session context seed.
///
/// Connection-scoped values take precedence; session-scoped values fill any
/// key the connection-scoped document omits. A project scope with no
/// explicit deep-mode flag in either document turns deep mode on: project
/// context implies the deeper reasoning path.
pub fn resolve(connection: &MetadataDoc, session: &MetadataDoc) -> SessionContext {
    let project_id = pick(&connection.project_id, &session.project_id);
    let deep_mode = connection
        .deep_mode
        .or(session.deep_mode)
        .unwrap_or_else(|| project_id.is_some());

    SessionContext {
        thread_id: pick(&connection.thread_id, &session.thread_id).unwrap_or_default(),
        project_id,
        deep_mode,
        voice_preset: pick(&connection.voice_preset, &session.voice_preset)
            .unwrap_or_else(|| DEFAULT_VOICE_PRESET.to_string()),
        persona_id: pick(&connection.persona_id, &session.persona_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_values_win_and_session_values_fill() {
        let connection = MetadataDoc::parse(Some(r#"{"voicePreset":"x"}"#));
        let session = MetadataDoc::parse(Some(r#"{"voicePreset":"y","threadId":"t1"}"#));

        let ctx = resolve(&connection, &session);
        assert_eq!(ctx.voice_preset, "x");
        assert_eq!(ctx.thread_id, "t1");
    }

    #[test]
    fn project_scope_implies_deep_mode() {
        let connection = MetadataDoc::parse(Some(r#"{"projectId":"p1"}"#));
        let ctx = resolve(&connection, &MetadataDoc::default());
        assert_eq!(ctx.project_id.as_deref(), Some("p1"));
        assert!(ctx.deep_mode);
    }

    #[test]
    fn explicit_deep_mode_is_not_overridden_by_project_scope() {
        let connection = MetadataDoc::parse(Some(r#"{"projectId":"p1","deepMode":false}"#));
        let ctx = resolve(&connection, &MetadataDoc::default());
        assert!(!ctx.deep_mode);
    }

    #[test]
    fn session_scoped_deep_mode_applies_when_connection_is_silent() {
        let session = MetadataDoc::parse(Some(r#"{"deepMode":true}"#));
        let ctx = resolve(&MetadataDoc::default(), &session);
        assert!(ctx.deep_mode);
    }

    #[test]
    fn malformed_documents_degrade_to_defaults() {
        let connection = MetadataDoc::parse(Some("{not json"));
        let session = MetadataDoc::parse(None);

        let ctx = resolve(&connection, &session);
        assert_eq!(ctx.thread_id, "");
        assert_eq!(ctx.project_id, None);
        assert!(!ctx.deep_mode);
        assert_eq!(ctx.voice_preset, DEFAULT_VOICE_PRESET);
        assert_eq!(ctx.persona_id, None);
    }

    #[test]
    fn empty_strings_are_treated_as_absent() {
        let connection = MetadataDoc::parse(Some(r#"{"threadId":"","personaId":""}"#));
        let session = MetadataDoc::parse(Some(r#"{"threadId":"t2"}"#));

        let ctx = resolve(&connection, &session);
        assert_eq!(ctx.thread_id, "t2");
        assert_eq!(ctx.persona_id, None);
    }

    #[test]
    fn persona_follows_connection_precedence() {
        let connection = MetadataDoc::parse(Some(r#"{"personaId":"nitara-analyst"}"#));
        let session = MetadataDoc::parse(Some(r#"{"personaId":"nitara-profiler"}"#));

        let ctx = resolve(&connection, &session);
        assert_eq!(ctx.persona_id.as_deref(), Some("nitara-analyst"));
    }
}

//! Persona registry and instruction assembly.
//!
//! A persona is a named conversational configuration: a synthesis voice, an
//! instruction document, and a backend strategy. Personas are loaded once at
//! startup and never mutated; selection happens exactly once per session.

use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const PERSONA_MAIN: &str = "nitara-main";
pub const PERSONA_ANALYST: &str = "nitara-analyst";
pub const PERSONA_PROFILER: &str = "nitara-profiler";

const DEFAULT_MAIN_VOICE: &str = "f786b574-daa5-4673-aa0c-cbe3e8534c02";
const DEFAULT_ANALYST_VOICE: &str = "228fca29-3a0a-435c-8728-5cb483251068";
const DEFAULT_PROFILER_VOICE: &str = "6ccbfb76-1fc6-48f7-b71d-91ac6298247b";

/// How a persona reaches its conversational backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendStrategy {
    /// Route every turn through the shared orchestrator API.
    Routed,
    /// Talk to a conversational-AI gateway directly, bypassing the shared
    /// orchestrator. Used for focused single-purpose sessions.
    Direct,
}

/// Immutable persona configuration.
#[derive(Debug, Clone)]
pub struct PersonaDescriptor {
    pub id: String,
    pub voice_id: String,
    pub instructions: String,
    pub strategy: BackendStrategy,
    /// Forces the expensive backend reasoning path regardless of metadata.
    pub force_deep_mode: bool,
}

/// Files the registry reads at startup.
#[derive(Debug, Clone)]
pub struct PersonaPaths {
    pub voices: PathBuf,
    pub soul: PathBuf,
    pub profiling_checklist: PathBuf,
}

/// Maps a legacy voice preset name to a synthesis voice id. Unknown presets
/// fall back to the default warm voice.
pub fn preset_voice_id(preset: &str) -> &'static str {
    match preset.to_ascii_lowercase().as_str() {
        "atlas" => DEFAULT_ANALYST_VOICE,
        "lyra" => DEFAULT_PROFILER_VOICE,
        _ => DEFAULT_MAIN_VOICE,
    }
}

#[derive(Debug, Default, Deserialize)]
struct VoiceConfigFile {
    #[serde(default)]
    personas: HashMap<String, VoiceEntry>,
}

#[derive(Debug, Deserialize)]
struct VoiceEntry {
    voice_id: String,
}

fn load_voice_table(path: &Path) -> VoiceConfigFile {
    let Ok(raw) = fs::read_to_string(path) else {
        return VoiceConfigFile::default();
    };
    match serde_json::from_str(&raw) {
        Ok(table) => table,
        Err(e) => {
            tracing::warn!("ignoring malformed voice table at {}: {e}", path.display());
            VoiceConfigFile::default()
        }
    }
}

const VOICE_PREAMBLE: &str = "You are Nitara, an AI business partner. You are speaking via voice.\n\
Keep responses under 3 sentences. No markdown, no bullet points, no code blocks. Speak naturally.\n\
Your full identity and personality are defined below. Embody this in every response.\n\n";

const FALLBACK_SOUL: &str = "You are Nitara, an AI business partner for solo founders and creators. \
You are concise, professional, and carry calm intensity. \
Keep responses short and conversational since this is a voice interface. \
Speak naturally. No formatting, no bullet points.";

/// Loads the personality document for the default persona. A missing file is
/// a configuration-absent condition: logged, recovered with the built-in
/// fallback, never surfaced to the caller.
fn load_soul_instructions(path: &Path) -> String {
    match fs::read_to_string(path) {
        Ok(soul) => format!("{VOICE_PREAMBLE}{soul}"),
        Err(e) => {
            tracing::warn!(
                "personality document not readable at {}: {e}; using fallback instructions",
                path.display()
            );
            FALLBACK_SOUL.to_string()
        }
    }
}

const ANALYST_INSTRUCTIONS: &str = "You are Nitara in Analyst mode: authoritative, data-driven, strategic.\n\
You are speaking via voice. Keep responses concise but substantive.\n\
No markdown, no bullet points, no code blocks. Speak naturally with confidence.\n\
\n\
Your role: Discuss portfolio analysis, project scoring, BUILD-NEXT recommendations,\n\
market research findings, and strategic decisions. Reference specific data from reports.\n\
\n\
When the founder asks about their portfolio:\n\
1. Reference the latest portfolio analysis report\n\
2. Give specific scores and rankings\n\
3. Explain your reasoning clearly\n\
4. Recommend concrete next steps";

const PROFILER_BASE: &str = "You are Nitara in Profiler mode: friendly, curious, conversational.\n\
You are speaking via voice on a phone call. This is a profiling session.\n\
\n\
Your goal: Learn about the founder through natural conversation. You're gathering\n\
information to fill gaps in the profiling checklist, but don't make it feel like\n\
an interrogation. Be genuinely curious, follow interesting threads, and let the\n\
conversation flow naturally.\n\
\n\
Guidelines:\n\
- Ask ONE question at a time. Wait for the answer before moving on.\n\
- When they share something, acknowledge it warmly before asking the next thing.\n\
- If they seem uncomfortable with a topic, gracefully pivot to another.\n\
- Summarize what you learned at the end of the conversation.\n\
- Keep the call under 10 minutes.\n\
- Speak naturally. No formatting, no bullet points.";

/// A domain is considered covered once it reaches this completeness.
const DOMAIN_COVERED_PERCENT: u32 = 80;
/// At most this many gap items are surfaced per call.
const MAX_GAP_ITEMS: usize = 5;

#[derive(Debug, Deserialize)]
struct ProfilingChecklist {
    #[serde(default)]
    overall_completeness: u32,
    #[serde(default)]
    domains: HashMap<String, ChecklistDomain>,
}

#[derive(Debug, Deserialize)]
struct ChecklistDomain {
    #[serde(default)]
    completeness: u32,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    items: Vec<ChecklistItem>,
}

#[derive(Debug, Deserialize)]
struct ChecklistItem {
    label: String,
    status: String,
}

fn priority_rank(priority: Option<&str>) -> u8 {
    match priority {
        Some("critical") => 0,
        Some("high") => 1,
        Some("medium") => 2,
        _ => 3,
    }
}

/// Assembles the profiler instructions from the current checklist state:
/// domains below the coverage threshold contribute their unknown items,
/// ordered by domain priority. Any read or parse failure yields the base
/// instructions alone.
fn build_profiler_instructions(checklist_path: &Path) -> String {
    let checklist = fs::read_to_string(checklist_path)
        .ok()
        .and_then(|raw| serde_json::from_str::<ProfilingChecklist>(&raw).ok());
    let Some(checklist) = checklist else {
        return PROFILER_BASE.to_string();
    };

    let mut gaps: Vec<(u8, String, String)> = Vec::new();
    for (domain_key, domain) in &checklist.domains {
        if domain.completeness >= DOMAIN_COVERED_PERCENT {
            continue;
        }
        for item in &domain.items {
            if item.status == "unknown" {
                gaps.push((
                    priority_rank(domain.priority.as_deref()),
                    domain_key.clone(),
                    item.label.clone(),
                ));
            }
        }
    }
    gaps.sort();
    gaps.truncate(MAX_GAP_ITEMS);

    if gaps.is_empty() {
        return PROFILER_BASE.to_string();
    }

    let mut instructions = String::from(PROFILER_BASE);
    instructions.push_str("\n\nCurrent profiling gaps to explore (in priority order):\n");
    for (_, domain, label) in &gaps {
        instructions.push_str(&format!("- {domain}: {label}\n"));
    }
    instructions.push_str(&format!(
        "\nOverall completeness: {}%. Target: {}%.",
        checklist.overall_completeness, DOMAIN_COVERED_PERCENT
    ));
    instructions
}

/// Startup-time table of the deployed personas.
pub struct PersonaRegistry {
    personas: HashMap<String, PersonaDescriptor>,
    default: PersonaDescriptor,
}

impl PersonaRegistry {
    pub fn load(paths: &PersonaPaths) -> Self {
        let voices = load_voice_table(&paths.voices);
        let voice_id = |persona: &str, fallback: &str| {
            voices
                .personas
                .get(persona)
                .map(|entry| entry.voice_id.clone())
                .unwrap_or_else(|| fallback.to_string())
        };

        let main = PersonaDescriptor {
            id: PERSONA_MAIN.to_string(),
            voice_id: voice_id(PERSONA_MAIN, DEFAULT_MAIN_VOICE),
            instructions: load_soul_instructions(&paths.soul),
            strategy: BackendStrategy::Routed,
            force_deep_mode: false,
        };
        let analyst = PersonaDescriptor {
            id: PERSONA_ANALYST.to_string(),
            voice_id: voice_id(PERSONA_ANALYST, DEFAULT_ANALYST_VOICE),
            instructions: ANALYST_INSTRUCTIONS.to_string(),
            strategy: BackendStrategy::Routed,
            force_deep_mode: true,
        };
        let profiler = PersonaDescriptor {
            id: PERSONA_PROFILER.to_string(),
            voice_id: voice_id(PERSONA_PROFILER, DEFAULT_PROFILER_VOICE),
            instructions: build_profiler_instructions(&paths.profiling_checklist),
            strategy: BackendStrategy::Direct,
            force_deep_mode: false,
        };

        let mut personas = HashMap::new();
        for persona in [main.clone(), analyst, profiler] {
            personas.insert(persona.id.clone(), persona);
        }
        Self {
            personas,
            default: main,
        }
    }

    /// Resolves a persona id to its descriptor. An unknown or empty id
    /// silently becomes the default persona: voice sessions must never
    /// stall waiting on a bad identifier.
    pub fn select(&self, persona_id: Option<&str>) -> &PersonaDescriptor {
        persona_id
            .filter(|id| !id.is_empty())
            .and_then(|id| self.personas.get(id))
            .unwrap_or(&self.default)
    }

    /// Resolves the synthesis voice for a selected persona. The default
    /// persona honors the session's voice preset; dedicated personas keep
    /// their configured voice.
    pub fn voice_for(&self, persona: &PersonaDescriptor, voice_preset: &str) -> String {
        if persona.id == self.default.id && !voice_preset.is_empty() {
            preset_voice_id(voice_preset).to_string()
        } else {
            persona.voice_id.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn paths_in(dir: &Path) -> PersonaPaths {
        PersonaPaths {
            voices: dir.join("voices.json"),
            soul: dir.join("soul.md"),
            profiling_checklist: dir.join("profiling-checklist.json"),
        }
    }

    #[test]
    fn unknown_persona_resolves_to_default() {
        let dir = tempdir().expect("tempdir");
        let registry = PersonaRegistry::load(&paths_in(dir.path()));

        assert_eq!(registry.select(Some("nitara-ghost")).id, PERSONA_MAIN);
        assert_eq!(registry.select(Some("")).id, PERSONA_MAIN);
        assert_eq!(registry.select(None).id, PERSONA_MAIN);
    }

    #[test]
    fn known_personas_resolve_with_their_strategy() {
        let dir = tempdir().expect("tempdir");
        let registry = PersonaRegistry::load(&paths_in(dir.path()));

        let analyst = registry.select(Some(PERSONA_ANALYST));
        assert_eq!(analyst.strategy, BackendStrategy::Routed);
        assert!(analyst.force_deep_mode);

        let profiler = registry.select(Some(PERSONA_PROFILER));
        assert_eq!(profiler.strategy, BackendStrategy::Direct);
        assert!(!profiler.force_deep_mode);
    }

    #[test]
    fn missing_soul_falls_back_to_builtin_instructions() {
        let dir = tempdir().expect("tempdir");
        let registry = PersonaRegistry::load(&paths_in(dir.path()));

        assert_eq!(registry.select(None).instructions, FALLBACK_SOUL);
    }

    #[test]
    fn soul_document_is_framed_with_the_voice_preamble() {
        let dir = tempdir().expect("tempdir");
        let paths = paths_in(dir.path());
        let mut soul = std::fs::File::create(&paths.soul).expect("create soul");
        write!(soul, "Calm intensity. Dry humor.").expect("write soul");

        let registry = PersonaRegistry::load(&paths);
        let instructions = &registry.select(None).instructions;
        assert!(instructions.starts_with("You are Nitara, an AI business partner."));
        assert!(instructions.ends_with("Calm intensity. Dry humor."));
    }

    #[test]
    fn voice_table_overrides_builtin_voice_ids() {
        let dir = tempdir().expect("tempdir");
        let paths = paths_in(dir.path());
        std::fs::write(
            &paths.voices,
            r#"{"personas":{"nitara-analyst":{"voice_id":"custom-voice"}}}"#,
        )
        .expect("write voices");

        let registry = PersonaRegistry::load(&paths);
        assert_eq!(
            registry.select(Some(PERSONA_ANALYST)).voice_id,
            "custom-voice"
        );
        assert_eq!(registry.select(None).voice_id, DEFAULT_MAIN_VOICE);
    }

    #[test]
    fn default_persona_honors_the_voice_preset() {
        let dir = tempdir().expect("tempdir");
        let registry = PersonaRegistry::load(&paths_in(dir.path()));

        let main = registry.select(None);
        assert_eq!(registry.voice_for(main, "atlas"), DEFAULT_ANALYST_VOICE);

        let profiler = registry.select(Some(PERSONA_PROFILER));
        assert_eq!(
            registry.voice_for(profiler, "atlas"),
            DEFAULT_PROFILER_VOICE
        );
    }

    #[test]
    fn unknown_preset_maps_to_the_warm_default_voice() {
        assert_eq!(preset_voice_id("nova"), DEFAULT_MAIN_VOICE);
        assert_eq!(preset_voice_id("NOVA"), DEFAULT_MAIN_VOICE);
        assert_eq!(preset_voice_id("whatever"), DEFAULT_MAIN_VOICE);
    }

    #[test]
    fn profiler_instructions_list_gaps_in_priority_order() {
        let dir = tempdir().expect("tempdir");
        let paths = paths_in(dir.path());
        std::fs::write(
            &paths.profiling_checklist,
            r#"{
                "overall_completeness": 42,
                "domains": {
                    "network_intelligence": {
                        "completeness": 10,
                        "priority": "medium",
                        "items": [{"label": "Key advisors", "status": "unknown"}]
                    },
                    "financial_reality": {
                        "completeness": 20,
                        "priority": "critical",
                        "items": [
                            {"label": "Monthly burn", "status": "unknown"},
                            {"label": "Runway", "status": "known"}
                        ]
                    },
                    "portfolio_depth": {
                        "completeness": 95,
                        "priority": "critical",
                        "items": [{"label": "Ignored because covered", "status": "unknown"}]
                    }
                }
            }"#,
        )
        .expect("write checklist");

        let registry = PersonaRegistry::load(&paths);
        let instructions = &registry.select(Some(PERSONA_PROFILER)).instructions;

        let burn = instructions.find("financial_reality: Monthly burn").expect("burn gap");
        let advisors = instructions
            .find("network_intelligence: Key advisors")
            .expect("advisors gap");
        assert!(burn < advisors, "critical gaps come first");
        assert!(!instructions.contains("Runway"), "known items are not gaps");
        assert!(
            !instructions.contains("Ignored because covered"),
            "covered domains contribute nothing"
        );
        assert!(instructions.contains("Overall completeness: 42%. Target: 80%."));
    }

    #[test]
    fn profiler_instructions_cap_the_gap_list() {
        let dir = tempdir().expect("tempdir");
        let paths = paths_in(dir.path());
        let items: Vec<String> = (0..8)
            .map(|i| format!(r#"{{"label": "Item {i}", "status": "unknown"}}"#))
            .collect();
        std::fs::write(
            &paths.profiling_checklist,
            format!(
                r#"{{"overall_completeness": 5, "domains": {{"founder_identity": {{
                    "completeness": 0, "priority": "high", "items": [{}]
                }}}}}}"#,
                items.join(",")
            ),
        )
        .expect("write checklist");

        let registry = PersonaRegistry::load(&paths);
        let instructions = &registry.select(Some(PERSONA_PROFILER)).instructions;
        let listed = instructions.matches("- founder_identity:").count();
        assert_eq!(listed, 5);
    }

    #[test]
    fn corrupt_checklist_yields_base_instructions() {
        let dir = tempdir().expect("tempdir");
        let paths = paths_in(dir.path());
        std::fs::write(&paths.profiling_checklist, "{broken").expect("write checklist");

        let registry = PersonaRegistry::load(&paths);
        assert_eq!(registry.select(Some(PERSONA_PROFILER)).instructions, PROFILER_BASE);
    }
}

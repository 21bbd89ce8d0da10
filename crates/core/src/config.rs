//! Application configuration.
//!
//! Centralizes everything loaded from the environment and provides a
//! single, shareable struct passed into component constructors at startup.
//! No process-wide mutable state: components receive the values they need.

use crate::persona::PersonaPaths;
use secrecy::SecretString;
use std::env;
use std::path::PathBuf;
use thiserror::Error;
use tracing::Level;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    MissingVar(String),
    #[error("invalid log level provided for RUST_LOG: {0}")]
    InvalidLogLevel(String),
}

/// Gateway used by direct-strategy personas.
#[derive(Debug, Clone)]
pub struct DirectLlmConfig {
    pub base_url: String,
    pub api_key: SecretString,
    pub model: String,
}

/// Holds all configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub backend_url: String,
    pub host_ws_url: String,
    pub host_token: Option<SecretString>,
    pub deepgram_api_key: Option<SecretString>,
    pub direct_llm: Option<DirectLlmConfig>,
    pub soul_path: PathBuf,
    pub voices_path: PathBuf,
    pub profiling_checklist_path: PathBuf,
    pub log_level: Level,
}

fn optional_secret(name: &str) -> Option<SecretString> {
    env::var(name)
        .ok()
        .filter(|value| !value.is_empty())
        .map(SecretString::from)
}

impl AgentConfig {
    /// Loads configuration from environment variables.
    ///
    // *   `HOST_WS_URL`: worker socket of the host runtime. Required.
    // *   `HOST_TOKEN`: (Optional) bearer token for the host runtime link.
    // *   `BACKEND_URL`: (Optional) orchestrator base URL. Defaults to "http://localhost:3001".
    // *   `DEEPGRAM_API_KEY`: (Optional) enables the ranked Deepgram recognizers.
    // *   `DIRECT_LLM_BASE_URL` / `DIRECT_LLM_API_KEY`: (Optional, as a pair) chat gateway
    //     for direct-strategy personas. Without them those personas fall back to the
    //     shared orchestrator.
    // *   `DIRECT_LLM_MODEL`: (Optional) model for the direct gateway.
    // *   `SOUL_PATH`, `VOICES_PATH`, `PROFILING_CHECKLIST_PATH`: (Optional) persona data
    //     files. Default to the `config/` directory.
    // *   `RUST_LOG`: (Optional) the logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file. Useful for local development, ignored if not present.
        dotenvy::dotenv().ok();

        let host_ws_url = env::var("HOST_WS_URL")
            .map_err(|_| ConfigError::MissingVar("HOST_WS_URL".to_string()))?;

        let backend_url =
            env::var("BACKEND_URL").unwrap_or_else(|_| "http://localhost:3001".to_string());

        let direct_llm = match (
            env::var("DIRECT_LLM_BASE_URL").ok().filter(|v| !v.is_empty()),
            optional_secret("DIRECT_LLM_API_KEY"),
        ) {
            (Some(base_url), Some(api_key)) => Some(DirectLlmConfig {
                base_url,
                api_key,
                model: env::var("DIRECT_LLM_MODEL")
                    .unwrap_or_else(|_| "claude-sonnet-4-20250514".to_string()),
            }),
            _ => None,
        };

        let path_or = |name: &str, default: &str| {
            env::var(name)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(default))
        };

        let log_level_str = env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidLogLevel(log_level_str))?;

        Ok(Self {
            backend_url,
            host_ws_url,
            host_token: optional_secret("HOST_TOKEN"),
            deepgram_api_key: optional_secret("DEEPGRAM_API_KEY"),
            direct_llm,
            soul_path: path_or("SOUL_PATH", "config/soul.md"),
            voices_path: path_or("VOICES_PATH", "config/voices.json"),
            profiling_checklist_path: path_or(
                "PROFILING_CHECKLIST_PATH",
                "config/profiling-checklist.json",
            ),
            log_level,
        })
    }

    pub fn persona_paths(&self) -> PersonaPaths {
        PersonaPaths {
            voices: self.voices_path.clone(),
            soul: self.soul_path.clone(),
            profiling_checklist: self.profiling_checklist_path.clone(),
        }
    }
}

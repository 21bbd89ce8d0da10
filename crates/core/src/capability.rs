//! Speech-recognition capability negotiation.
//!
//! Recognition is supplied by swappable providers of varying sophistication.
//! Candidates live in a static, ordered registry (most capable first) and
//! expose a uniform construction contract; negotiation walks the chain and
//! settles on the first candidate that constructs. An exhausted chain is not
//! an error: the host runtime's built-in recognizer applies, and session
//! start is never blocked.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

/// Ranked levels of speech-recognition sophistication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SttTier {
    /// The recognition stream itself detects end of turn.
    Streaming,
    /// Voice-activity detection only.
    VoiceActivity,
}

#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("provider `{0}` is not configured")]
    ProviderUnavailable(String),
    #[error("required keyword-boost data is missing")]
    MissingAux,
    #[error("provider `{provider}` rejected model `{model}`: {reason}")]
    InitFailed {
        provider: String,
        model: String,
        reason: String,
    },
}

/// A constructed recognizer choice, handed to the host runtime.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RecognizerSpec {
    pub provider: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub boost_keywords: Vec<String>,
}

/// Uniform construction contract for one ranked capability candidate.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SttFactory: Send + Sync {
    fn provider(&self) -> &str;
    fn model(&self) -> &str;
    fn tier(&self) -> SttTier;

    /// Attempts construction. May perform network-dependent initialization
    /// and is allowed to fail; the negotiator falls through on failure.
    async fn build(&self, keywords: &[String]) -> Result<RecognizerSpec, CapabilityError>;
}

/// Outcome of capability negotiation.
#[derive(Debug, Clone, PartialEq)]
pub enum SttSelection {
    Provider { spec: RecognizerSpec, tier: SttTier },
    /// Every ranked candidate failed; the host runtime's built-in
    /// recognizer applies.
    HostDefault,
}

impl SttSelection {
    /// Tier used for turn-taking configuration. The host default is assumed
    /// to behave like the voice-activity tier.
    pub fn tier(&self) -> SttTier {
        match self {
            SttSelection::Provider { tier, .. } => *tier,
            SttSelection::HostDefault => SttTier::VoiceActivity,
        }
    }

    pub fn into_spec(self) -> Option<RecognizerSpec> {
        match self {
            SttSelection::Provider { spec, .. } => Some(spec),
            SttSelection::HostDefault => None,
        }
    }
}

/// Ordered, most-capable-first table of recognizer candidates.
pub struct CapabilityRegistry {
    candidates: Vec<Box<dyn SttFactory>>,
}

impl CapabilityRegistry {
    pub fn new(candidates: Vec<Box<dyn SttFactory>>) -> Self {
        Self { candidates }
    }

    /// Attempts each candidate at most once, in rank order, with no
    /// retries, and returns the first success. The returned tier is always
    /// the highest-ranked tier whose construction succeeded, or the
    /// host-default sentinel if none did.
    pub async fn negotiate(&self, keywords: &[String]) -> SttSelection {
        for candidate in &self.candidates {
            match candidate.build(keywords).await {
                Ok(spec) => {
                    tracing::info!(
                        provider = candidate.provider(),
                        model = candidate.model(),
                        "selected speech recognizer"
                    );
                    return SttSelection::Provider {
                        spec,
                        tier: candidate.tier(),
                    };
                }
                Err(e) => {
                    tracing::warn!(
                        provider = candidate.provider(),
                        model = candidate.model(),
                        "recognizer init failed, falling through: {e}"
                    );
                }
            }
        }
        tracing::warn!("no ranked recognizer available; using host runtime default");
        SttSelection::HostDefault
    }
}

/// Strips boost-entry weight suffixes (`word:level`) and drops empties.
pub fn clean_keywords(raw: &[String]) -> Vec<String> {
    raw.iter()
        .filter_map(|keyword| keyword.split(':').next())
        .filter(|keyword| !keyword.is_empty())
        .map(str::to_string)
        .collect()
}

/// Deepgram-hosted recognizer candidate. Both deployed models require the
/// provider credential and a non-empty boost-keyword list to construct.
pub struct DeepgramFactory {
    api_key: Option<SecretString>,
    model: String,
    language: Option<String>,
    tier: SttTier,
}

impl DeepgramFactory {
    /// Streaming end-of-turn recognizer; the top-ranked candidate.
    pub fn flux(api_key: Option<SecretString>) -> Self {
        Self {
            api_key,
            model: "flux-general-en".to_string(),
            language: None,
            tier: SttTier::Streaming,
        }
    }

    /// Keyword-boosted VAD recognizer; the fallback candidate.
    pub fn nova(api_key: Option<SecretString>) -> Self {
        Self {
            api_key,
            model: "nova-3".to_string(),
            language: Some("en".to_string()),
            tier: SttTier::VoiceActivity,
        }
    }
}

#[async_trait]
impl SttFactory for DeepgramFactory {
    fn provider(&self) -> &str {
        "deepgram"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn tier(&self) -> SttTier {
        self.tier
    }

    async fn build(&self, keywords: &[String]) -> Result<RecognizerSpec, CapabilityError> {
        let configured = self
            .api_key
            .as_ref()
            .is_some_and(|key| !key.expose_secret().is_empty());
        if !configured {
            return Err(CapabilityError::ProviderUnavailable(
                self.provider().to_string(),
            ));
        }
        if keywords.is_empty() {
            return Err(CapabilityError::MissingAux);
        }
        Ok(RecognizerSpec {
            provider: self.provider().to_string(),
            model: self.model.clone(),
            language: self.language.clone(),
            boost_keywords: keywords.to_vec(),
        })
    }
}

/// The deployed candidate ranking, most capable first.
pub fn default_registry(api_key: Option<SecretString>) -> CapabilityRegistry {
    CapabilityRegistry::new(vec![
        Box::new(DeepgramFactory::flux(api_key.clone())),
        Box::new(DeepgramFactory::nova(api_key)),
    ])
}

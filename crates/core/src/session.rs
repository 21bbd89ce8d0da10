//! Turn-taking configuration.
//!
//! Endpointing is derived from the negotiated recognition tier and the
//! channel a session arrived over. Streaming recognizers report end of turn
//! themselves, so they get fast asymmetric thresholds; VAD-only tiers wait
//! longer before closing a turn.

use crate::capability::SttTier;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How the host runtime decides a turn has ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TurnDetectionMode {
    /// Driven by the recognition stream's own end-of-turn signal.
    #[serde(rename = "stt")]
    Recognizer,
    /// Voice-activity detection only.
    #[serde(rename = "vad")]
    VoiceActivity,
}

/// The transport a session arrived over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    /// Web or in-app session.
    #[default]
    Interactive,
    /// Inbound or outbound phone call.
    Telephony,
}

/// Endpointing parameters handed to the host runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnTakingParams {
    pub mode: TurnDetectionMode,
    pub min_endpointing_delay: Duration,
    pub max_endpointing_delay: Duration,
}

/// Derives turn-taking parameters from tier and channel. Telephony raises
/// the minimum silence threshold to absorb PSTN jitter.
pub fn turn_taking_params(tier: SttTier, channel: ChannelKind) -> TurnTakingParams {
    match (tier, channel) {
        (SttTier::Streaming, ChannelKind::Interactive) => TurnTakingParams {
            mode: TurnDetectionMode::Recognizer,
            min_endpointing_delay: Duration::from_millis(300),
            max_endpointing_delay: Duration::from_secs(3),
        },
        (SttTier::Streaming, ChannelKind::Telephony) => TurnTakingParams {
            mode: TurnDetectionMode::Recognizer,
            min_endpointing_delay: Duration::from_millis(500),
            max_endpointing_delay: Duration::from_secs(3),
        },
        (SttTier::VoiceActivity, ChannelKind::Interactive) => TurnTakingParams {
            mode: TurnDetectionMode::VoiceActivity,
            min_endpointing_delay: Duration::from_millis(500),
            max_endpointing_delay: Duration::from_secs(5),
        },
        (SttTier::VoiceActivity, ChannelKind::Telephony) => TurnTakingParams {
            mode: TurnDetectionMode::VoiceActivity,
            min_endpointing_delay: Duration::from_millis(800),
            max_endpointing_delay: Duration::from_secs(5),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streaming_tier_uses_fast_recognizer_driven_endpointing() {
        let params = turn_taking_params(SttTier::Streaming, ChannelKind::Interactive);
        assert_eq!(params.mode, TurnDetectionMode::Recognizer);
        assert_eq!(params.min_endpointing_delay, Duration::from_millis(300));
        assert_eq!(params.max_endpointing_delay, Duration::from_secs(3));
    }

    #[test]
    fn vad_tier_waits_longer() {
        let params = turn_taking_params(SttTier::VoiceActivity, ChannelKind::Interactive);
        assert_eq!(params.mode, TurnDetectionMode::VoiceActivity);
        assert_eq!(params.min_endpointing_delay, Duration::from_millis(500));
        assert_eq!(params.max_endpointing_delay, Duration::from_secs(5));
    }

    #[test]
    fn telephony_raises_the_minimum_threshold() {
        let streaming = turn_taking_params(SttTier::Streaming, ChannelKind::Telephony);
        assert_eq!(streaming.min_endpointing_delay, Duration::from_millis(500));
        assert_eq!(streaming.mode, TurnDetectionMode::Recognizer);

        let vad = turn_taking_params(SttTier::VoiceActivity, ChannelKind::Telephony);
        assert_eq!(vad.min_endpointing_delay, Duration::from_millis(800));
        assert_eq!(vad.max_endpointing_delay, Duration::from_secs(5));
    }
}

//! Speech synthesis and the on-disk speech cache
//!
//! Synthesizers turn text into encoded audio. The cache sits in front of
//! them so every distinct utterance is synthesized once and replayed from
//! disk afterwards, including across restarts.

mod azure;
mod cache;
mod command;

use async_trait::async_trait;

use crate::Result;

pub use azure::{AzureSynthesizer, build_ssml};
pub use cache::{CacheKey, DEFAULT_SYNTHESIS_TIMEOUT, SpeechCache, WarmSummary, normalize_text};
pub use command::{CommandSynthesizer, DEFAULT_PROGRAM as DEFAULT_SYNTH_PROGRAM};

/// Default Azure output format (16 kHz mono WAV)
pub const DEFAULT_OUTPUT_FORMAT: &str = "riff-16khz-16bit-mono-pcm";

/// Every parameter that changes the rendered audio
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VoiceParams {
    /// BCP-47 language tag (e.g. "en-US")
    pub language: String,
    /// Voice gender ("Female", "Male")
    pub gender: String,
    /// Voice name (e.g. "en-US-JennyNeural")
    pub voice: String,
    /// Output encoding requested from the synthesizer
    pub output_format: String,
}

impl Default for VoiceParams {
    fn default() -> Self {
        Self {
            language: "en-US".to_string(),
            gender: "Female".to_string(),
            voice: "en-US-JennyNeural".to_string(),
            output_format: DEFAULT_OUTPUT_FORMAT.to_string(),
        }
    }
}

impl VoiceParams {
    /// File extension matching the output format
    #[must_use]
    pub fn extension(&self) -> &'static str {
        let format = self.output_format.to_ascii_lowercase();
        if format.starts_with("riff-") || format.ends_with("wav") {
            "wav"
        } else if format.contains("mp3") {
            "mp3"
        } else if format.starts_with("ogg-") {
            "ogg"
        } else if format.starts_with("webm-") {
            "webm"
        } else {
            "audio"
        }
    }
}

/// Text-to-speech backend
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize `text` with the given voice
    ///
    /// # Errors
    ///
    /// Returns error on transport, authentication, or server failure
    async fn synthesize(&self, text: &str, params: &VoiceParams) -> Result<Vec<u8>>;

    /// Backend name for logs
    fn name(&self) -> &'static str;

    /// Identifies everything about the backend that changes the rendered
    /// audio beyond [`VoiceParams`]; part of every cache key
    fn fingerprint(&self) -> String {
        self.name().to_string()
    }
}

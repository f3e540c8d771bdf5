//! Content-addressed speech cache
//!
//! Artifacts live at `<dir>/<sha256 hex>.<ext>`. An artifact, once written,
//! is valid forever; writes go through a temp file and an atomic rename so a
//! failed or interrupted synthesis never leaves a partial entry behind.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};

use super::{Synthesizer, VoiceParams};
use crate::{Error, Result};

/// Default bound on a single synthesis call
pub const DEFAULT_SYNTHESIS_TIMEOUT: Duration = Duration::from_secs(15);

/// Bumped whenever the canonical encoding changes
const KEY_VERSION: &str = "tipster-speech-v2";

/// Trim and collapse whitespace runs to a single space
#[must_use]
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Stable digest of an utterance
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for `text` spoken with `params` by the synthesizer
    /// identified by `fingerprint`
    ///
    /// Every field is length-prefixed in a fixed order, so no choice of
    /// field contents can make two different utterances encode the same.
    #[must_use]
    pub fn derive(text: &str, params: &VoiceParams, fingerprint: &str) -> Self {
        let text = normalize_text(text);
        let fields: [(&str, &str); 6] = [
            ("text", &text),
            ("language", &params.language),
            ("gender", &params.gender),
            ("voice", &params.voice),
            ("format", &params.output_format),
            ("synthesizer", fingerprint),
        ];

        let mut hasher = Sha256::new();
        hasher.update(KEY_VERSION.as_bytes());
        hasher.update(b"\n");
        for (name, value) in fields {
            hasher.update(format!("{name}:{}:", value.len()).as_bytes());
            hasher.update(value.as_bytes());
            hasher.update(b"\n");
        }

        Self(hex::encode(hasher.finalize()))
    }

    /// Hex digest
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of [`SpeechCache::warm`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WarmSummary {
    /// Already present, including repeats within the same batch
    pub cached: usize,
    /// Newly synthesized
    pub written: usize,
    /// Synthesis failed
    pub failed: usize,
}

/// Memoizes synthesis results on disk
pub struct SpeechCache {
    dir: PathBuf,
    synthesizer: Arc<dyn Synthesizer>,
    fingerprint: String,
    timeout: Duration,
}

impl SpeechCache {
    /// Create a cache rooted at `dir`, creating the directory if needed
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created
    pub fn new(dir: impl Into<PathBuf>, synthesizer: Arc<dyn Synthesizer>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        Ok(Self {
            dir,
            fingerprint: synthesizer.fingerprint(),
            synthesizer,
            timeout: DEFAULT_SYNTHESIS_TIMEOUT,
        })
    }

    /// Override the synthesis timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Cache directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Fingerprint of the synthesizer behind this cache
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Artifact path for an utterance, whether or not it exists yet
    #[must_use]
    pub fn path_for(&self, text: &str, params: &VoiceParams) -> PathBuf {
        let key = CacheKey::derive(text, params, &self.fingerprint);
        self.dir.join(format!("{key}.{}", params.extension()))
    }

    /// Whether an utterance is already cached
    #[must_use]
    pub fn contains(&self, text: &str, params: &VoiceParams) -> bool {
        is_valid_artifact(&self.path_for(text, params))
    }

    /// Return the cached artifact for `text`, synthesizing it on a miss
    ///
    /// # Errors
    ///
    /// Returns `Error::Synthesis` if the synthesizer fails, times out, or
    /// returns no audio. Nothing is written to the cache in that case.
    pub async fn speak(&self, text: &str, params: &VoiceParams) -> Result<PathBuf> {
        let path = self.path_for(text, params);

        if is_valid_artifact(&path) {
            tracing::debug!(path = %path.display(), "speech cache hit");
            return Ok(path);
        }

        tracing::info!(
            backend = self.synthesizer.name(),
            voice = %params.voice,
            "speech cache miss, synthesizing"
        );

        let spoken = normalize_text(text);
        let audio = tokio::time::timeout(
            self.timeout,
            self.synthesizer.synthesize(&spoken, params),
        )
        .await
        .map_err(|_| {
            Error::Synthesis(format!(
                "synthesis timed out after {}ms",
                self.timeout.as_millis()
            ))
        })?
        .map_err(|e| match e {
            Error::Synthesis(_) => e,
            other => Error::Synthesis(other.to_string()),
        })?;

        if audio.is_empty() {
            return Err(Error::Synthesis("synthesizer returned no audio".to_string()));
        }

        self.persist(&path, &audio)?;
        tracing::debug!(path = %path.display(), bytes = audio.len(), "cached speech");
        Ok(path)
    }

    /// Synthesize every text not yet cached
    ///
    /// Failures are logged and skipped so one bad utterance does not block
    /// the rest. Texts sharing an artifact with an earlier one count as cached.
    pub async fn warm<'a, I>(&self, texts: I, params: &VoiceParams) -> WarmSummary
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut summary = WarmSummary::default();
        for text in texts {
            if self.contains(text, params) {
                summary.cached += 1;
                continue;
            }
            match self.speak(text, params).await {
                Ok(_) => summary.written += 1,
                Err(e) => {
                    tracing::warn!(error = %e, text, "failed to warm cache entry");
                    summary.failed += 1;
                }
            }
        }
        summary
    }

    fn persist(&self, path: &Path, audio: &[u8]) -> Result<()> {
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(audio)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }
}

fn is_valid_artifact(path: &Path) -> bool {
    std::fs::metadata(path).is_ok_and(|m| m.is_file() && m.len() > 0)
}

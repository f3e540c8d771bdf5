//! Local synthesizer driven through an external command
//!
//! The command must write encoded audio to stdout. Arguments may contain the
//! placeholders `{text}`, `{voice}`, `{language}` and `{gender}`.

use async_trait::async_trait;
use tokio::process::Command;

use super::{Synthesizer, VoiceParams};
use crate::{Error, Result};

/// Default local synthesizer program
pub const DEFAULT_PROGRAM: &str = "espeak-ng";

/// Runs a local TTS program per utterance
#[derive(Debug, Clone)]
pub struct CommandSynthesizer {
    program: String,
    args: Vec<String>,
}

impl Default for CommandSynthesizer {
    fn default() -> Self {
        Self::new(
            DEFAULT_PROGRAM,
            vec![
                "--stdout".to_string(),
                "-v".to_string(),
                "{language}".to_string(),
                "{text}".to_string(),
            ],
        )
    }
}

impl CommandSynthesizer {
    /// Create a synthesizer for `program` with argument templates
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Arguments with placeholders substituted
    #[must_use]
    pub fn render_args(&self, text: &str, params: &VoiceParams) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{voice}", &params.voice)
                    .replace("{language}", &params.language)
                    .replace("{gender}", &params.gender)
                    // Substituted last so tip text can never inject a placeholder
                    .replace("{text}", text)
            })
            .collect()
    }
}

#[async_trait]
impl Synthesizer for CommandSynthesizer {
    async fn synthesize(&self, text: &str, params: &VoiceParams) -> Result<Vec<u8>> {
        let args = self.render_args(text, params);
        tracing::debug!(program = %self.program, "running local synthesizer");

        let output = Command::new(&self.program)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::Synthesis(format!("failed to run {}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Synthesis(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        Ok(output.stdout)
    }

    fn name(&self) -> &'static str {
        "command"
    }

    fn fingerprint(&self) -> String {
        format!("command:{:?}:{:?}", self.program, self.args)
    }
}

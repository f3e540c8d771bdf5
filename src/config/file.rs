//! TOML configuration file loading
//!
//! Supports `~/.config/tipster/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{Error, Result};

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TipsterConfigFile {
    /// Path to the tips file
    pub tips_path: Option<PathBuf>,

    /// Speech cache directory
    pub cache_dir: Option<PathBuf>,

    /// Warning sound played on early presses
    pub warning_sound: Option<PathBuf>,

    /// Timing configuration
    #[serde(default)]
    pub timing: TimingFileConfig,

    /// GPIO configuration
    #[serde(default)]
    pub gpio: GpioFileConfig,

    /// Speech synthesis configuration
    #[serde(default)]
    pub speech: SpeechFileConfig,

    /// Playback configuration
    #[serde(default)]
    pub playback: PlaybackFileConfig,
}

/// Cooldown and sampling timing, all in milliseconds
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimingFileConfig {
    pub cooldown_ms: Option<u64>,
    pub penalty_ms: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub debounce_ms: Option<u64>,
}

/// Pin assignment
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GpioFileConfig {
    /// "sysfs" or "rpi"
    pub backend: Option<String>,
    pub button_pin: Option<u8>,
    pub led_pin: Option<u8>,
    pub button_active_low: Option<bool>,
    /// Button has its own pull resistor (required for active-low on sysfs)
    pub external_pull: Option<bool>,
}

/// Synthesizer selection and voice
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpeechFileConfig {
    /// "azure" or "command"
    pub backend: Option<String>,
    pub region: Option<String>,
    pub subscription_key: Option<String>,
    pub language: Option<String>,
    pub gender: Option<String>,
    pub voice: Option<String>,
    pub output_format: Option<String>,
    pub timeout_ms: Option<u64>,
    /// Local synthesizer program and argument templates
    pub command: Option<Vec<String>>,
}

/// Audio output
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlaybackFileConfig {
    /// "command" or "native"
    pub backend: Option<String>,
    /// Player program and arguments; the file path is appended
    pub command: Option<Vec<String>>,
    /// Mixer control adjusted at startup (e.g. "PCM")
    pub mixer_control: Option<String>,
    /// Value passed to `amixer set <control> --`
    pub volume: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `TipsterConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> TipsterConfigFile {
    let Some(path) = config_file_path() else {
        return TipsterConfigFile::default();
    };

    if !path.exists() {
        return TipsterConfigFile::default();
    }

    match read_config_file(&path) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            TipsterConfigFile::default()
        }
    }
}

/// Read and parse a specific config file
///
/// # Errors
///
/// Returns error if the file cannot be read or is not valid TOML
pub fn read_config_file(path: &Path) -> Result<TipsterConfigFile> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
    let config = toml::from_str(&content)?;
    tracing::info!(path = %path.display(), "loaded config file");
    Ok(config)
}

/// Return the config file path: `~/.config/tipster/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("tipster").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_file() {
        let config: TipsterConfigFile = toml::from_str(
            r#"
            tips_path = "/opt/fencingtips/tips.txt"

            [timing]
            cooldown_ms = 12000

            [speech]
            backend = "command"
            command = ["pico2wave", "--wave=/dev/stdout", "{text}"]
            "#,
        )
        .unwrap();

        assert_eq!(config.tips_path, Some(PathBuf::from("/opt/fencingtips/tips.txt")));
        assert_eq!(config.timing.cooldown_ms, Some(12000));
        assert_eq!(config.timing.penalty_ms, None);
        assert_eq!(config.speech.backend.as_deref(), Some("command"));
        assert_eq!(config.speech.command.unwrap().len(), 3);
    }

    #[test]
    fn empty_file_is_default() {
        let config: TipsterConfigFile = toml::from_str("").unwrap();
        assert!(config.cache_dir.is_none());
        assert!(config.gpio.button_pin.is_none());
    }

    #[test]
    fn rejects_unknown_keys() {
        let result: std::result::Result<TipsterConfigFile, _> = toml::from_str("colour = 1");
        assert!(result.is_err());
    }

    #[test]
    fn read_reports_missing_file() {
        let err = read_config_file(Path::new("/nonexistent/config.toml")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}

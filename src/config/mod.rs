//! Configuration management for the tipster appliance
//!
//! Values are layered env > TOML file > defaults.

pub mod file;

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::gpio::Wiring;
use crate::speech::VoiceParams;
use crate::{Error, Result};

use file::TipsterConfigFile;

/// Appliance configuration
#[derive(Debug)]
pub struct Config {
    /// Pipe-delimited tips file
    pub tips_path: PathBuf,

    /// Directory of cached speech artifacts
    pub cache_dir: PathBuf,

    /// Sound played on early presses and failed tips
    pub warning_sound: PathBuf,

    /// Cooldown and sampling timing
    pub timing: TimingConfig,

    /// Button and LED wiring
    pub gpio: GpioConfig,

    /// Speech synthesis
    pub speech: SpeechConfig,

    /// Audio output
    pub playback: PlaybackConfig,
}

/// Cooldown and sampling timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingConfig {
    /// Cooldown after an accepted press
    pub base_cooldown: Duration,
    /// Extension per early press
    pub penalty: Duration,
    /// Delay between button samples
    pub poll_interval: Duration,
    /// Time a button level must hold before it counts
    pub debounce: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            base_cooldown: crate::cooldown::DEFAULT_BASE_COOLDOWN,
            penalty: crate::cooldown::DEFAULT_PENALTY,
            poll_interval: Duration::from_millis(5),
            debounce: crate::button::DEFAULT_DEBOUNCE,
        }
    }
}

/// GPIO driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpioBackend {
    /// Linux `/sys/class/gpio`
    Sysfs,
    /// Raspberry Pi peripheral via `rppal`
    Rpi,
}

impl Default for GpioBackend {
    /// `rppal` when built in, since only it can enable the button pull-up
    fn default() -> Self {
        if cfg!(feature = "rpi") {
            Self::Rpi
        } else {
            Self::Sysfs
        }
    }
}

impl FromStr for GpioBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sysfs" => Ok(Self::Sysfs),
            "rpi" | "rppal" => Ok(Self::Rpi),
            other => Err(Error::Config(format!("unknown gpio backend: {other}"))),
        }
    }
}

/// GPIO configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct GpioConfig {
    /// Driver
    pub backend: GpioBackend,
    /// Pins and polarity
    pub wiring: Wiring,
}

/// Synthesizer selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpeechBackend {
    /// Azure Cognitive Services
    #[default]
    Azure,
    /// Local command such as `espeak-ng`
    Command,
}

impl FromStr for SpeechBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "azure" => Ok(Self::Azure),
            "command" | "local" => Ok(Self::Command),
            other => Err(Error::Config(format!("unknown speech backend: {other}"))),
        }
    }
}

/// Speech synthesis configuration
#[derive(Debug)]
pub struct SpeechConfig {
    /// Synthesizer
    pub backend: SpeechBackend,
    /// Azure region (from `AZURE_SPEECH_REGION`)
    pub region: Option<String>,
    /// Azure subscription key (from `AZURE_SPEECH_KEY`)
    pub subscription_key: Option<SecretString>,
    /// Voice parameters; all of them feed the cache key
    pub voice: VoiceParams,
    /// Bound on a single synthesis call
    pub timeout: Duration,
    /// Local synthesizer program followed by argument templates
    pub command: Option<Vec<String>>,
}

/// Audio output driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackBackend {
    /// External player such as `aplay`
    #[default]
    Command,
    /// In-process `cpal` output
    Native,
}

impl FromStr for PlaybackBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "command" => Ok(Self::Command),
            "native" | "cpal" => Ok(Self::Native),
            other => Err(Error::Config(format!("unknown playback backend: {other}"))),
        }
    }
}

/// Audio output configuration
#[derive(Debug, Clone, Default)]
pub struct PlaybackConfig {
    /// Player
    pub backend: PlaybackBackend,
    /// Player program and arguments
    pub command: Option<Vec<String>>,
    /// Mixer control for the startup volume
    pub mixer_control: String,
    /// Startup volume, left untouched when unset
    pub volume: Option<String>,
}

/// Return the data directory: `~/.local/share/tipster` on Linux
fn data_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map_or_else(|| PathBuf::from("."), |d| d.data_dir().join("tipster"))
}

/// Return the speech cache directory: `~/.cache/tipster/speech` on Linux
fn default_cache_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from(".cache/tipster/speech"),
        |d| d.cache_dir().join("tipster").join("speech"),
    )
}

impl Config {
    /// Load configuration from the environment and config file
    ///
    /// An explicit `path` must exist and parse; the default path is optional.
    ///
    /// # Errors
    ///
    /// Returns error if an explicit config file is unreadable or any value is invalid
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let fc = match path {
            Some(path) => file::read_config_file(path)?,
            None => file::load_config_file(),
        };
        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Build configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if a backend name or timing value is invalid
    pub fn from_sources<F>(fc: TipsterConfigFile, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = data_dir();

        let tips_path = env("TIPSTER_TIPS_PATH")
            .map(PathBuf::from)
            .or(fc.tips_path)
            .unwrap_or_else(|| data_dir.join("tips.txt"));
        let cache_dir = env("TIPSTER_CACHE_DIR")
            .map(PathBuf::from)
            .or(fc.cache_dir)
            .unwrap_or_else(default_cache_dir);
        let warning_sound = env("TIPSTER_WARNING_SOUND")
            .map(PathBuf::from)
            .or(fc.warning_sound)
            .unwrap_or_else(|| data_dir.join("alarm.wav"));

        // Timing (toml > default)
        let defaults = TimingConfig::default();
        let ms =
            |value: Option<u64>, default: Duration| value.map_or(default, Duration::from_millis);
        let timing = TimingConfig {
            base_cooldown: ms(fc.timing.cooldown_ms, defaults.base_cooldown),
            penalty: ms(fc.timing.penalty_ms, defaults.penalty),
            poll_interval: ms(fc.timing.poll_interval_ms, defaults.poll_interval),
            debounce: ms(fc.timing.debounce_ms, defaults.debounce),
        };
        if timing.poll_interval.is_zero() {
            return Err(Error::Config("poll interval must be positive".to_string()));
        }

        // GPIO (env > toml > default)
        let default_wiring = Wiring::default();
        let gpio = GpioConfig {
            backend: env("TIPSTER_GPIO_BACKEND")
                .or(fc.gpio.backend)
                .map(|s| s.parse::<GpioBackend>())
                .transpose()?
                .unwrap_or_default(),
            wiring: Wiring {
                button_pin: fc.gpio.button_pin.unwrap_or(default_wiring.button_pin),
                led_pin: fc.gpio.led_pin.unwrap_or(default_wiring.led_pin),
                button_active_low: fc
                    .gpio
                    .button_active_low
                    .unwrap_or(default_wiring.button_active_low),
                external_pull: fc
                    .gpio
                    .external_pull
                    .unwrap_or(default_wiring.external_pull),
            },
        };
        if gpio.wiring.button_pin == gpio.wiring.led_pin {
            return Err(Error::Config("button and LED must use different pins".to_string()));
        }

        // Speech (env > toml > default)
        let default_voice = VoiceParams::default();
        let speech = SpeechConfig {
            backend: env("TIPSTER_SPEECH_BACKEND")
                .or(fc.speech.backend)
                .map(|s| s.parse::<SpeechBackend>())
                .transpose()?
                .unwrap_or_default(),
            region: env("AZURE_SPEECH_REGION").or(fc.speech.region),
            subscription_key: env("AZURE_SPEECH_KEY")
                .or(fc.speech.subscription_key)
                .map(SecretString::from),
            voice: VoiceParams {
                language: fc.speech.language.unwrap_or(default_voice.language),
                gender: fc.speech.gender.unwrap_or(default_voice.gender),
                voice: env("TIPSTER_VOICE")
                    .or(fc.speech.voice)
                    .unwrap_or(default_voice.voice),
                output_format: fc
                    .speech
                    .output_format
                    .unwrap_or(default_voice.output_format),
            },
            timeout: ms(
                fc.speech.timeout_ms,
                crate::speech::DEFAULT_SYNTHESIS_TIMEOUT,
            ),
            command: fc.speech.command.filter(|c| !c.is_empty()),
        };

        let playback = PlaybackConfig {
            backend: env("TIPSTER_PLAYBACK_BACKEND")
                .or(fc.playback.backend)
                .map(|s| s.parse::<PlaybackBackend>())
                .transpose()?
                .unwrap_or_default(),
            command: fc.playback.command.filter(|c| !c.is_empty()),
            mixer_control: fc.playback.mixer_control.unwrap_or_else(|| "PCM".to_string()),
            volume: fc.playback.volume,
        };

        Ok(Self {
            tips_path,
            cache_dir,
            warning_sound,
            timing,
            gpio,
            speech,
            playback,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn defaults_match_appliance() {
        let config = Config::from_sources(TipsterConfigFile::default(), no_env).unwrap();

        assert_eq!(config.timing.base_cooldown, Duration::from_secs(10));
        assert_eq!(config.timing.penalty, Duration::from_secs(5));
        assert_eq!(config.gpio.wiring, Wiring::default());
        let backend = if cfg!(feature = "rpi") {
            GpioBackend::Rpi
        } else {
            GpioBackend::Sysfs
        };
        assert_eq!(config.gpio.backend, backend);
        assert!(!config.gpio.wiring.external_pull);
        assert_eq!(config.speech.backend, SpeechBackend::Azure);
        assert_eq!(config.speech.voice, VoiceParams::default());
        assert_eq!(config.playback.backend, PlaybackBackend::Command);
        assert_eq!(config.playback.mixer_control, "PCM");
        assert!(config.tips_path.ends_with("tips.txt"));
        assert!(config.warning_sound.ends_with("alarm.wav"));
    }

    #[test]
    fn env_overrides_file() {
        let fc: TipsterConfigFile = toml::from_str(
            r#"
            tips_path = "/from/file.txt"
            [speech]
            region = "westus"
            voice = "en-US-GuyNeural"
            "#,
        )
        .unwrap();

        let env: HashMap<&str, &str> = HashMap::from([
            ("TIPSTER_TIPS_PATH", "/from/env.txt"),
            ("AZURE_SPEECH_KEY", "secret"),
        ]);
        let config =
            Config::from_sources(fc, |key| env.get(key).map(ToString::to_string)).unwrap();

        assert_eq!(config.tips_path, PathBuf::from("/from/env.txt"));
        assert_eq!(config.speech.region.as_deref(), Some("westus"));
        assert_eq!(config.speech.voice.voice, "en-US-GuyNeural");
        assert_eq!(
            config.speech.subscription_key.as_ref().map(|k| k.expose_secret()),
            Some("secret")
        );
    }

    #[test]
    fn file_timing_is_milliseconds() {
        let fc: TipsterConfigFile = toml::from_str(
            "[timing]\ncooldown_ms = 1500\npenalty_ms = 250\ndebounce_ms = 0\n",
        )
        .unwrap();
        let config = Config::from_sources(fc, no_env).unwrap();

        assert_eq!(config.timing.base_cooldown, Duration::from_millis(1500));
        assert_eq!(config.timing.penalty, Duration::from_millis(250));
        assert_eq!(config.timing.debounce, Duration::ZERO);
    }

    #[test]
    fn rejects_unknown_backend() {
        let err = Config::from_sources(TipsterConfigFile::default(), |key| {
            (key == "TIPSTER_SPEECH_BACKEND").then(|| "polly".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn rejects_shared_pin() {
        let fc: TipsterConfigFile =
            toml::from_str("[gpio]\nbutton_pin = 20\nled_pin = 20\n").unwrap();
        assert!(Config::from_sources(fc, no_env).is_err());
    }

    #[test]
    fn sysfs_with_external_pull() {
        let fc: TipsterConfigFile =
            toml::from_str("[gpio]\nbackend = \"sysfs\"\nexternal_pull = true\n").unwrap();
        let config = Config::from_sources(fc, no_env).unwrap();

        assert_eq!(config.gpio.backend, GpioBackend::Sysfs);
        assert!(config.gpio.wiring.external_pull);
        assert!(config.gpio.wiring.button_active_low);
    }

    #[test]
    fn rejects_zero_poll_interval() {
        let fc: TipsterConfigFile = toml::from_str("[timing]\npoll_interval_ms = 0\n").unwrap();
        assert!(Config::from_sources(fc, no_env).is_err());
    }

    #[test]
    fn backend_names_parse() {
        assert_eq!("RPI".parse::<GpioBackend>().unwrap(), GpioBackend::Rpi);
        assert_eq!("local".parse::<SpeechBackend>().unwrap(), SpeechBackend::Command);
        assert_eq!("cpal".parse::<PlaybackBackend>().unwrap(), PlaybackBackend::Native);
    }

    #[test]
    fn explicit_missing_file_is_error() {
        let err = Config::load(Some(Path::new("/nonexistent/tipster.toml"))).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}

//! Error types for the tipster appliance

use thiserror::Error;

/// Result type alias for tipster operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running the appliance
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Tips source unreadable or malformed
    #[error("failed to load tips: {0}")]
    Load(String),

    /// Speech synthesis failed, timed out, or returned nothing
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// Synthesizer credentials rejected
    #[error("auth error: {0}")]
    Auth(String),

    /// Audio playback failed
    #[error("playback error: {0}")]
    Playback(String),

    /// Audio device or encoding error
    #[error("audio error: {0}")]
    Audio(String),

    /// Digital I/O (GPIO) error
    #[error("gpio error: {0}")]
    Gpio(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Whether this error should stop the control loop
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Gpio(_) | Self::Config(_) | Self::Load(_))
    }
}

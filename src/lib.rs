//! Tipster - a one-button appliance that speaks random tips
//!
//! Pressing the button speaks a tip chosen without repetition until every
//! tip has been heard. A cooldown follows each tip, signalled by the LED;
//! pressing during the cooldown plays a warning and extends it.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   edges    ┌────────────────────────────────┐
//! │ Panel (GPIO) ├───────────►│           Appliance            │
//! │ button / LED │◄───────────┤ Cooldown │ TipSelector │ LED   │
//! └──────────────┘   LED      └───────┬───────────────┬────────┘
//!                                     │ text          │ path
//!                            ┌────────▼───────┐ ┌─────▼───────┐
//!                            │  SpeechCache   │ │ AudioPlayer │
//!                            │ (disk, SHA-256)│ └─────────────┘
//!                            └────────┬───────┘
//!                            ┌────────▼───────┐
//!                            │  Synthesizer   │
//!                            │ Azure / local  │
//!                            └────────────────┘
//! ```

pub mod appliance;
pub mod button;
pub mod config;
pub mod cooldown;
pub mod error;
pub mod gpio;
pub mod lifecycle;
pub mod playback;
pub mod selection;
pub mod speech;
pub mod tips;
pub mod tone;

pub use appliance::{Appliance, Parts, PressOutcome};
pub use config::Config;
pub use cooldown::{Cooldown, CooldownState, Decision};
pub use error::{Error, Result};
pub use gpio::{DigitalIo, Level, Panel, Wiring};
pub use playback::AudioPlayer;
pub use selection::TipSelector;
pub use speech::{SpeechCache, Synthesizer, VoiceParams};
pub use tips::{Tip, TipStore};

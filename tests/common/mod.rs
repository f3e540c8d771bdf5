//! Shared test utilities

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use tipster::gpio::{DigitalIo, Level, Wiring};
use tipster::playback::AudioPlayer;
use tipster::speech::{Synthesizer, VoiceParams};
use tipster::{Error, Result};

/// How the fake synthesizer answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthMode {
    /// Return `audio:<text>` bytes
    Succeed,
    /// Return a synthesis error
    Fail,
    /// Return nothing
    Empty,
    /// Never answer
    Hang,
}

/// Synthesizer that records every call
pub struct FakeSynthesizer {
    calls: AtomicUsize,
    texts: Mutex<Vec<String>>,
    mode: Mutex<SynthMode>,
    fingerprint: String,
}

impl FakeSynthesizer {
    #[must_use]
    pub fn new(mode: SynthMode) -> Arc<Self> {
        Self::with_fingerprint(mode, "fake")
    }

    /// A fake that identifies itself as a differently configured backend
    #[must_use]
    pub fn with_fingerprint(mode: SynthMode, fingerprint: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            texts: Mutex::new(Vec::new()),
            mode: Mutex::new(mode),
            fingerprint: fingerprint.to_string(),
        })
    }

    pub fn set_mode(&self, mode: SynthMode) {
        *self.mode.lock().unwrap() = mode;
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Synthesizer for FakeSynthesizer {
    async fn synthesize(&self, text: &str, _params: &VoiceParams) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.lock().unwrap().push(text.to_string());

        let mode = *self.mode.lock().unwrap();
        match mode {
            SynthMode::Succeed => Ok(format!("audio:{text}").into_bytes()),
            SynthMode::Fail => Err(Error::Synthesis("service unavailable".to_string())),
            SynthMode::Empty => Ok(Vec::new()),
            SynthMode::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Vec::new())
            }
        }
    }

    fn name(&self) -> &'static str {
        "fake"
    }

    fn fingerprint(&self) -> String {
        self.fingerprint.clone()
    }
}

/// Player that records what it was asked to play
#[derive(Default)]
pub struct FakePlayer {
    played: Mutex<Vec<PathBuf>>,
    fail: bool,
}

impl FakePlayer {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A player whose every call fails
    #[must_use]
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            played: Mutex::new(Vec::new()),
            fail: true,
        })
    }

    #[must_use]
    pub fn played(&self) -> Vec<PathBuf> {
        self.played.lock().unwrap().clone()
    }
}

#[async_trait]
impl AudioPlayer for FakePlayer {
    async fn play(&self, path: &Path) -> Result<()> {
        self.played.lock().unwrap().push(path.to_path_buf());
        if self.fail {
            return Err(Error::Playback("device busy".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct PinState {
    pressed: bool,
    led: Option<bool>,
    broken: bool,
}

/// In-memory button and LED using the default wiring
#[derive(Clone, Default)]
pub struct FakePins {
    state: Arc<Mutex<PinState>>,
}

impl FakePins {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_pressed(&self, pressed: bool) {
        self.state.lock().unwrap().pressed = pressed;
    }

    /// Last LED value written, if any
    #[must_use]
    pub fn led(&self) -> Option<bool> {
        self.state.lock().unwrap().led
    }

    /// Make every subsequent pin access fail
    pub fn break_pins(&self) {
        self.state.lock().unwrap().broken = true;
    }
}

impl DigitalIo for FakePins {
    fn read(&mut self, pin: u8) -> Result<Level> {
        let state = self.state.lock().unwrap();
        if state.broken {
            return Err(Error::Gpio(format!("pin {pin} unavailable")));
        }
        assert_eq!(pin, Wiring::default().button_pin);
        // Default wiring is active-low
        Ok(Level::from(!state.pressed))
    }

    fn write(&mut self, pin: u8, level: Level) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.broken {
            return Err(Error::Gpio(format!("pin {pin} unavailable")));
        }
        assert_eq!(pin, Wiring::default().led_pin);
        state.led = Some(level == Level::High);
        Ok(())
    }
}

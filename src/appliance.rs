//! Button-driven control loop
//!
//! Samples the button, turns presses into cooldown decisions, speaks tips
//! through the speech cache and keeps the LED in step with readiness. Every
//! press is handled to completion before the next sample, so each decision
//! sees the state left behind by the previous one.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use rand::rngs::StdRng;

use crate::button::EdgeDetector;
use crate::config::TimingConfig;
use crate::cooldown::{Cooldown, Decision};
use crate::gpio::Panel;
use crate::playback::AudioPlayer;
use crate::selection::TipSelector;
use crate::speech::{SpeechCache, VoiceParams};
use crate::tips::TipStore;
use crate::Result;

/// What a recognized press led to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PressOutcome {
    /// A tip was spoken and the cooldown started
    Spoke {
        /// Store index of the tip
        index: usize,
        /// Cached artifact that was played
        artifact: PathBuf,
    },
    /// Pressed too early; warning played and penalty applied
    Penalized {
        /// Ready time after the penalty
        ready_at: Instant,
    },
    /// The tip could not be synthesized; warning played, still ready
    Failed {
        /// Store index of the tip, returned to the pool
        index: usize,
    },
}

/// Collaborators the control loop drives
pub struct Parts {
    /// Button and LED
    pub panel: Panel,
    /// Speech cache in front of the synthesizer
    pub cache: SpeechCache,
    /// Audio output
    pub player: Arc<dyn AudioPlayer>,
}

/// The appliance state machine and its collaborators
pub struct Appliance<R = StdRng> {
    panel: Panel,
    cache: SpeechCache,
    player: Arc<dyn AudioPlayer>,
    selector: TipSelector<R>,
    cooldown: Cooldown,
    button: EdgeDetector,
    voice: VoiceParams,
    warning_sound: PathBuf,
    poll_interval: Duration,
}

impl Appliance<StdRng> {
    /// Create an appliance that is ready immediately
    #[must_use]
    pub fn new(
        parts: Parts,
        tips: Arc<TipStore>,
        voice: VoiceParams,
        warning_sound: PathBuf,
        timing: &TimingConfig,
    ) -> Self {
        Self::with_selector(parts, TipSelector::new(tips), voice, warning_sound, timing)
    }
}

impl<R: Rng> Appliance<R> {
    /// Create an appliance with an explicit selector
    #[must_use]
    pub fn with_selector(
        parts: Parts,
        selector: TipSelector<R>,
        voice: VoiceParams,
        warning_sound: PathBuf,
        timing: &TimingConfig,
    ) -> Self {
        Self {
            panel: parts.panel,
            cache: parts.cache,
            player: parts.player,
            selector,
            cooldown: Cooldown::new(timing.base_cooldown, timing.penalty, Instant::now()),
            button: EdgeDetector::new(timing.debounce),
            voice,
            warning_sound,
            poll_interval: timing.poll_interval,
        }
    }

    /// Run one sampling iteration at `now`
    ///
    /// # Errors
    ///
    /// Returns `Error::Gpio` if the button or LED cannot be accessed. Every
    /// other failure is handled inside the press and logged.
    pub async fn step(&mut self, now: Instant) -> Result<Option<PressOutcome>> {
        let pressed = self.panel.is_pressed()?;

        let outcome = if self.button.update(pressed, now) {
            Some(self.handle_press(now).await?)
        } else {
            None
        };

        self.panel.set_led(self.cooldown.is_ready(now))?;
        Ok(outcome)
    }

    /// Poll until interrupted
    ///
    /// Returns after Ctrl-C with the LED switched off.
    ///
    /// # Errors
    ///
    /// Returns `Error::Gpio` if the button or LED becomes inaccessible
    pub async fn run(&mut self) -> Result<()> {
        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        tracing::info!(
            tips = self.selector.store().len(),
            cooldown_ms = self.cooldown.base().as_millis(),
            penalty_ms = self.cooldown.penalty().as_millis(),
            "appliance ready"
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("shutdown requested");
                    break;
                }
                () = tokio::time::sleep(self.poll_interval) => {
                    self.step(Instant::now()).await?;
                }
            }
        }

        self.panel.set_led(false)?;
        Ok(())
    }

    async fn handle_press(&mut self, now: Instant) -> Result<PressOutcome> {
        match self.cooldown.press(now) {
            Decision::Accepted => self.speak_tip(now).await,
            Decision::Rejected { ready_at } => {
                tracing::info!(
                    remaining_ms = ready_at.saturating_duration_since(now).as_millis(),
                    "pressed during cooldown"
                );
                self.play_warning().await;
                Ok(PressOutcome::Penalized { ready_at })
            }
        }
    }

    async fn speak_tip(&mut self, now: Instant) -> Result<PressOutcome> {
        self.panel.set_led(false)?;

        let selection = self.selector.next();
        let index = selection.index;
        let spoken = selection.tip.spoken().to_string();
        tracing::info!(index, text = %selection.tip.text, "speaking tip");

        let artifact = match self.cache.speak(&spoken, &self.voice).await {
            Ok(path) => path,
            Err(e) => {
                tracing::error!(error = %e, index, "failed to synthesize tip");
                self.selector.restore(index);
                self.play_warning().await;
                return Ok(PressOutcome::Failed { index });
            }
        };

        if let Err(e) = self.player.play(&artifact).await {
            tracing::error!(error = %e, path = %artifact.display(), "failed to play tip");
        }

        self.cooldown.begin(now);
        Ok(PressOutcome::Spoke { index, artifact })
    }

    async fn play_warning(&self) {
        if let Err(e) = self.player.play(&self.warning_sound).await {
            tracing::error!(
                error = %e,
                path = %self.warning_sound.display(),
                "failed to play warning sound"
            );
        }
    }

    /// Cooldown state
    #[must_use]
    pub const fn cooldown(&self) -> &Cooldown {
        &self.cooldown
    }

    /// Tip selector
    #[must_use]
    pub const fn selector(&self) -> &TipSelector<R> {
        &self.selector
    }
}

//! Audio playback of cached speech and the warning sound

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;

use crate::{Error, Result};

/// Default external player
pub const DEFAULT_PLAYER: &str = "aplay";

/// Plays an audio file to completion
#[async_trait]
pub trait AudioPlayer: Send + Sync {
    /// Play the file at `path`, returning once playback has finished
    ///
    /// # Errors
    ///
    /// Returns `Error::Playback` if the file cannot be played
    async fn play(&self, path: &Path) -> Result<()>;
}

/// Plays files through an external command such as `aplay`
#[derive(Debug, Clone)]
pub struct CommandPlayer {
    program: String,
    args: Vec<String>,
}

impl Default for CommandPlayer {
    fn default() -> Self {
        Self::new(DEFAULT_PLAYER, vec!["-q".to_string()])
    }
}

impl CommandPlayer {
    /// Create a player; the file path is appended after `args`
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

#[async_trait]
impl AudioPlayer for CommandPlayer {
    async fn play(&self, path: &Path) -> Result<()> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::Playback(format!("failed to run {}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Playback(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        tracing::debug!(path = %path.display(), "playback complete");
        Ok(())
    }
}

/// Set the output volume once at startup via `amixer`
///
/// # Errors
///
/// Returns `Error::Audio` if `amixer` cannot be run or rejects the value
pub async fn set_volume(control: &str, volume: &str) -> Result<()> {
    let output = Command::new("amixer")
        .args(["set", control, "--", volume])
        .output()
        .await
        .map_err(|e| Error::Audio(format!("failed to run amixer: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Audio(format!("amixer failed: {}", stderr.trim())));
    }

    tracing::debug!(control, volume, "mixer volume set");
    Ok(())
}

/// Decoded mono or multi-channel PCM
#[derive(Debug, Clone)]
pub struct Pcm {
    /// Interleaved samples in `[-1.0, 1.0]`
    pub samples: Vec<f32>,
    /// Frames per second
    pub sample_rate: u32,
    /// Interleaved channel count
    pub channels: u16,
}

impl Pcm {
    /// Playback duration
    #[must_use]
    pub fn duration(&self) -> std::time::Duration {
        let frames = self.samples.len() as u64 / u64::from(self.channels.max(1));
        std::time::Duration::from_millis(frames * 1000 / u64::from(self.sample_rate.max(1)))
    }

    /// Downmix to a single channel by averaging
    #[must_use]
    pub fn into_mono(self) -> Vec<f32> {
        if self.channels <= 1 {
            return self.samples;
        }
        let channels = usize::from(self.channels);
        #[allow(clippy::cast_precision_loss)]
        let mono = self
            .samples
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect();
        mono
    }
}

/// Decode a WAV file to f32 samples
///
/// # Errors
///
/// Returns `Error::Audio` if the file is not a readable WAV
#[allow(clippy::cast_precision_loss)]
pub fn decode_wav(path: &Path) -> Result<Pcm> {
    let mut reader =
        hound::WavReader::open(path).map_err(|e| Error::Audio(format!("WAV open error: {e}")))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::Audio(format!("WAV decode error: {e}")))?,
        hound::SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| Error::Audio(format!("WAV decode error: {e}")))?
        }
    };

    Ok(Pcm {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}

/// In-process playback through the default output device
#[cfg(feature = "native-audio")]
pub use native::NativePlayer;

#[cfg(feature = "native-audio")]
mod native {
    use std::io::Cursor;
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use cpal::SampleRate;

    use super::{AudioPlayer, Pcm, decode_wav};
    use crate::{Error, Result};

    /// Plays WAV and MP3 files with `cpal`
    #[derive(Debug, Default, Clone, Copy)]
    pub struct NativePlayer;

    #[async_trait]
    impl AudioPlayer for NativePlayer {
        async fn play(&self, path: &Path) -> Result<()> {
            let pcm = load(path)?;
            tokio::task::spawn_blocking(move || play_blocking(pcm))
                .await
                .map_err(|e| Error::Playback(format!("playback task failed: {e}")))?
        }
    }

    fn load(path: &Path) -> Result<Pcm> {
        let is_mp3 = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("mp3"));
        if is_mp3 {
            let data = std::fs::read(path)?;
            decode_mp3(&data)
        } else {
            decode_wav(path)
        }
    }

    /// Decode MP3 bytes to mono f32 samples
    fn decode_mp3(mp3_data: &[u8]) -> Result<Pcm> {
        let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
        let mut samples = Vec::new();
        let mut sample_rate = 0;

        loop {
            match decoder.next_frame() {
                Ok(frame) => {
                    sample_rate = u32::try_from(frame.sample_rate).unwrap_or_default();
                    if frame.channels == 2 {
                        samples.extend(frame.data.chunks(2).map(|chunk| {
                            let left = f32::from(chunk[0]) / 32768.0;
                            let right =
                                f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                            f32::midpoint(left, right)
                        }));
                    } else {
                        samples.extend(frame.data.iter().map(|&s| f32::from(s) / 32768.0));
                    }
                }
                Err(minimp3::Error::Eof) => break,
                Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
            }
        }

        Ok(Pcm {
            samples,
            sample_rate,
            channels: 1,
        })
    }

    fn play_blocking(pcm: Pcm) -> Result<()> {
        let sample_rate = pcm.sample_rate;
        let duration = pcm.duration();
        let samples = pcm.into_mono();
        if samples.is_empty() {
            return Ok(());
        }

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Playback("no output device available".to_string()))?;

        let supported = device
            .supported_output_configs()
            .map_err(|e| Error::Playback(e.to_string()))?
            .find(|c| {
                c.min_sample_rate() <= SampleRate(sample_rate)
                    && c.max_sample_rate() >= SampleRate(sample_rate)
            })
            .ok_or_else(|| {
                Error::Playback(format!("no output config supports {sample_rate} Hz"))
            })?;

        let config = supported.with_sample_rate(SampleRate(sample_rate)).config();
        let channels = usize::from(config.channels);

        let total = samples.len();
        let position = Arc::new(Mutex::new(0usize));
        let position_cb = Arc::clone(&position);

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let Ok(mut pos) = position_cb.lock() else {
                        return;
                    };
                    for frame in data.chunks_mut(channels) {
                        let sample = samples.get(*pos).copied().unwrap_or(0.0);
                        frame.fill(sample);
                        if *pos < samples.len() {
                            *pos += 1;
                        }
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio playback error");
                },
                None,
            )
            .map_err(|e| Error::Playback(e.to_string()))?;

        stream.play().map_err(|e| Error::Playback(e.to_string()))?;

        // Poll for completion with timeout
        let start = std::time::Instant::now();
        let timeout = duration + std::time::Duration::from_millis(500);
        while position.lock().map_or(true, |pos| *pos < total) {
            if start.elapsed() > timeout {
                tracing::warn!("playback did not finish in time");
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(20));
        }

        // Let the device drain its buffer
        std::thread::sleep(std::time::Duration::from_millis(100));
        drop(stream);

        tracing::debug!(samples = total, "playback complete");
        Ok(())
    }
}

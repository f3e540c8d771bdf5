//! Warning tone generation
//!
//! The appliance plays a fixed warning file on early presses. When no file
//! has been provided, `tipster gen-warning` writes a two-tone alarm with
//! these helpers.

use std::path::Path;

use crate::{Error, Result};

/// Sample rate for generated tones
pub const TONE_SAMPLE_RATE: u32 = 16000;

/// Alternating two-tone alarm samples
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn alarm_samples(duration_secs: f32) -> Vec<f32> {
    const HIGH_HZ: f32 = 960.0;
    const LOW_HZ: f32 = 640.0;
    const BEEP_SECS: f32 = 0.125;
    const AMPLITUDE: f32 = 0.4;

    let num_samples = (TONE_SAMPLE_RATE as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / TONE_SAMPLE_RATE as f32;
            let beep = (t / BEEP_SECS) as usize;
            let frequency = if beep % 2 == 0 { HIGH_HZ } else { LOW_HZ };
            AMPLITUDE * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

/// Convert f32 samples to 16-bit mono WAV bytes
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

/// Write the default alarm to `path`
///
/// # Errors
///
/// Returns error if encoding or writing fails
pub fn write_alarm(path: &Path, duration_secs: f32) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let wav = samples_to_wav(&alarm_samples(duration_secs), TONE_SAMPLE_RATE)?;
    std::fs::write(path, wav)?;
    tracing::info!(path = %path.display(), "wrote warning tone");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn alarm_has_expected_length() {
        assert_eq!(alarm_samples(0.5).len(), 8000);
        assert!(alarm_samples(0.5).iter().all(|s| s.abs() <= 0.4 + f32::EPSILON));
    }

    #[test]
    fn wav_header_is_valid() {
        let wav = samples_to_wav(&alarm_samples(0.1), TONE_SAMPLE_RATE).unwrap();
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");

        let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
        assert_eq!(reader.spec().sample_rate, TONE_SAMPLE_RATE);
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.len(), 1600);
    }

    #[test]
    fn write_alarm_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sounds/alarm.wav");
        write_alarm(&path, 0.2).unwrap();
        assert!(std::fs::metadata(&path).unwrap().len() > 44);
    }
}

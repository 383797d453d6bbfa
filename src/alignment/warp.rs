//! Stem warping
//!
//! Applies one track's alignment to each of its stems: pitch shift first (the
//! frame grid is unchanged), then time stretch, then sample-rate conversion.
//! Stems are warped in parallel.

use rayon::prelude::*;

use super::phase_vocoder::{pitch_shift, time_stretch};
use super::resample::resample;
use super::TrackAlignment;
use crate::audio::AudioBuffer;
use crate::config::AlignmentConfig;
use crate::dsp::stft::StftPlan;
use crate::error::MashupError;
use crate::separation::{StemKind, StemSet};

/// Warp every stem of a track to the reference tempo, key and output rate
///
/// Ratio 1.0, shift 0 and equal rates return an exact copy.
///
/// # Errors
///
/// Returns `MashupError` if the ratio is not positive, the vocoder plan is
/// invalid or resampling fails
pub fn warp_stems(
    stems: &StemSet,
    alignment: &TrackAlignment,
    output_rate: u32,
    config: &AlignmentConfig,
) -> Result<StemSet, MashupError> {
    if !(alignment.stretch_ratio > 0.0) || !alignment.stretch_ratio.is_finite() {
        return Err(MashupError::InvalidInput(format!(
            "Stretch ratio must be positive, got {}",
            alignment.stretch_ratio
        )));
    }

    if alignment.is_identity() && stems.sample_rate() == output_rate {
        log::debug!("Identity alignment; stems copied unchanged");
        return Ok(stems.clone());
    }

    log::debug!(
        "Warping stems: ratio {:.4}, shift {} semitones, {} Hz → {} Hz",
        alignment.stretch_ratio,
        alignment.pitch_shift_semitones,
        stems.sample_rate(),
        output_rate
    );

    let plan = StftPlan::new(config.frame_size, config.hop_size)?;
    let warped: Vec<AudioBuffer> = StemKind::ALL
        .par_iter()
        .map(|&kind| warp_buffer(stems.get(kind), alignment, output_rate, &plan, config))
        .collect::<Result<_, _>>()?;

    let warped: [AudioBuffer; 4] = warped
        .try_into()
        .map_err(|_| MashupError::ProcessingError("Stem count changed while warping".to_string()))?;
    Ok(StemSet::new(warped))
}

fn warp_buffer(
    buffer: &AudioBuffer,
    alignment: &TrackAlignment,
    output_rate: u32,
    plan: &StftPlan,
    config: &AlignmentConfig,
) -> Result<AudioBuffer, MashupError> {
    let channels = buffer
        .channels
        .iter()
        .map(|channel| {
            let shifted = pitch_shift(
                channel,
                alignment.pitch_shift_semitones,
                plan,
                config.preserve_formants,
            );
            if alignment.stretch_ratio == 1.0 {
                shifted
            } else {
                time_stretch(&shifted, alignment.stretch_ratio, plan)
            }
        })
        .collect();

    resample(&AudioBuffer::new(channels, buffer.sample_rate), output_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn stems(len: usize, sr: u32) -> StemSet {
        StemSet::from_fn(|kind| {
            let freq = 100.0 * (kind.index() + 1) as f32;
            let samples: Vec<f32> = (0..len)
                .map(|i| 0.3 * (2.0 * PI * freq * i as f32 / sr as f32).sin())
                .collect();
            AudioBuffer::stereo(samples.clone(), samples, sr)
        })
    }

    fn config() -> AlignmentConfig {
        AlignmentConfig {
            frame_size: 512,
            hop_size: 128,
            ..AlignmentConfig::default()
        }
    }

    #[test]
    fn test_identity_warp() {
        let input = stems(4000, 8000);
        let out = warp_stems(&input, &TrackAlignment::identity(0.5), 8000, &config()).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn test_stretch_length() {
        let input = stems(8000, 8000);
        let alignment = TrackAlignment {
            stretch_ratio: 1.2,
            pitch_shift_semitones: -3,
            beat_phase_secs: 0.0,
            stretched_duration_secs: 1.0 / 1.2,
        };
        let out = warp_stems(&input, &alignment, 8000, &config()).unwrap();
        for (_, stem) in out.iter() {
            assert_eq!(stem.num_frames(), 6667);
            assert_eq!(stem.num_channels(), 2);
        }
    }

    #[test]
    fn test_rate_conversion_only() {
        let input = stems(8000, 8000);
        let out = warp_stems(&input, &TrackAlignment::identity(1.0), 16000, &config()).unwrap();
        assert_eq!(out.sample_rate(), 16000);
        assert_eq!(out.num_frames(), 16000);
    }

    #[test]
    fn test_invalid_ratio() {
        let input = stems(100, 8000);
        let alignment = TrackAlignment {
            stretch_ratio: 0.0,
            ..TrackAlignment::identity(1.0)
        };
        assert!(warp_stems(&input, &alignment, 8000, &config()).is_err());
    }
}

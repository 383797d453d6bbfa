//! Melodic contour
//!
//! Per-frame dominant pitch, expressed as a fractional MIDI note number.
//! This is a cheap spectral-peak tracker, not a full pitch estimator: it
//! follows whatever is loudest inside the melody band.

use crate::error::MashupError;
use crate::features::period::peak_picking::parabolic_offset;

/// Melody tracking parameters
#[derive(Debug, Clone, Copy)]
pub struct MelodyParams {
    /// Lowest frequency considered (Hz)
    pub min_freq: f32,
    /// Highest frequency considered (Hz)
    pub max_freq: f32,
    /// Frames quieter than the loudest frame by more than this are unvoiced (dB, negative)
    pub floor_db: f32,
}

impl Default for MelodyParams {
    fn default() -> Self {
        Self {
            min_freq: 65.41,
            max_freq: 2093.0,
            floor_db: -40.0,
        }
    }
}

/// Convert a frequency to a fractional MIDI note number (A4 = 440 Hz = 69)
pub fn freq_to_midi(freq: f32) -> f32 {
    69.0 + 12.0 * (freq / 440.0).log2()
}

/// Extract the melodic contour from a magnitude spectrogram
///
/// For every frame the strongest bin in `[min_freq, max_freq]` is refined by
/// parabolic interpolation and converted to MIDI. Frames whose band energy is
/// more than `floor_db` below the loudest frame are `None`.
///
/// # Errors
///
/// Returns `MashupError::InvalidInput` if the spectrogram does not match
/// `frame_size` or the frequency band is empty
pub fn extract_melody(
    fft_magnitudes: &[Vec<f32>],
    sample_rate: u32,
    frame_size: usize,
    params: &MelodyParams,
) -> Result<Vec<Option<f32>>, MashupError> {
    if fft_magnitudes.is_empty() {
        return Ok(Vec::new());
    }

    let n_bins = frame_size / 2 + 1;
    if sample_rate == 0 || fft_magnitudes[0].len() != n_bins {
        return Err(MashupError::InvalidInput(format!(
            "Spectrogram has {} bins, expected {} for frame size {}",
            fft_magnitudes[0].len(),
            n_bins,
            frame_size
        )));
    }

    let bin_hz = sample_rate as f32 / frame_size as f32;
    let lo = ((params.min_freq / bin_hz).ceil() as usize).max(1);
    let hi = ((params.max_freq / bin_hz).floor() as usize).min(n_bins - 2);
    if lo >= hi {
        return Err(MashupError::InvalidInput(format!(
            "Melody band [{:.1}, {:.1}] Hz is empty at {} Hz / {} samples",
            params.min_freq, params.max_freq, sample_rate, frame_size
        )));
    }

    let energies: Vec<f32> = fft_magnitudes
        .iter()
        .map(|frame| frame[lo..=hi].iter().map(|m| m * m).sum())
        .collect();
    let loudest = energies.iter().copied().fold(0.0f32, f32::max);
    if loudest <= f32::EPSILON {
        return Ok(vec![None; fft_magnitudes.len()]);
    }
    // Power ratio floor
    let floor = loudest * 10f32.powf(params.floor_db / 10.0);

    let contour: Vec<Option<f32>> = fft_magnitudes
        .iter()
        .zip(energies.iter())
        .map(|(frame, &energy)| {
            if energy < floor || energy <= f32::EPSILON {
                return None;
            }
            let (peak, _) = frame[lo..=hi]
                .iter()
                .enumerate()
                .fold((0usize, f32::MIN), |best, (i, &m)| {
                    if m > best.1 {
                        (i, m)
                    } else {
                        best
                    }
                });
            let k = lo + peak;
            let offset = parabolic_offset(frame[k - 1], frame[k], frame[k + 1]);
            Some(freq_to_midi((k as f32 + offset) * bin_hz))
        })
        .collect();

    let voiced = contour.iter().filter(|p| p.is_some()).count();
    log::debug!(
        "Melodic contour: {}/{} frames voiced",
        voiced,
        contour.len()
    );

    Ok(contour)
}

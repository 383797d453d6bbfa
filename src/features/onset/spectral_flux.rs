//! Spectral flux onset strength
//!
//! Measures how much new energy appears in each frame of a magnitude
//! spectrogram.
//!
//! # Algorithm
//!
//! 1. Log-compress magnitudes: `L[t][k] = ln(1 + γ·|X[t][k]|)`
//! 2. Half-wave rectified difference: `d[t][k] = max(0, L[t][k] - L[t-1][k])`
//! 3. Sum over bins: `flux[t] = Σ_k d[t][k]`
//!
//! Log compression keeps quiet percussive attacks visible next to loud
//! sustained tones; rectification ignores decays.
//!
//! # Reference
//!
//! Bello, J. P., et al. (2005). A Tutorial on Onset Detection in Music Signals.
//! *IEEE Transactions on Speech and Audio Processing*, 13(5), 1035-1047.

use crate::error::MashupError;

/// Log compression factor γ
const LOG_COMPRESSION: f32 = 10.0;

/// Compute the spectral flux onset strength envelope
///
/// # Arguments
///
/// * `fft_magnitudes` - Magnitude spectrogram (n_frames × n_bins)
///
/// # Returns
///
/// One flux value per frame; the first frame is 0
///
/// # Errors
///
/// Returns `MashupError::InvalidInput` if the spectrogram is empty or ragged
pub fn onset_strength(fft_magnitudes: &[Vec<f32>]) -> Result<Vec<f32>, MashupError> {
    log::debug!(
        "Computing spectral flux: {} frames",
        fft_magnitudes.len()
    );

    if fft_magnitudes.is_empty() {
        return Err(MashupError::InvalidInput(
            "Empty magnitude spectrogram".to_string(),
        ));
    }

    let n_bins = fft_magnitudes[0].len();
    if fft_magnitudes.iter().any(|frame| frame.len() != n_bins) {
        return Err(MashupError::InvalidInput(
            "Magnitude spectrogram frames differ in length".to_string(),
        ));
    }

    let mut flux = Vec::with_capacity(fft_magnitudes.len());
    flux.push(0.0);

    let mut prev: Vec<f32> = fft_magnitudes[0]
        .iter()
        .map(|&m| (1.0 + LOG_COMPRESSION * m).ln())
        .collect();

    for frame in &fft_magnitudes[1..] {
        let mut sum = 0.0f32;
        for (k, &m) in frame.iter().enumerate() {
            let current = (1.0 + LOG_COMPRESSION * m).ln();
            let diff = current - prev[k];
            if diff > 0.0 {
                sum += diff;
            }
            prev[k] = current;
        }
        flux.push(sum);
    }

    Ok(flux)
}

//! Chroma vector extraction
//!
//! Folds a magnitude spectrogram into pitch-class bins.
//!
//! # Algorithm
//!
//! For every FFT bin with centre frequency `f` inside `[min_freq, max_freq]`:
//!
//! 1. Pitch position in chroma bins relative to C:
//!    `p = bins_per_octave * log2(f / f_C)`, with `f_C = 440 * 2^(-9/12)`
//! 2. Hard mapping: the power `|X|²` goes to bin `round(p) mod n_bins`
//! 3. Soft mapping: the power is spread over neighbouring bins with Gaussian
//!    weights `exp(-½ (d / σ)²)`, normalized to sum to 1
//!
//! Each frame is then L1-normalized so loudness does not bias key estimation.
//!
//! # Reference
//!
//! Müller, M., & Ewert, S. (2011). Chroma Toolbox: MATLAB Implementations for
//! Extracting Variants of Chroma-Based Audio Features. *ISMIR*.

use super::normalization::normalize_l1;
use super::ChromaResolution;
use crate::error::MashupError;

const EPSILON: f32 = 1e-10;

/// Frequency of C4; chroma bin 0 is C
const C_REFERENCE_HZ: f32 = 261.625_56;

/// How far (in chroma bins) soft mapping spreads energy
const SOFT_SPREAD_BINS: i32 = 2;

/// Chroma extraction parameters
#[derive(Debug, Clone, Copy)]
pub struct ChromaParams {
    /// Bins per octave
    pub resolution: ChromaResolution,
    /// Lowest frequency considered (Hz)
    pub min_freq: f32,
    /// Highest frequency considered (Hz)
    pub max_freq: f32,
    /// Spread energy to neighbouring chroma bins
    pub soft_mapping: bool,
    /// Gaussian width of the soft mapping in chroma bins
    pub soft_sigma: f32,
}

impl Default for ChromaParams {
    fn default() -> Self {
        Self {
            resolution: ChromaResolution::High24,
            min_freq: 55.0,
            max_freq: 5000.0,
            soft_mapping: true,
            soft_sigma: 0.5,
        }
    }
}

/// Extract chroma vectors from a magnitude spectrogram
///
/// # Arguments
///
/// * `fft_magnitudes` - Magnitude spectrogram (n_frames × n_bins), `n_bins = frame_size / 2 + 1`
/// * `sample_rate` - Sample rate in Hz
/// * `frame_size` - FFT frame size used for the spectrogram
/// * `params` - Chroma parameters
///
/// # Returns
///
/// One L1-normalized chroma vector per frame (silent frames stay all-zero)
///
/// # Errors
///
/// Returns `MashupError::InvalidInput` if the spectrogram is empty, its bin
/// count does not match `frame_size`, or the frequency range is empty
pub fn extract_chroma(
    fft_magnitudes: &[Vec<f32>],
    sample_rate: u32,
    frame_size: usize,
    params: &ChromaParams,
) -> Result<Vec<Vec<f32>>, MashupError> {
    log::debug!(
        "Extracting chroma: {} frames at {} Hz, {} bins/octave",
        fft_magnitudes.len(),
        sample_rate,
        params.resolution.bins_per_octave()
    );

    if fft_magnitudes.is_empty() {
        return Err(MashupError::InvalidInput(
            "Empty magnitude spectrogram".to_string(),
        ));
    }

    let n_fft_bins = frame_size / 2 + 1;
    if fft_magnitudes[0].len() != n_fft_bins {
        return Err(MashupError::InvalidInput(format!(
            "Spectrogram has {} bins, expected {} for frame size {}",
            fft_magnitudes[0].len(),
            n_fft_bins,
            frame_size
        )));
    }

    let max_freq = params.max_freq.min(sample_rate as f32 / 2.0);
    if params.min_freq <= 0.0 || params.min_freq >= max_freq {
        return Err(MashupError::InvalidInput(format!(
            "Invalid chroma frequency range: [{:.1}, {:.1}] Hz",
            params.min_freq, max_freq
        )));
    }

    let mapping = build_mapping(n_fft_bins, sample_rate, frame_size, params, max_freq);
    let n_chroma = params.resolution.bins_per_octave();

    let chroma = fft_magnitudes
        .iter()
        .map(|frame| {
            let mut vector = vec![0.0f32; n_chroma];
            for &(fft_bin, chroma_bin, weight) in &mapping {
                let m = frame.get(fft_bin).copied().unwrap_or(0.0);
                vector[chroma_bin] += weight * m * m;
            }
            normalize_l1(&mut vector);
            vector
        })
        .collect();

    Ok(chroma)
}

/// Precompute (fft_bin, chroma_bin, weight) triples
fn build_mapping(
    n_fft_bins: usize,
    sample_rate: u32,
    frame_size: usize,
    params: &ChromaParams,
    max_freq: f32,
) -> Vec<(usize, usize, f32)> {
    let n_chroma = params.resolution.bins_per_octave() as i32;
    let mut mapping = Vec::new();

    for k in 1..n_fft_bins {
        let freq = k as f32 * sample_rate as f32 / frame_size as f32;
        if freq < params.min_freq || freq > max_freq {
            continue;
        }

        let position = n_chroma as f32 * (freq / C_REFERENCE_HZ).log2();
        let nearest = position.round() as i32;

        if params.soft_mapping && params.soft_sigma > EPSILON {
            let weights: Vec<(i32, f32)> = (-SOFT_SPREAD_BINS..=SOFT_SPREAD_BINS)
                .map(|d| {
                    let bin = nearest + d;
                    let dist = (bin as f32 - position) / params.soft_sigma;
                    (bin, (-0.5 * dist * dist).exp())
                })
                .collect();
            let total: f32 = weights.iter().map(|(_, w)| w).sum();
            for (bin, w) in weights {
                mapping.push((k, bin.rem_euclid(n_chroma) as usize, w / total));
            }
        } else {
            mapping.push((k, nearest.rem_euclid(n_chroma) as usize, 1.0));
        }
    }

    mapping
}

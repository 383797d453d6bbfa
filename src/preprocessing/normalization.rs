//! Level normalization utilities
//!
//! Supports two normalization methods:
//! - Peak normalization (scales the loudest sample to the ceiling)
//! - RMS normalization (scales toward a target RMS, bounded by the peak ceiling)
//!
//! # Example
//!
//! ```
//! use stratum_mashup::preprocessing::normalization::{
//!     normalize, NormalizationConfig, NormalizationMethod
//! };
//!
//! let mut samples = vec![0.1f32; 8000];
//! let config = NormalizationConfig {
//!     method: NormalizationMethod::Rms,
//!     target_rms_db: -14.0,
//!     ceiling_db: -1.0,
//! };
//!
//! let metadata = normalize(&mut samples, &config)?;
//! assert!(metadata.gain_db > 0.0);
//! # Ok::<(), stratum_mashup::MashupError>(())
//! ```

use serde::{Deserialize, Serialize};

use crate::error::MashupError;

/// Normalization method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizationMethod {
    /// Scale so the peak sits at the ceiling
    Peak,
    /// Scale toward a target RMS without exceeding the ceiling
    Rms,
}

/// Normalization configuration
#[derive(Debug, Clone)]
pub struct NormalizationConfig {
    /// Normalization method
    pub method: NormalizationMethod,

    /// Target RMS level in dBFS (default: -14.0)
    pub target_rms_db: f32,

    /// Peak ceiling in dBFS (default: -1.0)
    pub ceiling_db: f32,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            method: NormalizationMethod::Rms,
            target_rms_db: -14.0,
            ceiling_db: -1.0,
        }
    }
}

/// Level metadata returned from normalization
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoudnessMetadata {
    /// Peak level in dBFS (before normalization)
    pub peak_db: f32,
    /// RMS level in dBFS (before normalization)
    pub rms_db: f32,
    /// Gain applied in dB
    pub gain_db: f32,
}

impl Default for LoudnessMetadata {
    fn default() -> Self {
        Self {
            peak_db: f32::NEG_INFINITY,
            rms_db: f32::NEG_INFINITY,
            gain_db: 0.0,
        }
    }
}

/// Numerical stability epsilon for divisions
const EPSILON: f32 = 1e-10;

/// Convert decibels to linear gain
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Convert linear amplitude to decibels (`-inf` for silence)
pub fn linear_to_db(linear: f32) -> f32 {
    if linear <= EPSILON {
        f32::NEG_INFINITY
    } else {
        20.0 * linear.log10()
    }
}

/// Largest absolute sample value
pub fn peak_level(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |acc, &x| acc.max(x.abs()))
}

/// RMS level
pub fn rms_level(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|&x| (x as f64) * (x as f64)).sum();
    (sum_sq / samples.len() as f64).sqrt() as f32
}

/// Linear gain that moves `rms` to `target_db`, limited to `max_gain_db` of boost
///
/// Returns 1.0 for (near-)silent input so noise floors are not amplified.
pub fn rms_gain(rms: f32, target_db: f32, max_gain_db: f32) -> f32 {
    if rms <= EPSILON {
        return 1.0;
    }
    let gain = db_to_linear(target_db) / rms;
    gain.min(db_to_linear(max_gain_db))
}

/// Normalize samples in place
///
/// # Arguments
///
/// * `samples` - Samples to normalize (any channel layout, treated as one signal)
/// * `config` - Normalization configuration
///
/// # Returns
///
/// Levels measured before normalization and the applied gain.
/// Silent input is left untouched with a gain of 0 dB.
///
/// # Errors
///
/// Returns `MashupError::InvalidInput` if the samples are empty or the ceiling is above 0 dBFS
pub fn normalize(
    samples: &mut [f32],
    config: &NormalizationConfig,
) -> Result<LoudnessMetadata, MashupError> {
    log::debug!(
        "Normalizing {} samples using {:?} (target {:.1} dBFS RMS, ceiling {:.1} dBFS)",
        samples.len(),
        config.method,
        config.target_rms_db,
        config.ceiling_db
    );

    if samples.is_empty() {
        return Err(MashupError::InvalidInput(
            "Empty audio samples".to_string(),
        ));
    }

    if config.ceiling_db > 0.0 {
        return Err(MashupError::InvalidInput(format!(
            "Peak ceiling must be at or below 0 dBFS, got {:.1}",
            config.ceiling_db
        )));
    }

    let peak = peak_level(samples);
    let rms = rms_level(samples);
    let mut metadata = LoudnessMetadata {
        peak_db: linear_to_db(peak),
        rms_db: linear_to_db(rms),
        gain_db: 0.0,
    };

    if peak <= EPSILON {
        log::debug!("Signal is silent, skipping normalization");
        return Ok(metadata);
    }

    let ceiling_gain = db_to_linear(config.ceiling_db) / peak;
    let gain = match config.method {
        NormalizationMethod::Peak => ceiling_gain,
        NormalizationMethod::Rms => (db_to_linear(config.target_rms_db) / rms).min(ceiling_gain),
    };

    for x in samples.iter_mut() {
        *x *= gain;
    }

    metadata.gain_db = linear_to_db(gain);
    log::debug!("Applied {:.2} dB of gain", metadata.gain_db);

    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Generate a test signal: sine wave at 440 Hz
    fn generate_test_signal(length: usize, amplitude: f32, sample_rate: f32) -> Vec<f32> {
        let freq = 440.0;
        (0..length)
            .map(|i| {
                let t = i as f32 / sample_rate;
                amplitude * (2.0 * std::f32::consts::PI * freq * t).sin()
            })
            .collect()
    }

    #[test]
    fn test_peak_normalization() {
        let mut samples = generate_test_signal(8000, 0.5, 8000.0);
        let config = NormalizationConfig {
            method: NormalizationMethod::Peak,
            target_rms_db: -14.0,
            ceiling_db: -1.0,
        };

        normalize(&mut samples, &config).unwrap();

        let new_peak = peak_level(&samples);
        let target_peak = db_to_linear(-1.0);
        assert!(
            (new_peak - target_peak).abs() < 0.01,
            "Peak normalization failed: expected ~{:.3}, got {:.3}",
            target_peak,
            new_peak
        );
    }

    #[test]
    fn test_rms_normalization_hits_target() {
        let mut samples = generate_test_signal(8000, 0.05, 8000.0);
        let config = NormalizationConfig::default();

        normalize(&mut samples, &config).unwrap();

        let rms_db = linear_to_db(rms_level(&samples));
        assert!(
            (rms_db - (-14.0)).abs() < 0.1,
            "RMS normalization failed: expected ~-14 dBFS, got {:.2}",
            rms_db
        );
    }

    #[test]
    fn test_rms_normalization_respects_ceiling() {
        // Spiky signal: low RMS but a full-scale peak
        let mut samples = vec![0.0f32; 8000];
        samples[100] = 0.9;
        let config = NormalizationConfig::default();

        let metadata = normalize(&mut samples, &config).unwrap();

        assert!(peak_level(&samples) <= db_to_linear(-1.0) + 1e-5);
        assert!(metadata.gain_db < 0.0);
    }

    #[test]
    fn test_silence_untouched() {
        let mut samples = vec![0.0f32; 100];
        let metadata = normalize(&mut samples, &NormalizationConfig::default()).unwrap();
        assert_eq!(metadata.gain_db, 0.0);
        assert!(samples.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_empty_rejected() {
        let mut samples: Vec<f32> = vec![];
        assert!(normalize(&mut samples, &NormalizationConfig::default()).is_err());
    }

    #[test]
    fn test_rms_gain_cap() {
        // -60 dBFS signal toward -20 dBFS wants +40 dB, capped at +12 dB
        let gain = rms_gain(db_to_linear(-60.0), -20.0, 12.0);
        assert!((linear_to_db(gain) - 12.0).abs() < 1e-3);
        assert_eq!(rms_gain(0.0, -20.0, 12.0), 1.0);
    }
}

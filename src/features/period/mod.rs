//! Period estimation
//!
//! Convert an onset strength envelope to a tempo estimate using:
//! - FFT autocorrelation
//! - A log-normal tempo prior for octave disambiguation
//! - Peak picking with parabolic refinement

pub mod autocorrelation;
pub mod peak_picking;

pub use autocorrelation::estimate_tempo;

use crate::config::AnalysisConfig;

/// Tempo estimate with confidence
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoEstimate {
    /// BPM estimate
    pub bpm: f32,

    /// Confidence score (0.0-1.0)
    pub confidence: f32,
}

/// Search range and prior for tempo estimation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoRange {
    /// Minimum BPM to consider
    pub min_bpm: f32,

    /// Maximum BPM to consider
    pub max_bpm: f32,

    /// Centre of the tempo prior
    pub prior_bpm: f32,

    /// Width of the tempo prior in octaves
    pub prior_width: f32,
}

impl Default for TempoRange {
    fn default() -> Self {
        Self {
            min_bpm: 40.0,
            max_bpm: 220.0,
            prior_bpm: 120.0,
            prior_width: 1.0,
        }
    }
}

impl From<&AnalysisConfig> for TempoRange {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            min_bpm: config.min_bpm,
            max_bpm: config.max_bpm,
            prior_bpm: config.tempo_prior_bpm,
            prior_width: config.tempo_prior_width,
        }
    }
}

impl TempoRange {
    /// Log-normal prior weight of a tempo (1.0 at the centre)
    pub fn prior(&self, bpm: f32) -> f32 {
        if bpm <= 0.0 || self.prior_width <= 0.0 {
            return 0.0;
        }
        let octaves = (bpm / self.prior_bpm).log2() / self.prior_width;
        (-0.5 * octaves * octaves).exp()
    }
}

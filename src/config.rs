//! Configuration parameters for mashup processing

use serde::{Deserialize, Serialize};

use crate::error::MashupError;
use crate::render::effects::StemEffects;

/// Processing path selected by the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessingMode {
    /// NMF stem separation and 24-bin chroma
    #[default]
    Enhanced,
    /// Masking-split separation and 12-bin chroma
    Standard,
}

/// Feature extraction parameters
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Minimum track duration accepted for analysis in seconds (default: 5.0)
    pub min_duration_secs: f32,

    // STFT parameters
    /// Frame size for STFT (default: 2048)
    pub frame_size: usize,

    /// Hop size for STFT (default: 512)
    pub hop_size: usize,

    // Tempo estimation
    /// Minimum BPM to consider (default: 40.0)
    pub min_bpm: f32,

    /// Maximum BPM to consider (default: 220.0)
    pub max_bpm: f32,

    /// Centre of the log-normal tempo prior (default: 120.0)
    /// Resolves octave ambiguity toward typical tempi
    pub tempo_prior_bpm: f32,

    /// Width of the tempo prior in octaves (default: 1.0)
    pub tempo_prior_width: f32,

    // Onset detection
    /// MAD multiplier for the adaptive onset threshold (default: 2.5)
    pub onset_threshold_k: f32,

    /// Minimum spacing between onsets in milliseconds (default: 50.0)
    pub min_onset_interval_ms: f32,

    // Key detection
    /// Lowest frequency mapped into chroma (default: 55.0 Hz, A1)
    pub min_chroma_freq: f32,

    /// Highest frequency mapped into chroma (default: 5000.0 Hz)
    pub max_chroma_freq: f32,

    /// Length of the chroma and melody analysis window in seconds (default: 0.186)
    /// Rounded to the nearest power of two in samples, never below `frame_size`.
    /// At 44.1 kHz this gives 8192 samples (5.4 Hz bins), fine enough to
    /// separate neighbouring semitones down to about 100 Hz.
    pub chroma_window_secs: f32,

    /// Enable soft chroma mapping (default: true)
    /// Soft mapping spreads frequency bins to neighboring chroma bins for robustness
    pub soft_chroma_mapping: bool,

    /// Soft mapping standard deviation in chroma bins (default: 0.5)
    pub soft_mapping_sigma: f32,

    /// Chroma sharpening power (default: 1.0 = no sharpening)
    pub chroma_sharpening_power: f32,

    /// Temporal smoothing window in frames, 0 or 1 disables (default: 5)
    pub chroma_smoothing_window: usize,

    // Melodic contour
    /// Lowest melody frequency (default: 65.4 Hz, C2)
    pub melody_min_freq: f32,

    /// Highest melody frequency (default: 2093.0 Hz, C7)
    pub melody_max_freq: f32,

    /// Frames quieter than the loudest frame by more than this are unvoiced (default: -40.0 dB)
    pub melody_floor_db: f32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_duration_secs: 5.0,
            frame_size: 2048,
            hop_size: 512,
            min_bpm: 40.0,
            max_bpm: 220.0,
            tempo_prior_bpm: 120.0,
            tempo_prior_width: 1.0,
            onset_threshold_k: 2.5,
            min_onset_interval_ms: 50.0,
            min_chroma_freq: 55.0,
            max_chroma_freq: 5000.0,
            chroma_window_secs: 0.186,
            soft_chroma_mapping: true,
            soft_mapping_sigma: 0.5,
            chroma_sharpening_power: 1.0,
            chroma_smoothing_window: 5,
            melody_min_freq: 65.41,
            melody_max_freq: 2093.0,
            melody_floor_db: -40.0,
        }
    }
}

impl AnalysisConfig {
    /// Chroma/melody frame size at `sample_rate`
    ///
    /// `chroma_window_secs` rounded to the nearest power of two, at least `frame_size`.
    pub fn chroma_frame_size(&self, sample_rate: u32) -> usize {
        let samples = (self.chroma_window_secs * sample_rate as f32).max(1.0);
        let rounded = 1usize << (samples.log2().round() as u32).min(20);
        rounded.max(self.frame_size)
    }

    /// Chroma/melody hop size at `sample_rate` (a quarter of the frame, at least `hop_size`)
    pub fn chroma_hop_size(&self, sample_rate: u32) -> usize {
        (self.chroma_frame_size(sample_rate) / 4).max(self.hop_size)
    }
}

/// Stem separation parameters
#[derive(Debug, Clone)]
pub struct SeparationConfig {
    /// STFT frame size (default: 2048)
    pub frame_size: usize,

    /// STFT hop size (default: 512)
    pub hop_size: usize,

    /// Smallest NMF rank, used for the simplest material (default: 4)
    pub min_rank: usize,

    /// Largest NMF rank (default: 12)
    pub max_rank: usize,

    /// Multiplicative-update iteration budget (default: 200)
    pub max_iterations: usize,

    /// Relative cost decrease that counts as converged (default: 1e-4)
    pub tolerance: f32,

    /// Tracks shorter than this use the masking split (default: 3.0 s)
    pub min_separation_secs: f32,

    /// Tracks with RMS below this use the masking split (default: -50.0 dBFS)
    pub quiet_threshold_db: f32,

    /// Upper bound on `bins * frames * rank` before NMF is refused (default: 4e8)
    pub max_nmf_cells: usize,

    /// Median filter length for the harmonic/percussive split, odd (default: 17)
    pub median_kernel: usize,
}

impl Default for SeparationConfig {
    fn default() -> Self {
        Self {
            frame_size: 2048,
            hop_size: 512,
            min_rank: 4,
            max_rank: 12,
            max_iterations: 200,
            tolerance: 1e-4,
            min_separation_secs: 3.0,
            quiet_threshold_db: -50.0,
            max_nmf_cells: 400_000_000,
            median_kernel: 17,
        }
    }
}

/// Alignment planning and warping parameters
#[derive(Debug, Clone)]
pub struct AlignmentConfig {
    /// Smallest stretch ratio applied (default: 0.5)
    pub min_stretch: f32,

    /// Largest stretch ratio applied (default: 2.0)
    pub max_stretch: f32,

    /// Clarity margin a single track needs to dictate the tempo (default: 0.25)
    pub tempo_winner_margin: f32,

    /// Score penalty per semitone of total pitch shift (default: 0.05)
    pub shift_penalty: f32,

    /// Tempo confidence below which a track is not stretched (default: 0.02)
    pub min_tempo_confidence: f32,

    /// Key confidence below which a track is not pitch-shifted (default: 0.1)
    pub min_key_confidence: f32,

    /// Phase vocoder frame size (default: 2048)
    pub frame_size: usize,

    /// Phase vocoder hop size (default: 512)
    pub hop_size: usize,

    /// Keep the spectral envelope in place when pitch shifting (default: true)
    pub preserve_formants: bool,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            min_stretch: 0.5,
            max_stretch: 2.0,
            tempo_winner_margin: 0.25,
            shift_penalty: 0.05,
            min_tempo_confidence: 0.02,
            min_key_confidence: 0.1,
            frame_size: 2048,
            hop_size: 512,
            preserve_formants: true,
        }
    }
}

/// Per-stem output levels applied when rendering
///
/// Linear gains; 1.0 leaves a stem at its blended level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StemLevels {
    /// Vocal prominence
    pub vocals: f32,
    /// Drum prominence
    pub drums: f32,
    /// Bass prominence
    pub bass: f32,
    /// Prominence of the remaining instrumentation
    pub other: f32,
}

impl Default for StemLevels {
    fn default() -> Self {
        Self {
            vocals: 1.0,
            drums: 1.0,
            bass: 1.0,
            other: 1.0,
        }
    }
}

/// Complete mashup configuration
#[derive(Debug, Clone, Default)]
pub struct MashupConfig {
    /// Processing path (default: Enhanced)
    pub mode: ProcessingMode,

    /// Feature extraction parameters
    pub analysis: AnalysisConfig,

    /// Stem separation parameters
    pub separation: SeparationConfig,

    /// Alignment parameters
    pub alignment: AlignmentConfig,

    /// Stem output levels
    pub stem_levels: StemLevels,

    /// Per-stem effects, run before the levels (default: none)
    pub stem_effects: StemEffects,

    /// Output sample rate; `None` uses the first track's rate
    pub output_sample_rate: Option<u32>,
}

impl MashupConfig {
    /// Standard-mode configuration with default parameters
    pub fn standard() -> Self {
        Self {
            mode: ProcessingMode::Standard,
            ..Self::default()
        }
    }

    /// Check parameters for internal consistency
    ///
    /// # Errors
    ///
    /// Returns `MashupError::InvalidInput` naming the first offending parameter
    pub fn validate(&self) -> Result<(), MashupError> {
        let a = &self.analysis;
        if a.frame_size < 64 || a.hop_size == 0 || a.hop_size > a.frame_size {
            return Err(MashupError::InvalidInput(format!(
                "Invalid analysis STFT parameters: frame_size={}, hop_size={}",
                a.frame_size, a.hop_size
            )));
        }
        if a.min_bpm <= 0.0 || a.min_bpm >= a.max_bpm {
            return Err(MashupError::InvalidInput(format!(
                "Invalid BPM range: [{:.1}, {:.1}]",
                a.min_bpm, a.max_bpm
            )));
        }
        if !(a.chroma_window_secs > 0.0 && a.chroma_window_secs.is_finite()) {
            return Err(MashupError::InvalidInput(format!(
                "chroma_window_secs must be positive, got {}",
                a.chroma_window_secs
            )));
        }
        if !(a.min_duration_secs > 0.0) {
            return Err(MashupError::InvalidInput(
                "min_duration_secs must be positive".to_string(),
            ));
        }

        let s = &self.separation;
        if s.frame_size < 64 || s.hop_size == 0 || s.hop_size > s.frame_size / 2 {
            return Err(MashupError::InvalidInput(format!(
                "Invalid separation STFT parameters: frame_size={}, hop_size={}",
                s.frame_size, s.hop_size
            )));
        }
        if s.min_rank == 0 || s.min_rank > s.max_rank {
            return Err(MashupError::InvalidInput(format!(
                "Invalid NMF rank range: [{}, {}]",
                s.min_rank, s.max_rank
            )));
        }
        if s.median_kernel == 0 || s.median_kernel % 2 == 0 {
            return Err(MashupError::InvalidInput(format!(
                "Median kernel must be odd, got {}",
                s.median_kernel
            )));
        }

        let al = &self.alignment;
        if !(al.min_stretch > 0.0 && al.min_stretch <= 1.0 && al.max_stretch >= 1.0) {
            return Err(MashupError::InvalidInput(format!(
                "Invalid stretch band: [{:.2}, {:.2}]",
                al.min_stretch, al.max_stretch
            )));
        }
        if al.frame_size < 64 || al.hop_size == 0 || al.hop_size > al.frame_size / 2 {
            return Err(MashupError::InvalidInput(format!(
                "Invalid phase vocoder parameters: frame_size={}, hop_size={}",
                al.frame_size, al.hop_size
            )));
        }

        let l = &self.stem_levels;
        for (name, level) in [
            ("vocals", l.vocals),
            ("drums", l.drums),
            ("bass", l.bass),
            ("other", l.other),
        ] {
            if !level.is_finite() || level < 0.0 {
                return Err(MashupError::InvalidInput(format!(
                    "Stem level for {} must be finite and non-negative, got {}",
                    name, level
                )));
            }
        }

        if self.output_sample_rate == Some(0) {
            return Err(MashupError::InvalidInput(
                "Output sample rate must be positive".to_string(),
            ));
        }

        self.stem_effects.validate()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(MashupConfig::default().validate().is_ok());
        assert!(MashupConfig::standard().validate().is_ok());
        assert_eq!(MashupConfig::standard().mode, ProcessingMode::Standard);
    }

    #[test]
    fn test_chroma_window_scales_with_sample_rate() {
        let config = AnalysisConfig::default();
        assert_eq!(config.chroma_frame_size(44100), 8192);
        assert_eq!(config.chroma_frame_size(48000), 8192);
        assert_eq!(config.chroma_frame_size(22050), 4096);
        assert_eq!(config.chroma_frame_size(8000), 2048);
        assert_eq!(config.chroma_hop_size(44100), 2048);

        // Never below the onset frame
        let small = AnalysisConfig {
            chroma_window_secs: 0.01,
            ..AnalysisConfig::default()
        };
        assert_eq!(small.chroma_frame_size(44100), 2048);
        assert_eq!(small.chroma_hop_size(44100), 512);
    }

    #[test]
    fn test_rejects_bad_stretch_band() {
        let mut config = MashupConfig::default();
        config.alignment.min_stretch = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_even_median_kernel() {
        let mut config = MashupConfig::default();
        config.separation.median_kernel = 16;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_stem_effects() {
        let mut config = MashupConfig::default();
        config.stem_effects.vocals.reverb = Some(crate::render::effects::ReverbSettings {
            amount: 2.0,
            room_size: 0.5,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_negative_stem_level() {
        let mut config = MashupConfig::default();
        config.stem_levels.bass = -1.0;
        assert!(config.validate().is_err());
    }
}

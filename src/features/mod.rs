//! Feature extraction modules
//!
//! Everything the planner needs to know about one track:
//! - Onset detection (spectral flux + adaptive threshold)
//! - Period estimation (tempo)
//! - Chroma extraction
//! - Key detection
//! - Melodic contour
//! - Complexity score

pub mod chroma;
pub mod complexity;
pub mod key;
pub mod melody;
pub mod onset;
pub mod period;

pub use complexity::ComplexityScore;

use serde::{Deserialize, Serialize};

use crate::analysis::result::Key;
use crate::audio::Track;
use crate::config::{AnalysisConfig, ProcessingMode};
use crate::dsp::stft::{magnitude, StftPlan};
use crate::error::MashupError;
use crate::preprocessing::silence::SilenceDetector;
use chroma::{ChromaParams, ChromaResolution};
use key::KeyTemplates;
use melody::MelodyParams;
use period::TempoRange;

/// Musical features of one track
///
/// Computed once per request and read-only afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureProfile {
    /// Identifier of the track the profile was computed from
    pub source_id: String,

    /// Sample rate of the analysed audio (Hz)
    pub sample_rate: u32,

    /// Duration of the analysed audio (seconds)
    pub duration_secs: f32,

    /// Tempo estimate (BPM)
    pub tempo_bpm: f32,

    /// Tempo confidence, a.k.a. clarity (0.0-1.0)
    pub tempo_confidence: f32,

    /// Detected key
    pub key: Key,

    /// Key confidence (0.0-1.0)
    pub key_confidence: f32,

    /// Key clarity (0.0-1.0)
    pub key_clarity: f32,

    /// Correlation with every key, ranked highest first
    pub key_scores: Vec<(Key, f32)>,

    /// Chroma matrix (frames × bins) the key was estimated from
    pub chroma: Vec<Vec<f32>>,

    /// Bins per octave of `chroma`
    pub chroma_resolution: ChromaResolution,

    /// Dominant pitch per frame as a fractional MIDI note, `None` when unvoiced
    pub melody: Vec<Option<f32>>,

    /// Onset times (seconds)
    pub onset_times: Vec<f32>,

    /// Complexity score
    pub complexity: ComplexityScore,
}

impl FeatureProfile {
    /// Correlation of the track's chroma with `key` (0.0 if unknown)
    pub fn key_correlation(&self, key: Key) -> f32 {
        self.key_scores
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, score)| *score)
            .unwrap_or(0.0)
    }

    /// Beat period at the detected tempo (seconds)
    pub fn beat_period_secs(&self) -> f32 {
        if self.tempo_bpm > 0.0 {
            60.0 / self.tempo_bpm
        } else {
            0.0
        }
    }
}

/// Extract the feature profile of a track
///
/// # Arguments
///
/// * `track` - Validated or unvalidated input track
/// * `config` - Analysis configuration
/// * `mode` - Processing mode (selects the chroma resolution)
///
/// # Errors
///
/// - `MashupError::DecodeError` if the audio is not valid
/// - `MashupError::InsufficientDuration` if the track is too short
/// - `MashupError::InvalidInput` for an unusable configuration
pub fn extract_features(
    track: &Track,
    config: &AnalysisConfig,
    mode: ProcessingMode,
) -> Result<FeatureProfile, MashupError> {
    track.validate(config.min_duration_secs)?;

    let sample_rate = track.sample_rate();
    log::debug!(
        "Extracting features for '{}': {:.2}s at {} Hz",
        track.source_id(),
        track.duration_secs(),
        sample_rate
    );

    let mono = track.buffer().to_mono();
    if SilenceDetector::default().is_silent(&mono) {
        log::warn!(
            "Track '{}' is silent; tempo and key fall back to defaults",
            track.source_id()
        );
    }
    let plan = StftPlan::new(config.frame_size, config.hop_size)?;
    let magnitudes = magnitude(&plan.forward(&mono));

    // Onsets
    let envelope = onset::spectral_flux::onset_strength(&magnitudes)?;
    let frames_per_sec = sample_rate as f32 / config.hop_size as f32;
    let min_distance =
        ((config.min_onset_interval_ms / 1000.0 * frames_per_sec).ceil() as usize).max(1);
    let onset_frames = onset::pick_onsets(&envelope, config.onset_threshold_k, min_distance)?;
    let onset_times: Vec<f32> = onset_frames
        .iter()
        .map(|&f| f as f32 / frames_per_sec)
        .collect();

    // Tempo
    let tempo = period::estimate_tempo(
        &envelope,
        sample_rate,
        config.hop_size,
        &TempoRange::from(config),
    )?;

    // Chroma and melody use a longer window so low notes resolve to the right pitch class
    let chroma_frame = config.chroma_frame_size(sample_rate);
    let chroma_plan = StftPlan::new(chroma_frame, config.chroma_hop_size(sample_rate))?;
    let chroma_magnitudes = magnitude(&chroma_plan.forward(&mono));

    // Chroma
    let resolution = ChromaResolution::for_mode(mode);
    let params = ChromaParams {
        resolution,
        min_freq: config.min_chroma_freq,
        max_freq: config.max_chroma_freq,
        soft_mapping: config.soft_chroma_mapping,
        soft_sigma: config.soft_mapping_sigma,
    };
    let mut chroma_vectors =
        chroma::extract_chroma(&chroma_magnitudes, sample_rate, chroma_frame, &params)?;
    if (config.chroma_sharpening_power - 1.0).abs() > f32::EPSILON {
        chroma_vectors = chroma_vectors
            .iter()
            .map(|c| chroma::normalization::sharpen_chroma(c, config.chroma_sharpening_power))
            .collect();
    }
    let complexity = complexity::compute_complexity(&chroma_vectors, &onset_times);
    let chroma_vectors =
        chroma::smoothing::smooth_chroma(&chroma_vectors, config.chroma_smoothing_window);

    // Key
    let key_result = key::detect_key(&chroma_vectors, KeyTemplates::shared(resolution))?;

    // Melody
    let melody = melody::extract_melody(
        &chroma_magnitudes,
        sample_rate,
        chroma_frame,
        &MelodyParams {
            min_freq: config.melody_min_freq,
            max_freq: config.melody_max_freq,
            floor_db: config.melody_floor_db,
        },
    )?;

    log::debug!(
        "Features for '{}': {:.2} BPM (conf {:.3}), key {} (conf {:.3}), {} onsets, complexity {:.3}",
        track.source_id(),
        tempo.bpm,
        tempo.confidence,
        key_result.key.name(),
        key_result.confidence,
        onset_times.len(),
        complexity.combined
    );

    Ok(FeatureProfile {
        source_id: track.source_id().to_string(),
        sample_rate,
        duration_secs: track.duration_secs(),
        tempo_bpm: tempo.bpm,
        tempo_confidence: tempo.confidence,
        key: key_result.key,
        key_confidence: key_result.confidence,
        key_clarity: key_result.clarity,
        key_scores: key_result.all_scores,
        chroma: chroma_vectors,
        chroma_resolution: resolution,
        melody,
        onset_times,
        complexity,
    })
}

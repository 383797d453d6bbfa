//! Stem separation
//!
//! Decomposes one track into {vocals, drums, bass, other}:
//! - NMF of the magnitude spectrogram with a pluggable component labeler
//!   (enhanced mode)
//! - Harmonic/percussive masking split with frequency crossovers (standard
//!   mode and every fallback)
//!
//! Both paths build soft masks that sum to one in every time-frequency bin and
//! apply them to each channel's complex STFT, so the stems always add back up
//! to the original track.

pub mod labeling;
pub mod masking;
pub mod nmf;

pub use labeling::{ComponentFeatures, HeuristicLabeler, LabelingPolicy};

use std::fmt;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::analysis::metadata::{FlagKind, ProcessingFlag};
use crate::audio::{AudioBuffer, Track};
use crate::config::{ProcessingMode, SeparationConfig};
use crate::dsp::stft::{Spectrogram, StftPlan};
use crate::error::MashupError;
use crate::features::FeatureProfile;
use crate::preprocessing::normalization::linear_to_db;

const EPSILON: f32 = 1e-10;

/// Stem vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StemKind {
    /// Lead and backing vocals
    Vocals,
    /// Drums and percussion
    Drums,
    /// Bass instruments
    Bass,
    /// Everything else
    Other,
}

impl StemKind {
    /// All stems in storage order
    pub const ALL: [StemKind; 4] = [
        StemKind::Vocals,
        StemKind::Drums,
        StemKind::Bass,
        StemKind::Other,
    ];

    /// Position in [`StemKind::ALL`]
    pub fn index(self) -> usize {
        match self {
            StemKind::Vocals => 0,
            StemKind::Drums => 1,
            StemKind::Bass => 2,
            StemKind::Other => 3,
        }
    }

    /// Lower-case name ("vocals", ...)
    pub fn name(self) -> &'static str {
        match self {
            StemKind::Vocals => "vocals",
            StemKind::Drums => "drums",
            StemKind::Bass => "bass",
            StemKind::Other => "other",
        }
    }
}

/// One buffer per stem kind, all on the same timeline
#[derive(Debug, Clone, PartialEq)]
pub struct StemSet {
    stems: [AudioBuffer; 4],
}

impl StemSet {
    /// Stem set from buffers in [`StemKind::ALL`] order
    pub fn new(stems: [AudioBuffer; 4]) -> Self {
        Self { stems }
    }

    /// Build a stem set by computing each stem
    pub fn from_fn(f: impl FnMut(StemKind) -> AudioBuffer) -> Self {
        Self {
            stems: StemKind::ALL.map(f),
        }
    }

    /// Stem of one kind
    pub fn get(&self, kind: StemKind) -> &AudioBuffer {
        &self.stems[kind.index()]
    }

    /// Mutable stem of one kind
    pub fn get_mut(&mut self, kind: StemKind) -> &mut AudioBuffer {
        &mut self.stems[kind.index()]
    }

    /// Iterate `(kind, buffer)` in storage order
    pub fn iter(&self) -> impl Iterator<Item = (StemKind, &AudioBuffer)> {
        StemKind::ALL.into_iter().zip(self.stems.iter())
    }

    /// Sample rate shared by all stems
    pub fn sample_rate(&self) -> u32 {
        self.stems[0].sample_rate
    }

    /// Frame count of the longest stem
    pub fn num_frames(&self) -> usize {
        self.stems.iter().map(AudioBuffer::num_frames).max().unwrap_or(0)
    }

    /// Sum of all stems
    pub fn mixdown(&self) -> AudioBuffer {
        let first = &self.stems[0];
        let mut mix = AudioBuffer::silent(first.num_channels(), self.num_frames(), first.sample_rate);
        for stem in &self.stems {
            mix.add_scaled(stem, 1.0, 0);
        }
        mix
    }
}

/// Which algorithm produced a stem set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeparationMethod {
    /// Non-negative matrix factorization with component labeling
    Nmf {
        /// Number of components
        rank: usize,
    },
    /// Harmonic/percussive split with frequency crossovers
    MaskingSplit,
}

/// Stems plus how they were obtained
#[derive(Debug, Clone)]
pub struct SeparationOutput {
    /// The separated stems
    pub stems: StemSet,

    /// Method that produced them
    pub method: SeparationMethod,

    /// Fallback flags (request-wide; the pipeline attaches the track index)
    pub flags: Vec<ProcessingFlag>,
}

/// Recoverable separation failures, reported as flags
#[derive(Debug, Clone, PartialEq)]
pub enum SeparationError {
    /// Track shorter than the separation minimum
    TooShort {
        /// Track duration in seconds
        duration_secs: f32,
        /// Minimum in seconds
        min_secs: f32,
    },
    /// Track quieter than the separation threshold
    TooQuiet {
        /// Track RMS in dBFS
        rms_db: f32,
        /// Threshold in dBFS
        threshold_db: f32,
    },
    /// Factorization would exceed the cell budget
    OverBudget {
        /// `bins * frames * rank`
        cells: usize,
        /// Configured limit
        limit: usize,
    },
    /// Cost still decreasing when the iteration budget ran out
    NotConverged {
        /// Iterations performed
        iterations: usize,
    },
    /// NaN or infinity in the factors
    NumericalFailure(String),
}

impl SeparationError {
    /// Flag kind this failure is reported as
    pub fn flag_kind(&self) -> FlagKind {
        match self {
            SeparationError::OverBudget { .. } => FlagKind::ResourceExhaustion,
            _ => FlagKind::SeparationFailure,
        }
    }

    /// Convert into a request-wide processing flag
    pub fn into_flag(self) -> ProcessingFlag {
        ProcessingFlag::global(self.flag_kind(), self.to_string())
    }
}

impl fmt::Display for SeparationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeparationError::TooShort {
                duration_secs,
                min_secs,
            } => write!(
                f,
                "Track too short for factorization: {:.2}s (minimum {:.2}s)",
                duration_secs, min_secs
            ),
            SeparationError::TooQuiet {
                rms_db,
                threshold_db,
            } => write!(
                f,
                "Track too quiet for factorization: {:.1} dBFS (threshold {:.1} dBFS)",
                rms_db, threshold_db
            ),
            SeparationError::OverBudget { cells, limit } => write!(
                f,
                "Factorization needs {} cells, limit is {}; downgraded to masking split",
                cells, limit
            ),
            SeparationError::NotConverged { iterations } => {
                write!(f, "Factorization did not converge in {} iterations", iterations)
            }
            SeparationError::NumericalFailure(msg) => {
                write!(f, "Factorization failed numerically: {}", msg)
            }
        }
    }
}

impl std::error::Error for SeparationError {}

/// Stem separator
///
/// Holds the configuration and the labeling policy; stateless across calls,
/// so one separator can serve several tracks in parallel.
#[derive(Debug)]
pub struct StemSeparator {
    config: SeparationConfig,
    mode: ProcessingMode,
    labeler: Box<dyn LabelingPolicy>,
}

impl StemSeparator {
    /// Separator with the default heuristic labeler
    pub fn new(config: SeparationConfig, mode: ProcessingMode) -> Self {
        Self {
            config,
            mode,
            labeler: Box::new(HeuristicLabeler::default()),
        }
    }

    /// Replace the component labeling policy
    pub fn with_labeler(mut self, labeler: Box<dyn LabelingPolicy>) -> Self {
        self.labeler = labeler;
        self
    }

    /// NMF rank for a track: `min + round(c · (max - min))`, midpoint without a profile
    pub fn choose_rank(&self, profile: Option<&FeatureProfile>) -> usize {
        let min = self.config.min_rank;
        let max = self.config.max_rank.max(min);
        let c = profile
            .map(|p| p.complexity.combined.clamp(0.0, 1.0))
            .unwrap_or(0.5);
        min + (c * (max - min) as f32).round() as usize
    }

    /// Processing mode the separator was built for
    pub fn mode(&self) -> ProcessingMode {
        self.mode
    }

    /// Estimated NMF size `bins × frames × rank` for a signal of `num_frames` samples
    pub fn nmf_cells(&self, num_frames: usize, rank: usize) -> usize {
        let bins = self.config.frame_size / 2 + 1;
        let frames = 1 + num_frames / self.config.hop_size.max(1);
        bins.saturating_mul(frames).saturating_mul(rank)
    }

    /// Check a track against `max_nmf_cells` without computing anything
    ///
    /// # Errors
    ///
    /// Returns `SeparationError::OverBudget` if the factorization would be too large
    pub fn check_budget(
        &self,
        track: &Track,
        profile: Option<&FeatureProfile>,
    ) -> Result<(), SeparationError> {
        let cells = self.nmf_cells(track.buffer().num_frames(), self.choose_rank(profile));
        if cells > self.config.max_nmf_cells {
            return Err(SeparationError::OverBudget {
                cells,
                limit: self.config.max_nmf_cells,
            });
        }
        Ok(())
    }

    /// Separate one track into stems
    ///
    /// # Arguments
    ///
    /// * `track` - Input track
    /// * `profile` - Feature profile of the track, used to size the factorization
    ///
    /// # Returns
    ///
    /// Stems with the track's channel count, length and sample rate, the
    /// method used and any fallback flags
    ///
    /// # Errors
    ///
    /// Returns `MashupError` only if the track itself is invalid or the STFT
    /// parameters are unusable; separation trouble becomes a flag
    pub fn separate(
        &self,
        track: &Track,
        profile: Option<&FeatureProfile>,
    ) -> Result<SeparationOutput, MashupError> {
        self.separate_in_mode(track, profile, self.mode)
    }

    /// Separate one track with an explicit mode
    ///
    /// Used when a request is downgraded to the masking split after the
    /// separator was built.
    ///
    /// # Errors
    ///
    /// Same as [`StemSeparator::separate`]
    pub fn separate_in_mode(
        &self,
        track: &Track,
        profile: Option<&FeatureProfile>,
        mode: ProcessingMode,
    ) -> Result<SeparationOutput, MashupError> {
        let buffer = track.buffer();
        buffer.validate(track.source_id())?;

        let plan = StftPlan::new(self.config.frame_size, self.config.hop_size)?;
        let spectra: Vec<Spectrogram> = buffer.channels.iter().map(|ch| plan.forward(ch)).collect();
        let magnitudes = mono_magnitude(&plan, &buffer.to_mono());

        log::debug!(
            "Separating '{}': {} channels, {} bins x {} frames",
            track.source_id(),
            buffer.num_channels(),
            magnitudes.nrows(),
            magnitudes.ncols()
        );

        let mut flags = Vec::new();
        let (masks, method) = match mode {
            ProcessingMode::Standard => (
                self.masking_masks(&magnitudes, buffer.sample_rate),
                SeparationMethod::MaskingSplit,
            ),
            ProcessingMode::Enhanced => match self.nmf_masks(track, profile, &magnitudes) {
                Ok((masks, rank)) => (masks, SeparationMethod::Nmf { rank }),
                Err(err) => {
                    log::warn!(
                        "Falling back to masking split for '{}': {}",
                        track.source_id(),
                        err
                    );
                    flags.push(err.into_flag());
                    (
                        self.masking_masks(&magnitudes, buffer.sample_rate),
                        SeparationMethod::MaskingSplit,
                    )
                }
            },
        };

        let stems = apply_masks(&plan, &spectra, &masks, buffer.num_frames(), buffer.sample_rate);

        log::debug!("Separated '{}' with {:?}", track.source_id(), method);

        Ok(SeparationOutput {
            stems,
            method,
            flags,
        })
    }

    fn masking_masks(&self, magnitudes: &Array2<f32>, sample_rate: u32) -> [Array2<f32>; 4] {
        masking::split_masks(
            magnitudes,
            self.config.median_kernel,
            sample_rate,
            self.config.frame_size,
        )
    }

    fn nmf_masks(
        &self,
        track: &Track,
        profile: Option<&FeatureProfile>,
        magnitudes: &Array2<f32>,
    ) -> Result<([Array2<f32>; 4], usize), SeparationError> {
        let duration = track.duration_secs();
        if duration < self.config.min_separation_secs {
            return Err(SeparationError::TooShort {
                duration_secs: duration,
                min_secs: self.config.min_separation_secs,
            });
        }

        let rms_db = linear_to_db(track.buffer().rms());
        if rms_db < self.config.quiet_threshold_db {
            return Err(SeparationError::TooQuiet {
                rms_db,
                threshold_db: self.config.quiet_threshold_db,
            });
        }

        self.check_budget(track, profile)?;
        let rank = self.choose_rank(profile);

        let result = nmf::factorize(
            magnitudes,
            &nmf::NmfParams {
                rank,
                max_iterations: self.config.max_iterations,
                tolerance: self.config.tolerance,
            },
        )?;

        let sample_rate = track.sample_rate();
        let labels: Vec<StemKind> = (0..rank)
            .map(|k| {
                let features = labeling::describe_component(
                    result.basis.column(k),
                    result.activations.row(k),
                    sample_rate,
                    self.config.frame_size,
                );
                let kind = self.labeler.label(&features);
                log::debug!("Component {} → {} ({:?})", k, kind.name(), features);
                kind
            })
            .collect();

        Ok((component_masks(&result, &labels), rank))
    }
}

/// Magnitude spectrogram of a mono signal as bins × frames
fn mono_magnitude(plan: &StftPlan, mono: &[f32]) -> Array2<f32> {
    let spectrum = plan.forward(mono);
    let n_frames = spectrum.len();
    let n_bins = plan.num_bins();
    Array2::from_shape_fn((n_bins, n_frames), |(k, t)| spectrum[t][k].norm())
}

/// Wiener-style masks from labeled NMF components
///
/// Bins the model leaves empty go to `Other`, so the masks always sum to one.
fn component_masks(result: &nmf::NmfResult, labels: &[StemKind]) -> [Array2<f32>; 4] {
    let shape = (result.basis.nrows(), result.activations.ncols());
    let mut partial: [Array2<f32>; 4] = StemKind::ALL.map(|_| Array2::zeros(shape));

    for (k, &kind) in labels.iter().enumerate() {
        let w = result.basis.column(k);
        let h = result.activations.row(k);
        let target = &mut partial[kind.index()];
        for ((f, t), value) in target.indexed_iter_mut() {
            *value += w[f] * h[t];
        }
    }

    let total = partial.iter().fold(Array2::<f32>::zeros(shape), |acc, p| acc + p);
    let mut masks = partial;
    for ((f, t), &sum) in total.indexed_iter() {
        if sum > EPSILON {
            for mask in masks.iter_mut() {
                mask[[f, t]] /= sum;
            }
        } else {
            for mask in masks.iter_mut() {
                mask[[f, t]] = 0.0;
            }
            masks[StemKind::Other.index()][[f, t]] = 1.0;
        }
    }
    masks
}

/// Apply bins × frames masks to every channel's spectrogram and resynthesize
fn apply_masks(
    plan: &StftPlan,
    spectra: &[Spectrogram],
    masks: &[Array2<f32>; 4],
    num_frames: usize,
    sample_rate: u32,
) -> StemSet {
    StemSet::from_fn(|kind| {
        let mask = &masks[kind.index()];
        let channels = spectra
            .iter()
            .map(|spectrum| {
                let masked: Spectrogram = spectrum
                    .iter()
                    .enumerate()
                    .map(|(t, frame)| {
                        frame
                            .iter()
                            .enumerate()
                            .map(|(k, &c)| c * mask[[k, t]])
                            .collect()
                    })
                    .collect();
                plan.inverse(&masked, num_frames)
            })
            .collect();
        AudioBuffer::new(channels, sample_rate)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn test_config() -> SeparationConfig {
        SeparationConfig {
            frame_size: 512,
            hop_size: 128,
            max_iterations: 60,
            min_separation_secs: 1.0,
            ..SeparationConfig::default()
        }
    }

    /// Bass tone, mid tone and clicks at 8 kHz
    fn mixed_track(secs: f32, stereo: bool) -> Track {
        let sr = 8000;
        let n = (sr as f32 * secs) as usize;
        let left: Vec<f32> = (0..n)
            .map(|i| {
                let t = i as f32 / sr as f32;
                let click = if i % 2000 < 40 { 0.5 * (1.0 - (i % 2000) as f32 / 40.0) } else { 0.0 };
                0.3 * (2.0 * PI * 80.0 * t).sin() + 0.2 * (2.0 * PI * 880.0 * t).sin() + click
            })
            .collect();
        let buffer = if stereo {
            let right = left.iter().map(|x| x * 0.5).collect();
            AudioBuffer::stereo(left, right, sr)
        } else {
            AudioBuffer::mono(left, sr)
        };
        Track::new("mix", buffer)
    }

    fn assert_additive(track: &Track, stems: &StemSet) {
        let mix = stems.mixdown();
        assert_eq!(mix.num_channels(), track.buffer().num_channels());
        assert_eq!(mix.num_frames(), track.buffer().num_frames());
        for (a, b) in mix.channels.iter().zip(track.buffer().channels.iter()) {
            let max_err = a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).fold(0.0f32, f32::max);
            assert!(max_err < 1e-3, "Stems do not sum to the original: {}", max_err);
        }
    }

    #[test]
    fn test_masking_split_is_additive() {
        let track = mixed_track(2.0, true);
        let separator = StemSeparator::new(test_config(), ProcessingMode::Standard);
        let output = separator.separate(&track, None).unwrap();

        assert_eq!(output.method, SeparationMethod::MaskingSplit);
        assert!(output.flags.is_empty());
        assert_additive(&track, &output.stems);
    }

    #[test]
    fn test_masking_split_routes_bass() {
        let track = mixed_track(2.0, false);
        let separator = StemSeparator::new(test_config(), ProcessingMode::Standard);
        let stems = separator.separate(&track, None).unwrap().stems;

        let bass = stems.get(StemKind::Bass).rms();
        let vocals = stems.get(StemKind::Vocals).rms();
        assert!(bass > 0.15, "80 Hz tone should land in bass, rms {}", bass);
        assert!(vocals > 0.1, "880 Hz tone should land in vocals, rms {}", vocals);
    }

    #[test]
    fn test_nmf_is_additive() {
        let track = mixed_track(2.0, true);
        let separator = StemSeparator::new(test_config(), ProcessingMode::Enhanced);
        let output = separator.separate(&track, None).unwrap();

        assert_additive(&track, &output.stems);
        for (_, stem) in output.stems.iter() {
            assert_eq!(stem.num_frames(), track.buffer().num_frames());
            assert_eq!(stem.sample_rate, 8000);
        }
    }

    #[test]
    fn test_short_track_falls_back_with_flag() {
        let track = mixed_track(0.5, false);
        let separator = StemSeparator::new(test_config(), ProcessingMode::Enhanced);
        let output = separator.separate(&track, None).unwrap();

        assert_eq!(output.method, SeparationMethod::MaskingSplit);
        assert_eq!(output.flags.len(), 1);
        assert_eq!(output.flags[0].kind, FlagKind::SeparationFailure);
        assert_additive(&track, &output.stems);
    }

    #[test]
    fn test_quiet_track_falls_back_with_flag() {
        let track = Track::new("quiet", AudioBuffer::mono(vec![1e-4; 16000], 8000));
        let separator = StemSeparator::new(test_config(), ProcessingMode::Enhanced);
        let output = separator.separate(&track, None).unwrap();
        assert_eq!(output.flags[0].kind, FlagKind::SeparationFailure);
    }

    #[test]
    fn test_over_budget_is_resource_exhaustion() {
        let track = mixed_track(2.0, false);
        let config = SeparationConfig {
            max_nmf_cells: 1000,
            ..test_config()
        };
        let output = StemSeparator::new(config, ProcessingMode::Enhanced)
            .separate(&track, None)
            .unwrap();
        assert_eq!(output.method, SeparationMethod::MaskingSplit);
        assert_eq!(output.flags[0].kind, FlagKind::ResourceExhaustion);
    }

    #[test]
    fn test_budget_estimate_matches_spectrogram() {
        let track = mixed_track(2.0, false);
        let separator = StemSeparator::new(test_config(), ProcessingMode::Enhanced);
        // 512-point frames, hop 128, 16000 samples → 257 bins × 126 frames
        assert_eq!(separator.nmf_cells(16000, 8), 257 * 126 * 8);
        assert!(separator.check_budget(&track, None).is_ok());

        let tight = StemSeparator::new(
            SeparationConfig {
                max_nmf_cells: 257 * 126 * 8 - 1,
                ..test_config()
            },
            ProcessingMode::Enhanced,
        );
        assert!(matches!(
            tight.check_budget(&track, None),
            Err(SeparationError::OverBudget { .. })
        ));
    }

    #[test]
    fn test_explicit_mode_overrides_separator_mode() {
        let track = mixed_track(2.0, false);
        let separator = StemSeparator::new(test_config(), ProcessingMode::Enhanced);
        let output = separator
            .separate_in_mode(&track, None, ProcessingMode::Standard)
            .unwrap();
        assert_eq!(output.method, SeparationMethod::MaskingSplit);
        assert!(output.flags.is_empty());
        assert_eq!(separator.mode(), ProcessingMode::Enhanced);
    }

    #[test]
    fn test_choose_rank() {
        let separator = StemSeparator::new(SeparationConfig::default(), ProcessingMode::Enhanced);
        assert_eq!(separator.choose_rank(None), 8);
    }

    #[test]
    fn test_custom_labeler() {
        #[derive(Debug)]
        struct AllDrums;
        impl LabelingPolicy for AllDrums {
            fn label(&self, _features: &ComponentFeatures) -> StemKind {
                StemKind::Drums
            }
        }

        let track = mixed_track(2.0, false);
        let config = SeparationConfig {
            tolerance: 1.0,
            ..test_config()
        };
        let output = StemSeparator::new(config, ProcessingMode::Enhanced)
            .with_labeler(Box::new(AllDrums))
            .separate(&track, None)
            .unwrap();

        assert!(matches!(output.method, SeparationMethod::Nmf { .. }));
        assert!(output.stems.get(StemKind::Vocals).peak() < 1e-6);
        assert!(output.stems.get(StemKind::Drums).rms() > 0.1);
    }
}

//! # Stratum Mashup
//!
//! An audio mashup engine: takes two or three decoded recordings and produces
//! one coherent track by separating stems, aligning tempo and key, and
//! recombining stems with content-aware mixing rules.
//!
//! ## Features
//!
//! - **Feature Extraction**: tempo, key (24-bin chroma in enhanced mode),
//!   melodic contour, onsets and a complexity score per track
//! - **Stem Separation**: NMF with a pluggable component labeler, falling back
//!   to a harmonic/percussive masking split
//! - **Alignment**: one reference tempo and key, phase-vocoder time stretch and
//!   formant-preserving pitch shift, sample-rate conversion
//! - **Blending and Rendering**: beat-grid alignment, per-stem mixing policy,
//!   optional per-stem effects (EQ, compression, distortion, delay, reverb),
//!   bus compression and loudness normalization
//!
//! ## Quick Start
//!
//! ```no_run
//! use stratum_mashup::{create_mashup, AudioBuffer, MashupConfig, Track};
//!
//! // Decoded audio (planar f32, normalized to [-1.0, 1.0])
//! let first = AudioBuffer::mono(vec![0.0; 44100 * 30], 44100);
//! let second = AudioBuffer::mono(vec![0.0; 44100 * 30], 44100);
//!
//! let tracks = vec![
//!     Track::new("first.wav", first),
//!     Track::new("second.wav", second).with_weight(0.5),
//! ];
//! let result = create_mashup(&tracks, &MashupConfig::default())?;
//!
//! println!(
//!     "{:.1}s at {:.1} BPM in {}",
//!     result.duration_secs(),
//!     result.report.reference_tempo_bpm,
//!     result.report.reference_key
//! );
//! # Ok::<(), stratum_mashup::MashupError>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Tracks → Feature Extraction → Stem Separation → Alignment Planning
//!        → Warping → Blending → Rendering → MashupResult
//! ```
//!
//! Every stage is public and can be run on its own.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod alignment;
pub mod analysis;
pub mod audio;
pub mod blend;
pub mod config;
pub mod dsp;
pub mod error;
pub mod features;
pub mod pipeline;
pub mod preprocessing;
pub mod render;
pub mod separation;

// Re-export main types
pub use alignment::{plan_alignment, warp_stems, AlignmentPlan, TrackAlignment};
pub use analysis::metadata::{FlagKind, MetadataReport, ProcessingFlag};
pub use analysis::result::{Key, MashupResult};
pub use audio::{AudioBuffer, Track};
pub use blend::{BlendConfig, Blender, MultiStemMix};
pub use config::{
    AlignmentConfig, AnalysisConfig, MashupConfig, ProcessingMode, SeparationConfig, StemLevels,
};
pub use error::MashupError;
pub use features::{extract_features, FeatureProfile};
pub use pipeline::MashupPipeline;
pub use render::{EffectChain, Renderer, StemEffects};
pub use separation::{StemKind, StemSeparator, StemSet};

/// Create a mashup from 2 or 3 tracks
///
/// Runs feature extraction, stem separation, alignment, blending and rendering
/// with the given configuration.
///
/// # Arguments
///
/// * `tracks` - Two or three decoded tracks with their blend weights
/// * `config` - Mashup configuration
///
/// # Returns
///
/// `MashupResult` with interleaved stereo samples, the alignment plan and a
/// metadata report (including any fallback flags)
///
/// # Errors
///
/// Returns `MashupError` if the request is invalid (track count, weights,
/// configuration), a track cannot be decoded or is too short, or processing
/// fails internally
///
/// # Example
///
/// ```no_run
/// use stratum_mashup::{create_mashup, AudioBuffer, MashupConfig, Track};
///
/// let tracks = vec![
///     Track::new("a", AudioBuffer::mono(vec![0.0; 44100 * 20], 44100)),
///     Track::new("b", AudioBuffer::mono(vec![0.0; 44100 * 20], 44100)),
/// ];
/// let result = create_mashup(&tracks, &MashupConfig::standard())?;
/// # Ok::<(), stratum_mashup::MashupError>(())
/// ```
pub fn create_mashup(tracks: &[Track], config: &MashupConfig) -> Result<MashupResult, MashupError> {
    MashupPipeline::new(config.clone())?.run(tracks)
}

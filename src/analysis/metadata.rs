//! Mashup metadata: processing flags and the per-request report

use serde::{Deserialize, Serialize};

use super::confidence::AnalysisConfidence;
use crate::config::ProcessingMode;
use crate::preprocessing::normalization::LoudnessMetadata;
use crate::separation::SeparationMethod;

/// Kind of recoverable degradation raised while processing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlagKind {
    /// Primary separation failed or was skipped; masking split used instead
    SeparationFailure,
    /// Track left unstretched or unshifted because its alignment was implausible
    AlignmentAnomaly,
    /// Separation cost over budget; request downgraded to the masking split
    ResourceExhaustion,
    /// Blend peak exceeded full scale; all stems scaled down
    BlendRenormalized,
    /// Rendered mix is silent
    SilentOutput,
}

/// Metadata marker for a recoverable degradation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingFlag {
    /// What happened
    pub kind: FlagKind,

    /// Index of the affected track, `None` for request-wide flags
    pub track: Option<usize>,

    /// Human-readable detail
    pub message: String,
}

impl ProcessingFlag {
    /// Flag attached to one track
    pub fn for_track(kind: FlagKind, track: usize, message: impl Into<String>) -> Self {
        Self {
            kind,
            track: Some(track),
            message: message.into(),
        }
    }

    /// Request-wide flag
    pub fn global(kind: FlagKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            track: None,
            message: message.into(),
        }
    }
}

/// Per-track summary in the report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackReport {
    /// Caller-supplied identifier
    pub source_id: String,

    /// Input duration in seconds
    pub duration_secs: f32,

    /// Input sample rate in Hz
    pub sample_rate: u32,

    /// Caller-supplied blend weight
    pub weight: f32,

    /// Detected tempo
    pub tempo_bpm: f32,

    /// Detected key name ("C", "Am", ...)
    pub key: String,

    /// Detected key in DJ numerical notation ("1A", ...)
    pub key_numerical: String,

    /// Key clarity (0.0-1.0)
    pub key_clarity: f32,

    /// Combined complexity score (0.0-1.0)
    pub complexity: f32,

    /// Tempo/key confidence summary
    pub confidence: AnalysisConfidence,

    /// Qualitative overall confidence: "High", "Medium" or "Low"
    pub confidence_level: String,

    /// Separation method that produced the stems
    pub separation_method: SeparationMethod,

    /// Applied stretch ratio
    pub stretch_ratio: f32,

    /// Applied pitch shift in semitones
    pub pitch_shift_semitones: i32,

    /// Delay applied to line the beat grid up with the anchor track
    pub grid_delay_secs: f32,

    /// Duration after stretching and grid delay
    pub aligned_duration_secs: f32,
}

/// Report returned alongside every mashup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataReport {
    /// Per-track summaries, in input order
    pub tracks: Vec<TrackReport>,

    /// Tempo every track was stretched to
    pub reference_tempo_bpm: f32,

    /// Key every track was shifted to
    pub reference_key: String,

    /// Processing mode the request ran in
    pub mode: ProcessingMode,

    /// Every flag raised, in stage order
    pub flags: Vec<ProcessingFlag>,

    /// Loudness before and gain applied by the final normalization
    pub loudness: LoudnessMetadata,

    /// Gain applied by the clip guard in the blender (1.0 when untouched)
    pub blend_headroom_gain: f32,

    /// Wall-clock processing time
    pub processing_time_ms: f32,

    /// Crate version that produced the mashup
    pub algorithm_version: String,
}

impl MetadataReport {
    /// Number of flags of a given kind
    pub fn count_flags(&self, kind: FlagKind) -> usize {
        self.flags.iter().filter(|f| f.kind == kind).count()
    }
}

/// Crate version string recorded in every report
pub fn algorithm_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

//! Tempo and key alignment
//!
//! - Planning: one reference tempo and key, per-track stretch ratio, pitch
//!   shift and beat phase
//! - Warping: phase-vocoder pitch shift and time stretch, sample-rate
//!   conversion

pub mod phase_vocoder;
pub mod planner;
pub mod resample;
pub mod warp;

pub use planner::plan_alignment;
pub use warp::warp_stems;

use serde::{Deserialize, Serialize};

use crate::analysis::metadata::ProcessingFlag;
use crate::analysis::result::Key;

/// How the reference tempo was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TempoPolicy {
    /// One track's tempo was clearly the most reliable
    ClearestSource,
    /// No clear winner; the median tempo was used
    Median,
}

/// Transform applied to one track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackAlignment {
    /// Reference tempo / track tempo; > 1 speeds the track up
    pub stretch_ratio: f32,

    /// Signed pitch shift in semitones, in [-6, 5]
    pub pitch_shift_semitones: i32,

    /// Phase of the track's beat grid within one reference beat, after stretching (seconds)
    pub beat_phase_secs: f32,

    /// Duration after stretching (seconds)
    pub stretched_duration_secs: f32,
}

impl TrackAlignment {
    /// Transform that leaves a track untouched
    pub fn identity(duration_secs: f32) -> Self {
        Self {
            stretch_ratio: 1.0,
            pitch_shift_semitones: 0,
            beat_phase_secs: 0.0,
            stretched_duration_secs: duration_secs,
        }
    }

    /// True if warping with this alignment changes nothing but the sample rate
    pub fn is_identity(&self) -> bool {
        self.stretch_ratio == 1.0 && self.pitch_shift_semitones == 0
    }
}

/// Alignment plan shared by every later stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentPlan {
    /// Tempo every track is stretched to
    pub reference_tempo_bpm: f32,

    /// Key every track is shifted to
    pub reference_key: Key,

    /// Track the reference tempo was taken from
    pub tempo_source: usize,

    /// How the tempo source was picked
    pub tempo_policy: TempoPolicy,

    /// Track the reference key was taken from
    pub key_source: usize,

    /// Per-track transforms, in input order
    pub tracks: Vec<TrackAlignment>,

    /// Alignment anomalies
    pub flags: Vec<ProcessingFlag>,
}

impl AlignmentPlan {
    /// Reference beat period in seconds
    pub fn beat_period_secs(&self) -> f32 {
        60.0 / self.reference_tempo_bpm
    }
}

//! Chroma extraction
//!
//! Extract pitch-class distributions from a magnitude spectrogram:
//! - Chroma vector computation (12 or 24 bins per octave)
//! - Normalization and sharpening
//! - Temporal smoothing

pub mod extractor;
pub mod normalization;
pub mod smoothing;

pub use extractor::{extract_chroma, ChromaParams};

use serde::{Deserialize, Serialize};

use crate::config::ProcessingMode;

/// Number of chroma bins per octave
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChromaResolution {
    /// One bin per semitone
    Standard12,
    /// Two bins per semitone (quarter-tone resolution)
    High24,
}

impl ChromaResolution {
    /// Resolution used by a processing mode
    pub fn for_mode(mode: ProcessingMode) -> Self {
        match mode {
            ProcessingMode::Enhanced => ChromaResolution::High24,
            ProcessingMode::Standard => ChromaResolution::Standard12,
        }
    }

    /// Bins per octave (12 or 24)
    pub fn bins_per_octave(self) -> usize {
        12 * self.bins_per_semitone()
    }

    /// Bins per semitone (1 or 2)
    pub fn bins_per_semitone(self) -> usize {
        match self {
            ChromaResolution::Standard12 => 1,
            ChromaResolution::High24 => 2,
        }
    }
}

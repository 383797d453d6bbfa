//! Key detection modules
//!
//! Detect musical key using:
//! - Krumhansl-Kessler templates (24 keys, 12 or 24 chroma bins)
//! - Template correlation
//! - Key clarity scoring

pub mod detector;
pub mod key_clarity;
pub mod templates;

pub use detector::{detect_key, pearson_correlation};
pub use key_clarity::compute_key_clarity;
pub use templates::KeyTemplates;

use crate::analysis::result::Key;

/// Key detection result
#[derive(Debug, Clone)]
pub struct KeyDetectionResult {
    /// Detected key (best match)
    pub key: Key,

    /// Confidence score (0.0-1.0): the best template correlation
    pub confidence: f32,

    /// Key clarity (0.0-1.0)
    pub clarity: f32,

    /// All 24 key correlations (ranked, highest first)
    pub all_scores: Vec<(Key, f32)>,

    /// Top 3 keys with scores
    pub top_keys: Vec<(Key, f32)>,
}

//! Confidence scoring
//!
//! Summarizes how far the tempo and key of one track can be trusted. The
//! planner decides with the raw numbers; this summary goes into the report so
//! callers can tell a solid analysis from a guess.
//!
//! # Confidence Components
//!
//! 1. **Tempo Confidence**: autocorrelation strength at the chosen lag, reduced
//!    when too few onsets back it up
//! 2. **Key Confidence**: template correlation, reduced for low key clarity
//! 3. **Overall Confidence**: weighted combination (tempo 60%, key 40%)
//!
//! # Example
//!
//! ```no_run
//! use stratum_mashup::{extract_features, AnalysisConfig, AudioBuffer, ProcessingMode, Track};
//! use stratum_mashup::analysis::confidence::compute_confidence;
//!
//! let track = Track::new("a.wav", AudioBuffer::mono(vec![0.0f32; 44100 * 30], 44100));
//! let profile = extract_features(&track, &AnalysisConfig::default(), ProcessingMode::Enhanced)?;
//! let confidence = compute_confidence(&profile);
//!
//! println!("Overall confidence: {:.2}", confidence.overall_confidence);
//! # Ok::<(), stratum_mashup::MashupError>(())
//! ```

use serde::{Deserialize, Serialize};

use crate::features::FeatureProfile;

/// Fewer onsets per second than this make the tempo estimate suspect
const MIN_ONSET_RATE: f32 = 0.5;

/// Specific weaknesses found while scoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceWarning {
    /// Weak or ambiguous periodicity
    WeakTempo,
    /// Few onsets to anchor the beat grid
    SparseOnsets,
    /// Chroma fits no key well
    WeakTonality,
}

/// Analysis confidence scores for one track
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfidence {
    /// Tempo confidence (0.0-1.0)
    pub tempo_confidence: f32,

    /// Key confidence (0.0-1.0)
    pub key_confidence: f32,

    /// Overall confidence (weighted average)
    pub overall_confidence: f32,

    /// Warnings indicating specific issues
    pub warnings: Vec<ConfidenceWarning>,
}

/// Compute confidence scores for a feature profile
///
/// # Algorithm
///
/// 1. **Tempo**: the profile's tempo confidence, ×0.7 when onsets are sparse
/// 2. **Key**: the profile's key confidence, ×0.6 for clarity below 0.2 and
///    ×0.85 for clarity below 0.5
/// 3. **Overall**: `0.6·tempo + 0.4·key` when both succeeded, otherwise the
///    surviving component ×0.6, or 0 when both failed
pub fn compute_confidence(profile: &FeatureProfile) -> AnalysisConfidence {
    let mut warnings = Vec::new();

    let onset_rate = if profile.duration_secs > 0.0 {
        profile.onset_times.len() as f32 / profile.duration_secs
    } else {
        0.0
    };
    let sparse = onset_rate < MIN_ONSET_RATE;

    let mut tempo_confidence = profile.tempo_confidence.clamp(0.0, 1.0);
    if sparse {
        tempo_confidence *= 0.7;
        warnings.push(ConfidenceWarning::SparseOnsets);
    }

    let key_confidence = compute_key_confidence(profile.key_confidence, profile.key_clarity);

    let overall_confidence = if tempo_confidence > 0.0 && key_confidence > 0.0 {
        (tempo_confidence * 0.6 + key_confidence * 0.4).clamp(0.0, 1.0)
    } else if tempo_confidence > 0.0 {
        tempo_confidence * 0.6
    } else if key_confidence > 0.0 {
        key_confidence * 0.6
    } else {
        0.0
    };

    if tempo_confidence < 0.3 {
        warnings.push(ConfidenceWarning::WeakTempo);
    }
    if key_confidence < 0.2 {
        warnings.push(ConfidenceWarning::WeakTonality);
    }

    log::debug!(
        "Confidence for '{}': tempo={:.3}, key={:.3}, overall={:.3}",
        profile.source_id,
        tempo_confidence,
        key_confidence,
        overall_confidence
    );

    AnalysisConfidence {
        tempo_confidence,
        key_confidence,
        overall_confidence,
        warnings,
    }
}

impl AnalysisConfidence {
    /// Overall confidence is high (>= 0.7)
    pub fn is_high_confidence(&self) -> bool {
        self.overall_confidence >= 0.7
    }

    /// Overall confidence is low (< 0.5)
    pub fn is_low_confidence(&self) -> bool {
        self.overall_confidence < 0.5
    }

    /// "High", "Medium" or "Low"
    pub fn confidence_level(&self) -> &'static str {
        if self.is_high_confidence() {
            "High"
        } else if self.is_low_confidence() {
            "Low"
        } else {
            "Medium"
        }
    }
}

fn compute_key_confidence(confidence: f32, clarity: f32) -> f32 {
    if confidence <= 0.0 {
        return 0.0;
    }

    let clarity_adjustment = if clarity < 0.2 {
        0.6
    } else if clarity < 0.5 {
        0.85
    } else {
        1.0
    };

    confidence.min(1.0) * clarity_adjustment
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::result::Key;
    use crate::features::chroma::ChromaResolution;
    use crate::features::ComplexityScore;

    fn create_test_profile(
        tempo_confidence: f32,
        key_confidence: f32,
        key_clarity: f32,
        onsets: usize,
    ) -> FeatureProfile {
        FeatureProfile {
            source_id: "test".to_string(),
            sample_rate: 44100,
            duration_secs: 10.0,
            tempo_bpm: 120.0,
            tempo_confidence,
            key: Key::Major(0),
            key_confidence,
            key_clarity,
            key_scores: vec![],
            chroma: vec![],
            chroma_resolution: ChromaResolution::Standard12,
            melody: vec![],
            onset_times: (0..onsets).map(|i| i as f32 * 0.5).collect(),
            complexity: ComplexityScore::default(),
        }
    }

    #[test]
    fn test_compute_confidence_all_good() {
        let confidence = compute_confidence(&create_test_profile(0.9, 0.8, 0.7, 20));

        assert_eq!(confidence.tempo_confidence, 0.9);
        assert_eq!(confidence.key_confidence, 0.8);
        // 0.9*0.6 + 0.8*0.4 = 0.86
        assert!((confidence.overall_confidence - 0.86).abs() < 0.01);
        assert!(confidence.warnings.is_empty());
        assert_eq!(confidence.confidence_level(), "High");
    }

    #[test]
    fn test_compute_confidence_tempo_failed() {
        let confidence = compute_confidence(&create_test_profile(0.0, 0.8, 0.7, 20));

        // Only key succeeded: 0.8 * 0.6 = 0.48
        assert!((confidence.overall_confidence - 0.48).abs() < 0.01);
        assert!(confidence.warnings.contains(&ConfidenceWarning::WeakTempo));
        assert!(confidence.is_low_confidence());
    }

    #[test]
    fn test_low_clarity_reduces_key_confidence() {
        let confidence = compute_confidence(&create_test_profile(0.9, 0.8, 0.1, 20));
        assert!((confidence.key_confidence - 0.48).abs() < 1e-5);
    }

    #[test]
    fn test_sparse_onsets() {
        let confidence = compute_confidence(&create_test_profile(0.9, 0.8, 0.7, 2));
        assert!(confidence.warnings.contains(&ConfidenceWarning::SparseOnsets));
        assert!((confidence.tempo_confidence - 0.63).abs() < 1e-5);
    }

    #[test]
    fn test_compute_confidence_all_failed() {
        let confidence = compute_confidence(&create_test_profile(0.0, 0.0, 0.0, 0));
        assert_eq!(confidence.overall_confidence, 0.0);
        assert!(confidence.warnings.contains(&ConfidenceWarning::WeakTonality));
    }
}

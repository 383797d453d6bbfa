//! Track complexity score
//!
//! Diagnostic only: combines how spread out the pitch content is with how
//! irregular the onsets are. The planner uses it to discount tempo estimates
//! from busy tracks; the separator uses it to size the factorization.

use serde::{Deserialize, Serialize};

/// Weight of the harmonic part in the combined score
const HARMONIC_WEIGHT: f32 = 0.6;

/// Weight of the rhythmic part in the combined score
const RHYTHMIC_WEIGHT: f32 = 0.4;

/// Complexity score with its parts, all in [0, 1]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplexityScore {
    /// Normalized entropy of the summed chroma
    pub harmonic: f32,
    /// Onset-interval coefficient of variation, squashed by `cv / (1 + cv)`
    pub rhythmic: f32,
    /// `0.6 · harmonic + 0.4 · rhythmic`
    pub combined: f32,
}

/// Compute the complexity score of a track
///
/// # Arguments
///
/// * `chroma_vectors` - Chroma vectors (one per frame)
/// * `onset_times` - Onset times in seconds, ascending
pub fn compute_complexity(chroma_vectors: &[Vec<f32>], onset_times: &[f32]) -> ComplexityScore {
    let harmonic = harmonic_complexity(chroma_vectors);
    let rhythmic = rhythmic_complexity(onset_times);
    let combined = (HARMONIC_WEIGHT * harmonic + RHYTHMIC_WEIGHT * rhythmic).clamp(0.0, 1.0);

    log::debug!(
        "Complexity: harmonic={:.3}, rhythmic={:.3}, combined={:.3}",
        harmonic,
        rhythmic,
        combined
    );

    ComplexityScore {
        harmonic,
        rhythmic,
        combined,
    }
}

fn harmonic_complexity(chroma_vectors: &[Vec<f32>]) -> f32 {
    let n_bins = match chroma_vectors.first() {
        Some(first) if first.len() > 1 => first.len(),
        _ => return 0.0,
    };

    let mut sum = vec![0.0f32; n_bins];
    for chroma in chroma_vectors {
        for (s, &x) in sum.iter_mut().zip(chroma.iter()) {
            *s += x;
        }
    }

    let total: f32 = sum.iter().sum();
    if total <= f32::EPSILON {
        return 0.0;
    }

    let entropy: f32 = sum
        .iter()
        .map(|&s| s / total)
        .filter(|&p| p > 0.0)
        .map(|p| -p * p.ln())
        .sum();

    (entropy / (n_bins as f32).ln()).clamp(0.0, 1.0)
}

fn rhythmic_complexity(onset_times: &[f32]) -> f32 {
    if onset_times.len() < 3 {
        return 0.0;
    }

    let intervals: Vec<f32> = onset_times.windows(2).map(|w| w[1] - w[0]).collect();
    let mean = intervals.iter().sum::<f32>() / intervals.len() as f32;
    if mean <= f32::EPSILON {
        return 0.0;
    }

    let variance =
        intervals.iter().map(|&x| (x - mean) * (x - mean)).sum::<f32>() / intervals.len() as f32;
    let cv = variance.sqrt() / mean;
    cv / (1.0 + cv)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_pitch_class_is_simple() {
        let mut chroma = vec![0.0f32; 12];
        chroma[0] = 1.0;
        let regular: Vec<f32> = (0..20).map(|i| i as f32 * 0.5).collect();
        let score = compute_complexity(&vec![chroma; 10], &regular);
        assert!(score.harmonic < 1e-6);
        assert!(score.rhythmic < 1e-6);
        assert!(score.combined < 1e-6);
    }

    #[test]
    fn test_flat_chroma_is_complex() {
        let chroma = vec![1.0 / 24.0; 24];
        let score = compute_complexity(&vec![chroma; 4], &[]);
        assert!((score.harmonic - 1.0).abs() < 1e-4);
        assert!((score.combined - 0.6).abs() < 1e-4);
    }

    #[test]
    fn test_irregular_onsets() {
        let onsets = [0.0, 0.1, 1.0, 1.05, 2.5, 2.6];
        let score = compute_complexity(&[], &onsets);
        assert!(score.rhythmic > 0.3 && score.rhythmic < 1.0);
        assert_eq!(score.harmonic, 0.0);
    }
}

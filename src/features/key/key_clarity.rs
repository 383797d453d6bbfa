//! Key clarity scoring
//!
//! Estimates how "tonal" vs "atonal" a track is from the spread of its key
//! correlations.

/// Compute key clarity from key scores
///
/// Clarity is the gap between the best and second-best key, relative to the
/// full score range: `(s₁ - s₂) / (s₁ - s_min)`. A single dominant key gives
/// values near 1; a flat or ambiguous profile gives values near 0.
///
/// # Arguments
///
/// * `scores` - All 24 key scores (ranked, highest first)
///
/// # Returns
///
/// Clarity score (0.0-1.0), higher = more tonal
pub fn compute_key_clarity(scores: &[(crate::analysis::result::Key, f32)]) -> f32 {
    if scores.len() < 2 {
        return 0.0;
    }

    let best = scores[0].1;
    let second = scores[1].1;
    let worst = scores.iter().map(|(_, s)| *s).fold(f32::MAX, f32::min);
    let range = best - worst;

    if range <= 1e-6 {
        return 0.0;
    }

    ((best - second) / range).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::result::Key;

    #[test]
    fn test_clear_key() {
        let scores = vec![(Key::Major(0), 0.9), (Key::Minor(9), 0.3), (Key::Major(6), -0.5)];
        let clarity = compute_key_clarity(&scores);
        assert!((clarity - 0.6 / 1.4).abs() < 1e-5);
    }

    #[test]
    fn test_ambiguous_key() {
        let scores = vec![(Key::Major(0), 0.5), (Key::Minor(9), 0.5), (Key::Major(6), 0.1)];
        assert_eq!(compute_key_clarity(&scores), 0.0);
        assert_eq!(compute_key_clarity(&scores[..1]), 0.0);
    }
}

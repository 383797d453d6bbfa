//! Key detection algorithm
//!
//! Matches the average chroma distribution against Krumhansl-Kessler templates
//! to detect the musical key of an audio track.
//!
//! # Algorithm
//!
//! 1. Average chroma vectors across all frames
//! 2. Pearson correlation of the average against each of the 24 templates
//! 3. Rank keys by correlation; the best key's correlation (clamped to
//!    [0, 1]) is the confidence
//!
//! # Reference
//!
//! Krumhansl, C. L. (1990). *Cognitive Foundations of Musical Pitch*.
//! Oxford University Press.

use super::{compute_key_clarity, templates::KeyTemplates, KeyDetectionResult};
use crate::analysis::result::Key;
use crate::error::MashupError;

const EPSILON: f32 = 1e-10;

/// Detect musical key from chroma vectors
///
/// # Arguments
///
/// * `chroma_vectors` - Chroma vectors (one per frame), at the templates' resolution
/// * `templates` - Key templates (Krumhansl-Kessler profiles)
///
/// # Returns
///
/// Key detection result with:
/// - Detected key (major or minor, 0-11)
/// - Confidence score (0.0-1.0)
/// - All 24 key correlations (ranked)
///
/// # Errors
///
/// Returns `MashupError::InvalidInput` if:
/// - Chroma vectors are empty
/// - Chroma vectors do not match the template resolution
///
/// # Example
///
/// ```
/// use stratum_mashup::features::key::{detect_key, KeyTemplates};
/// use stratum_mashup::features::chroma::ChromaResolution;
/// use stratum_mashup::Key;
///
/// // C major triad energy
/// let mut chroma = vec![0.0f32; 12];
/// chroma[0] = 0.4;
/// chroma[4] = 0.3;
/// chroma[7] = 0.3;
/// let templates = KeyTemplates::shared(ChromaResolution::Standard12);
/// let result = detect_key(&[chroma], templates)?;
/// assert_eq!(result.key, Key::Major(0));
/// # Ok::<(), stratum_mashup::MashupError>(())
/// ```
pub fn detect_key(
    chroma_vectors: &[Vec<f32>],
    templates: &KeyTemplates,
) -> Result<KeyDetectionResult, MashupError> {
    log::debug!("Detecting key from {} chroma vectors", chroma_vectors.len());

    if chroma_vectors.is_empty() {
        return Err(MashupError::InvalidInput(
            "Empty chroma vectors".to_string(),
        ));
    }

    let n_bins = templates.resolution().bins_per_octave();
    for (i, chroma) in chroma_vectors.iter().enumerate() {
        if chroma.len() != n_bins {
            return Err(MashupError::InvalidInput(format!(
                "Chroma vector at index {} has {} elements, expected {}",
                i,
                chroma.len(),
                n_bins
            )));
        }
    }

    // Step 1: average chroma
    let mut mean = vec![0.0f32; n_bins];
    for chroma in chroma_vectors {
        for (m, &x) in mean.iter_mut().zip(chroma.iter()) {
            *m += x;
        }
    }
    let n = chroma_vectors.len() as f32;
    for m in mean.iter_mut() {
        *m /= n;
    }

    // Step 2: correlate with all 24 templates
    let mut scores: Vec<(Key, f32)> = Key::all()
        .map(|key| (key, pearson_correlation(&mean, templates.template(key))))
        .collect();

    // Step 3: rank (stable: ties keep template order, majors first)
    scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let (key, best_score) = scores[0];
    let confidence = best_score.clamp(0.0, 1.0);
    let clarity = compute_key_clarity(&scores);
    let top_keys: Vec<(Key, f32)> = scores.iter().take(3).cloned().collect();

    log::debug!(
        "Detected key: {} (correlation {:.4}, clarity {:.4})",
        key.name(),
        best_score,
        clarity
    );

    Ok(KeyDetectionResult {
        key,
        confidence,
        clarity,
        all_scores: scores,
        top_keys,
    })
}

/// Pearson correlation coefficient of two equal-length vectors
///
/// Returns 0.0 if either vector has (near-)zero variance.
pub fn pearson_correlation(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }

    let mean_a = a[..n].iter().sum::<f32>() / n as f32;
    let mean_b = b[..n].iter().sum::<f32>() / n as f32;

    let mut cov = 0.0f32;
    let mut var_a = 0.0f32;
    let mut var_b = 0.0f32;
    for (&x, &y) in a[..n].iter().zip(b[..n].iter()) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    let denom = (var_a * var_b).sqrt();
    if denom < EPSILON {
        0.0
    } else {
        cov / denom
    }
}

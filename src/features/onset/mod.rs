//! Onset detection
//!
//! - Spectral flux onset strength envelope
//! - Adaptive median + MAD threshold
//! - Peak picking with a minimum inter-onset gap

pub mod spectral_flux;
pub mod threshold;

use crate::error::MashupError;
use threshold::adaptive_threshold_median_mad;

/// Pick onset frames from an onset strength envelope
///
/// A frame is an onset when it is a local maximum (strictly above its left
/// neighbour, not below its right one) and exceeds the median + k·MAD
/// threshold of the whole envelope. Of two onsets closer than `min_distance`
/// frames the stronger one is kept.
///
/// # Arguments
///
/// * `envelope` - Onset strength per frame
/// * `threshold_k` - MAD multiplier (default 2.5)
/// * `min_distance` - Minimum onset spacing in frames
///
/// # Returns
///
/// Onset frame indices in ascending order
///
/// # Errors
///
/// Returns `MashupError` if the envelope is empty or `threshold_k` is negative
pub fn pick_onsets(
    envelope: &[f32],
    threshold_k: f32,
    min_distance: usize,
) -> Result<Vec<usize>, MashupError> {
    let threshold = adaptive_threshold_median_mad(envelope, threshold_k)?;
    log::debug!(
        "Picking onsets from {} frames, threshold={:.4}",
        envelope.len(),
        threshold
    );

    let mut onsets: Vec<usize> = Vec::new();
    for i in 1..envelope.len().saturating_sub(1) {
        let value = envelope[i];
        if value <= threshold || value <= envelope[i - 1] || value < envelope[i + 1] {
            continue;
        }

        match onsets.last() {
            Some(&last) if i - last < min_distance => {
                if value > envelope[last] {
                    if let Some(slot) = onsets.last_mut() {
                        *slot = i;
                    }
                }
            }
            _ => onsets.push(i),
        }
    }

    log::debug!("Picked {} onsets", onsets.len());
    Ok(onsets)
}

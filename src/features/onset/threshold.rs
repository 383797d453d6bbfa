//! Adaptive thresholding for onset picking
//!
//! Median + MAD (Median Absolute Deviation) thresholding, as recommended by
//! McFee & Ellis (2014). Robust to the handful of very strong attacks that
//! would drag a mean/std threshold upward.

use crate::error::MashupError;

/// Median of a slice (mean of the two middle values for even lengths)
fn median(values: &[f32]) -> f32 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) * 0.5
    } else {
        sorted[mid]
    }
}

/// Compute adaptive threshold using median + MAD (Median Absolute Deviation)
///
/// Computes: `threshold = median(values) + k * MAD(values)`
/// where MAD = median(|values - median(values)|)
///
/// # Reference
///
/// McFee, B., & Ellis, D. P. W. (2014). Better Beat Tracking Through Robust Onset Aggregation.
/// *Proceedings of the International Society for Music Information Retrieval Conference*.
///
/// # Arguments
///
/// * `values` - Flux/energy values to threshold
/// * `k` - Multiplier for MAD (typically 2.0-3.0, default 2.5)
///
/// # Returns
///
/// Adaptive threshold value
///
/// # Errors
///
/// Returns `MashupError` if values are empty or `k` is negative
pub fn adaptive_threshold_median_mad(values: &[f32], k: f32) -> Result<f32, MashupError> {
    if values.is_empty() {
        return Err(MashupError::InvalidInput(
            "Empty values for threshold calculation".to_string(),
        ));
    }

    if k < 0.0 {
        return Err(MashupError::InvalidInput(
            "MAD multiplier k must be non-negative".to_string(),
        ));
    }

    let med = median(values);
    let deviations: Vec<f32> = values.iter().map(|&v| (v - med).abs()).collect();
    let mad = median(&deviations);

    Ok(med + k * mad)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adaptive_threshold_median_mad_basic() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0, 100.0]; // Outlier at 100
        let threshold = adaptive_threshold_median_mad(&values, 2.5).unwrap();

        // Median is 3.5, MAD is 1.5
        assert!((threshold - (3.5 + 2.5 * 1.5)).abs() < 1e-6);
        assert!(threshold < 50.0, "Threshold should not follow the outlier");
    }

    #[test]
    fn test_adaptive_threshold_median_mad_empty() {
        assert!(adaptive_threshold_median_mad(&[], 2.5).is_err());
    }

    #[test]
    fn test_adaptive_threshold_negative_k() {
        assert!(adaptive_threshold_median_mad(&[1.0], -1.0).is_err());
    }

    #[test]
    fn test_adaptive_threshold_median_mad_single_value() {
        let threshold = adaptive_threshold_median_mad(&[5.0], 2.5).unwrap();
        assert_eq!(threshold, 5.0); // MAD of single value is 0
    }
}

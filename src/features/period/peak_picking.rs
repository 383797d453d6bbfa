//! Peak detection utilities
//!
//! Local-maximum search and sub-bin refinement for 1D signals (autocorrelation
//! functions, spectra).

const EPSILON: f32 = 1e-10;

/// Find peaks in a signal
///
/// Detects interior local maxima at or above `threshold`, separated by at
/// least `min_distance` samples.
///
/// # Arguments
///
/// * `signal` - Signal to find peaks in
/// * `threshold` - Minimum peak height (absolute)
/// * `min_distance` - Minimum distance between peaks (in samples)
///
/// # Returns
///
/// Vector of (index, value) pairs for detected peaks, sorted by value (highest first)
///
/// # Algorithm
///
/// 1. Find all local maxima (value > left neighbor && value >= right neighbor)
/// 2. Filter by threshold
/// 3. Enforce minimum distance (keep highest peak when too close)
/// 4. Sort by value
///
/// # Example
///
/// ```
/// use stratum_mashup::features::period::peak_picking::find_peaks;
///
/// let signal = vec![0.0, 0.5, 1.0, 0.7, 0.3, 0.9, 0.2];
/// let peaks = find_peaks(&signal, 0.5, 2);
/// assert_eq!(peaks[0].0, 2);
/// assert_eq!(peaks[1].0, 5);
/// ```
pub fn find_peaks(signal: &[f32], threshold: f32, min_distance: usize) -> Vec<(usize, f32)> {
    if signal.len() < 3 {
        return vec![];
    }

    let mut peaks = Vec::new();
    for i in 1..(signal.len() - 1) {
        let value = signal[i];
        if value > signal[i - 1] && value >= signal[i + 1] && value >= threshold {
            peaks.push((i, value));
        }
    }

    peaks.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    if min_distance > 0 && peaks.len() > 1 {
        let mut filtered: Vec<(usize, f32)> = Vec::with_capacity(peaks.len());
        for (idx, value) in peaks {
            let too_close = filtered
                .iter()
                .any(|&(existing, _)| idx.abs_diff(existing) < min_distance);
            if !too_close {
                filtered.push((idx, value));
            }
        }
        peaks = filtered;
    }

    peaks
}

/// Sub-sample offset of a peak by parabolic interpolation
///
/// Fits a parabola through three neighbouring values and returns the vertex
/// position relative to the centre sample, in [-0.5, 0.5].
///
/// # Example
///
/// ```
/// use stratum_mashup::features::period::peak_picking::parabolic_offset;
///
/// // Symmetric neighbours: peak is exactly at the centre
/// assert_eq!(parabolic_offset(1.0, 2.0, 1.0), 0.0);
/// // Right neighbour higher: peak leans right
/// assert!(parabolic_offset(1.0, 2.0, 1.5) > 0.0);
/// ```
pub fn parabolic_offset(left: f32, center: f32, right: f32) -> f32 {
    let denom = left - 2.0 * center + right;
    if denom.abs() < EPSILON {
        return 0.0;
    }
    (0.5 * (left - right) / denom).clamp(-0.5, 0.5)
}

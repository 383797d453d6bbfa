//! Temporal chroma smoothing

/// Smooth chroma vectors over time with a centred moving average
///
/// # Arguments
///
/// * `chroma_vectors` - Chroma vectors (one per frame)
/// * `window_size` - Smoothing window size in frames (0 or 1 returns a copy)
///
/// # Returns
///
/// Smoothed chroma vectors (same count and dimension). Windows are truncated
/// at the edges rather than zero-padded.
pub fn smooth_chroma(chroma_vectors: &[Vec<f32>], window_size: usize) -> Vec<Vec<f32>> {
    log::debug!(
        "Smoothing {} chroma vectors with window size {}",
        chroma_vectors.len(),
        window_size
    );

    if window_size <= 1 || chroma_vectors.is_empty() {
        return chroma_vectors.to_vec();
    }

    let n = chroma_vectors.len();
    let dim = chroma_vectors[0].len();
    let before = window_size / 2;
    let after = window_size - before - 1;

    (0..n)
        .map(|t| {
            let start = t.saturating_sub(before);
            let end = (t + after).min(n - 1);
            let count = (end - start + 1) as f32;
            let mut out = vec![0.0f32; dim];
            for frame in &chroma_vectors[start..=end] {
                for (o, &x) in out.iter_mut().zip(frame.iter()) {
                    *o += x;
                }
            }
            for o in out.iter_mut() {
                *o /= count;
            }
            out
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smoothing_averages_neighbours() {
        let frames = vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![0.0, 1.0]];
        let smoothed = smooth_chroma(&frames, 3);
        assert_eq!(smoothed.len(), 3);
        assert!((smoothed[1][0] - 1.0 / 3.0).abs() < 1e-6);
        // Edge window covers frames 0-1 only
        assert!((smoothed[0][0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_window_one_is_identity() {
        let frames = vec![vec![0.2, 0.8], vec![0.6, 0.4]];
        assert_eq!(smooth_chroma(&frames, 1), frames);
    }
}

//! Masking split
//!
//! Harmonic/percussive separation by median filtering, followed by smooth
//! frequency crossovers on the harmonic part.
//!
//! # Algorithm
//!
//! 1. Harmonic enhancement: median of each bin along time
//! 2. Percussive enhancement: median of each frame along frequency
//! 3. Soft masks `M_h = H² / (H² + P²)`, `M_p = 1 − M_h`
//! 4. Raised-cosine crossovers split `M_h` into bass (< ~250 Hz), vocals
//!    (~300-3400 Hz) and other (the rest); `M_p` becomes drums
//!
//! The crossover weights sum to one at every frequency, so the four masks
//! partition unity.
//!
//! # Reference
//!
//! Fitzgerald, D. (2010). Harmonic/Percussive Separation using Median
//! Filtering. *Proceedings of the 13th International Conference on Digital
//! Audio Effects (DAFx-10)*.

use std::f32::consts::PI;

use ndarray::{Array1, Array2, Axis};

use super::StemKind;

const EPSILON: f32 = 1e-10;

/// Bass crossover: full weight below the first edge, none above the second (Hz)
pub const BASS_CROSSOVER_HZ: (f32, f32) = (200.0, 300.0);

/// Vocal band upper crossover (Hz)
pub const VOCAL_CROSSOVER_HZ: (f32, f32) = (3000.0, 3800.0);

/// Build the four stem masks (bins × frames), indexed by [`StemKind::index`]
///
/// # Arguments
///
/// * `magnitudes` - Mono magnitude spectrogram (bins × frames)
/// * `kernel` - Median filter length (odd)
/// * `sample_rate` - Sample rate in Hz
/// * `frame_size` - STFT frame size
pub fn split_masks(
    magnitudes: &Array2<f32>,
    kernel: usize,
    sample_rate: u32,
    frame_size: usize,
) -> [Array2<f32>; 4] {
    log::debug!(
        "Masking split: {} bins x {} frames, kernel {}",
        magnitudes.nrows(),
        magnitudes.ncols(),
        kernel
    );

    let harmonic = median_filter(magnitudes, Axis(1), kernel);
    let percussive = median_filter(magnitudes, Axis(0), kernel);

    let harmonic_mask = Array2::from_shape_fn(magnitudes.dim(), |idx| {
        let h = harmonic[idx] * harmonic[idx];
        let p = percussive[idx] * percussive[idx];
        if h + p > EPSILON {
            h / (h + p)
        } else {
            // Silent bins stay with the harmonic part
            1.0
        }
    });

    let bin_hz = sample_rate as f32 / frame_size.max(1) as f32;
    let bands: Vec<[f32; 3]> = (0..magnitudes.nrows())
        .map(|k| band_weights(k as f32 * bin_hz))
        .collect();

    StemKind::ALL.map(|kind| match kind {
        StemKind::Drums => harmonic_mask.mapv(|m| 1.0 - m),
        StemKind::Bass => band_mask(&harmonic_mask, &bands, 0),
        StemKind::Vocals => band_mask(&harmonic_mask, &bands, 1),
        StemKind::Other => band_mask(&harmonic_mask, &bands, 2),
    })
}

/// Crossover weights `[bass, vocals, other]` at a frequency; they sum to one
pub fn band_weights(freq: f32) -> [f32; 3] {
    let below_bass = falling_edge(freq, BASS_CROSSOVER_HZ);
    let below_vocal_top = falling_edge(freq, VOCAL_CROSSOVER_HZ);
    [
        below_bass,
        (below_vocal_top - below_bass).max(0.0),
        1.0 - below_vocal_top,
    ]
}

/// 1 below `edges.0`, 0 above `edges.1`, raised cosine in between
fn falling_edge(freq: f32, edges: (f32, f32)) -> f32 {
    if freq <= edges.0 {
        1.0
    } else if freq >= edges.1 {
        0.0
    } else {
        let x = (freq - edges.0) / (edges.1 - edges.0);
        0.5 + 0.5 * (PI * x).cos()
    }
}

fn band_mask(harmonic_mask: &Array2<f32>, bands: &[[f32; 3]], band: usize) -> Array2<f32> {
    let mut mask = harmonic_mask.clone();
    for (mut row, weights) in mask.rows_mut().into_iter().zip(bands.iter()) {
        row *= weights[band];
    }
    mask
}

/// Median filter every lane along `axis` with a centred window, truncated at the edges
fn median_filter(input: &Array2<f32>, axis: Axis, kernel: usize) -> Array2<f32> {
    let half = kernel.max(1) / 2;
    let mut output = Array2::<f32>::zeros(input.dim());
    let mut window: Vec<f32> = Vec::with_capacity(2 * half + 1);

    for (lane_in, mut lane_out) in input
        .lanes(axis)
        .into_iter()
        .zip(output.lanes_mut(axis).into_iter())
    {
        let values: Array1<f32> = lane_in.to_owned();
        let n = values.len();
        for i in 0..n {
            let start = i.saturating_sub(half);
            let end = (i + half + 1).min(n);
            window.clear();
            window.extend(values.slice(ndarray::s![start..end]).iter().copied());
            lane_out[i] = median(&mut window);
        }
    }
    output
}

fn median(values: &mut [f32]) -> f32 {
    let mid = values.len() / 2;
    let (_, m, _) = values.select_nth_unstable_by(mid, |a, b| {
        a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal)
    });
    *m
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_weights_partition_unity() {
        for f in [0.0, 150.0, 250.0, 299.0, 1000.0, 3400.0, 3900.0, 8000.0] {
            let w = band_weights(f);
            assert!((w.iter().sum::<f32>() - 1.0).abs() < 1e-6, "at {} Hz: {:?}", f, w);
        }
        assert_eq!(band_weights(100.0), [1.0, 0.0, 0.0]);
        assert_eq!(band_weights(1000.0), [0.0, 1.0, 0.0]);
        assert_eq!(band_weights(5000.0), [0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_masks_sum_to_one() {
        let mags = Array2::from_shape_fn((65, 40), |(k, t)| ((k * 3 + t * 5) % 7) as f32);
        let masks = split_masks(&mags, 5, 8000, 128);
        for idx in [(0, 0), (10, 20), (64, 39), (30, 5)] {
            let sum: f32 = masks.iter().map(|m| m[idx]).sum();
            assert!((sum - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_sustained_tone_is_harmonic() {
        // Constant row at bin 5, a vertical click at frame 20
        let mut mags = Array2::<f32>::zeros((33, 41));
        for t in 0..41 {
            mags[[5, t]] = 1.0;
        }
        for k in 0..33 {
            mags[[k, 20]] += 1.0;
        }
        let masks = split_masks(&mags, 5, 8000, 64);

        // Bin 5 at 625 Hz sits in the vocal band
        assert!(masks[StemKind::Vocals.index()][[5, 10]] > 0.9);
        assert!(masks[StemKind::Drums.index()][[20, 20]] > 0.9);
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&mut [3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&mut [5.0]), 5.0);
    }
}

//! Fixed stem-mixing policy
//!
//! Pure functions the blender applies per stem kind. None of these values are
//! user-configurable; per-stem output levels live in `StemLevels` and are
//! applied by the renderer.

use crate::preprocessing::normalization::{linear_to_db, rms_gain};

/// Target RMS for each track's vocal stem before summation (dBFS)
pub const VOCAL_TARGET_DB: f32 = -20.0;

/// Largest boost applied to a vocal stem (dB)
pub const VOCAL_MAX_GAIN_DB: f32 = 12.0;

/// Vocal stems quieter than this are left untouched (dBFS)
pub const VOCAL_SILENCE_DB: f32 = -60.0;

/// Cutoff of the zero-phase bass low-pass (Hz)
pub const BASS_CUTOFF_HZ: f32 = 200.0;

/// Two largest weights closer than this (relative) trigger bass ducking
pub const BASS_DUCK_WINDOW: f32 = 0.25;

/// Gain applied to the bass of every track but the dominant one when ducking
pub const BASS_DUCK_GAIN: f32 = 0.5;

/// Largest peak the summed mix may reach before every stem is scaled down
pub const MIX_CEILING: f32 = 1.0;

/// Gain that brings one vocal stem to the common level
pub fn vocal_gain(rms: f32) -> f32 {
    if linear_to_db(rms) < VOCAL_SILENCE_DB {
        return 1.0;
    }
    rms_gain(rms, VOCAL_TARGET_DB, VOCAL_MAX_GAIN_DB)
}

/// Bass weights after ducking
///
/// `weights` are already normalized to sum to one. When the two largest
/// weights are within [`BASS_DUCK_WINDOW`] of each other, the track with the
/// most low-end energy keeps its weight, the others are scaled by
/// [`BASS_DUCK_GAIN`], and the result is renormalized. Otherwise the weights
/// are returned unchanged.
pub fn bass_weights(weights: &[f32], low_energy: &[f32]) -> Vec<f32> {
    let mut sorted: Vec<f32> = weights.iter().copied().filter(|&w| w > 0.0).collect();
    if sorted.len() < 2 {
        return weights.to_vec();
    }
    sorted.sort_by(|a, b| b.total_cmp(a));
    let (top, second) = (sorted[0], sorted[1]);
    if (top - second) / top > BASS_DUCK_WINDOW {
        return weights.to_vec();
    }

    // Strict comparison keeps the first track on ties
    let dominant = weights
        .iter()
        .zip(low_energy.iter())
        .enumerate()
        .filter(|(_, (&w, _))| w > 0.0)
        .fold(None::<(usize, f32)>, |best, (i, (_, &e))| match best {
            Some((_, best_e)) if e <= best_e => best,
            _ => Some((i, e)),
        })
        .map(|(i, _)| i);

    let ducked: Vec<f32> = weights
        .iter()
        .enumerate()
        .map(|(i, &w)| if Some(i) == dominant { w } else { w * BASS_DUCK_GAIN })
        .collect();
    let sum: f32 = ducked.iter().sum();
    if sum <= 0.0 {
        return weights.to_vec();
    }
    ducked.iter().map(|w| w / sum).collect()
}

/// Delay that moves a track's beat grid onto the anchor's grid (seconds)
///
/// Always in `[0, period)`, so the delay only ever pads.
pub fn grid_delay_secs(anchor_phase: f32, track_phase: f32, period: f32) -> f32 {
    if !(period > 0.0) {
        return 0.0;
    }
    let delay = (anchor_phase - track_phase).rem_euclid(period);
    // rem_euclid can round up to exactly `period`
    if delay >= period {
        0.0
    } else {
        delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::normalization::db_to_linear;

    #[test]
    fn test_vocal_gain_reaches_target() {
        let rms = db_to_linear(-26.0);
        let gained = rms * vocal_gain(rms);
        assert!((linear_to_db(gained) - VOCAL_TARGET_DB).abs() < 0.01);
    }

    #[test]
    fn test_vocal_gain_capped_and_silence_untouched() {
        let quiet = db_to_linear(-50.0);
        assert!((linear_to_db(vocal_gain(quiet)) - VOCAL_MAX_GAIN_DB).abs() < 0.01);
        assert_eq!(vocal_gain(db_to_linear(-80.0)), 1.0);
        assert_eq!(vocal_gain(0.0), 1.0);
    }

    #[test]
    fn test_bass_ducking_when_weights_close() {
        let weights = [0.5, 0.5];
        let out = bass_weights(&weights, &[0.1, 0.4]);
        // Track 1 has more low end: 0.5 vs 0.25, renormalized
        assert!((out[1] - 2.0 / 3.0).abs() < 1e-6);
        assert!((out[0] - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_no_ducking_when_one_track_dominates() {
        let weights = [0.7, 0.3];
        assert_eq!(bass_weights(&weights, &[0.1, 0.9]), weights.to_vec());
    }

    #[test]
    fn test_ducking_ignores_silent_tracks() {
        let weights = [0.5, 0.0, 0.5];
        let out = bass_weights(&weights, &[0.2, 5.0, 0.1]);
        assert_eq!(out[1], 0.0);
        assert!(out[0] > out[2]);
    }

    #[test]
    fn test_grid_delay_wraps_into_period() {
        assert!((grid_delay_secs(0.1, 0.3, 0.5) - 0.3).abs() < 1e-6);
        assert!((grid_delay_secs(0.3, 0.1, 0.5) - 0.2).abs() < 1e-6);
        assert_eq!(grid_delay_secs(0.2, 0.2, 0.5), 0.0);
        assert_eq!(grid_delay_secs(0.2, 0.1, 0.0), 0.0);
    }
}

//! Bus compressor
//!
//! Stereo-linked feed-forward compressor used on the final mix.
//!
//! # Algorithm
//!
//! 1. The detector takes the larger of |left| and |right|, so both channels
//!    receive the same gain and the stereo image does not shift.
//! 2. An exponential envelope follower smooths the detector: the attack
//!    coefficient applies while the level rises, the release coefficient while
//!    it falls (`coeff = exp(-1 / (τ × fs))`).
//! 3. Above the threshold the gain reduction is
//!    `(threshold − level) × (1 − 1/ratio)` dB; below it the gain is unity.
//!
//! The compressor only ever reduces gain.

use crate::preprocessing::normalization::{db_to_linear, linear_to_db};

/// Threshold in dBFS
pub const THRESHOLD_DB: f32 = -10.0;

/// Compression ratio (input dB : output dB above threshold)
pub const RATIO: f32 = 3.0;

/// Attack time-constant in seconds
pub const ATTACK_SECS: f32 = 0.010;

/// Release time-constant in seconds
pub const RELEASE_SECS: f32 = 0.100;

/// Stereo-linked feed-forward compressor
#[derive(Debug, Clone)]
pub struct Compressor {
    threshold_db: f32,
    ratio: f32,
    attack_coeff: f32,
    release_coeff: f32,
    /// Smoothed detector level (linear)
    envelope: f32,
}

impl Compressor {
    /// Compressor with the fixed mix-bus settings
    pub fn new(sample_rate: u32) -> Self {
        Self::with_params(THRESHOLD_DB, RATIO, ATTACK_SECS, RELEASE_SECS, sample_rate)
    }

    /// Compressor with custom settings
    pub fn with_params(
        threshold_db: f32,
        ratio: f32,
        attack_secs: f32,
        release_secs: f32,
        sample_rate: u32,
    ) -> Self {
        let fs = sample_rate.max(1) as f32;
        Self {
            threshold_db,
            ratio: ratio.max(1.0),
            attack_coeff: (-1.0 / (attack_secs * fs)).exp(),
            release_coeff: (-1.0 / (release_secs * fs)).exp(),
            envelope: 0.0,
        }
    }

    /// Static gain for a detector level
    pub fn gain_for(&self, level: f32) -> f32 {
        let level_db = linear_to_db(level);
        if level_db <= self.threshold_db {
            return 1.0;
        }
        db_to_linear((self.threshold_db - level_db) * (1.0 - 1.0 / self.ratio))
    }

    /// Process a stereo block in place
    pub fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let peak = l.abs().max(r.abs());
            let coeff = if peak > self.envelope {
                self.attack_coeff
            } else {
                self.release_coeff
            };
            self.envelope = self.envelope * coeff + peak * (1.0 - coeff);

            let gain = self.gain_for(self.envelope);
            *l *= gain;
            *r *= gain;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_below_threshold_is_untouched() {
        let mut comp = Compressor::new(8000);
        let mut left = vec![0.1; 4000];
        let mut right = vec![-0.1; 4000];
        comp.process(&mut left, &mut right);
        assert!(left.iter().all(|&x| x == 0.1));
        assert!(right.iter().all(|&x| x == -0.1));
    }

    #[test]
    fn test_steady_state_reduction_matches_ratio() {
        let mut comp = Compressor::new(8000);
        // 0 dBFS is 10 dB over threshold → 10 × (1 − 1/3) ≈ 6.67 dB reduction
        let mut left = vec![1.0; 16000];
        let mut right = vec![1.0; 16000];
        comp.process(&mut left, &mut right);
        let out_db = linear_to_db(left[15999]);
        assert!((out_db + 6.667).abs() < 0.1, "Output {} dBFS", out_db);
    }

    #[test]
    fn test_channels_are_linked() {
        let mut comp = Compressor::new(8000);
        let mut left = vec![0.9; 8000];
        let mut right = vec![0.0; 8000];
        comp.process(&mut left, &mut right);
        assert!(left[7999] < 0.9);
        assert!(right.iter().all(|&x| x == 0.0));

        let mut comp = Compressor::new(8000);
        let mut left = vec![0.9; 8000];
        let mut right = vec![0.45; 8000];
        comp.process(&mut left, &mut right);
        assert!((left[7999] / right[7999] - 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_release_recovers_gain() {
        let mut comp = Compressor::new(8000);
        let mut loud_l = vec![1.0; 4000];
        let mut loud_r = vec![1.0; 4000];
        comp.process(&mut loud_l, &mut loud_r);

        let mut quiet_l = vec![0.1; 8000];
        let mut quiet_r = vec![0.1; 8000];
        comp.process(&mut quiet_l, &mut quiet_r);
        assert!(quiet_l[0] < 0.1);
        assert!((quiet_l[7999] - 0.1).abs() < 1e-6);
    }
}

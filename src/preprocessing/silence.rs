//! Silence detection utilities

use crate::preprocessing::normalization::{linear_to_db, rms_level};

/// Silence detection configuration
#[derive(Debug, Clone)]
pub struct SilenceDetector {
    /// Threshold in dBFS (default: -60.0)
    pub threshold_db: f32,

    /// Frame size for analysis (default: 2048)
    pub frame_size: usize,
}

impl Default for SilenceDetector {
    fn default() -> Self {
        Self {
            threshold_db: -60.0,
            frame_size: 2048,
        }
    }
}

impl SilenceDetector {
    /// Fraction of frames (0.0-1.0) whose RMS is above the threshold
    pub fn active_fraction(&self, samples: &[f32]) -> f32 {
        let frame_size = self.frame_size.max(1);
        let mut total = 0usize;
        let mut active = 0usize;
        for frame in samples.chunks(frame_size) {
            total += 1;
            if linear_to_db(rms_level(frame)) > self.threshold_db {
                active += 1;
            }
        }
        if total == 0 {
            0.0
        } else {
            active as f32 / total as f32
        }
    }

    /// True when no frame rises above the threshold
    pub fn is_silent(&self, samples: &[f32]) -> bool {
        log::debug!("Checking {} samples for silence", samples.len());
        self.active_fraction(samples) == 0.0
    }
}

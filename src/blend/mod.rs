//! Stem blending
//!
//! Combines the aligned stems of every track into one stereo buffer per stem
//! kind:
//! - every track is delayed so its beat grid lands on the anchor's grid
//!   (anchor = highest-weight track); the delay applies to all of its stems
//! - vocals are brought to a common level before the weighted sum
//! - bass is low-passed (zero phase) and ducked when two tracks compete
//! - drums and other are plain weighted sums
//!
//! If the summed mix would clip, every stem is scaled by the same factor and a
//! `BlendRenormalized` flag is raised.

pub mod policy;

use rayon::prelude::*;

use crate::alignment::AlignmentPlan;
use crate::analysis::metadata::{FlagKind, ProcessingFlag};
use crate::audio::{AudioBuffer, Track};
use crate::dsp::filter::{filtfilt, BiquadCoefficients};
use crate::error::MashupError;
use crate::separation::{StemKind, StemSet};

/// Per-track blend weights
#[derive(Debug, Clone, PartialEq)]
pub struct BlendConfig {
    /// Relative weights in track order (finite, ≥ 0, not all zero)
    pub weights: Vec<f32>,
}

impl BlendConfig {
    /// Weights taken from the tracks
    pub fn from_tracks(tracks: &[Track]) -> Self {
        Self {
            weights: tracks.iter().map(Track::weight).collect(),
        }
    }

    /// Weights scaled to sum to one
    ///
    /// # Errors
    ///
    /// Returns `MashupError::InvalidInput` if any weight is negative or not
    /// finite, or if all weights are zero
    pub fn normalized_weights(&self) -> Result<Vec<f32>, MashupError> {
        if let Some(w) = self.weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
            return Err(MashupError::InvalidInput(format!(
                "Blend weights must be finite and non-negative, got {}",
                w
            )));
        }
        let sum: f32 = self.weights.iter().sum();
        if sum <= 0.0 {
            return Err(MashupError::InvalidInput(
                "At least one blend weight must be positive".to_string(),
            ));
        }
        Ok(self.weights.iter().map(|w| w / sum).collect())
    }
}

/// Blended stems, ready for rendering
#[derive(Debug, Clone)]
pub struct MultiStemMix {
    /// Stereo stems, all the same length
    pub stems: StemSet,

    /// Beat-grid delay applied to each track (frames)
    pub grid_delays: Vec<usize>,

    /// Scale applied by the clip guard (1.0 if none)
    pub headroom_gain: f32,

    /// `BlendRenormalized` if the clip guard engaged
    pub flags: Vec<ProcessingFlag>,
}

impl MultiStemMix {
    /// Grid delays in seconds
    pub fn grid_delays_secs(&self) -> Vec<f32> {
        let sr = self.stems.sample_rate() as f32;
        self.grid_delays.iter().map(|&d| d as f32 / sr).collect()
    }
}

/// Stem blender
#[derive(Debug, Clone)]
pub struct Blender {
    config: BlendConfig,
}

impl Blender {
    /// Blender with the given weights
    pub fn new(config: BlendConfig) -> Self {
        Self { config }
    }

    /// Anchor track: highest weight, first on ties
    pub fn anchor(&self) -> usize {
        self.config
            .weights
            .iter()
            .enumerate()
            .fold((0, f32::NEG_INFINITY), |best, (i, &w)| {
                if w > best.1 {
                    (i, w)
                } else {
                    best
                }
            })
            .0
    }

    /// Per-track beat-grid delays in frames at `sample_rate`
    pub fn grid_delays(&self, plan: &AlignmentPlan, sample_rate: u32) -> Vec<usize> {
        let period = plan.beat_period_secs();
        let anchor_phase = plan
            .tracks
            .get(self.anchor())
            .map_or(0.0, |t| t.beat_phase_secs);
        plan.tracks
            .iter()
            .map(|t| {
                let secs = policy::grid_delay_secs(anchor_phase, t.beat_phase_secs, period);
                (secs * sample_rate as f32).round() as usize
            })
            .collect()
    }

    /// Blend aligned stem sets into one multi-stem mix
    ///
    /// # Arguments
    ///
    /// * `aligned` - Warped stems, one set per track, all at the output rate
    /// * `plan` - Alignment plan (reference tempo and beat phases)
    ///
    /// # Errors
    ///
    /// Returns `MashupError::InvalidInput` if the number of stem sets, weights
    /// and plan entries disagree, the sets differ in sample rate, or the
    /// weights are invalid
    pub fn blend(
        &self,
        aligned: &[StemSet],
        plan: &AlignmentPlan,
    ) -> Result<MultiStemMix, MashupError> {
        if aligned.is_empty() {
            return Err(MashupError::InvalidInput("No stems to blend".to_string()));
        }
        if aligned.len() != self.config.weights.len() || aligned.len() != plan.tracks.len() {
            return Err(MashupError::InvalidInput(format!(
                "Blend input mismatch: {} stem sets, {} weights, {} plan entries",
                aligned.len(),
                self.config.weights.len(),
                plan.tracks.len()
            )));
        }
        let sample_rate = aligned[0].sample_rate();
        if aligned.iter().any(|s| s.sample_rate() != sample_rate) {
            return Err(MashupError::InvalidInput(
                "Aligned stems must share one sample rate".to_string(),
            ));
        }

        let weights = self.config.normalized_weights()?;
        let delays = self.grid_delays(plan, sample_rate);
        // Delayed tracks are padded, not cut, so the mix can run up to one
        // beat past the longest stretched track
        let length = aligned
            .iter()
            .zip(delays.iter())
            .map(|(stems, &d)| stems.num_frames() + d)
            .max()
            .unwrap_or(0);

        log::debug!(
            "Blending {} tracks: weights {:?}, grid delays {:?} frames, {} output frames",
            aligned.len(),
            weights,
            delays,
            length
        );

        let blended: Vec<AudioBuffer> = StemKind::ALL
            .par_iter()
            .map(|&kind| blend_kind(kind, aligned, &weights, &delays, length, sample_rate))
            .collect::<Result<_, _>>()?;
        let blended: [AudioBuffer; 4] = blended
            .try_into()
            .map_err(|_| MashupError::ProcessingError("Stem count changed while blending".to_string()))?;
        let mut stems = StemSet::new(blended);

        let mut flags = Vec::new();
        let peak = stems.mixdown().peak();
        let headroom_gain = if peak > policy::MIX_CEILING {
            let gain = policy::MIX_CEILING / peak;
            for kind in StemKind::ALL {
                stems.get_mut(kind).scale(gain);
            }
            log::warn!("Blend peak {:.3} exceeds ceiling; scaled stems by {:.3}", peak, gain);
            flags.push(ProcessingFlag::global(
                FlagKind::BlendRenormalized,
                format!("Summed peak {:.3} scaled by {:.3}", peak, gain),
            ));
            gain
        } else {
            1.0
        };

        Ok(MultiStemMix {
            stems,
            grid_delays: delays,
            headroom_gain,
            flags,
        })
    }
}

fn blend_kind(
    kind: StemKind,
    aligned: &[StemSet],
    weights: &[f32],
    delays: &[usize],
    length: usize,
    sample_rate: u32,
) -> Result<AudioBuffer, MashupError> {
    let mut out = AudioBuffer::silent(2, length, sample_rate);

    match kind {
        StemKind::Bass => {
            let coeffs = BiquadCoefficients::lowpass(policy::BASS_CUTOFF_HZ, sample_rate)?;
            let filtered: Vec<AudioBuffer> = aligned
                .iter()
                .map(|stems| {
                    let bass = stems.get(kind).to_stereo();
                    let channels = bass.channels.iter().map(|ch| filtfilt(ch, coeffs)).collect();
                    AudioBuffer::new(channels, sample_rate)
                })
                .collect();
            let low_energy: Vec<f32> = filtered.iter().map(AudioBuffer::rms).collect();
            let bass_weights = policy::bass_weights(weights, &low_energy);
            for ((stem, &w), &delay) in filtered.iter().zip(bass_weights.iter()).zip(delays) {
                if w > 0.0 {
                    out.add_scaled(stem, w, delay);
                }
            }
        }
        StemKind::Vocals | StemKind::Drums | StemKind::Other => {
            for ((stems, &w), &delay) in aligned.iter().zip(weights).zip(delays) {
                if w <= 0.0 {
                    continue;
                }
                let stem = stems.get(kind).to_stereo();
                let gain = if kind == StemKind::Vocals {
                    policy::vocal_gain(stem.rms())
                } else {
                    1.0
                };
                out.add_scaled(&stem, w * gain, delay);
            }
        }
    }

    Ok(out)
}

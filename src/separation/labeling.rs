//! NMF component labeling
//!
//! Each factorized component is summarized by a handful of spectral and
//! temporal descriptors; a [`LabelingPolicy`] turns those into a stem kind.

use ndarray::ArrayView1;

use super::StemKind;
use crate::features::period::autocorrelation::compute_autocorrelation_fft;

const EPSILON: f32 = 1e-10;

/// Upper edge of the low band (Hz)
pub const LOW_BAND_MAX_HZ: f32 = 250.0;

/// Voice formant band (Hz)
pub const FORMANT_BAND_HZ: (f32, f32) = (300.0, 3400.0);

/// Descriptors of one NMF component
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComponentFeatures {
    /// Spectral centroid of the basis (Hz)
    pub centroid_hz: f32,
    /// Fraction of basis energy below 250 Hz
    pub low_energy: f32,
    /// Fraction of basis energy in 300-3400 Hz
    pub formant_energy: f32,
    /// Fraction of basis energy above 3400 Hz
    pub high_energy: f32,
    /// Spectral flatness of the basis (0 = tonal, 1 = noise-like)
    pub flatness: f32,
    /// Share of activation mass that arrives as rises (0 = sustained, ~0.5+ = percussive)
    pub transientness: f32,
    /// Strongest normalized autocorrelation of the activation (0-1)
    pub periodicity: f32,
}

/// Maps component descriptors to a stem
///
/// Implementations must be deterministic; they run on rayon workers.
pub trait LabelingPolicy: Send + Sync + std::fmt::Debug {
    /// Stem the component belongs to
    fn label(&self, features: &ComponentFeatures) -> StemKind;
}

/// Rule-based labeler
///
/// - low band dominant and transient → drums, sustained → bass
/// - noise-like and transient or strongly periodic → drums
/// - formant band dominant, tonal and sustained → vocals
/// - anything else → other
#[derive(Debug, Clone, Copy)]
pub struct HeuristicLabeler {
    /// Band energy fraction that counts as dominant (default: 0.5)
    pub dominance: f32,
    /// Transientness above which a component is percussive (default: 0.3)
    pub transient_threshold: f32,
    /// Flatness above which a basis is noise-like (default: 0.4)
    pub noise_flatness: f32,
    /// Flatness below which a basis is tonal (default: 0.25)
    pub tonal_flatness: f32,
    /// Periodicity above which a noise-like component is a drum pattern (default: 0.5)
    pub periodic_threshold: f32,
}

impl Default for HeuristicLabeler {
    fn default() -> Self {
        Self {
            dominance: 0.5,
            transient_threshold: 0.3,
            noise_flatness: 0.4,
            tonal_flatness: 0.25,
            periodic_threshold: 0.5,
        }
    }
}

impl LabelingPolicy for HeuristicLabeler {
    fn label(&self, f: &ComponentFeatures) -> StemKind {
        let transient = f.transientness > self.transient_threshold;

        if f.low_energy > self.dominance {
            return if transient { StemKind::Drums } else { StemKind::Bass };
        }
        if f.flatness > self.noise_flatness
            && (transient || f.periodicity > self.periodic_threshold)
        {
            return StemKind::Drums;
        }
        if f.formant_energy > self.dominance && f.flatness < self.tonal_flatness && !transient {
            return StemKind::Vocals;
        }
        StemKind::Other
    }
}

/// Compute the descriptors of one component
///
/// # Arguments
///
/// * `basis` - Spectral template (one value per STFT bin)
/// * `activation` - Activation over frames
/// * `sample_rate` - Sample rate in Hz
/// * `frame_size` - STFT frame size the template was computed with
pub fn describe_component(
    basis: ArrayView1<f32>,
    activation: ArrayView1<f32>,
    sample_rate: u32,
    frame_size: usize,
) -> ComponentFeatures {
    let bin_hz = sample_rate as f32 / frame_size.max(1) as f32;

    let mut total = 0.0f32;
    let mut low = 0.0f32;
    let mut formant = 0.0f32;
    let mut high = 0.0f32;
    let mut weighted_freq = 0.0f32;
    for (k, &m) in basis.iter().enumerate() {
        let freq = k as f32 * bin_hz;
        let energy = m * m;
        total += energy;
        weighted_freq += freq * m;
        if freq < LOW_BAND_MAX_HZ {
            low += energy;
        } else if (FORMANT_BAND_HZ.0..=FORMANT_BAND_HZ.1).contains(&freq) {
            formant += energy;
        } else if freq > FORMANT_BAND_HZ.1 {
            high += energy;
        }
    }

    let basis_sum: f32 = basis.sum();
    let (low_energy, formant_energy, high_energy) = if total > EPSILON {
        (low / total, formant / total, high / total)
    } else {
        (0.0, 0.0, 0.0)
    };

    ComponentFeatures {
        centroid_hz: if basis_sum > EPSILON {
            weighted_freq / basis_sum
        } else {
            0.0
        },
        low_energy,
        formant_energy,
        high_energy,
        flatness: spectral_flatness(basis),
        transientness: transientness(activation),
        periodicity: periodicity(activation),
    }
}

/// Geometric mean over arithmetic mean
fn spectral_flatness(basis: ArrayView1<f32>) -> f32 {
    let n = basis.len();
    if n == 0 {
        return 0.0;
    }
    let mean = basis.sum() / n as f32;
    if mean <= EPSILON {
        return 0.0;
    }
    let log_mean = basis.iter().map(|&m| (m + EPSILON).ln()).sum::<f32>() / n as f32;
    (log_mean.exp() / mean).clamp(0.0, 1.0)
}

/// Sum of positive frame-to-frame increases over the total activation
fn transientness(activation: ArrayView1<f32>) -> f32 {
    let total: f32 = activation.sum();
    if total <= EPSILON || activation.len() < 2 {
        return 0.0;
    }
    let rises: f32 = activation
        .iter()
        .zip(activation.iter().skip(1))
        .map(|(&a, &b)| (b - a).max(0.0))
        .sum();
    (rises / total).clamp(0.0, 1.0)
}

/// Largest normalized autocorrelation of the mean-removed activation at lags ≥ 2
fn periodicity(activation: ArrayView1<f32>) -> f32 {
    let n = activation.len();
    if n < 8 {
        return 0.0;
    }
    let mean = activation.sum() / n as f32;
    let centred: Vec<f32> = activation.iter().map(|&x| x - mean).collect();
    let acf = compute_autocorrelation_fft(&centred);
    if acf.is_empty() || acf[0] <= EPSILON {
        return 0.0;
    }
    acf[2..(n / 2).max(3).min(acf.len())]
        .iter()
        .fold(0.0f32, |best, &x| best.max(x / acf[0]))
        .clamp(0.0, 1.0)
}

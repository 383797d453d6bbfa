//! Biquad filtering
//!
//! Second-order sections in Direct Form II transposed, with RBJ cookbook
//! coefficients, and a forward-backward pass for zero-phase filtering.
//!
//! # Reference
//!
//! Bristow-Johnson, R. Cookbook formulae for audio EQ biquad filter coefficients.

use std::f32::consts::PI;

use crate::error::MashupError;

/// Butterworth Q for a single second-order section
const BUTTERWORTH_Q: f32 = std::f32::consts::FRAC_1_SQRT_2;

/// Normalized biquad coefficients (a0 = 1)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoefficients {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

impl BiquadCoefficients {
    /// Second-order Butterworth low-pass
    ///
    /// # Errors
    ///
    /// Returns `MashupError::InvalidInput` if the cutoff is not strictly between
    /// 0 and the Nyquist frequency
    pub fn lowpass(cutoff_hz: f32, sample_rate: u32) -> Result<Self, MashupError> {
        let (cos_w0, alpha) = prewarp(cutoff_hz, sample_rate)?;
        let b1 = 1.0 - cos_w0;
        Ok(Self::normalized(b1 / 2.0, b1, b1 / 2.0, cos_w0, alpha))
    }

    /// Second-order Butterworth high-pass
    ///
    /// # Errors
    ///
    /// Same conditions as [`BiquadCoefficients::lowpass`]
    pub fn highpass(cutoff_hz: f32, sample_rate: u32) -> Result<Self, MashupError> {
        let (cos_w0, alpha) = prewarp(cutoff_hz, sample_rate)?;
        let b1 = -(1.0 + cos_w0);
        Ok(Self::normalized(-b1 / 2.0, b1, -b1 / 2.0, cos_w0, alpha))
    }

    fn normalized(b0: f32, b1: f32, b2: f32, cos_w0: f32, alpha: f32) -> Self {
        let a0 = 1.0 + alpha;
        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: -2.0 * cos_w0 / a0,
            a2: (1.0 - alpha) / a0,
        }
    }
}

/// `(cos ω0, α)` for a Butterworth section at `cutoff_hz`
fn prewarp(cutoff_hz: f32, sample_rate: u32) -> Result<(f32, f32), MashupError> {
    let nyquist = sample_rate as f32 / 2.0;
    if !(cutoff_hz > 0.0 && cutoff_hz < nyquist) {
        return Err(MashupError::InvalidInput(format!(
            "Cutoff {:.1} Hz outside (0, {:.1}) Hz",
            cutoff_hz, nyquist
        )));
    }
    let w0 = 2.0 * PI * cutoff_hz / sample_rate as f32;
    Ok((w0.cos(), w0.sin() / (2.0 * BUTTERWORTH_Q)))
}

/// Stateful biquad section
#[derive(Debug, Clone)]
pub struct Biquad {
    coeffs: BiquadCoefficients,
    z1: f32,
    z2: f32,
}

impl Biquad {
    /// Create a filter with zeroed state
    pub fn new(coeffs: BiquadCoefficients) -> Self {
        Self {
            coeffs,
            z1: 0.0,
            z2: 0.0,
        }
    }

    /// Process a single sample
    pub fn process(&mut self, x: f32) -> f32 {
        let c = &self.coeffs;
        let y = c.b0 * x + self.z1;
        self.z1 = c.b1 * x - c.a1 * y + self.z2;
        self.z2 = c.b2 * x - c.a2 * y;
        y
    }

    /// Process a block in place
    pub fn process_block(&mut self, samples: &mut [f32]) {
        for x in samples.iter_mut() {
            *x = self.process(*x);
        }
    }
}

/// Zero-phase filtering: run the section forward, then backward
///
/// The magnitude response is squared (a 2nd-order Butterworth becomes 4th
/// order) and the phase response cancels, so transients stay in place.
pub fn filtfilt(samples: &[f32], coeffs: BiquadCoefficients) -> Vec<f32> {
    let mut out = samples.to_vec();

    let mut forward = Biquad::new(coeffs);
    forward.process_block(&mut out);

    out.reverse();
    let mut backward = Biquad::new(coeffs);
    backward.process_block(&mut out);
    out.reverse();

    out
}

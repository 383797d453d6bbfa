//! Short-time Fourier transform
//!
//! Hann-windowed STFT with centred frames (the signal is zero-padded by
//! `frame_size / 2` on both sides) and its inverse by weighted overlap-add.
//!
//! # Algorithm
//!
//! Forward: frame `t` covers samples `[t*hop - N/2, t*hop + N/2)`, is multiplied
//! by the analysis window and transformed; only the `N/2 + 1` non-negative
//! frequency bins are kept.
//!
//! Inverse: each frame is rebuilt to a Hermitian spectrum, inverse transformed,
//! multiplied by the synthesis window and overlap-added. The result is divided
//! by the overlap-added squared window `Σ w²`, which makes `inverse(forward(x))`
//! reproduce `x` up to floating point error for any hop up to `N/2`.
//!
//! # Example
//!
//! ```
//! use stratum_mashup::dsp::stft::StftPlan;
//!
//! let plan = StftPlan::new(512, 128)?;
//! let signal: Vec<f32> = (0..4000).map(|i| (i as f32 * 0.05).sin()).collect();
//! let spectrum = plan.forward(&signal);
//! let rebuilt = plan.inverse(&spectrum, signal.len());
//! assert!((rebuilt[1000] - signal[1000]).abs() < 1e-3);
//! # Ok::<(), stratum_mashup::MashupError>(())
//! ```

use std::f32::consts::PI;
use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::error::MashupError;

/// Complex spectrogram, frames × bins
pub type Spectrogram = Vec<Vec<Complex<f32>>>;

const EPSILON: f32 = 1e-10;

/// Periodic Hann window of length `n`
pub fn hann_window(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / n as f32).cos())
        .collect()
}

/// Reusable STFT configuration with pre-planned transforms
///
/// Plans are shared via `Arc`, so a plan is `Send + Sync` and can be used
/// from several rayon workers at once.
#[derive(Clone)]
pub struct StftPlan {
    frame_size: usize,
    hop_size: usize,
    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
    ifft: Arc<dyn Fft<f32>>,
}

impl std::fmt::Debug for StftPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StftPlan")
            .field("frame_size", &self.frame_size)
            .field("hop_size", &self.hop_size)
            .finish()
    }
}

impl StftPlan {
    /// Plan an STFT
    ///
    /// # Errors
    ///
    /// Returns `MashupError::InvalidInput` if `frame_size < 4`, `hop_size == 0`
    /// or `hop_size > frame_size / 2`
    pub fn new(frame_size: usize, hop_size: usize) -> Result<Self, MashupError> {
        if frame_size < 4 || hop_size == 0 || hop_size > frame_size / 2 {
            return Err(MashupError::InvalidInput(format!(
                "Invalid STFT parameters: frame_size={}, hop_size={}",
                frame_size, hop_size
            )));
        }

        let mut planner = FftPlanner::new();
        Ok(Self {
            frame_size,
            hop_size,
            window: hann_window(frame_size),
            fft: planner.plan_fft_forward(frame_size),
            ifft: planner.plan_fft_inverse(frame_size),
        })
    }

    /// Frame size in samples
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Hop size in samples
    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    /// Number of non-negative frequency bins
    pub fn num_bins(&self) -> usize {
        self.frame_size / 2 + 1
    }

    /// Number of frames produced for a signal of `len` samples
    pub fn num_frames(&self, len: usize) -> usize {
        1 + len / self.hop_size
    }

    /// Centre frequency of bin `k` in Hz
    pub fn bin_frequency(&self, k: usize, sample_rate: u32) -> f32 {
        k as f32 * sample_rate as f32 / self.frame_size as f32
    }

    /// Forward transform
    ///
    /// Returns `num_frames(signal.len())` frames of `num_bins()` bins.
    pub fn forward(&self, signal: &[f32]) -> Spectrogram {
        let n = self.frame_size;
        let half = n / 2;
        let n_frames = self.num_frames(signal.len());
        let mut frames = Vec::with_capacity(n_frames);
        let mut buffer = vec![Complex::new(0.0f32, 0.0); n];

        for t in 0..n_frames {
            let start = (t * self.hop_size) as isize - half as isize;
            for (i, slot) in buffer.iter_mut().enumerate() {
                let idx = start + i as isize;
                let sample = if idx >= 0 && (idx as usize) < signal.len() {
                    signal[idx as usize]
                } else {
                    0.0
                };
                *slot = Complex::new(sample * self.window[i], 0.0);
            }
            self.fft.process(&mut buffer);
            frames.push(buffer[..=half].to_vec());
        }

        frames
    }

    /// Inverse transform by weighted overlap-add
    ///
    /// # Arguments
    ///
    /// * `spectrum` - Frames × bins, as produced by [`StftPlan::forward`]
    /// * `output_len` - Length of the rebuilt signal in samples
    pub fn inverse(&self, spectrum: &[Vec<Complex<f32>>], output_len: usize) -> Vec<f32> {
        let n = self.frame_size;
        let half = n / 2;
        let n_bins = self.num_bins();
        let scale = 1.0 / n as f32;

        let mut output = vec![0.0f32; output_len];
        let mut window_sum = vec![0.0f32; output_len];
        let mut buffer = vec![Complex::new(0.0f32, 0.0); n];

        for (t, frame) in spectrum.iter().enumerate() {
            for (k, slot) in buffer.iter_mut().enumerate() {
                *slot = if k < n_bins {
                    frame.get(k).copied().unwrap_or_default()
                } else {
                    frame.get(n - k).map(|c| c.conj()).unwrap_or_default()
                };
            }
            self.ifft.process(&mut buffer);

            let start = (t * self.hop_size) as isize - half as isize;
            for (i, value) in buffer.iter().enumerate() {
                let idx = start + i as isize;
                if idx < 0 || idx as usize >= output_len {
                    continue;
                }
                let w = self.window[i];
                output[idx as usize] += value.re * scale * w;
                window_sum[idx as usize] += w * w;
            }
        }

        for (x, &ws) in output.iter_mut().zip(window_sum.iter()) {
            if ws > EPSILON {
                *x /= ws;
            } else {
                *x = 0.0;
            }
        }

        output
    }
}

/// Magnitude of every bin
pub fn magnitude(spectrum: &[Vec<Complex<f32>>]) -> Vec<Vec<f32>> {
    spectrum
        .iter()
        .map(|frame| frame.iter().map(|c| c.norm()).collect())
        .collect()
}

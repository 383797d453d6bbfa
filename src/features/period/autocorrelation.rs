//! Autocorrelation-based tempo estimation
//!
//! Finds periodicity in the onset strength envelope using FFT-accelerated
//! autocorrelation.
//!
//! # Algorithm
//!
//! 1. Remove the mean of the onset strength envelope
//! 2. Compute autocorrelation using FFT acceleration: `ACF = IFFT(|FFT(signal)|²)`
//! 3. Restrict lags to the BPM range: `lag = (60 * sample_rate) / (BPM * hop_size)`
//! 4. Weight every lag by a log-normal tempo prior
//!    `p(bpm) = exp(-½ (log2(bpm / center) / width)²)`
//! 5. Pick the strongest weighted peak and refine it by parabolic interpolation
//!
//! The prior breaks octave ambiguity: a pulse train at 120 BPM also
//! correlates at 60 BPM, and the prior prefers the estimate nearer the
//! typical tempo.
//!
//! Confidence is `ACF[lag] / ACF[0]` (unweighted), the fraction of envelope
//! energy explained by the chosen period.
//!
//! # Reference
//!
//! Ellis, D. P. W. (2007). Beat Tracking by Dynamic Programming.
//! *Journal of New Music Research*, 36(1), 51-60.
//!
//! # Example
//!
//! ```
//! use stratum_mashup::features::period::autocorrelation::estimate_tempo;
//! use stratum_mashup::features::period::TempoRange;
//!
//! // Onset envelope with a pulse every 25 frames: 8000 / 128 * 60 / 25 = 150 BPM
//! let mut envelope = vec![0.0f32; 1000];
//! for i in (0..1000).step_by(25) {
//!     envelope[i] = 1.0;
//! }
//! let estimate = estimate_tempo(&envelope, 8000, 128, &TempoRange::default())?;
//! assert!((estimate.bpm - 150.0).abs() < 2.0);
//! # Ok::<(), stratum_mashup::MashupError>(())
//! ```

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

use super::peak_picking::{find_peaks, parabolic_offset};
use super::{TempoEstimate, TempoRange};
use crate::error::MashupError;

const EPSILON: f32 = 1e-10;

/// Estimate tempo from an onset strength envelope
///
/// # Arguments
///
/// * `envelope` - Onset strength per frame
/// * `sample_rate` - Sample rate in Hz
/// * `hop_size` - Hop size used for the envelope (samples per frame)
/// * `range` - BPM range and tempo prior
///
/// # Returns
///
/// Best tempo and its confidence. A flat or silent envelope yields the prior
/// centre with confidence 0.
///
/// # Errors
///
/// Returns `MashupError::InvalidInput` if:
/// - The envelope is empty
/// - `sample_rate` or `hop_size` is 0
/// - The BPM range is empty or non-positive
pub fn estimate_tempo(
    envelope: &[f32],
    sample_rate: u32,
    hop_size: usize,
    range: &TempoRange,
) -> Result<TempoEstimate, MashupError> {
    log::debug!(
        "Estimating tempo from autocorrelation: {} frames, {} Hz, hop={}, range=[{:.1}, {:.1}] BPM",
        envelope.len(),
        sample_rate,
        hop_size,
        range.min_bpm,
        range.max_bpm
    );

    if envelope.is_empty() {
        return Err(MashupError::InvalidInput(
            "Empty onset envelope".to_string(),
        ));
    }

    if sample_rate == 0 || hop_size == 0 {
        return Err(MashupError::InvalidInput(format!(
            "Invalid sample rate / hop size: {} / {}",
            sample_rate, hop_size
        )));
    }

    if range.min_bpm <= 0.0 || range.min_bpm >= range.max_bpm {
        return Err(MashupError::InvalidInput(format!(
            "Invalid BPM range: [{:.1}, {:.1}]",
            range.min_bpm, range.max_bpm
        )));
    }

    let fallback = TempoEstimate {
        bpm: range.prior_bpm,
        confidence: 0.0,
    };

    // Step 1: remove DC so the ACF measures periodicity, not loudness
    let mean = envelope.iter().sum::<f32>() / envelope.len() as f32;
    let centred: Vec<f32> = envelope.iter().map(|&x| x - mean).collect();

    // Step 2: autocorrelation
    let acf = compute_autocorrelation_fft(&centred);
    if acf.is_empty() || acf[0] < EPSILON {
        log::warn!("Onset envelope is flat; falling back to {:.1} BPM", range.prior_bpm);
        return Ok(fallback);
    }

    // Step 3: lag range
    let frames_per_minute = 60.0 * sample_rate as f32 / hop_size as f32;
    let lag_min = (frames_per_minute / range.max_bpm).ceil().max(1.0) as usize;
    let lag_max = ((frames_per_minute / range.min_bpm).floor() as usize).min(acf.len().saturating_sub(2));

    if lag_min >= lag_max {
        log::warn!(
            "Envelope too short for BPM range: lags [{}, {}] with {} frames",
            lag_min,
            lag_max,
            acf.len()
        );
        return Ok(fallback);
    }

    // Step 4: prior-weighted ACF over [lag_min - 1, lag_max + 1] so that the
    // range endpoints can still be local maxima
    let lo = lag_min - 1;
    let hi = lag_max + 1;
    let weighted: Vec<f32> = (lo..=hi)
        .map(|lag| acf[lag].max(0.0) * range.prior(frames_per_minute / lag as f32))
        .collect();

    // Step 5: strongest weighted peak inside the range
    let best = find_peaks(&weighted, EPSILON, 1)
        .into_iter()
        .map(|(i, v)| (i + lo, v))
        .find(|&(lag, _)| (lag_min..=lag_max).contains(&lag));

    let (lag, _) = match best {
        Some(peak) => peak,
        None => {
            log::warn!("No periodicity peak found in BPM range");
            return Ok(fallback);
        }
    };

    let i = lag - lo;
    let refined_lag = lag as f32 + parabolic_offset(weighted[i - 1], weighted[i], weighted[i + 1]);
    let bpm = (frames_per_minute / refined_lag).clamp(range.min_bpm, range.max_bpm);
    let confidence = (acf[lag] / acf[0]).clamp(0.0, 1.0);

    log::debug!(
        "Tempo estimate: {:.2} BPM (lag {:.2} frames, confidence {:.3})",
        bpm,
        refined_lag,
        confidence
    );

    Ok(TempoEstimate { bpm, confidence })
}

/// Compute autocorrelation using FFT acceleration
///
/// Uses the identity: ACF = IFFT(|FFT(signal)|²), zero-padded to avoid
/// circular wrap-around.
///
/// # Arguments
///
/// * `signal` - Input signal
///
/// # Returns
///
/// Autocorrelation function (same length as input, unnormalized)
pub fn compute_autocorrelation_fft(signal: &[f32]) -> Vec<f32> {
    let n = signal.len();
    if n == 0 {
        return vec![];
    }

    // FFT size: next power of 2 >= 2*n (for zero-padding)
    let fft_size = (2 * n).next_power_of_two();

    let mut fft_input: Vec<Complex<f32>> = signal.iter().map(|&x| Complex::new(x, 0.0)).collect();
    fft_input.resize(fft_size, Complex::new(0.0, 0.0));

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(fft_size);
    fft.process(&mut fft_input);

    for x in &mut fft_input {
        *x = *x * x.conj();
    }

    let ifft = planner.plan_fft_inverse(fft_size);
    ifft.process(&mut fft_input);

    let scale = 1.0 / (fft_size as f32);
    fft_input[..n].iter().map(|x| x.re * scale).collect()
}

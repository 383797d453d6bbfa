//! Phase vocoder
//!
//! Time stretching and formant-preserving pitch shifting in the STFT domain.
//!
//! # Time stretch
//!
//! Output frame `j` reads the analysis spectrogram at fractional position
//! `j · ratio`, interpolating magnitudes between the two neighbouring frames.
//! Phases are accumulated from the instantaneous frequency of each bin (the
//! principal-argument deviation of the measured phase advance from the bin's
//! nominal advance), so partials stay coherent across frames.
//!
//! # Pitch shift
//!
//! Frequency scaling by `α = 2^(s/12)` with the frame count unchanged. Output
//! bin `k` takes the magnitude at source bin `k/α`; with formant preservation
//! the magnitude is also multiplied by `E(k) / E(k/α)`, where `E` is a
//! moving-average envelope of the frame, so the spectral envelope stays put
//! while harmonics move. Phases advance by `α ×` the source bin's
//! instantaneous frequency.
//!
//! # Reference
//!
//! Laroche, J., & Dolson, M. (1999). Improved Phase Vocoder Time-Scale
//! Modification of Audio. *IEEE Transactions on Speech and Audio Processing*,
//! 7(3), 323-332.

use std::f32::consts::PI;

use rustfft::num_complex::Complex;

use crate::dsp::stft::{Spectrogram, StftPlan};

const EPSILON: f32 = 1e-10;

/// Largest gain the envelope correction may apply to one bin
const MAX_ENVELOPE_GAIN: f32 = 4.0;

/// Wrap a phase into (-π, π]
pub fn principal_arg(phase: f32) -> f32 {
    let wrapped = (phase + PI).rem_euclid(2.0 * PI) - PI;
    if wrapped <= -PI {
        wrapped + 2.0 * PI
    } else {
        wrapped
    }
}

/// Per-hop phase advance of every bin between two frames
fn phase_advance(plan: &StftPlan, from: &[Complex<f32>], to: &[Complex<f32>]) -> Vec<f32> {
    let n = plan.frame_size() as f32;
    let hop = plan.hop_size() as f32;
    from.iter()
        .zip(to.iter())
        .enumerate()
        .map(|(k, (a, b))| {
            let nominal = 2.0 * PI * k as f32 * hop / n;
            nominal + principal_arg(b.arg() - a.arg() - nominal)
        })
        .collect()
}

/// Stretch a signal in time without changing its pitch
///
/// `ratio > 1` shortens the signal. The output has exactly
/// `round(len / ratio)` samples.
pub fn time_stretch(signal: &[f32], ratio: f32, plan: &StftPlan) -> Vec<f32> {
    let out_len = (signal.len() as f32 / ratio).round() as usize;
    if signal.is_empty() || out_len == 0 {
        return vec![0.0; out_len];
    }

    let spectrum = plan.forward(signal);
    let n_frames = spectrum.len();
    let n_bins = plan.num_bins();
    let out_frames = plan.num_frames(out_len);

    let mut phase: Vec<f32> = spectrum[0].iter().map(|c| c.arg()).collect();
    let mut output: Spectrogram = Vec::with_capacity(out_frames);

    for j in 0..out_frames {
        let position = j as f32 * ratio;
        let t0 = (position.floor() as usize).min(n_frames - 1);
        let t1 = (t0 + 1).min(n_frames - 1);
        let frac = (position - t0 as f32).clamp(0.0, 1.0);

        let frame: Vec<Complex<f32>> = (0..n_bins)
            .map(|k| {
                let mag = (1.0 - frac) * spectrum[t0][k].norm() + frac * spectrum[t1][k].norm();
                Complex::from_polar(mag, phase[k])
            })
            .collect();
        output.push(frame);

        let advance = phase_advance(plan, &spectrum[t0], &spectrum[t1]);
        let nominal_only = t0 == t1;
        for (k, p) in phase.iter_mut().enumerate() {
            *p += if nominal_only {
                2.0 * PI * k as f32 * plan.hop_size() as f32 / plan.frame_size() as f32
            } else {
                advance[k]
            };
            *p = principal_arg(*p);
        }
    }

    plan.inverse(&output, out_len)
}

/// Shift the pitch of a signal by `semitones` without changing its length
///
/// # Arguments
///
/// * `signal` - Input samples
/// * `semitones` - Signed shift
/// * `plan` - STFT plan
/// * `preserve_formants` - Keep the spectral envelope in place
pub fn pitch_shift(
    signal: &[f32],
    semitones: i32,
    plan: &StftPlan,
    preserve_formants: bool,
) -> Vec<f32> {
    if semitones == 0 || signal.is_empty() {
        return signal.to_vec();
    }

    let alpha = 2f32.powf(semitones as f32 / 12.0);
    let spectrum = plan.forward(signal);
    let n_bins = plan.num_bins();
    let envelope_width = (plan.frame_size() / 64).max(3);

    let mut phase = vec![0.0f32; n_bins];
    let mut output: Spectrogram = Vec::with_capacity(spectrum.len());

    for t in 0..spectrum.len() {
        let magnitudes: Vec<f32> = spectrum[t].iter().map(|c| c.norm()).collect();
        let envelope = if preserve_formants {
            spectral_envelope(&magnitudes, envelope_width)
        } else {
            Vec::new()
        };
        let advance = if t > 0 {
            phase_advance(plan, &spectrum[t - 1], &spectrum[t])
        } else {
            spectrum[0].iter().map(|c| c.arg()).collect()
        };

        let frame: Vec<Complex<f32>> = (0..n_bins)
            .map(|k| {
                let source = k as f32 / alpha;
                let j = source.floor() as usize;
                if j + 1 >= n_bins {
                    return Complex::new(0.0, 0.0);
                }
                let frac = source - j as f32;
                let mut mag = (1.0 - frac) * magnitudes[j] + frac * magnitudes[j + 1];
                if preserve_formants {
                    let source_env = (1.0 - frac) * envelope[j] + frac * envelope[j + 1];
                    mag *= (envelope[k] / source_env.max(EPSILON)).min(MAX_ENVELOPE_GAIN);
                }

                let nearest = (source.round() as usize).min(n_bins - 1);
                phase[k] = principal_arg(phase[k] + alpha * advance[nearest]);
                Complex::from_polar(mag, phase[k])
            })
            .collect();
        output.push(frame);
    }

    plan.inverse(&output, signal.len())
}

/// Centred moving average of a magnitude frame
fn spectral_envelope(magnitudes: &[f32], width: usize) -> Vec<f32> {
    let n = magnitudes.len();
    let half = width / 2;
    let mut prefix = vec![0.0f32; n + 1];
    for (i, &m) in magnitudes.iter().enumerate() {
        prefix[i + 1] = prefix[i] + m;
    }
    (0..n)
        .map(|i| {
            let start = i.saturating_sub(half);
            let end = (i + half + 1).min(n);
            (prefix[end] - prefix[start]) / (end - start) as f32 + EPSILON
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sr: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| 0.5 * (2.0 * PI * freq * i as f32 / sr as f32).sin())
            .collect()
    }

    fn dominant_frequency(signal: &[f32], sr: u32) -> f32 {
        let plan = StftPlan::new(2048, 512).unwrap();
        let spectrum = plan.forward(signal);
        let frame = &spectrum[spectrum.len() / 2];
        let (k, _) = frame
            .iter()
            .enumerate()
            .fold((0, 0.0f32), |best, (k, c)| if c.norm() > best.1 { (k, c.norm()) } else { best });
        plan.bin_frequency(k, sr)
    }

    #[test]
    fn test_principal_arg() {
        assert!((principal_arg(3.0 * PI).abs() - PI).abs() < 1e-5);
        assert!((principal_arg(-0.5) + 0.5).abs() < 1e-6);
        assert!((principal_arg(2.0 * PI + 0.25) - 0.25).abs() < 1e-5);
    }

    #[test]
    fn test_time_stretch_length_and_pitch() {
        let sr = 8000;
        let signal = sine(500.0, sr, 16000);
        let plan = StftPlan::new(1024, 256).unwrap();

        let faster = time_stretch(&signal, 1.25, &plan);
        assert_eq!(faster.len(), 12800);
        let slower = time_stretch(&signal, 0.8, &plan);
        assert_eq!(slower.len(), 20000);

        let f = dominant_frequency(&slower, sr);
        assert!((f - 500.0).abs() < 8.0, "Pitch moved to {} Hz", f);
    }

    #[test]
    fn test_time_stretch_keeps_level() {
        let signal = sine(440.0, 8000, 16000);
        let plan = StftPlan::new(1024, 256).unwrap();
        let out = time_stretch(&signal, 1.1, &plan);
        let rms_in = (signal.iter().map(|x| x * x).sum::<f32>() / signal.len() as f32).sqrt();
        let middle = &out[2000..out.len() - 2000];
        let rms_out = (middle.iter().map(|x| x * x).sum::<f32>() / middle.len() as f32).sqrt();
        assert!((rms_out / rms_in - 1.0).abs() < 0.2, "rms {} vs {}", rms_out, rms_in);
    }

    #[test]
    fn test_pitch_shift_moves_frequency() {
        let sr = 8000;
        let signal = sine(400.0, sr, 16000);
        let plan = StftPlan::new(1024, 256).unwrap();

        let up = pitch_shift(&signal, 12, &plan, false);
        assert_eq!(up.len(), signal.len());
        let f = dominant_frequency(&up, sr);
        assert!((f - 800.0).abs() < 12.0, "Expected ~800 Hz, got {}", f);

        let down = pitch_shift(&signal, -5, &plan, false);
        let f = dominant_frequency(&down, sr);
        let expected = 400.0 * 2f32.powf(-5.0 / 12.0);
        assert!((f - expected).abs() < 12.0, "Expected ~{} Hz, got {}", expected, f);
    }

    #[test]
    fn test_formant_preserving_shift_keeps_level() {
        // Harmonic series on 200 Hz with a flat envelope
        let sr = 8000;
        let signal: Vec<f32> = (0..16000)
            .map(|i| {
                (1..16)
                    .map(|h| 0.05 * (2.0 * PI * 200.0 * h as f32 * i as f32 / sr as f32).sin())
                    .sum()
            })
            .collect();
        let plan = StftPlan::new(1024, 256).unwrap();
        let shifted = pitch_shift(&signal, 3, &plan, true);

        let rms = |x: &[f32]| (x.iter().map(|v| v * v).sum::<f32>() / x.len() as f32).sqrt();
        let ratio = rms(&shifted[2000..14000]) / rms(&signal[2000..14000]);
        assert!(ratio > 0.5 && ratio < 1.5, "Level ratio {}", ratio);
    }

    #[test]
    fn test_zero_shift_is_identity() {
        let signal = sine(300.0, 8000, 4000);
        let plan = StftPlan::new(512, 128).unwrap();
        assert_eq!(pitch_shift(&signal, 0, &plan, true), signal);
    }
}

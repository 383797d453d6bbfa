//! Per-stem effects chain
//!
//! Each stem of the blended mix can run through its own chain before the
//! renderer applies stem levels. The order is fixed:
//!
//! 1. **EQ**: three bands split at 250 Hz and 4 kHz with zero-phase
//!    Butterworth filters; the mid band is what the other two leave, so the
//!    bands always sum back to the input. Each band is scaled by `1 + gain`.
//! 2. **Compression**: stereo-linked [`Compressor`] followed by makeup gain
//!    toward a 0.99 peak, at most ×2.
//! 3. **Distortion**: `tanh(g·x) / tanh(g)` with `g = 1 + 9·amount`, mixed
//!    with the dry signal.
//! 4. **Delay**: up to five echoes `time` apart, the first at `0.7·mix`, each
//!    further one scaled by `feedback`; echoes below 5% are dropped.
//! 5. **Reverb**: FFT convolution with a synthetic impulse response (initial
//!    spike, sparse early reflections, exponential tail), dry kept at
//!    `1 − amount/2`.
//!
//! EQ and delay pull the stem back to a 0.99 peak if they push it past full
//! scale. An empty chain leaves the stem untouched.

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use serde::{Deserialize, Serialize};

use super::compressor::Compressor;
use crate::audio::AudioBuffer;
use crate::dsp::filter::{filtfilt, BiquadCoefficients};
use crate::error::MashupError;
use crate::separation::StemKind;

/// Low/mid crossover of the EQ (Hz)
pub const EQ_LOW_CUTOFF_HZ: f32 = 250.0;

/// Mid/high crossover of the EQ (Hz)
pub const EQ_HIGH_CUTOFF_HZ: f32 = 4000.0;

/// Peak that clip protection pulls back to
const PROTECT_PEAK: f32 = 0.99;

/// Largest makeup gain after compression
const MAX_MAKEUP_GAIN: f32 = 2.0;

const MAX_ECHOES: i32 = 5;
const MIN_ECHO_GAIN: f32 = 0.05;
const FIRST_ECHO_GAIN: f32 = 0.7;
const MAX_FEEDBACK: f32 = 0.9;

/// Three-band EQ gains, each in [-1, 1] (band scaled by `1 + gain`)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EqSettings {
    /// Below 250 Hz
    pub low_gain: f32,
    /// 250 Hz to 4 kHz
    pub mid_gain: f32,
    /// Above 4 kHz
    pub high_gain: f32,
}

/// Stem compressor settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompressionSettings {
    /// Threshold in dBFS (default: -20.0)
    pub threshold_db: f32,
    /// Ratio, 1.0 disables (default: 4.0)
    pub ratio: f32,
    /// Attack time-constant in seconds (default: 0.01)
    pub attack_secs: f32,
    /// Release time-constant in seconds (default: 0.1)
    pub release_secs: f32,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            threshold_db: -20.0,
            ratio: 4.0,
            attack_secs: 0.01,
            release_secs: 0.1,
        }
    }
}

/// Soft-clipping distortion
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistortionSettings {
    /// Drive in [0, 1] (default: 0.5)
    pub amount: f32,
    /// Wet share in [0, 1] (default: 0.5)
    pub mix: f32,
}

impl Default for DistortionSettings {
    fn default() -> Self {
        Self {
            amount: 0.5,
            mix: 0.5,
        }
    }
}

/// Feedback delay
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DelaySettings {
    /// Echo spacing in seconds (default: 0.3)
    pub time_secs: f32,
    /// Echo decay, clamped to [0, 0.9] (default: 0.4)
    pub feedback: f32,
    /// Wet level in [0, 1] (default: 0.5)
    pub mix: f32,
}

impl Default for DelaySettings {
    fn default() -> Self {
        Self {
            time_secs: 0.3,
            feedback: 0.4,
            mix: 0.5,
        }
    }
}

/// Convolution reverb
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReverbSettings {
    /// Wet level in [0, 1] (default: 0.5)
    pub amount: f32,
    /// Room size in [0, 1]; the impulse response lasts `0.1 + 2.5·room_size` s (default: 0.5)
    pub room_size: f32,
}

impl Default for ReverbSettings {
    fn default() -> Self {
        Self {
            amount: 0.5,
            room_size: 0.5,
        }
    }
}

/// Effects for one stem; `None` skips the stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EffectChain {
    /// Three-band EQ
    pub eq: Option<EqSettings>,
    /// Compressor
    pub compression: Option<CompressionSettings>,
    /// Soft clipper
    pub distortion: Option<DistortionSettings>,
    /// Feedback delay
    pub delay: Option<DelaySettings>,
    /// Convolution reverb
    pub reverb: Option<ReverbSettings>,
}

impl EffectChain {
    /// True if no stage is enabled
    pub fn is_empty(&self) -> bool {
        self.eq.is_none()
            && self.compression.is_none()
            && self.distortion.is_none()
            && self.delay.is_none()
            && self.reverb.is_none()
    }

    /// Check every enabled stage's parameters
    ///
    /// # Errors
    ///
    /// Returns `MashupError::InvalidInput` naming the first parameter out of range
    pub fn validate(&self) -> Result<(), MashupError> {
        if let Some(eq) = &self.eq {
            check_range("eq.low_gain", eq.low_gain, -1.0, 1.0)?;
            check_range("eq.mid_gain", eq.mid_gain, -1.0, 1.0)?;
            check_range("eq.high_gain", eq.high_gain, -1.0, 1.0)?;
        }
        if let Some(c) = &self.compression {
            check_range("compression.threshold_db", c.threshold_db, -60.0, 0.0)?;
            check_range("compression.ratio", c.ratio, 1.0, 20.0)?;
            check_positive("compression.attack_secs", c.attack_secs)?;
            check_positive("compression.release_secs", c.release_secs)?;
        }
        if let Some(d) = &self.distortion {
            check_range("distortion.amount", d.amount, 0.0, 1.0)?;
            check_range("distortion.mix", d.mix, 0.0, 1.0)?;
        }
        if let Some(d) = &self.delay {
            check_positive("delay.time_secs", d.time_secs)?;
            check_range("delay.feedback", d.feedback, 0.0, 1.0)?;
            check_range("delay.mix", d.mix, 0.0, 1.0)?;
        }
        if let Some(r) = &self.reverb {
            check_range("reverb.amount", r.amount, 0.0, 1.0)?;
            check_range("reverb.room_size", r.room_size, 0.0, 1.0)?;
        }
        Ok(())
    }

    /// Run the chain over a stem in place
    ///
    /// # Errors
    ///
    /// Returns `MashupError::InvalidInput` if a parameter is out of range
    pub fn apply(&self, stem: &mut AudioBuffer) -> Result<(), MashupError> {
        if self.is_empty() || stem.num_frames() == 0 {
            return Ok(());
        }
        self.validate()?;
        let sample_rate = stem.sample_rate;

        if let Some(eq) = &self.eq {
            for channel in stem.channels.iter_mut() {
                *channel = apply_eq(channel, sample_rate, eq)?;
            }
            protect_peak(stem);
        }
        if let Some(settings) = &self.compression {
            apply_compression(stem, settings);
        }
        if let Some(d) = &self.distortion {
            for channel in stem.channels.iter_mut() {
                apply_distortion(channel, d);
            }
        }
        if let Some(d) = &self.delay {
            for channel in stem.channels.iter_mut() {
                *channel = apply_delay(channel, sample_rate, d);
            }
            protect_peak(stem);
        }
        if let Some(r) = &self.reverb {
            let response = impulse_response(sample_rate, r);
            for channel in stem.channels.iter_mut() {
                *channel = apply_reverb(channel, &response, r.amount);
            }
        }
        Ok(())
    }
}

/// One effect chain per stem kind
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StemEffects {
    /// Vocal chain
    pub vocals: EffectChain,
    /// Drum chain
    pub drums: EffectChain,
    /// Bass chain
    pub bass: EffectChain,
    /// Chain for the remaining instrumentation
    pub other: EffectChain,
}

impl StemEffects {
    /// Chain for a stem kind
    pub fn chain(&self, kind: StemKind) -> &EffectChain {
        match kind {
            StemKind::Vocals => &self.vocals,
            StemKind::Drums => &self.drums,
            StemKind::Bass => &self.bass,
            StemKind::Other => &self.other,
        }
    }

    /// True if every chain is empty
    pub fn is_empty(&self) -> bool {
        StemKind::ALL.iter().all(|&kind| self.chain(kind).is_empty())
    }

    /// Check every chain
    ///
    /// # Errors
    ///
    /// Returns `MashupError::InvalidInput` with the stem and parameter name
    pub fn validate(&self) -> Result<(), MashupError> {
        for kind in StemKind::ALL {
            self.chain(kind).validate().map_err(|e| match e {
                MashupError::InvalidInput(msg) => {
                    MashupError::InvalidInput(format!("{} effects: {}", kind.name(), msg))
                }
                other => other,
            })?;
        }
        Ok(())
    }
}

fn check_range(name: &str, value: f32, min: f32, max: f32) -> Result<(), MashupError> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(MashupError::InvalidInput(format!(
            "{} must lie in [{}, {}], got {}",
            name, min, max, value
        )))
    }
}

fn check_positive(name: &str, value: f32) -> Result<(), MashupError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(MashupError::InvalidInput(format!(
            "{} must be positive, got {}",
            name, value
        )))
    }
}

fn protect_peak(stem: &mut AudioBuffer) {
    let peak = stem.peak();
    if peak > 1.0 {
        stem.scale(PROTECT_PEAK / peak);
    }
}

fn apply_eq(samples: &[f32], sample_rate: u32, eq: &EqSettings) -> Result<Vec<f32>, MashupError> {
    if eq.low_gain == 0.0 && eq.mid_gain == 0.0 && eq.high_gain == 0.0 {
        return Ok(samples.to_vec());
    }

    let nyquist = sample_rate as f32 / 2.0;
    let low = filtfilt(samples, BiquadCoefficients::lowpass(EQ_LOW_CUTOFF_HZ, sample_rate)?);
    // No high band when 4 kHz is at or above Nyquist
    let high = if EQ_HIGH_CUTOFF_HZ < nyquist {
        filtfilt(samples, BiquadCoefficients::highpass(EQ_HIGH_CUTOFF_HZ, sample_rate)?)
    } else {
        vec![0.0; samples.len()]
    };

    Ok(samples
        .iter()
        .zip(low.iter().zip(high.iter()))
        .map(|(&x, (&l, &h))| {
            let mid = x - l - h;
            l * (1.0 + eq.low_gain) + mid * (1.0 + eq.mid_gain) + h * (1.0 + eq.high_gain)
        })
        .collect())
}

fn apply_compression(stem: &mut AudioBuffer, settings: &CompressionSettings) {
    if settings.ratio <= 1.0 {
        return;
    }
    let mut compressor = Compressor::with_params(
        settings.threshold_db,
        settings.ratio,
        settings.attack_secs,
        settings.release_secs,
        stem.sample_rate,
    );
    match stem.channels.as_mut_slice() {
        [left, right] => compressor.process(left, right),
        [mono] => {
            let mut linked = mono.clone();
            compressor.process(mono, &mut linked);
        }
        _ => {}
    }

    let peak = stem.peak();
    if peak > 0.0 {
        stem.scale((PROTECT_PEAK / peak).min(MAX_MAKEUP_GAIN));
    }
}

fn apply_distortion(samples: &mut [f32], settings: &DistortionSettings) {
    if settings.amount <= 0.0 || settings.mix <= 0.0 {
        return;
    }
    let drive = 1.0 + settings.amount * 9.0;
    let norm = drive.tanh();
    for x in samples.iter_mut() {
        let wet = (*x * drive).tanh() / norm;
        *x = (1.0 - settings.mix) * *x + settings.mix * wet;
    }
}

fn apply_delay(samples: &[f32], sample_rate: u32, settings: &DelaySettings) -> Vec<f32> {
    let mut out = samples.to_vec();
    let spacing = (settings.time_secs * sample_rate as f32).round() as usize;
    if settings.mix <= 0.0 || spacing == 0 {
        return out;
    }
    let feedback = settings.feedback.clamp(0.0, MAX_FEEDBACK);

    for echo in 0..MAX_ECHOES {
        let gain = settings.mix * FIRST_ECHO_GAIN * feedback.powi(echo);
        if echo > 0 && gain < MIN_ECHO_GAIN * settings.mix {
            break;
        }
        let offset = spacing * (echo as usize + 1);
        if offset >= samples.len() {
            break;
        }
        for (o, &x) in out[offset..].iter_mut().zip(samples.iter()) {
            *o += gain * x;
        }
    }
    out
}

fn impulse_response(sample_rate: u32, settings: &ReverbSettings) -> Vec<f32> {
    let length = ((sample_rate as f32 * (0.1 + settings.room_size * 2.5)) as usize).max(2);
    let decay = 0.1 + (1.0 - settings.amount) * 0.8;
    let mut response = vec![0.0f32; length];
    response[0] = 1.0;

    let reflections = (5.0 + settings.room_size * 15.0) as usize;
    for i in 0..reflections {
        let position = (i + 1) * length / (reflections * 2);
        response[position] = 0.5 * (-(i as f32) / (reflections as f32 * 0.5)).exp();
    }

    let tail_start = length / 10;
    let tail_len = (length - tail_start).max(1) as f32;
    for (i, r) in response.iter_mut().enumerate().skip(tail_start) {
        let position = (i - tail_start) as f32 / tail_len;
        *r = (-position / decay).exp() * settings.amount;
    }

    let total: f32 = response.iter().map(|r| r.abs()).sum();
    if total > 0.0 {
        for r in response.iter_mut() {
            *r = *r / total * settings.amount;
        }
    }
    response
}

fn apply_reverb(samples: &[f32], response: &[f32], amount: f32) -> Vec<f32> {
    if amount <= 0.0 {
        return samples.to_vec();
    }
    let wet = fft_convolve(samples, response, samples.len());
    let dry = 1.0 - amount * 0.5;
    samples
        .iter()
        .zip(wet.iter())
        .map(|(&x, &w)| x * dry + w * amount)
        .collect()
}

/// Linear convolution of `a` and `b`, truncated to `len` samples
fn fft_convolve(a: &[f32], b: &[f32], len: usize) -> Vec<f32> {
    if a.is_empty() || b.is_empty() {
        return vec![0.0; len];
    }
    let n = (a.len() + b.len() - 1).next_power_of_two();
    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(n);
    let ifft = planner.plan_fft_inverse(n);

    let to_spectrum = |x: &[f32]| {
        let mut buffer: Vec<Complex<f32>> = x.iter().map(|&v| Complex::new(v, 0.0)).collect();
        buffer.resize(n, Complex::new(0.0, 0.0));
        fft.process(&mut buffer);
        buffer
    };
    let mut product: Vec<Complex<f32>> = to_spectrum(a)
        .iter()
        .zip(to_spectrum(b).iter())
        .map(|(x, y)| x * y)
        .collect();
    ifft.process(&mut product);

    let scale = 1.0 / n as f32;
    product.iter().take(len).map(|c| c.re * scale).collect()
}

//! Planar sample buffer
//!
//! All pipeline stages exchange audio as [`AudioBuffer`]: one `Vec<f32>` per
//! channel plus the sample rate. Stages never mutate their input; they build
//! new buffers.

use serde::{Deserialize, Serialize};

use crate::error::MashupError;
use crate::preprocessing::channel_mixer::{mono_to_stereo, stereo_to_mono};

/// Planar audio buffer (1 or 2 channels of equal length)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioBuffer {
    /// Channel data, planar
    pub channels: Vec<Vec<f32>>,

    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl AudioBuffer {
    /// Create a buffer from planar channel data
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        Self {
            channels,
            sample_rate,
        }
    }

    /// Create a mono buffer
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self::new(vec![samples], sample_rate)
    }

    /// Create a stereo buffer
    pub fn stereo(left: Vec<f32>, right: Vec<f32>, sample_rate: u32) -> Self {
        Self::new(vec![left, right], sample_rate)
    }

    /// Create a buffer of silence
    pub fn silent(num_channels: usize, num_frames: usize, sample_rate: u32) -> Self {
        Self::new(vec![vec![0.0; num_frames]; num_channels], sample_rate)
    }

    /// De-interleave `[L, R, L, R, ...]` samples into a planar buffer
    ///
    /// # Errors
    ///
    /// Returns `MashupError::InvalidInput` if the channel count is zero or the
    /// sample count is not a multiple of it
    pub fn from_interleaved(
        samples: &[f32],
        num_channels: usize,
        sample_rate: u32,
    ) -> Result<Self, MashupError> {
        if num_channels == 0 || samples.len() % num_channels != 0 {
            return Err(MashupError::InvalidInput(format!(
                "{} interleaved samples cannot be split into {} channels",
                samples.len(),
                num_channels
            )));
        }

        let num_frames = samples.len() / num_channels;
        let mut channels = vec![Vec::with_capacity(num_frames); num_channels];
        for frame in samples.chunks_exact(num_channels) {
            for (ch, &sample) in frame.iter().enumerate() {
                channels[ch].push(sample);
            }
        }

        Ok(Self::new(channels, sample_rate))
    }

    /// Interleave channels into `[L, R, L, R, ...]`
    pub fn to_interleaved(&self) -> Vec<f32> {
        let n_ch = self.num_channels();
        let n_frames = self.num_frames();
        let mut out = Vec::with_capacity(n_ch * n_frames);
        for i in 0..n_frames {
            for ch in &self.channels {
                out.push(ch[i]);
            }
        }
        out
    }

    /// Number of channels
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Number of frames (samples per channel)
    pub fn num_frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    /// Duration in seconds
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.num_frames() as f32 / self.sample_rate as f32
    }

    /// Check that the buffer is usable audio
    ///
    /// # Errors
    ///
    /// Returns `MashupError::DecodeError` if:
    /// - There are no channels or more than two
    /// - Channels differ in length
    /// - The buffer holds no frames or the sample rate is zero
    /// - Any sample is NaN or infinite
    pub fn validate(&self, source_id: &str) -> Result<(), MashupError> {
        if self.channels.is_empty() || self.channels.len() > 2 {
            return Err(MashupError::decode(
                source_id,
                format!("expected 1 or 2 channels, got {}", self.channels.len()),
            ));
        }

        let n = self.num_frames();
        if self.channels.iter().any(|ch| ch.len() != n) {
            return Err(MashupError::decode(source_id, "channels differ in length"));
        }

        if n == 0 {
            return Err(MashupError::decode(source_id, "buffer is empty"));
        }

        if self.sample_rate == 0 {
            return Err(MashupError::decode(source_id, "sample rate is 0"));
        }

        for (ch_idx, ch) in self.channels.iter().enumerate() {
            if let Some(pos) = ch.iter().position(|s| !s.is_finite()) {
                return Err(MashupError::decode(
                    source_id,
                    format!("non-finite sample at frame {} of channel {}", pos, ch_idx),
                ));
            }
        }

        Ok(())
    }

    /// Mono mixdown (average of channels)
    pub fn to_mono(&self) -> Vec<f32> {
        match self.channels.as_slice() {
            [mono] => mono.clone(),
            [left, right] => stereo_to_mono(left, right),
            _ => Vec::new(),
        }
    }

    /// Stereo copy of this buffer (mono is duplicated to both sides)
    pub fn to_stereo(&self) -> AudioBuffer {
        match self.channels.as_slice() {
            [mono] => {
                let (left, right) = mono_to_stereo(mono);
                AudioBuffer::stereo(left, right, self.sample_rate)
            }
            _ => self.clone(),
        }
    }

    /// Largest absolute sample value across channels
    pub fn peak(&self) -> f32 {
        self.channels
            .iter()
            .flat_map(|ch| ch.iter())
            .fold(0.0f32, |acc, &x| acc.max(x.abs()))
    }

    /// RMS level across all channels
    pub fn rms(&self) -> f32 {
        let count: usize = self.channels.iter().map(Vec::len).sum();
        if count == 0 {
            return 0.0;
        }
        let sum_sq: f64 = self
            .channels
            .iter()
            .flat_map(|ch| ch.iter())
            .map(|&x| (x as f64) * (x as f64))
            .sum();
        (sum_sq / count as f64).sqrt() as f32
    }

    /// Multiply every sample by `gain`
    pub fn scale(&mut self, gain: f32) {
        for ch in &mut self.channels {
            for x in ch.iter_mut() {
                *x *= gain;
            }
        }
    }

    /// Zero-pad every channel to `num_frames` (never truncates)
    pub fn pad_to(&mut self, num_frames: usize) {
        for ch in &mut self.channels {
            if ch.len() < num_frames {
                ch.resize(num_frames, 0.0);
            }
        }
    }

    /// Accumulate `gain * other` into this buffer starting at frame `offset`
    ///
    /// Channels are matched by index; samples past the end of `self` are dropped,
    /// so callers size the destination first.
    pub fn add_scaled(&mut self, other: &AudioBuffer, gain: f32, offset: usize) {
        for (dst, src) in self.channels.iter_mut().zip(other.channels.iter()) {
            if offset >= dst.len() {
                continue;
            }
            for (d, &s) in dst[offset..].iter_mut().zip(src.iter()) {
                *d += gain * s;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interleave_roundtrip_layout() {
        let buf = AudioBuffer::from_interleaved(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2, 8000).unwrap();
        assert_eq!(buf.channels[0], vec![1.0, 3.0, 5.0]);
        assert_eq!(buf.channels[1], vec![2.0, 4.0, 6.0]);
        assert_eq!(buf.to_interleaved(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_from_interleaved_rejects_ragged() {
        assert!(AudioBuffer::from_interleaved(&[1.0, 2.0, 3.0], 2, 8000).is_err());
        assert!(AudioBuffer::from_interleaved(&[1.0], 0, 8000).is_err());
    }

    #[test]
    fn test_validate_rejects_invalid_audio() {
        assert!(AudioBuffer::mono(vec![], 8000).validate("a").is_err());
        assert!(AudioBuffer::mono(vec![0.0; 10], 0).validate("a").is_err());
        assert!(AudioBuffer::mono(vec![0.0, f32::NAN], 8000).validate("a").is_err());
        assert!(AudioBuffer::mono(vec![0.0, f32::INFINITY], 8000).validate("a").is_err());
        assert!(AudioBuffer::stereo(vec![0.0; 4], vec![0.0; 3], 8000)
            .validate("a")
            .is_err());
        assert!(AudioBuffer::new(vec![vec![0.0; 4]; 3], 8000).validate("a").is_err());
        assert!(AudioBuffer::mono(vec![0.1; 4], 8000).validate("a").is_ok());
    }

    #[test]
    fn test_mono_and_stereo_conversion() {
        let stereo = AudioBuffer::stereo(vec![1.0, 0.0], vec![0.0, 1.0], 8000);
        assert_eq!(stereo.to_mono(), vec![0.5, 0.5]);

        let mono = AudioBuffer::mono(vec![0.25, -0.25], 8000);
        let up = mono.to_stereo();
        assert_eq!(up.num_channels(), 2);
        assert_eq!(up.channels[0], up.channels[1]);
    }

    #[test]
    fn test_add_scaled_with_offset() {
        let mut dst = AudioBuffer::silent(1, 5, 8000);
        let src = AudioBuffer::mono(vec![1.0, 1.0, 1.0], 8000);
        dst.add_scaled(&src, 0.5, 3);
        assert_eq!(dst.channels[0], vec![0.0, 0.0, 0.0, 0.5, 0.5]);
    }

    #[test]
    fn test_levels() {
        let buf = AudioBuffer::mono(vec![0.5, -1.0, 0.5, -0.5], 4);
        assert_eq!(buf.peak(), 1.0);
        assert!((buf.rms() - (1.75f32 / 4.0).sqrt()).abs() < 1e-6);
        assert!((buf.duration_secs() - 1.0).abs() < 1e-6);
    }
}

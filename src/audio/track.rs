//! Mashup input track

use crate::audio::buffer::AudioBuffer;
use crate::error::MashupError;

/// One decoded input recording with its blend weight
///
/// Tracks are immutable once built; every stage reads them by reference.
#[derive(Debug, Clone)]
pub struct Track {
    buffer: AudioBuffer,
    source_id: String,
    weight: f32,
}

impl Track {
    /// Create a track with the default blend weight of 1.0
    pub fn new(source_id: impl Into<String>, buffer: AudioBuffer) -> Self {
        Self {
            buffer,
            source_id: source_id.into(),
            weight: 1.0,
        }
    }

    /// Set the relative blend weight
    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }

    /// Sample data
    pub fn buffer(&self) -> &AudioBuffer {
        &self.buffer
    }

    /// Caller-supplied identifier (file name, upload id, ...)
    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Relative blend weight
    pub fn weight(&self) -> f32 {
        self.weight
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.buffer.sample_rate
    }

    /// Duration in seconds
    pub fn duration_secs(&self) -> f32 {
        self.buffer.duration_secs()
    }

    /// Check the track can be analysed
    ///
    /// # Errors
    ///
    /// - `MashupError::DecodeError` if the buffer is not valid audio
    /// - `MashupError::InsufficientDuration` if shorter than `min_duration_secs`
    /// - `MashupError::InvalidInput` if the weight is negative or not finite
    pub fn validate(&self, min_duration_secs: f32) -> Result<(), MashupError> {
        self.buffer.validate(&self.source_id)?;

        let duration = self.duration_secs();
        if duration < min_duration_secs {
            return Err(MashupError::InsufficientDuration {
                source_id: self.source_id.clone(),
                duration_secs: duration,
                min_secs: min_duration_secs,
            });
        }

        if !self.weight.is_finite() || self.weight < 0.0 {
            return Err(MashupError::InvalidInput(format!(
                "Blend weight of '{}' must be finite and non-negative, got {}",
                self.source_id, self.weight
            )));
        }

        Ok(())
    }
}

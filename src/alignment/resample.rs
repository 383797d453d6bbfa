//! Sample-rate conversion
//!
//! Polynomial resampling with `rubato`. The whole buffer is processed as one
//! chunk, the resampler's delay is trimmed and the result is sized to exactly
//! `round(len · out / in)` frames.

use rubato::{FastFixedIn, PolynomialDegree, Resampler};

use crate::audio::AudioBuffer;
use crate::error::MashupError;

/// Number of frames a buffer has after conversion
pub fn resampled_len(num_frames: usize, input_rate: u32, output_rate: u32) -> usize {
    if input_rate == 0 {
        return 0;
    }
    (num_frames as f64 * output_rate as f64 / input_rate as f64).round() as usize
}

/// Convert a buffer to `output_rate`
///
/// Equal rates return a copy.
///
/// # Errors
///
/// Returns `MashupError::ProcessingError` if the resampler cannot be built or
/// fails, `MashupError::InvalidInput` for a zero rate
pub fn resample(buffer: &AudioBuffer, output_rate: u32) -> Result<AudioBuffer, MashupError> {
    if buffer.sample_rate == 0 || output_rate == 0 {
        return Err(MashupError::InvalidInput(format!(
            "Cannot resample {} Hz to {} Hz",
            buffer.sample_rate, output_rate
        )));
    }
    if buffer.sample_rate == output_rate {
        return Ok(buffer.clone());
    }

    let input_frames = buffer.num_frames();
    let target_len = resampled_len(input_frames, buffer.sample_rate, output_rate);
    if input_frames == 0 {
        return Ok(AudioBuffer::silent(buffer.num_channels(), 0, output_rate));
    }

    let channels = buffer.num_channels();
    let mut resampler = FastFixedIn::<f32>::new(
        output_rate as f64 / buffer.sample_rate as f64,
        1.0, // fixed ratio
        PolynomialDegree::Septic,
        input_frames,
        channels,
    )
    .map_err(|e| MashupError::ProcessingError(format!("Failed to create resampler: {}", e)))?;

    let delay = resampler.output_delay();
    let planar_output = resampler
        .process(&buffer.channels, None)
        .map_err(|e| MashupError::ProcessingError(format!("Resampling failed: {}", e)))?;

    let output: Vec<Vec<f32>> = planar_output
        .into_iter()
        .map(|mut ch| {
            let skip = delay.min(ch.len());
            ch.drain(..skip);
            ch.resize(target_len, 0.0);
            ch
        })
        .collect();

    log::debug!(
        "Resampled {} frames ({} Hz) → {} frames ({} Hz)",
        input_frames,
        buffer.sample_rate,
        target_len,
        output_rate
    );

    Ok(AudioBuffer::new(output, output_rate))
}

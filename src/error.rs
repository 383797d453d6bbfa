//! Error types for the mashup engine
//!
//! Only conditions that make a request impossible surface as [`MashupError`].
//! Recoverable degradations (separation fallback, alignment anomalies, resource
//! downgrades) are reported as [`crate::analysis::metadata::ProcessingFlag`]s instead.

use std::fmt;

/// Errors that can abort a mashup request
#[derive(Debug, Clone, PartialEq)]
pub enum MashupError {
    /// Buffer cannot be interpreted as audio (empty, NaN/Inf, bad layout)
    DecodeError {
        /// Source identifier of the offending track
        source_id: String,
        /// What was wrong with the buffer
        reason: String,
    },

    /// Track too short for reliable tempo/key analysis
    InsufficientDuration {
        /// Source identifier of the offending track
        source_id: String,
        /// Actual duration in seconds
        duration_secs: f32,
        /// Minimum analysis window in seconds
        min_secs: f32,
    },

    /// Invalid request shape or parameters
    InvalidInput(String),

    /// Processing error during a pipeline stage
    ProcessingError(String),
}

impl MashupError {
    pub(crate) fn decode(source_id: &str, reason: impl Into<String>) -> Self {
        MashupError::DecodeError {
            source_id: source_id.to_string(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for MashupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MashupError::DecodeError { source_id, reason } => {
                write!(f, "Decode error in '{}': {}", source_id, reason)
            }
            MashupError::InsufficientDuration {
                source_id,
                duration_secs,
                min_secs,
            } => write!(
                f,
                "Insufficient duration in '{}': {:.2}s (minimum {:.2}s)",
                source_id, duration_secs, min_secs
            ),
            MashupError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            MashupError::ProcessingError(msg) => write!(f, "Processing error: {}", msg),
        }
    }
}

impl std::error::Error for MashupError {}

//! Preprocessing utilities
//!
//! - Channel mixing (stereo/mono)
//! - Level normalization (peak, RMS)
//! - Silence detection

pub mod channel_mixer;
pub mod normalization;
pub mod silence;

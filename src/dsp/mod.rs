//! Shared signal processing building blocks
//!
//! - STFT / inverse STFT (Hann window, weighted overlap-add)
//! - Biquad filters with zero-phase application

pub mod filter;
pub mod stft;

pub use stft::{StftPlan, Spectrogram};

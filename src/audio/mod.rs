//! Audio containers
//!
//! - [`AudioBuffer`]: planar samples + sample rate
//! - [`Track`]: an input buffer with its source id and blend weight

pub mod buffer;
pub mod track;

pub use buffer::AudioBuffer;
pub use track::Track;

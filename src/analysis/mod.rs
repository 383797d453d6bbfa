//! Analysis and result aggregation modules
//!
//! Collects everything the pipeline learned into the final output:
//! - Confidence scoring
//! - Result types
//! - Metadata report and processing flags

pub mod confidence;
pub mod metadata;
pub mod result;

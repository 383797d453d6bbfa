//! Krumhansl-Kessler key templates
//!
//! Defines tonal profiles for 24 keys (12 major + 12 minor) at a given chroma
//! resolution. Template banks are immutable and built once per process.
//!
//! # Reference
//!
//! Krumhansl, C. L., & Kessler, E. J. (1982). Tracing the Dynamic Changes in Perceived
//! Tonal Organization in a Spatial Representation of Musical Keys. *Psychological Review*,
//! 89(4), 334-368.

use std::sync::OnceLock;

use crate::analysis::result::Key;
use crate::features::chroma::ChromaResolution;

/// Major key profile (C major, starting at the tonic)
const MAJOR_PROFILE: [f32; 12] = [
    6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88,
];

/// Minor key profile (C minor, starting at the tonic)
const MINOR_PROFILE: [f32; 12] = [
    6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17,
];

static STANDARD_TEMPLATES: OnceLock<KeyTemplates> = OnceLock::new();
static HIGH_RES_TEMPLATES: OnceLock<KeyTemplates> = OnceLock::new();

/// Key templates for all 24 keys
#[derive(Debug, Clone)]
pub struct KeyTemplates {
    resolution: ChromaResolution,

    /// Major key templates (12 keys: C, C#, D, ..., B)
    major: Vec<Vec<f32>>,

    /// Minor key templates (12 keys: C, C#, D, ..., B)
    minor: Vec<Vec<f32>>,
}

impl KeyTemplates {
    /// Build templates at the given resolution
    ///
    /// At 24 bins per octave the semitone bins carry the profile values and
    /// the quarter-tone bins in between carry half the profile minimum, so
    /// off-pitch energy is mildly penalized rather than ignored.
    pub fn new(resolution: ChromaResolution) -> Self {
        let major = (0..12)
            .map(|tonic| expand_profile(&MAJOR_PROFILE, tonic, resolution))
            .collect();
        let minor = (0..12)
            .map(|tonic| expand_profile(&MINOR_PROFILE, tonic, resolution))
            .collect();

        Self {
            resolution,
            major,
            minor,
        }
    }

    /// Process-wide template bank for a resolution, built on first use
    pub fn shared(resolution: ChromaResolution) -> &'static KeyTemplates {
        let cell = match resolution {
            ChromaResolution::Standard12 => &STANDARD_TEMPLATES,
            ChromaResolution::High24 => &HIGH_RES_TEMPLATES,
        };
        cell.get_or_init(|| {
            log::debug!("Building key template bank ({:?})", resolution);
            KeyTemplates::new(resolution)
        })
    }

    /// Chroma resolution the templates are built for
    pub fn resolution(&self) -> ChromaResolution {
        self.resolution
    }

    /// Major template for a tonic (0 = C, ..., 11 = B)
    pub fn get_major_template(&self, tonic: u32) -> &[f32] {
        &self.major[tonic as usize % 12]
    }

    /// Minor template for a tonic (0 = C, ..., 11 = B)
    pub fn get_minor_template(&self, tonic: u32) -> &[f32] {
        &self.minor[tonic as usize % 12]
    }

    /// Template for any key
    pub fn template(&self, key: Key) -> &[f32] {
        match key {
            Key::Major(t) => self.get_major_template(t),
            Key::Minor(t) => self.get_minor_template(t),
        }
    }
}

fn expand_profile(profile: &[f32; 12], tonic: usize, resolution: ChromaResolution) -> Vec<f32> {
    let per_semitone = resolution.bins_per_semitone();
    let floor = 0.5 * profile.iter().copied().fold(f32::MAX, f32::min);

    (0..resolution.bins_per_octave())
        .map(|bin| {
            if bin % per_semitone == 0 {
                let pitch_class = bin / per_semitone;
                profile[(pitch_class + 12 - tonic) % 12]
            } else {
                floor
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_templates_are_rotations() {
        let templates = KeyTemplates::new(ChromaResolution::Standard12);
        let c_major = templates.get_major_template(0);
        let g_major = templates.get_major_template(7);
        assert_eq!(c_major.len(), 12);
        assert_eq!(c_major[0], MAJOR_PROFILE[0]);
        // Tonic of G major sits at pitch class 7
        assert_eq!(g_major[7], MAJOR_PROFILE[0]);
        assert_eq!(g_major[(7 + 7) % 12], MAJOR_PROFILE[7]);
    }

    #[test]
    fn test_high_resolution_layout() {
        let templates = KeyTemplates::new(ChromaResolution::High24);
        let a_minor = templates.get_minor_template(9);
        assert_eq!(a_minor.len(), 24);
        assert_eq!(a_minor[18], MINOR_PROFILE[0]);
        assert_eq!(a_minor[19], 0.5 * 2.54);
    }

    #[test]
    fn test_shared_bank_is_reused() {
        let a = KeyTemplates::shared(ChromaResolution::High24);
        let b = KeyTemplates::shared(ChromaResolution::High24);
        assert!(std::ptr::eq(a, b));
        assert_eq!(a.resolution(), ChromaResolution::High24);
    }
}

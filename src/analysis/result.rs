//! Result types

use serde::{Deserialize, Serialize};

use super::metadata::{FlagKind, MetadataReport, ProcessingFlag};
use crate::alignment::AlignmentPlan;

/// Musical key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    /// Major key (0 = C, 1 = C#, ..., 11 = B)
    Major(u32),
    /// Minor key (0 = C, 1 = C#, ..., 11 = B)
    Minor(u32),
}

impl Key {
    /// All 24 keys: C major ... B major, then C minor ... B minor
    pub fn all() -> impl Iterator<Item = Key> {
        (0..12).map(Key::Major).chain((0..12).map(Key::Minor))
    }

    /// Tonic pitch class (0 = C, ..., 11 = B)
    pub fn tonic(&self) -> u32 {
        match self {
            Key::Major(i) | Key::Minor(i) => *i % 12,
        }
    }

    /// True for minor keys
    pub fn is_minor(&self) -> bool {
        matches!(self, Key::Minor(_))
    }

    /// Tonic of the relative major (A minor → C)
    ///
    /// Relative keys share a key signature, so this is the pitch class that
    /// pitch shifting works against.
    pub fn relative_major_tonic(&self) -> u32 {
        match self {
            Key::Major(i) => *i % 12,
            Key::Minor(i) => (*i + 3) % 12,
        }
    }

    /// Shortest signed semitone shift that moves this key onto `target`
    ///
    /// Keys are compared through their relative majors, so a minor key and its
    /// relative major need no shift. The result lies in [-6, 5]; a tritone
    /// resolves downward.
    ///
    /// # Example
    ///
    /// ```
    /// use stratum_mashup::analysis::result::Key;
    ///
    /// assert_eq!(Key::Minor(9).semitone_shift_to(&Key::Major(0)), 0); // Am → C
    /// assert_eq!(Key::Major(2).semitone_shift_to(&Key::Major(0)), -2); // D → C
    /// assert_eq!(Key::Major(10).semitone_shift_to(&Key::Major(0)), 2); // A# → C
    /// assert_eq!(Key::Major(6).semitone_shift_to(&Key::Major(0)), -6); // F# → C
    /// ```
    pub fn semitone_shift_to(&self, target: &Key) -> i32 {
        let diff = (target.relative_major_tonic() as i32 - self.relative_major_tonic() as i32)
            .rem_euclid(12);
        if diff >= 6 {
            diff - 12
        } else {
            diff
        }
    }

    /// Get key name in musical notation (e.g., "C", "Am", "F#", "D#m")
    ///
    /// Returns standard musical notation:
    /// - Major keys: note name only (e.g., "C", "C#", "D", "F#")
    /// - Minor keys: note name + "m" (e.g., "Am", "C#m", "Dm", "F#m")
    ///
    /// # Example
    ///
    /// ```
    /// use stratum_mashup::analysis::result::Key;
    ///
    /// assert_eq!(Key::Major(0).name(), "C");
    /// assert_eq!(Key::Major(6).name(), "F#");
    /// assert_eq!(Key::Minor(9).name(), "Am");
    /// assert_eq!(Key::Minor(1).name(), "C#m");
    /// ```
    pub fn name(&self) -> String {
        let note_names = [
            "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
        ];
        match self {
            Key::Major(i) => note_names[*i as usize % 12].to_string(),
            Key::Minor(i) => format!("{}m", note_names[*i as usize % 12]),
        }
    }

    /// Get key in DJ standard numerical notation (e.g., "1A", "2B", "12A")
    ///
    /// Uses the circle of fifths mapping popularized in DJ software:
    /// - Major keys: 1A-12A (1A = C, 2A = G, 3A = D, ..., 12A = F)
    /// - Minor keys: 1B-12B (1B = Am, 2B = Em, 3B = Bm, ..., 12B = Dm)
    ///
    /// A key and its relative minor share the same number, which makes the
    /// notation handy for judging how well two tracks sit together.
    ///
    /// # Example
    ///
    /// ```
    /// use stratum_mashup::analysis::result::Key;
    ///
    /// assert_eq!(Key::Major(0).numerical(), "1A");   // C
    /// assert_eq!(Key::Major(7).numerical(), "2A");   // G
    /// assert_eq!(Key::Minor(9).numerical(), "1B");   // Am
    /// assert_eq!(Key::Minor(4).numerical(), "2B");   // Em
    /// ```
    pub fn numerical(&self) -> String {
        // Circle of fifths: C, G, D, A, E, B, F#, C#, G#, D#, A#, F
        let circle_of_fifths_major = [0, 7, 2, 9, 4, 11, 6, 1, 8, 3, 10, 5];

        // Positions follow the relative major, so Am shares 1 with C
        let position = circle_of_fifths_major
            .iter()
            .position(|&x| x == self.relative_major_tonic())
            .unwrap_or(0);

        match self {
            Key::Major(_) => format!("{}A", position + 1),
            Key::Minor(_) => format!("{}B", position + 1),
        }
    }
}

/// Rendered mashup
///
/// Owned by the caller; the pipeline keeps nothing after returning it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MashupResult {
    /// Interleaved stereo samples `[L, R, L, R, ...]`
    pub samples: Vec<f32>,

    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Alignment plan the mashup was built with
    pub plan: AlignmentPlan,

    /// Per-track analysis, processing details and flags
    pub report: MetadataReport,
}

impl MashupResult {
    /// Number of stereo frames
    pub fn num_frames(&self) -> usize {
        self.samples.len() / 2
    }

    /// Duration in seconds
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.num_frames() as f32 / self.sample_rate as f32
    }

    /// Every flag raised while processing
    pub fn flags(&self) -> &[ProcessingFlag] {
        &self.report.flags
    }

    /// True if any flag of `kind` was raised
    pub fn has_flag(&self, kind: FlagKind) -> bool {
        self.report.flags.iter().any(|f| f.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_name_major() {
        assert_eq!(Key::Major(0).name(), "C");
        assert_eq!(Key::Major(1).name(), "C#");
        assert_eq!(Key::Major(6).name(), "F#");
        assert_eq!(Key::Major(11).name(), "B");
    }

    #[test]
    fn test_key_name_minor() {
        assert_eq!(Key::Minor(0).name(), "Cm");
        assert_eq!(Key::Minor(9).name(), "Am");
        assert_eq!(Key::Minor(11).name(), "Bm");
    }

    #[test]
    fn test_key_numerical() {
        assert_eq!(Key::Major(0).numerical(), "1A"); // C
        assert_eq!(Key::Major(2).numerical(), "3A"); // D
        assert_eq!(Key::Major(5).numerical(), "12A"); // F
        assert_eq!(Key::Minor(9).numerical(), "1B"); // Am
        assert_eq!(Key::Minor(11).numerical(), "3B"); // Bm
        assert_eq!(Key::Minor(0).numerical(), "10B"); // Cm
        assert_eq!(Key::Minor(2).numerical(), "12B"); // Dm
    }

    #[test]
    fn test_relative_keys_share_numerical_position() {
        for key in (0..12).map(Key::Major) {
            let relative_minor = Key::Minor((key.tonic() + 9) % 12);
            assert_eq!(
                key.numerical().trim_end_matches('A'),
                relative_minor.numerical().trim_end_matches('B'),
                "{} and {}",
                key.name(),
                relative_minor.name()
            );
        }
    }

    #[test]
    fn test_all_keys() {
        let keys: Vec<Key> = Key::all().collect();
        assert_eq!(keys.len(), 24);
        assert_eq!(keys[0], Key::Major(0));
        assert_eq!(keys[12], Key::Minor(0));
    }

    #[test]
    fn test_semitone_shift_range_and_symmetry() {
        for from in Key::all() {
            for to in Key::all() {
                let shift = from.semitone_shift_to(&to);
                assert!((-6..=5).contains(&shift), "{} → {}: {}", from.name(), to.name(), shift);
                let landed = (from.relative_major_tonic() as i32 + shift).rem_euclid(12) as u32;
                assert_eq!(landed, to.relative_major_tonic());
            }
        }
    }

    #[test]
    fn test_relative_keys_need_no_shift() {
        assert_eq!(Key::Minor(9).semitone_shift_to(&Key::Major(0)), 0);
        assert_eq!(Key::Major(7).semitone_shift_to(&Key::Minor(4)), 0);
        assert_eq!(Key::Minor(0).semitone_shift_to(&Key::Major(3)), 0);
    }
}

//! Alignment planning
//!
//! Picks one reference tempo and key for all tracks and derives every track's
//! stretch ratio, pitch shift and beat phase.
//!
//! # Algorithm
//!
//! 1. Tempo clarity per track: `tempo_confidence / (1 + complexity)`
//! 2. Reference tempo: the clearest track's tempo when its clarity beats the
//!    runner-up by `1 + tempo_winner_margin`, otherwise the median tempo (for
//!    an even count, the clearer of the two middle tracks)
//! 3. Reference key: among the detected keys, maximize
//!    `Σ corr_i(K) − shift_penalty · Σ |shift_i(K)|`
//! 4. Per track: stretch ratio, pitch shift (with anomaly fallbacks) and the
//!    circular mean of onset phases within the reference beat

use std::cmp::Ordering;
use std::f32::consts::PI;

use super::{AlignmentPlan, TempoPolicy, TrackAlignment};
use crate::analysis::metadata::{FlagKind, ProcessingFlag};
use crate::analysis::result::Key;
use crate::config::AlignmentConfig;
use crate::error::MashupError;
use crate::features::FeatureProfile;

/// Tempo clarity: confidence discounted by complexity
pub fn tempo_clarity(profile: &FeatureProfile) -> f32 {
    profile.tempo_confidence.max(0.0) / (1.0 + profile.complexity.combined.max(0.0))
}

/// Build the alignment plan for a set of tracks
///
/// # Arguments
///
/// * `profiles` - Feature profiles, in track order
/// * `config` - Alignment configuration
///
/// # Returns
///
/// The plan; implausible per-track transforms are replaced by identity and
/// reported in `plan.flags`
///
/// # Errors
///
/// Returns `MashupError::InvalidInput` if `profiles` is empty or the stretch
/// band is invalid
pub fn plan_alignment(
    profiles: &[FeatureProfile],
    config: &AlignmentConfig,
) -> Result<AlignmentPlan, MashupError> {
    if profiles.is_empty() {
        return Err(MashupError::InvalidInput(
            "Cannot plan alignment without tracks".to_string(),
        ));
    }
    if !(config.min_stretch > 0.0 && config.min_stretch <= 1.0 && config.max_stretch >= 1.0) {
        return Err(MashupError::InvalidInput(format!(
            "Invalid stretch band: [{}, {}]",
            config.min_stretch, config.max_stretch
        )));
    }

    let clarities: Vec<f32> = profiles.iter().map(tempo_clarity).collect();
    let (tempo_source, tempo_policy) = choose_tempo_source(profiles, &clarities, config);
    let reference_tempo_bpm = profiles[tempo_source].tempo_bpm;
    let (reference_key, key_source) = choose_reference_key(profiles, config);

    log::debug!(
        "Reference tempo {:.2} BPM from track {} ({:?}), reference key {} from track {}",
        reference_tempo_bpm,
        tempo_source,
        tempo_policy,
        reference_key.name(),
        key_source
    );

    let period = 60.0 / reference_tempo_bpm;
    let mut flags = Vec::new();
    let tracks = profiles
        .iter()
        .enumerate()
        .map(|(i, profile)| {
            let stretch_ratio = if i == tempo_source {
                1.0
            } else {
                stretch_ratio_for(i, profile, reference_tempo_bpm, config, &mut flags)
            };
            let pitch_shift_semitones =
                pitch_shift_for(i, profile, &reference_key, config, &mut flags);

            TrackAlignment {
                stretch_ratio,
                pitch_shift_semitones,
                beat_phase_secs: beat_phase(&profile.onset_times, stretch_ratio, period),
                stretched_duration_secs: profile.duration_secs / stretch_ratio,
            }
        })
        .collect();

    Ok(AlignmentPlan {
        reference_tempo_bpm,
        reference_key,
        tempo_source,
        tempo_policy,
        key_source,
        tracks,
        flags,
    })
}

fn choose_tempo_source(
    profiles: &[FeatureProfile],
    clarities: &[f32],
    config: &AlignmentConfig,
) -> (usize, TempoPolicy) {
    // Clearest first; stable sort keeps lower indices first on ties
    let mut by_clarity: Vec<usize> = (0..profiles.len()).collect();
    by_clarity.sort_by(|&a, &b| {
        clarities[b]
            .partial_cmp(&clarities[a])
            .unwrap_or(Ordering::Equal)
    });

    let best = by_clarity[0];
    let clear_winner = match by_clarity.get(1) {
        None => true,
        Some(&runner_up) => {
            clarities[best] > 0.0
                && clarities[best] > clarities[runner_up] * (1.0 + config.tempo_winner_margin)
        }
    };
    if clear_winner {
        return (best, TempoPolicy::ClearestSource);
    }

    let mut by_tempo: Vec<usize> = (0..profiles.len()).collect();
    by_tempo.sort_by(|&a, &b| {
        profiles[a]
            .tempo_bpm
            .partial_cmp(&profiles[b].tempo_bpm)
            .unwrap_or(Ordering::Equal)
    });

    let n = by_tempo.len();
    let median = if n % 2 == 1 {
        by_tempo[n / 2]
    } else {
        let (a, b) = (by_tempo[n / 2 - 1], by_tempo[n / 2]);
        match clarities[a].partial_cmp(&clarities[b]) {
            Some(Ordering::Greater) => a,
            Some(Ordering::Less) => b,
            _ => a.min(b),
        }
    };
    (median, TempoPolicy::Median)
}

fn choose_reference_key(profiles: &[FeatureProfile], config: &AlignmentConfig) -> (Key, usize) {
    let mut best: Option<(Key, usize, f32, i32)> = None;

    for (source, candidate) in profiles.iter().map(|p| p.key).enumerate() {
        if profiles[..source].iter().any(|p| p.key == candidate) {
            continue;
        }

        let total_shift: i32 = profiles
            .iter()
            .map(|p| p.key.semitone_shift_to(&candidate).abs())
            .sum();
        let correlation: f32 = profiles.iter().map(|p| p.key_correlation(candidate)).sum();
        let score = correlation - config.shift_penalty * total_shift as f32;

        log::debug!(
            "Key candidate {}: correlation {:.3}, total shift {}, score {:.3}",
            candidate.name(),
            correlation,
            total_shift,
            score
        );

        let better = match best {
            None => true,
            Some((_, _, best_score, best_shift)) => {
                score > best_score || (score == best_score && total_shift < best_shift)
            }
        };
        if better {
            best = Some((candidate, source, score, total_shift));
        }
    }

    match best {
        Some((key, source, _, _)) => (key, source),
        None => (profiles[0].key, 0),
    }
}

fn stretch_ratio_for(
    index: usize,
    profile: &FeatureProfile,
    reference_tempo_bpm: f32,
    config: &AlignmentConfig,
    flags: &mut Vec<ProcessingFlag>,
) -> f32 {
    if profile.tempo_confidence < config.min_tempo_confidence {
        let message = format!(
            "Tempo confidence {:.3} below {:.3}; track left unstretched",
            profile.tempo_confidence, config.min_tempo_confidence
        );
        log::warn!("Track {}: {}", index, message);
        flags.push(ProcessingFlag::for_track(FlagKind::AlignmentAnomaly, index, message));
        return 1.0;
    }

    let ratio = reference_tempo_bpm / profile.tempo_bpm;
    if !ratio.is_finite() || ratio < config.min_stretch || ratio > config.max_stretch {
        let message = format!(
            "Stretch ratio {:.3} outside [{:.2}, {:.2}]; track left unstretched",
            ratio, config.min_stretch, config.max_stretch
        );
        log::warn!("Track {}: {}", index, message);
        flags.push(ProcessingFlag::for_track(FlagKind::AlignmentAnomaly, index, message));
        return 1.0;
    }

    ratio
}

fn pitch_shift_for(
    index: usize,
    profile: &FeatureProfile,
    reference_key: &Key,
    config: &AlignmentConfig,
    flags: &mut Vec<ProcessingFlag>,
) -> i32 {
    let shift = profile.key.semitone_shift_to(reference_key);
    if shift != 0 && profile.key_confidence < config.min_key_confidence {
        let message = format!(
            "Key confidence {:.3} below {:.3}; shift of {} semitones skipped",
            profile.key_confidence, config.min_key_confidence, shift
        );
        log::warn!("Track {}: {}", index, message);
        flags.push(ProcessingFlag::for_track(FlagKind::AlignmentAnomaly, index, message));
        return 0;
    }
    shift
}

/// Circular mean of stretched onset times modulo the beat period, in [0, period)
pub fn beat_phase(onset_times: &[f32], stretch_ratio: f32, period: f32) -> f32 {
    if onset_times.is_empty() || !(period > 0.0) || !(stretch_ratio > 0.0) {
        return 0.0;
    }

    let (sin_sum, cos_sum) = onset_times.iter().fold((0.0f32, 0.0f32), |(s, c), &t| {
        let angle = 2.0 * PI * (t / stretch_ratio) / period;
        (s + angle.sin(), c + angle.cos())
    });

    if sin_sum.hypot(cos_sum) < 1e-6 * onset_times.len() as f32 {
        return 0.0;
    }

    let angle = sin_sum.atan2(cos_sum).rem_euclid(2.0 * PI);
    let phase = angle / (2.0 * PI) * period;
    if phase >= period {
        0.0
    } else {
        phase
    }
}

//! Final rendering
//!
//! Runs the per-stem effects, applies stem levels, sums the stems to stereo,
//! runs the bus compressor, normalizes loudness and assembles the
//! [`MashupResult`] with its metadata report.

pub mod compressor;
pub mod effects;

pub use compressor::Compressor;
pub use effects::{EffectChain, StemEffects};

use std::time::Instant;

use rayon::prelude::*;

use crate::alignment::AlignmentPlan;
use crate::analysis::confidence::compute_confidence;
use crate::analysis::metadata::{
    algorithm_version, FlagKind, MetadataReport, ProcessingFlag, TrackReport,
};
use crate::analysis::result::MashupResult;
use crate::audio::{AudioBuffer, Track};
use crate::blend::MultiStemMix;
use crate::config::{ProcessingMode, StemLevels};
use crate::error::MashupError;
use crate::features::FeatureProfile;
use crate::preprocessing::normalization::{
    linear_to_db, normalize, LoudnessMetadata, NormalizationConfig,
};
use crate::separation::{SeparationMethod, StemKind};

const SILENCE_PEAK: f32 = 1e-6;

/// Rendered stereo audio before the report is attached
#[derive(Debug, Clone)]
pub struct RenderedAudio {
    /// Interleaved stereo samples
    pub samples: Vec<f32>,

    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Levels before normalization and the gain it applied
    pub loudness: LoudnessMetadata,

    /// `SilentOutput` if the mix held no signal
    pub flags: Vec<ProcessingFlag>,
}

/// Everything the report needs besides the audio
#[derive(Debug)]
pub struct RenderContext<'a> {
    /// Input tracks, in request order
    pub tracks: &'a [Track],

    /// One profile per track
    pub profiles: &'a [FeatureProfile],

    /// Separation method used per track
    pub separation_methods: &'a [SeparationMethod],

    /// Plan the stems were aligned with
    pub plan: AlignmentPlan,

    /// Processing mode of the request
    pub mode: ProcessingMode,

    /// Flags raised by earlier stages
    pub flags: Vec<ProcessingFlag>,

    /// When the request started
    pub started: Instant,
}

/// Final mix renderer
#[derive(Debug, Clone)]
pub struct Renderer {
    levels: StemLevels,
    effects: StemEffects,
    normalization: NormalizationConfig,
}

impl Renderer {
    /// Renderer with the given stem levels and default loudness target
    pub fn new(levels: StemLevels) -> Self {
        Self {
            levels,
            effects: StemEffects::default(),
            normalization: NormalizationConfig::default(),
        }
    }

    /// Run these effect chains on the stems before the levels
    pub fn with_effects(mut self, effects: StemEffects) -> Self {
        self.effects = effects;
        self
    }

    /// Override the loudness target
    pub fn with_normalization(mut self, normalization: NormalizationConfig) -> Self {
        self.normalization = normalization;
        self
    }

    fn level(&self, kind: StemKind) -> f32 {
        match kind {
            StemKind::Vocals => self.levels.vocals,
            StemKind::Drums => self.levels.drums,
            StemKind::Bass => self.levels.bass,
            StemKind::Other => self.levels.other,
        }
    }

    /// Run each stem's effect chain, stems in parallel
    fn process_effects(&self, mix: &MultiStemMix) -> Result<Vec<AudioBuffer>, MashupError> {
        StemKind::ALL
            .par_iter()
            .map(|&kind| {
                let mut stem = mix.stems.get(kind).clone();
                let chain = self.effects.chain(kind);
                if !chain.is_empty() {
                    log::debug!("Applying effects to {}: {:?}", kind.name(), chain);
                    chain.apply(&mut stem)?;
                }
                Ok(stem)
            })
            .collect()
    }

    /// Run stem effects, then sum, compress and normalize the blended stems
    ///
    /// # Errors
    ///
    /// Returns `MashupError::InvalidInput` if a stem level is negative or not
    /// finite, an effect parameter is out of range, or the normalization
    /// ceiling is invalid
    pub fn render_audio(&self, mix: &MultiStemMix) -> Result<RenderedAudio, MashupError> {
        let sample_rate = mix.stems.sample_rate();
        let mut bus = AudioBuffer::silent(2, mix.stems.num_frames(), sample_rate);
        let processed = self.process_effects(mix)?;
        for (kind, stem) in StemKind::ALL.into_iter().zip(processed.iter()) {
            let level = self.level(kind);
            if !level.is_finite() || level < 0.0 {
                return Err(MashupError::InvalidInput(format!(
                    "Stem level for {} must be finite and non-negative, got {}",
                    kind.name(),
                    level
                )));
            }
            bus.add_scaled(&stem.to_stereo(), level, 0);
        }

        let peak = bus.peak();
        if peak <= SILENCE_PEAK {
            log::warn!("Mix is silent; skipping compression and normalization");
            let loudness = LoudnessMetadata {
                peak_db: linear_to_db(peak),
                rms_db: linear_to_db(bus.rms()),
                gain_db: 0.0,
            };
            return Ok(RenderedAudio {
                samples: bus.to_interleaved(),
                sample_rate,
                loudness,
                flags: vec![ProcessingFlag::global(
                    FlagKind::SilentOutput,
                    "Rendered mix contains no signal",
                )],
            });
        }

        if let [left, right] = bus.channels.as_mut_slice() {
            Compressor::new(sample_rate).process(left, right);
        }

        let mut samples = bus.to_interleaved();
        let loudness = normalize(&mut samples, &self.normalization)?;
        log::debug!(
            "Rendered {} frames: peak {:.1} dBFS, rms {:.1} dBFS, gain {:.1} dB",
            samples.len() / 2,
            loudness.peak_db,
            loudness.rms_db,
            loudness.gain_db
        );

        Ok(RenderedAudio {
            samples,
            sample_rate,
            loudness,
            flags: Vec::new(),
        })
    }

    /// Render the mix and build the final result
    ///
    /// Flags are reported in stage order: those in `context` first, then the
    /// blender's, then the renderer's own.
    ///
    /// # Errors
    ///
    /// Returns `MashupError::InvalidInput` if the context does not have one
    /// entry per track, or on any [`Renderer::render_audio`] error
    pub fn render(
        &self,
        mix: &MultiStemMix,
        context: RenderContext<'_>,
    ) -> Result<MashupResult, MashupError> {
        let n = context.tracks.len();
        if context.profiles.len() != n
            || context.separation_methods.len() != n
            || context.plan.tracks.len() != n
            || mix.grid_delays.len() != n
        {
            return Err(MashupError::InvalidInput(format!(
                "Render context mismatch for {} tracks",
                n
            )));
        }

        let audio = self.render_audio(mix)?;
        let delays = mix.grid_delays_secs();

        let tracks: Vec<TrackReport> = (0..n)
            .map(|i| {
                let track = &context.tracks[i];
                let profile = &context.profiles[i];
                let alignment = &context.plan.tracks[i];
                let confidence = compute_confidence(profile);
                TrackReport {
                    source_id: track.source_id().to_string(),
                    duration_secs: track.duration_secs(),
                    sample_rate: track.sample_rate(),
                    weight: track.weight(),
                    tempo_bpm: profile.tempo_bpm,
                    key: profile.key.name(),
                    key_numerical: profile.key.numerical(),
                    key_clarity: profile.key_clarity,
                    complexity: profile.complexity.combined,
                    confidence_level: confidence.confidence_level().to_string(),
                    confidence,
                    separation_method: context.separation_methods[i],
                    stretch_ratio: alignment.stretch_ratio,
                    pitch_shift_semitones: alignment.pitch_shift_semitones,
                    grid_delay_secs: delays[i],
                    aligned_duration_secs: alignment.stretched_duration_secs + delays[i],
                }
            })
            .collect();

        let mut flags = context.flags;
        flags.extend(mix.flags.iter().cloned());
        flags.extend(audio.flags);

        let report = MetadataReport {
            tracks,
            reference_tempo_bpm: context.plan.reference_tempo_bpm,
            reference_key: context.plan.reference_key.name(),
            mode: context.mode,
            flags,
            loudness: audio.loudness,
            blend_headroom_gain: mix.headroom_gain,
            processing_time_ms: context.started.elapsed().as_secs_f32() * 1000.0,
            algorithm_version: algorithm_version(),
        };

        Ok(MashupResult {
            samples: audio.samples,
            sample_rate: audio.sample_rate,
            plan: context.plan,
            report,
        })
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new(StemLevels::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::normalization::{peak_level, rms_level};
    use crate::separation::StemSet;
    use std::f32::consts::PI;

    const SR: u32 = 8000;

    fn mix_of(amp: f32) -> MultiStemMix {
        let stems = StemSet::from_fn(|kind| {
            let freq = [440.0, 1000.0, 80.0, 660.0][kind.index()];
            let samples: Vec<f32> = (0..16000)
                .map(|i| amp * (2.0 * PI * freq * i as f32 / SR as f32).sin())
                .collect();
            AudioBuffer::stereo(samples.clone(), samples, SR)
        });
        MultiStemMix {
            stems,
            grid_delays: vec![0, 0],
            headroom_gain: 1.0,
            flags: Vec::new(),
        }
    }

    #[test]
    fn test_render_normalizes_under_ceiling() {
        let audio = Renderer::default().render_audio(&mix_of(0.05)).unwrap();
        assert_eq!(audio.samples.len(), 32000);
        assert_eq!(audio.sample_rate, SR);
        assert!(audio.flags.is_empty());

        let peak = peak_level(&audio.samples);
        assert!(linear_to_db(peak) <= -1.0 + 1e-3, "Peak {} dBFS", linear_to_db(peak));
        let rms_db = linear_to_db(rms_level(&audio.samples));
        assert!(rms_db > -20.0 && rms_db <= -13.9, "RMS {} dBFS", rms_db);
    }

    #[test]
    fn test_stem_levels_mute_stems() {
        let levels = StemLevels {
            vocals: 0.0,
            drums: 0.0,
            bass: 0.0,
            other: 0.0,
        };
        let audio = Renderer::new(levels).render_audio(&mix_of(0.1)).unwrap();
        assert!(audio.samples.iter().all(|&x| x == 0.0));
        assert_eq!(audio.flags.len(), 1);
        assert_eq!(audio.flags[0].kind, FlagKind::SilentOutput);
    }

    #[test]
    fn test_negative_level_rejected() {
        let levels = StemLevels {
            drums: -1.0,
            ..StemLevels::default()
        };
        assert!(Renderer::new(levels).render_audio(&mix_of(0.1)).is_err());
    }

    #[test]
    fn test_effects_run_before_levels() {
        let levels = StemLevels {
            vocals: 1.0,
            drums: 0.0,
            bass: 0.0,
            other: 0.0,
        };
        let dry = Renderer::new(levels).render_audio(&mix_of(0.05)).unwrap();

        let mut chains = StemEffects::default();
        chains.vocals.delay = Some(effects::DelaySettings {
            time_secs: 0.0375,
            feedback: 0.3,
            mix: 0.5,
        });
        // A chain on a muted stem must not leak into the mix
        chains.drums.distortion = Some(effects::DistortionSettings::default());
        let wet = Renderer::new(levels)
            .with_effects(chains)
            .render_audio(&mix_of(0.05))
            .unwrap();

        assert_eq!(wet.samples.len(), dry.samples.len());
        assert!(wet.flags.is_empty());
        let differs = dry
            .samples
            .iter()
            .zip(wet.samples.iter())
            .any(|(a, b)| (a - b).abs() > 1e-3);
        assert!(differs, "Vocal delay should change the render");
    }

    #[test]
    fn test_invalid_effect_rejected() {
        let mut chains = StemEffects::default();
        chains.other.eq = Some(effects::EqSettings {
            low_gain: 3.0,
            ..effects::EqSettings::default()
        });
        let renderer = Renderer::default().with_effects(chains);
        assert!(matches!(
            renderer.render_audio(&mix_of(0.1)),
            Err(MashupError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_single_stem_solo() {
        let levels = StemLevels {
            vocals: 1.0,
            drums: 0.0,
            bass: 0.0,
            other: 0.0,
        };
        let audio = Renderer::new(levels).render_audio(&mix_of(0.05)).unwrap();
        // A lone sine normalized under a -1 dBFS ceiling sits at -4 dBFS RMS at most
        let rms_db = linear_to_db(rms_level(&audio.samples));
        assert!(rms_db <= -3.9, "RMS {} dBFS", rms_db);
        assert!(audio.flags.is_empty());
    }
}

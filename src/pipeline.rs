//! End-to-end mashup pipeline
//!
//! ```text
//! Tracks → Features → Budget check → Stems → Plan → Warp → Blend → Render → MashupResult
//! ```
//!
//! Feature extraction and separation each run per track on the rayon pool.
//! Between them the NMF budget is checked for the whole request, so every
//! track of a request is separated the same way. Planning waits for every
//! profile; warping runs per track (and per stem inside [`warp_stems`]);
//! blending runs per stem kind.

use std::time::Instant;

use rayon::prelude::*;

use crate::alignment::{plan_alignment, warp_stems};
use crate::analysis::metadata::{FlagKind, ProcessingFlag};
use crate::analysis::result::MashupResult;
use crate::audio::Track;
use crate::blend::{BlendConfig, Blender};
use crate::config::{MashupConfig, ProcessingMode};
use crate::error::MashupError;
use crate::features::{extract_features, FeatureProfile};
use crate::render::{RenderContext, Renderer};
use crate::separation::{LabelingPolicy, SeparationOutput, StemSeparator};

/// Fewest tracks a mashup accepts
pub const MIN_TRACKS: usize = 2;

/// Most tracks a mashup accepts
pub const MAX_TRACKS: usize = 3;

/// Configured mashup pipeline
///
/// Stateless between runs; one pipeline can serve any number of requests.
#[derive(Debug)]
pub struct MashupPipeline {
    config: MashupConfig,
    separator: StemSeparator,
}

impl MashupPipeline {
    /// Build a pipeline
    ///
    /// # Errors
    ///
    /// Returns `MashupError::InvalidInput` if the configuration is inconsistent
    pub fn new(config: MashupConfig) -> Result<Self, MashupError> {
        config.validate()?;
        let separator = StemSeparator::new(config.separation.clone(), config.mode);
        Ok(Self { config, separator })
    }

    /// Replace the stem separator's component labeling policy
    pub fn with_labeler(mut self, labeler: Box<dyn LabelingPolicy>) -> Self {
        self.separator = self.separator.with_labeler(labeler);
        self
    }

    /// Configuration this pipeline runs with
    pub fn config(&self) -> &MashupConfig {
        &self.config
    }

    /// Check the request shape before any processing
    ///
    /// # Errors
    ///
    /// - `MashupError::InvalidInput` for a track count outside 2..=3 or
    ///   invalid blend weights
    /// - `MashupError::DecodeError` / `MashupError::InsufficientDuration` for
    ///   the first unusable track
    pub fn validate_request(&self, tracks: &[Track]) -> Result<(), MashupError> {
        if !(MIN_TRACKS..=MAX_TRACKS).contains(&tracks.len()) {
            return Err(MashupError::InvalidInput(format!(
                "A mashup needs {} to {} tracks, got {}",
                MIN_TRACKS,
                MAX_TRACKS,
                tracks.len()
            )));
        }
        BlendConfig::from_tracks(tracks).normalized_weights()?;
        for track in tracks {
            track.validate(self.config.analysis.min_duration_secs)?;
        }
        Ok(())
    }

    /// Separation mode for the whole request
    ///
    /// Enhanced requests drop to the masking split for every track as soon as
    /// one track would exceed the NMF budget, with one request-wide
    /// `ResourceExhaustion` flag.
    fn separation_mode(
        &self,
        tracks: &[Track],
        profiles: &[FeatureProfile],
        flags: &mut Vec<ProcessingFlag>,
    ) -> ProcessingMode {
        if self.config.mode == ProcessingMode::Standard {
            return ProcessingMode::Standard;
        }

        let over_budget: Vec<String> = tracks
            .iter()
            .zip(profiles.iter())
            .enumerate()
            .filter_map(|(i, (track, profile))| {
                self.separator
                    .check_budget(track, Some(profile))
                    .err()
                    .map(|err| format!("track {} ('{}'): {}", i, track.source_id(), err))
            })
            .collect();
        if over_budget.is_empty() {
            return ProcessingMode::Enhanced;
        }

        let message = format!(
            "Request downgraded to masking split; {}",
            over_budget.join("; ")
        );
        log::warn!("{}", message);
        flags.push(ProcessingFlag::global(FlagKind::ResourceExhaustion, message));
        ProcessingMode::Standard
    }

    /// Run the whole pipeline on 2 or 3 tracks
    ///
    /// # Errors
    ///
    /// Returns `MashupError` for an invalid request (see
    /// [`MashupPipeline::validate_request`]) or an internal processing
    /// failure. Recoverable trouble is reported as flags in the result.
    pub fn run(&self, tracks: &[Track]) -> Result<MashupResult, MashupError> {
        let started = Instant::now();
        self.validate_request(tracks)?;

        let output_rate = self
            .config
            .output_sample_rate
            .unwrap_or_else(|| tracks[0].sample_rate());
        log::info!(
            "Starting mashup of {} tracks ({:?} mode, output {} Hz)",
            tracks.len(),
            self.config.mode,
            output_rate
        );

        // Features per track
        let profiles: Vec<FeatureProfile> = tracks
            .par_iter()
            .map(|track| extract_features(track, &self.config.analysis, self.config.mode))
            .collect::<Result<_, MashupError>>()?;
        log::info!("Extracted features of {} tracks", profiles.len());

        // Stems per track, all with the same method family
        let mut flags: Vec<ProcessingFlag> = Vec::new();
        let separation_mode = self.separation_mode(tracks, &profiles, &mut flags);
        let separated: Vec<SeparationOutput> = tracks
            .par_iter()
            .zip(profiles.par_iter())
            .map(|(track, profile)| {
                self.separator
                    .separate_in_mode(track, Some(profile), separation_mode)
            })
            .collect::<Result<_, MashupError>>()?;
        log::info!("Separated {} tracks", separated.len());

        for (i, output) in separated.iter().enumerate() {
            flags.extend(output.flags.iter().map(|f| ProcessingFlag {
                track: Some(i),
                ..f.clone()
            }));
        }

        // Barrier: the plan needs every profile
        let plan = plan_alignment(&profiles, &self.config.alignment)?;
        flags.extend(plan.flags.iter().cloned());
        log::info!(
            "Planned alignment: {:.1} BPM, key {}",
            plan.reference_tempo_bpm,
            plan.reference_key.name()
        );

        let aligned = separated
            .par_iter()
            .zip(plan.tracks.par_iter())
            .map(|(output, alignment)| {
                warp_stems(&output.stems, alignment, output_rate, &self.config.alignment)
            })
            .collect::<Result<Vec<_>, MashupError>>()?;
        log::info!("Warped stems of {} tracks", aligned.len());

        let mix = Blender::new(BlendConfig::from_tracks(tracks)).blend(&aligned, &plan)?;
        log::info!(
            "Blended {} frames (headroom gain {:.3})",
            mix.stems.num_frames(),
            mix.headroom_gain
        );

        let methods: Vec<_> = separated.iter().map(|s| s.method).collect();
        let renderer = Renderer::new(self.config.stem_levels)
            .with_effects(self.config.stem_effects.clone());
        let result = renderer.render(
            &mix,
            RenderContext {
                tracks,
                profiles: &profiles,
                separation_methods: &methods,
                plan,
                mode: self.config.mode,
                flags,
                started,
            },
        )?;

        log::info!(
            "Mashup rendered: {:.2}s at {} Hz, {} flags, {:.0} ms",
            result.duration_secs(),
            result.sample_rate,
            result.report.flags.len(),
            result.report.processing_time_ms
        );

        Ok(result)
    }
}

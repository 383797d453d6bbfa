//! Integration tests for the mashup engine
//!
//! All signals are synthetic: sustained triads with a decaying 60 Hz kick on
//! every beat. Most tests run at 8 kHz with small STFT frames so the full
//! pipeline stays fast; the default-configuration tests run at 44.1 and
//! 22.05 kHz.

use std::f32::consts::PI;

use stratum_mashup::{
    create_mashup, extract_features, plan_alignment, Key, warp_stems, AlignmentConfig, AnalysisConfig,
    AudioBuffer, BlendConfig, Blender, FlagKind, MashupConfig, MashupError, MashupPipeline,
    ProcessingMode, SeparationConfig, StemKind, StemSeparator, StemSet, Track, TrackAlignment,
};

const SR: u32 = 8000;

const C_MAJOR: [f32; 3] = [261.63, 329.63, 392.0];
const A_MINOR: [f32; 3] = [220.0, 261.63, 329.63];
const G_MAJOR: [f32; 3] = [196.0, 246.94, 293.66];

/// Triad plus a kick at `bpm`, mono or stereo
fn synth(id: &str, sr: u32, secs: f32, bpm: f32, chord: [f32; 3], stereo: bool) -> Track {
    let n = (sr as f32 * secs) as usize;
    let period = (60.0 / bpm * sr as f32).round() as usize;
    let kick_len = sr as usize / 20;
    let samples: Vec<f32> = (0..n)
        .map(|i| {
            let t = i as f32 / sr as f32;
            let tone: f32 = chord.iter().map(|f| (2.0 * PI * f * t).sin()).sum::<f32>() * 0.1;
            let pos = i % period;
            let kick = if pos < kick_len {
                let decay = (-(pos as f32) / (sr as f32 / 100.0)).exp();
                decay * (2.0 * PI * 60.0 * pos as f32 / sr as f32).sin()
            } else {
                0.0
            };
            tone + 0.3 * kick
        })
        .collect();

    let buffer = if stereo {
        let right: Vec<f32> = samples.iter().map(|x| x * 0.8).collect();
        AudioBuffer::stereo(samples, right, sr)
    } else {
        AudioBuffer::mono(samples, sr)
    };
    Track::new(id, buffer)
}

fn small_config(mode: ProcessingMode) -> MashupConfig {
    MashupConfig {
        mode,
        analysis: AnalysisConfig {
            frame_size: 1024,
            hop_size: 160,
            ..AnalysisConfig::default()
        },
        separation: SeparationConfig {
            frame_size: 1024,
            hop_size: 256,
            max_iterations: 100,
            ..SeparationConfig::default()
        },
        alignment: AlignmentConfig {
            frame_size: 1024,
            hop_size: 256,
            ..AlignmentConfig::default()
        },
        ..MashupConfig::default()
    }
}

#[test]
fn test_two_track_mashup_scenario() {
    let tracks = vec![
        synth("c_major_120", SR, 30.0, 120.0, C_MAJOR, false),
        synth("a_minor_100", SR, 30.0, 100.0, A_MINOR, true),
    ];
    let result = create_mashup(&tracks, &small_config(ProcessingMode::Enhanced))
        .expect("Mashup should succeed");

    let tempo = result.report.reference_tempo_bpm;
    assert!(
        (tempo - 120.0).abs() < 3.0 || (tempo - 100.0).abs() < 3.0,
        "Reference tempo should come from one of the tracks, got {:.2}",
        tempo
    );
    for alignment in &result.plan.tracks {
        assert!(alignment.pitch_shift_semitones.abs() <= 3);
        assert!(alignment.stretch_ratio >= 0.5 && alignment.stretch_ratio <= 2.0);
    }

    // Output covers the longest stretched + grid-delayed track, nothing more
    let expected = result
        .report
        .tracks
        .iter()
        .map(|t| t.aligned_duration_secs)
        .fold(0.0f32, f32::max);
    assert!(
        (result.duration_secs() - expected).abs() < 0.05,
        "Duration {:.3}s, expected {:.3}s",
        result.duration_secs(),
        expected
    );
    let longest_stretch = result
        .plan
        .tracks
        .iter()
        .map(|t| 30.0 / t.stretch_ratio)
        .fold(0.0f32, f32::max);
    assert!(result.duration_secs() >= longest_stretch - 0.05);

    assert_eq!(result.sample_rate, SR);
    assert_eq!(result.samples.len() % 2, 0);
    assert!(result.samples.iter().all(|x| x.is_finite() && x.abs() <= 1.0));

    for kind in [
        FlagKind::AlignmentAnomaly,
        FlagKind::ResourceExhaustion,
        FlagKind::SilentOutput,
    ] {
        assert!(!result.has_flag(kind), "Unexpected {:?} flag", kind);
    }
    assert_eq!(result.report.tracks.len(), 2);
    assert_eq!(result.report.mode, ProcessingMode::Enhanced);
}

#[test]
fn test_default_config_detects_keys_at_44k() {
    let config = AnalysisConfig::default();
    let c_major = synth("c_major_120", 44100, 30.0, 120.0, C_MAJOR, false);
    let a_minor = synth("a_minor_100", 44100, 30.0, 100.0, A_MINOR, true);

    let c = extract_features(&c_major, &config, ProcessingMode::Enhanced).unwrap();
    let a = extract_features(&a_minor, &config, ProcessingMode::Enhanced).unwrap();

    assert_eq!(c.key, Key::Major(0), "C major detected as {}", c.key.name());
    assert_eq!(a.key, Key::Minor(9), "A minor detected as {}", a.key.name());
    assert!((c.tempo_bpm - 120.0).abs() < 3.0, "Tempo {:.2}", c.tempo_bpm);
    assert!((a.tempo_bpm - 100.0).abs() < 3.0, "Tempo {:.2}", a.tempo_bpm);
}

#[test]
fn test_two_track_scenario_with_default_config() {
    let sr = 22050;
    let tracks = vec![
        synth("c_major_120", sr, 30.0, 120.0, C_MAJOR, false),
        synth("a_minor_100", sr, 30.0, 100.0, A_MINOR, true),
    ];
    let result = create_mashup(&tracks, &MashupConfig::default()).expect("Mashup should succeed");

    assert_eq!(result.report.tracks[0].key, "C");
    assert_eq!(result.report.tracks[1].key, "Am");
    // Relative keys: no transposition needed
    for alignment in &result.plan.tracks {
        assert!(
            alignment.pitch_shift_semitones.abs() <= 3,
            "Shift {}",
            alignment.pitch_shift_semitones
        );
    }
    let tempo = result.report.reference_tempo_bpm;
    assert!(
        (tempo - 120.0).abs() < 3.0 || (tempo - 100.0).abs() < 3.0,
        "Reference tempo {:.2}",
        tempo
    );

    let longest_stretch = result
        .plan
        .tracks
        .iter()
        .map(|t| 30.0 / t.stretch_ratio)
        .fold(0.0f32, f32::max);
    let beat = 60.0 / tempo;
    assert!(result.duration_secs() >= longest_stretch - 0.05);
    assert!(result.duration_secs() <= longest_stretch + beat + 0.05);

    assert_eq!(result.sample_rate, sr);
    assert!(result.samples.iter().all(|x| x.is_finite() && x.abs() <= 1.0));
    for kind in [
        FlagKind::AlignmentAnomaly,
        FlagKind::ResourceExhaustion,
        FlagKind::SilentOutput,
    ] {
        assert!(!result.has_flag(kind), "Unexpected {:?} flag", kind);
    }
}

#[test]
fn test_short_clip_rejected() {
    let tracks = vec![
        synth("full", SR, 10.0, 120.0, C_MAJOR, false),
        synth("clip", SR, 2.0, 120.0, C_MAJOR, false),
    ];
    match create_mashup(&tracks, &small_config(ProcessingMode::Standard)) {
        Err(MashupError::InsufficientDuration {
            source_id,
            duration_secs,
            ..
        }) => {
            assert_eq!(source_id, "clip");
            assert!((duration_secs - 2.0).abs() < 1e-3);
        }
        other => panic!("Expected InsufficientDuration, got {:?}", other.map(|r| r.duration_secs())),
    }
}

#[test]
fn test_track_count_and_weights_rejected() {
    let config = small_config(ProcessingMode::Standard);
    let one = vec![synth("a", SR, 6.0, 120.0, C_MAJOR, false)];
    assert!(matches!(
        create_mashup(&one, &config),
        Err(MashupError::InvalidInput(_))
    ));

    let zeros = vec![
        synth("a", SR, 6.0, 120.0, C_MAJOR, false).with_weight(0.0),
        synth("b", SR, 6.0, 100.0, A_MINOR, false).with_weight(0.0),
    ];
    assert!(matches!(
        create_mashup(&zeros, &config),
        Err(MashupError::InvalidInput(_))
    ));
}

#[test]
fn test_zero_weight_track_is_silent_but_planned() {
    let config = small_config(ProcessingMode::Standard);
    let tracks = vec![
        synth("a", SR, 8.0, 120.0, C_MAJOR, false),
        synth("b", SR, 8.0, 100.0, A_MINOR, false),
        synth("muted", SR, 8.0, 110.0, G_MAJOR, false).with_weight(0.0),
    ];

    let profiles: Vec<_> = tracks
        .iter()
        .map(|t| extract_features(t, &config.analysis, config.mode).unwrap())
        .collect();
    let separator = StemSeparator::new(config.separation.clone(), config.mode);
    let stems: Vec<StemSet> = tracks
        .iter()
        .zip(profiles.iter())
        .map(|(t, p)| separator.separate(t, Some(p)).unwrap().stems)
        .collect();

    let plan = plan_alignment(&profiles, &config.alignment).unwrap();
    assert_eq!(plan.tracks.len(), 3);

    let aligned: Vec<StemSet> = stems
        .iter()
        .zip(plan.tracks.iter())
        .map(|(s, a)| warp_stems(s, a, SR, &config.alignment).unwrap())
        .collect();

    let blender = Blender::new(BlendConfig::from_tracks(&tracks));
    let mix = blender.blend(&aligned, &plan).unwrap();

    // Replacing the muted track's stems with silence changes nothing
    let mut silenced = aligned.clone();
    let frames = silenced[2].num_frames();
    silenced[2] = StemSet::from_fn(|_| AudioBuffer::mono(vec![0.0; frames], SR));
    let reference = blender.blend(&silenced, &plan).unwrap();

    for kind in StemKind::ALL {
        assert_eq!(mix.stems.get(kind), reference.stems.get(kind), "{} differs", kind.name());
    }

    let result = create_mashup(&tracks, &config).unwrap();
    assert_eq!(result.report.tracks.len(), 3);
    assert_eq!(result.report.tracks[2].weight, 0.0);
}

#[test]
fn test_pipeline_is_deterministic() {
    let tracks = vec![
        synth("a", SR, 8.0, 120.0, C_MAJOR, true),
        synth("b", SR, 8.0, 100.0, A_MINOR, false),
    ];
    let pipeline = MashupPipeline::new(small_config(ProcessingMode::Enhanced)).unwrap();
    let first = pipeline.run(&tracks).unwrap();
    let second = pipeline.run(&tracks).unwrap();

    assert_eq!(first.samples, second.samples);
    assert_eq!(first.plan, second.plan);
    assert_eq!(first.report.flags, second.report.flags);
}

#[test]
fn test_separated_stems_are_additive() {
    let track = synth("stereo", SR, 8.0, 120.0, C_MAJOR, true);
    let config = small_config(ProcessingMode::Enhanced);
    let profile = extract_features(&track, &config.analysis, config.mode).unwrap();

    for mode in [ProcessingMode::Enhanced, ProcessingMode::Standard] {
        let separator = StemSeparator::new(config.separation.clone(), mode);
        let output = separator.separate(&track, Some(&profile)).unwrap();
        let mix = output.stems.mixdown();

        assert_eq!(mix.num_channels(), 2);
        assert_eq!(mix.num_frames(), track.buffer().num_frames());
        for (rebuilt, original) in mix.channels.iter().zip(track.buffer().channels.iter()) {
            let max_err = rebuilt
                .iter()
                .zip(original.iter())
                .map(|(a, b)| (a - b).abs())
                .fold(0.0f32, f32::max);
            assert!(max_err < 1e-3, "{:?}: reconstruction error {}", mode, max_err);
        }
    }
}

#[test]
fn test_identity_warp_returns_input() {
    let track = synth("a", SR, 6.0, 120.0, C_MAJOR, true);
    let config = small_config(ProcessingMode::Standard);
    let stems = StemSeparator::new(config.separation.clone(), config.mode)
        .separate(&track, None)
        .unwrap()
        .stems;

    let warped = warp_stems(
        &stems,
        &TrackAlignment::identity(track.duration_secs()),
        SR,
        &config.alignment,
    )
    .unwrap();
    assert_eq!(warped, stems);
}

#[test]
fn test_out_of_band_ratio_is_clamped_and_flagged() {
    let config = small_config(ProcessingMode::Standard);
    let tracks = [
        synth("a", SR, 8.0, 120.0, C_MAJOR, false),
        synth("b", SR, 8.0, 100.0, A_MINOR, false),
    ];
    let mut profiles: Vec<_> = tracks
        .iter()
        .map(|t| extract_features(t, &config.analysis, config.mode).unwrap())
        .collect();
    profiles[1].tempo_bpm = 45.0;

    let plan = plan_alignment(&profiles, &config.alignment).unwrap();
    for alignment in &plan.tracks {
        assert!(alignment.stretch_ratio >= config.alignment.min_stretch);
        assert!(alignment.stretch_ratio <= config.alignment.max_stretch);
    }
    assert!(plan.tracks.iter().any(|t| t.stretch_ratio == 1.0));
    assert!(plan
        .flags
        .iter()
        .any(|f| f.kind == FlagKind::AlignmentAnomaly && f.track.is_some()));
}

#[test]
fn test_mixed_sample_rates_use_first_track_rate() {
    let tracks = vec![
        synth("narrow", SR, 6.0, 120.0, C_MAJOR, false),
        synth("wide", 16000, 6.0, 120.0, C_MAJOR, false),
    ];
    let result = create_mashup(&tracks, &small_config(ProcessingMode::Standard)).unwrap();
    assert_eq!(result.sample_rate, SR);

    let mut config = small_config(ProcessingMode::Standard);
    config.output_sample_rate = Some(16000);
    let result = create_mashup(&tracks, &config).unwrap();
    assert_eq!(result.sample_rate, 16000);
    assert!(result.duration_secs() > 5.5);
}

#[test]
fn test_report_serializes() {
    let tracks = vec![
        synth("a", SR, 6.0, 120.0, C_MAJOR, false),
        synth("b", SR, 6.0, 100.0, A_MINOR, false),
    ];
    let result = create_mashup(&tracks, &small_config(ProcessingMode::Standard)).unwrap();

    let json = serde_json::to_string(&result.report).unwrap();
    assert!(json.contains("reference_tempo_bpm"));
    assert!(json.contains("\"MaskingSplit\""));
    assert!(!result.report.algorithm_version.is_empty());
    assert!(result.report.processing_time_ms >= 0.0);

    for track in &result.report.tracks {
        assert!(json.contains(&format!("\"key_numerical\":\"{}\"", track.key_numerical)));
        assert_eq!(track.confidence_level, track.confidence.confidence_level());
        assert!(["High", "Medium", "Low"].contains(&track.confidence_level.as_str()));
    }
}

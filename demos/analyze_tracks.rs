//! Example: Analyze WAV files in parallel
//!
//! Prints tempo, key, complexity and confidence for each file, the way the
//! mashup pipeline sees them before planning.
//!
//! Usage:
//!   cargo run --release --example analyze_tracks -- [--standard] [--json] <file1.wav> <file2.wav> ...

use std::env;

use rayon::prelude::*;
use stratum_mashup::analysis::confidence::compute_confidence;
use stratum_mashup::{extract_features, AnalysisConfig, AudioBuffer, ProcessingMode, Track};

fn load_wav(path: &str) -> Result<AudioBuffer, Box<dyn std::error::Error + Send + Sync>> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        hound::SampleFormat::Int => {
            let max_value = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|s| s as f32 / max_value))
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    Ok(AudioBuffer::from_interleaved(
        &samples,
        spec.channels as usize,
        spec.sample_rate,
    )?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut mode = ProcessingMode::Enhanced;
    let mut json = false;
    let mut paths: Vec<String> = Vec::new();
    for arg in env::args().skip(1) {
        match arg.as_str() {
            "--standard" => mode = ProcessingMode::Standard,
            "--json" => json = true,
            _ => paths.push(arg),
        }
    }

    if paths.is_empty() {
        eprintln!("Usage: analyze_tracks [--standard] [--json] <file1.wav> <file2.wav> ...");
        std::process::exit(2);
    }

    let config = AnalysisConfig::default();
    let results: Vec<_> = paths
        .par_iter()
        .map(|path| {
            let buffer = load_wav(path)?;
            let track = Track::new(path.as_str(), buffer);
            let profile = extract_features(&track, &config, mode)?;
            Ok::<_, Box<dyn std::error::Error + Send + Sync>>(profile)
        })
        .collect();

    for (path, result) in paths.iter().zip(results) {
        let profile = match result {
            Ok(profile) => profile,
            Err(e) => {
                eprintln!("{}: {}", path, e);
                continue;
            }
        };
        let confidence = compute_confidence(&profile);

        if json {
            let line = serde_json::json!({
                "file": path,
                "duration_secs": profile.duration_secs,
                "tempo_bpm": profile.tempo_bpm,
                "tempo_confidence": profile.tempo_confidence,
                "key": profile.key.name(),
                "key_numerical": profile.key.numerical(),
                "key_confidence": profile.key_confidence,
                "complexity": profile.complexity,
                "onsets": profile.onset_times.len(),
                "confidence": confidence,
            });
            println!("{}", line);
            continue;
        }

        let voiced = profile.melody.iter().filter(|p| p.is_some()).count();
        println!("{}", path);
        println!(
            "  Tempo: {:.2} BPM (confidence {:.2})",
            profile.tempo_bpm, profile.tempo_confidence
        );
        println!(
            "  Key: {} / {} (confidence {:.2}, clarity {:.2})",
            profile.key.name(),
            profile.key.numerical(),
            profile.key_confidence,
            profile.key_clarity
        );
        println!(
            "  Complexity: {:.2} (harmonic {:.2}, rhythmic {:.2})",
            profile.complexity.combined, profile.complexity.harmonic, profile.complexity.rhythmic
        );
        println!(
            "  Onsets: {}, voiced frames: {}/{}",
            profile.onset_times.len(),
            voiced,
            profile.melody.len()
        );
        println!(
            "  Overall confidence: {:.2} ({:?})",
            confidence.overall_confidence, confidence.warnings
        );
    }

    Ok(())
}

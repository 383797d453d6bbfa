//! Example: Build a mashup from WAV files
//!
//! Usage:
//!   cargo run --release --example mashup_wav -- [--standard] [--json] [--out mashup.wav] <a.wav[:weight]> <b.wav[:weight]> [c.wav[:weight]]
//!
//! Notes:
//! - Weights are relative (default 1.0); `song.wav:0.5` halves a track's share.
//! - The output is 32-bit float stereo at the first track's sample rate.

use std::env;

use stratum_mashup::{create_mashup, AudioBuffer, MashupConfig, Track};

/// Load a WAV file as planar f32
fn load_wav(path: &str) -> Result<AudioBuffer, Box<dyn std::error::Error>> {
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

/// `path[:weight]`
fn parse_track(arg: &str) -> Result<Track, Box<dyn std::error::Error>> {
    let (path, weight) = match arg.rsplit_once(':') {
        Some((path, w)) if w.parse::<f32>().is_ok() => (path, w.parse::<f32>()?),
        _ => (arg, 1.0),
    };
    Ok(Track::new(path, load_wav(path)?).with_weight(weight))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut args = env::args().skip(1);
    let mut config = MashupConfig::default();
    let mut json = false;
    let mut out_path = String::from("mashup.wav");
    let mut track_args: Vec<String> = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--standard" => config = MashupConfig::standard(),
            "--json" => json = true,
            "--out" => out_path = args.next().ok_or("--out needs a path")?,
            _ => track_args.push(arg),
        }
    }

    if track_args.len() < 2 || track_args.len() > 3 {
        eprintln!(
            "Usage: mashup_wav [--standard] [--json] [--out mashup.wav] <a.wav[:weight]> <b.wav[:weight]> [c.wav[:weight]]"
        );
        std::process::exit(2);
    }

    let tracks = track_args
        .iter()
        .map(|a| parse_track(a))
        .collect::<Result<Vec<_>, _>>()?;

    let result = create_mashup(&tracks, &config)?;

    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: result.sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(&out_path, spec)?;
    for &sample in &result.samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result.report)?);
        return Ok(());
    }

    let report = &result.report;
    println!("Mashup written to {}", out_path);
    println!(
        "  Reference: {:.2} BPM, key {}",
        report.reference_tempo_bpm, report.reference_key
    );
    println!(
        "  Duration: {:.2}s at {} Hz ({:.0} ms)",
        result.duration_secs(),
        result.sample_rate,
        report.processing_time_ms
    );
    for (i, track) in report.tracks.iter().enumerate() {
        println!(
            "  [{}] {}: {:.2} BPM, {} ({}), stretch {:.3}, shift {:+}, delay {:.3}s, {:?}",
            i,
            track.source_id,
            track.tempo_bpm,
            track.key,
            track.key_numerical,
            track.stretch_ratio,
            track.pitch_shift_semitones,
            track.grid_delay_secs,
            track.separation_method
        );
    }
    for flag in &report.flags {
        match flag.track {
            Some(i) => println!("  flag {:?} (track {}): {}", flag.kind, i, flag.message),
            None => println!("  flag {:?}: {}", flag.kind, flag.message),
        }
    }

    Ok(())
}

//! Emotion Inference CLI
//!
//! A standalone tool to run the inference pipeline on media files without
//! the full service layer.
//!
//! Usage:
//!   cargo run --bin emotion_cli -- [--image <path>] [--audio <path>] [--weights <dir>] [--patterns]
//!
//! Examples:
//!   cargo run --bin emotion_cli -- --image subject.png
//!   cargo run --bin emotion_cli -- --image subject.png --audio clip.wav
//!   cargo run --bin emotion_cli -- --audio clip.wav --patterns

use anyhow::{bail, Context, Result};
use std::env;
use std::fs;
use std::path::PathBuf;

use sentia::config::EngineConfig;
use sentia::engine::EmotionEngine;

struct Args {
    image: Option<PathBuf>,
    audio: Option<PathBuf>,
    weights: Option<PathBuf>,
    patterns: bool,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        image: None,
        audio: None,
        weights: None,
        patterns: false,
    };

    let mut iter = env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--image" => {
                args.image = Some(PathBuf::from(
                    iter.next().context("--image requires a path")?,
                ));
            }
            "--audio" => {
                args.audio = Some(PathBuf::from(
                    iter.next().context("--audio requires a path")?,
                ));
            }
            "--weights" => {
                args.weights = Some(PathBuf::from(
                    iter.next().context("--weights requires a directory")?,
                ));
            }
            "--patterns" => args.patterns = true,
            other => bail!("unknown argument: {}", other),
        }
    }

    Ok(args)
}

fn usage(program: &str) {
    eprintln!("Emotion Inference CLI");
    eprintln!();
    eprintln!(
        "Usage: {} [--image <path>] [--audio <path>] [--weights <dir>] [--patterns]",
        program
    );
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --image <path>    Still image (PNG/JPEG) of the subject");
    eprintln!("  --audio <path>    Audio clip (WAV) of the subject");
    eprintln!("  --weights <dir>   Classifier weight directory (default: ~/.sentia/weights)");
    eprintln!("  --patterns        Also print speech-pattern indicators (needs --audio)");
    eprintln!();
    eprintln!("At least one of --image or --audio is required.");
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = parse_args()?;
    if args.image.is_none() && args.audio.is_none() {
        let program = env::args().next().unwrap_or_else(|| "emotion_cli".to_string());
        usage(&program);
        std::process::exit(1);
    }

    let mut config = EngineConfig::load_or_default();
    if args.weights.is_some() {
        config.weights_dir = args.weights.clone();
    }

    let engine = EmotionEngine::new(config);

    let health = engine.health_status();
    if !health.ready {
        eprintln!(
            "warning: engine not ready: {}",
            serde_json::to_string(&health)?
        );
    } else if health.degraded {
        eprintln!("warning: one or more classifiers are serving untrained weights");
    }

    let image_bytes = args
        .image
        .as_ref()
        .map(|p| fs::read(p).with_context(|| format!("failed to read {}", p.display())))
        .transpose()?;
    let audio_bytes = args
        .audio
        .as_ref()
        .map(|p| fs::read(p).with_context(|| format!("failed to read {}", p.display())))
        .transpose()?;

    let verdict = engine.detect_emotion(
        image_bytes.as_deref(),
        audio_bytes.as_deref(),
        "cli",
    )?;
    println!("{}", serde_json::to_string_pretty(&verdict)?);

    if args.patterns {
        match audio_bytes.as_deref() {
            Some(audio) => {
                let patterns = engine.speech_patterns(audio)?;
                println!("{}", serde_json::to_string_pretty(&patterns)?);
            }
            None => bail!("--patterns requires --audio"),
        }
    }

    Ok(())
}

//! rrb_analyze - run detection on one local video and print the JSON result

use anyhow::{anyhow, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use rrb_detect::{InferenceEngine, ServiceConfig};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Backend {
    /// Trained ONNX models (requires the backend-tract feature).
    Tract,
    /// Deterministic heuristics, for demos and smoke tests.
    Stub,
}

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Video file, or a synthetic `stub://` source.
    video: PathBuf,
    /// Include per-joint pose analysis.
    #[arg(long)]
    enhanced: bool,
    #[arg(long, value_enum, default_value_t = Backend::Tract)]
    backend: Backend,
    /// Override the minimum detection duration (seconds).
    #[arg(long)]
    min_duration: Option<f64>,
    /// Override the per-sequence confidence threshold.
    #[arg(long)]
    threshold: Option<f32>,
    /// Compact single-line output.
    #[arg(long)]
    compact: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let mut config = ServiceConfig::load()?;
    if let Some(min_duration) = args.min_duration {
        config.detector.min_detection_duration = min_duration;
    }
    if let Some(threshold) = args.threshold {
        config.detector.confidence_threshold = threshold;
    }
    config.detector.validate()?;

    let engine = match args.backend {
        Backend::Tract => InferenceEngine::load(&config)?,
        Backend::Stub => InferenceEngine::stub(config.detector.clone())?,
    };

    let raw = args.video.to_string_lossy();
    if !raw.starts_with("stub://") && !args.video.is_file() {
        return Err(anyhow!("video {} does not exist", args.video.display()));
    }

    let output = if args.enhanced {
        serde_json::to_value(engine.detect_with_pose_analysis(&args.video)?)?
    } else {
        serde_json::to_value(engine.detect(&args.video)?)?
    };
    let text = if args.compact {
        serde_json::to_string(&output)?
    } else {
        serde_json::to_string_pretty(&output)?
    };
    println!("{}", text);
    Ok(())
}

use anyhow::Result;
use std::path::Path;

use rrb_detect::{DetectorConfig, InferenceEngine};

fn engine() -> Result<InferenceEngine> {
    InferenceEngine::stub(DetectorConfig::default())
}

#[test]
fn sustained_flapping_is_reported_as_one_segment() -> Result<()> {
    let result = engine()?.detect(Path::new("stub://flap?frames=300&fps=30&freq=2"))?;

    assert!(result.detected);
    assert_eq!(result.primary_behavior, "hand_flapping");
    assert!((result.confidence - 0.9).abs() < 1e-6);
    assert_eq!(result.total_sequences_analyzed, 10);
    assert_eq!(result.sequences_with_detections, 10);
    assert_eq!(result.video_info.frame_count, 300);
    assert_eq!(result.video_info.fps, 30.0);

    let summary = &result.behaviors["hand_flapping"];
    assert_eq!(summary.count, 10);
    assert_eq!(summary.occurrences, 1);
    assert!((summary.total_duration - 10.0).abs() < 1e-9);
    assert_eq!(summary.segments.len(), 1);
    assert_eq!(summary.segments[0].start_sequence, 0);
    assert_eq!(summary.segments[0].end_sequence, 9);
    assert_eq!(result.behaviors.len(), 1);
    Ok(())
}

#[test]
fn one_second_burst_is_below_minimum_duration() -> Result<()> {
    // 45 frames: one full window, the trailing 15 frames are dropped.
    let result = engine()?.detect(Path::new("stub://burst?frames=45&fps=30&freq=2"))?;

    assert!(!result.detected);
    assert_eq!(result.primary_behavior, "normal");
    assert!(result.behaviors.is_empty());
    assert_eq!(result.total_sequences_analyzed, 1);
    assert_eq!(result.sequences_with_detections, 1);
    assert_eq!(result.confidence, 0.0);
    assert!((result.video_info.duration - 1.5).abs() < 1e-9);
    Ok(())
}

#[test]
fn still_video_is_confidently_normal() -> Result<()> {
    let result = engine()?.detect(Path::new("stub://still?frames=120&fps=30"))?;

    assert!(!result.detected);
    assert_eq!(result.primary_behavior, "normal");
    assert!((result.confidence - 0.95).abs() < 1e-6);
    assert_eq!(result.total_sequences_analyzed, 4);
    assert_eq!(result.sequences_with_detections, 0);
    Ok(())
}

#[test]
fn frames_without_a_person_still_form_windows() -> Result<()> {
    let result = engine()?.detect(Path::new("stub://empty?frames=90&fps=30&dropout=1"))?;

    assert!(!result.detected);
    assert_eq!(result.total_sequences_analyzed, 3);
    assert!((result.confidence - 0.5).abs() < 1e-6);
    Ok(())
}

#[test]
fn video_shorter_than_a_window_yields_empty_result() -> Result<()> {
    let result = engine()?.detect(Path::new("stub://short?frames=20&fps=30&freq=2"))?;

    assert!(!result.detected);
    assert_eq!(result.total_sequences_analyzed, 0);
    assert_eq!(result.confidence, 0.0);
    assert_eq!(result.video_info.frame_count, 20);
    Ok(())
}

#[test]
fn unreadable_video_yields_empty_result_with_default_fps() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("broken.mp4");
    std::fs::write(&path, b"this is not a video")?;

    let result = engine()?.detect(&path)?;
    assert!(!result.detected);
    assert_eq!(result.primary_behavior, "normal");
    assert_eq!(result.total_sequences_analyzed, 0);
    assert_eq!(result.video_info.fps, 30.0);
    assert_eq!(result.video_info.frame_count, 0);
    assert_eq!(result.video_info.duration, 0.0);

    let missing = engine()?.detect(&dir.path().join("missing.mp4"))?;
    assert_eq!(missing.total_sequences_analyzed, 0);
    Ok(())
}

#[test]
fn longer_minimum_duration_suppresses_short_runs() -> Result<()> {
    let cfg = DetectorConfig {
        min_detection_duration: 12.0,
        ..DetectorConfig::default()
    };
    let engine = InferenceEngine::stub(cfg)?;
    let result = engine.detect(Path::new("stub://flap?frames=300&fps=30&freq=2"))?;
    assert!(!result.detected);
    assert_eq!(result.sequences_with_detections, 10);
    Ok(())
}

#[test]
fn frame_rate_scales_durations() -> Result<()> {
    // 15 fps: each 30-frame window covers two seconds.
    let result = engine()?.detect(Path::new("stub://flap?frames=60&fps=15&freq=1"))?;
    assert!(result.detected);
    let summary = &result.behaviors["hand_flapping"];
    assert!((summary.total_duration - 4.0).abs() < 1e-9);
    assert!((summary.segments[0].end_time - 4.0).abs() < 1e-9);
    Ok(())
}

#[test]
fn repeated_runs_are_identical() -> Result<()> {
    let engine = engine()?;
    let path = Path::new("stub://flap?frames=150&fps=30&freq=2&dropout=7");
    let first = engine.detect(path)?;
    let second = engine.detect(path)?;
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn enhanced_detection_adds_pose_analysis() -> Result<()> {
    let engine = engine()?;
    let path = Path::new("stub://flap?frames=300&fps=30&freq=2&dropout=10");
    let enhanced = engine.detect_with_pose_analysis(path)?;
    assert_eq!(enhanced.result, engine.detect(path)?);

    let pose = &enhanced.pose_analysis;
    assert_eq!(pose.frames_total, 300);
    assert_eq!(pose.frames_with_pose, 270);
    assert!((pose.detection_rate - 0.9).abs() < 1e-6);
    let wrist = &pose.joints["left_wrist"];
    assert!(wrist.range_y > 0.2);
    assert!((wrist.dominant_frequency - 2.0).abs() < 0.25);
    assert_eq!(pose.joints["nose"].range_y, 0.0);

    let value = serde_json::to_value(&enhanced)?;
    assert!(value.get("pose_analysis").is_some());
    assert_eq!(value["primary_behavior"], "hand_flapping");
    Ok(())
}

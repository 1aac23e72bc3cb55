//! Video-level detection results.
//!
//! These are created once per request and serialized straight into the
//! response; nothing here is persisted.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::analysis::PoseAnalysis;

/// One validated run of a behavior, in video time.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DetectionSegment {
    /// Seconds from the start of the video.
    pub start_time: f64,
    pub end_time: f64,
    /// First and last window index of the run (inclusive).
    pub start_sequence: usize,
    pub end_sequence: usize,
    /// Highest per-window confidence inside the run.
    pub confidence: f32,
}

/// Aggregate evidence for one behavior across the whole video.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BehaviorSummary {
    /// Windows inside validated runs of this behavior.
    pub count: usize,
    /// Seconds covered by validated runs.
    pub total_duration: f64,
    /// Highest per-window confidence in validated runs.
    pub confidence: f32,
    pub mean_confidence: f32,
    /// Number of validated runs.
    pub occurrences: usize,
    pub segments: Vec<DetectionSegment>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct VideoInfo {
    /// Seconds, from the frame count and frame rate.
    pub duration: f64,
    pub fps: f64,
    pub frame_count: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct VideoResult {
    pub detected: bool,
    pub primary_behavior: String,
    pub confidence: f32,
    pub behaviors: BTreeMap<String, BehaviorSummary>,
    pub video_info: VideoInfo,
    pub total_sequences_analyzed: usize,
    pub sequences_with_detections: usize,
}

/// Detection result plus descriptive pose statistics.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EnhancedVideoResult {
    #[serde(flatten)]
    pub result: VideoResult,
    pub pose_analysis: PoseAnalysis,
}

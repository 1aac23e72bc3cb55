//! Temporal aggregation of per-window predictions.
//!
//! Consecutive windows with the same non-normal label at or above the
//! confidence threshold form a run. A run only counts once it lasts at least
//! `min_detection_duration` seconds, which keeps a single noisy window from
//! turning into a video-level detection.

use std::collections::BTreeMap;

use crate::classify::SequencePrediction;
use crate::config::DetectorConfig;
use crate::result::{BehaviorSummary, DetectionSegment, VideoInfo, VideoResult};

/// Float slack for duration comparisons.
const DURATION_EPSILON: f64 = 1e-9;

/// Outcome of classifying one window.
#[derive(Clone, Debug, PartialEq)]
pub enum WindowOutcome {
    Classified(SequencePrediction),
    /// The classifier failed on this window; it breaks any open run.
    Failed { window_index: usize },
}

impl WindowOutcome {
    pub fn window_index(&self) -> usize {
        match self {
            WindowOutcome::Classified(p) => p.window_index(),
            WindowOutcome::Failed { window_index } => *window_index,
        }
    }
}

/// Maximal span of same-label, above-threshold windows.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionRun {
    pub label: String,
    pub start_index: usize,
    pub end_index: usize,
    pub confidences: Vec<f32>,
    /// `sequence_count * sequence_length / fps`, in seconds.
    pub duration: f64,
    pub validated: bool,
}

impl DetectionRun {
    pub fn sequence_count(&self) -> usize {
        self.confidences.len()
    }

    pub fn max_confidence(&self) -> f32 {
        self.confidences.iter().cloned().fold(0.0, f32::max)
    }
}

struct OpenRun {
    label: String,
    start_index: usize,
    end_index: usize,
    confidences: Vec<f32>,
}

pub struct TemporalAggregator {
    sequence_length: usize,
    fps: f64,
    confidence_threshold: f32,
    min_detection_duration: f64,
    normal_label: String,
}

impl TemporalAggregator {
    /// `fps` must be the sanitized frame rate of the video; non-positive
    /// values fall back to the configured default.
    pub fn new(cfg: &DetectorConfig, fps: f64) -> Self {
        let fps = if fps.is_finite() && fps > 0.0 {
            fps
        } else {
            cfg.default_fps
        };
        Self {
            sequence_length: cfg.sequence_length,
            fps,
            confidence_threshold: cfg.confidence_threshold,
            min_detection_duration: cfg.min_detection_duration,
            normal_label: cfg.normal_label.clone(),
        }
    }

    /// Seconds of video covered by `count` windows.
    pub fn windows_to_seconds(&self, count: usize) -> f64 {
        count as f64 * self.sequence_length as f64 / self.fps
    }

    fn is_positive(&self, prediction: &SequencePrediction) -> bool {
        prediction.label() != self.normal_label
            && prediction.confidence() >= self.confidence_threshold
    }

    fn close(&self, open: &mut Option<OpenRun>, runs: &mut Vec<DetectionRun>) {
        let Some(run) = open.take() else {
            return;
        };
        let duration = self.windows_to_seconds(run.confidences.len());
        let validated = duration + DURATION_EPSILON >= self.min_detection_duration;
        if !validated {
            log::debug!(
                "discarding {} run at windows {}..={} ({:.2}s < {:.2}s)",
                run.label,
                run.start_index,
                run.end_index,
                duration,
                self.min_detection_duration
            );
        }
        runs.push(DetectionRun {
            label: run.label,
            start_index: run.start_index,
            end_index: run.end_index,
            confidences: run.confidences,
            duration,
            validated,
        });
    }

    /// Group outcomes into runs, validated or not, in window order.
    pub fn runs(&self, outcomes: &[WindowOutcome]) -> Vec<DetectionRun> {
        let mut runs = Vec::new();
        let mut open: Option<OpenRun> = None;
        for outcome in outcomes {
            let prediction = match outcome {
                WindowOutcome::Classified(p) => p,
                WindowOutcome::Failed { .. } => {
                    self.close(&mut open, &mut runs);
                    continue;
                }
            };
            if !self.is_positive(prediction) {
                self.close(&mut open, &mut runs);
                continue;
            }
            let extends = open.as_ref().is_some_and(|run| {
                run.label == prediction.label() && run.end_index + 1 == prediction.window_index()
            });
            if extends {
                if let Some(run) = open.as_mut() {
                    run.end_index = prediction.window_index();
                    run.confidences.push(prediction.confidence());
                }
            } else {
                self.close(&mut open, &mut runs);
                open = Some(OpenRun {
                    label: prediction.label().to_string(),
                    start_index: prediction.window_index(),
                    end_index: prediction.window_index(),
                    confidences: vec![prediction.confidence()],
                });
            }
        }
        self.close(&mut open, &mut runs);
        runs
    }

    /// Reduce per-window outcomes to the video-level verdict.
    pub fn aggregate(&self, outcomes: &[WindowOutcome], video_info: VideoInfo) -> VideoResult {
        let predictions: Vec<&SequencePrediction> = outcomes
            .iter()
            .filter_map(|o| match o {
                WindowOutcome::Classified(p) => Some(p),
                WindowOutcome::Failed { .. } => None,
            })
            .collect();
        let failed = outcomes.len() - predictions.len();
        if failed > 0 {
            log::warn!("{} of {} windows could not be classified", failed, outcomes.len());
        }
        let sequences_with_detections = predictions.iter().filter(|p| self.is_positive(p)).count();

        let validated: Vec<DetectionRun> = self
            .runs(outcomes)
            .into_iter()
            .filter(|run| run.validated)
            .collect();

        let mut behaviors: BTreeMap<String, BehaviorSummary> = BTreeMap::new();
        let mut first_start: BTreeMap<String, usize> = BTreeMap::new();
        for run in &validated {
            first_start
                .entry(run.label.clone())
                .or_insert(run.start_index);
            let summary = behaviors
                .entry(run.label.clone())
                .or_insert_with(|| BehaviorSummary {
                    count: 0,
                    total_duration: 0.0,
                    confidence: 0.0,
                    mean_confidence: 0.0,
                    occurrences: 0,
                    segments: Vec::new(),
                });
            summary.count += run.sequence_count();
            summary.total_duration += run.duration;
            summary.confidence = summary.confidence.max(run.max_confidence());
            // Holds the running sum until the pass below divides it.
            summary.mean_confidence += run.confidences.iter().sum::<f32>();
            summary.occurrences += 1;
            summary.segments.push(DetectionSegment {
                start_time: self.windows_to_seconds(run.start_index),
                end_time: self.windows_to_seconds(run.end_index + 1),
                start_sequence: run.start_index,
                end_sequence: run.end_index,
                confidence: run.max_confidence(),
            });
        }
        for summary in behaviors.values_mut() {
            summary.mean_confidence /= summary.count as f32;
        }

        let primary = behaviors
            .iter()
            .map(|(label, summary)| (label, summary, first_start[label]))
            .fold(None, |best: Option<(&String, &BehaviorSummary, usize)>, candidate| {
                match best {
                    None => Some(candidate),
                    Some(current) => {
                        let diff = candidate.1.total_duration - current.1.total_duration;
                        let longer = diff > DURATION_EPSILON;
                        let tied_earlier = diff.abs() <= DURATION_EPSILON && candidate.2 < current.2;
                        if longer || tied_earlier {
                            Some(candidate)
                        } else {
                            Some(current)
                        }
                    }
                }
            });

        let (detected, primary_behavior, confidence) = match primary {
            Some((label, summary, _)) => (true, label.clone(), summary.confidence),
            None => {
                let normal: Vec<f32> = predictions
                    .iter()
                    .filter(|p| p.label() == self.normal_label)
                    .map(|p| p.confidence())
                    .collect();
                let confidence = if normal.is_empty() {
                    0.0
                } else {
                    normal.iter().sum::<f32>() / normal.len() as f32
                };
                (false, self.normal_label.clone(), confidence)
            }
        };

        log::info!(
            "aggregated {} windows: detected={} primary={} confidence={:.3} ({} validated runs)",
            predictions.len(),
            detected,
            primary_behavior,
            confidence,
            validated.len()
        );

        VideoResult {
            detected,
            primary_behavior,
            confidence,
            behaviors,
            video_info,
            total_sequences_analyzed: predictions.len(),
            sequences_with_detections,
        }
    }
}

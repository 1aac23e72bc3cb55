//! Descriptive motion statistics from the raw landmark stream.
//!
//! This runs beside the classifier and never influences the verdict. Frames
//! without a pose (the zero-filled placeholders) and joints below the
//! visibility floor contribute no samples: treating them as real positions
//! would fake large jumps to the origin and back.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::landmarks::{KeyJoint, LandmarkVector};

/// Joints below this visibility are ignored for that frame.
pub const MIN_JOINT_VISIBILITY: f32 = 0.5;

/// Motion summary for one joint.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct JointMotion {
    pub samples: usize,
    pub mean_x: f32,
    pub mean_y: f32,
    pub std_x: f32,
    pub std_y: f32,
    /// Max minus min position: the movement amplitude.
    pub range_x: f32,
    pub range_y: f32,
    /// Normalized units per second, over consecutive frames with a sample.
    pub mean_speed: f32,
    /// Vertical oscillation frequency in Hz.
    pub dominant_frequency: f32,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PoseAnalysis {
    pub frames_total: u64,
    pub frames_with_pose: u64,
    pub detection_rate: f32,
    pub joints: BTreeMap<String, JointMotion>,
    /// Joint with the largest vertical spread, if any joint had samples.
    pub most_active_joint: Option<String>,
}

struct JointSeries {
    frames: Vec<u64>,
    xs: Vec<f32>,
    ys: Vec<f32>,
}

/// Incremental reporter: feed every frame's vector in order, then `finish`.
pub struct PoseAnalysisReporter {
    fps: f64,
    frames_total: u64,
    frames_with_pose: u64,
    series: BTreeMap<KeyJoint, JointSeries>,
}

impl PoseAnalysisReporter {
    pub fn new(fps: f64) -> Self {
        let series = KeyJoint::ALL
            .iter()
            .map(|joint| {
                (
                    *joint,
                    JointSeries {
                        frames: Vec::new(),
                        xs: Vec::new(),
                        ys: Vec::new(),
                    },
                )
            })
            .collect();
        Self {
            fps,
            frames_total: 0,
            frames_with_pose: 0,
            series,
        }
    }

    pub fn observe(&mut self, vector: &LandmarkVector) {
        let frame = self.frames_total;
        self.frames_total += 1;
        if vector.is_zero() {
            return;
        }
        self.frames_with_pose += 1;
        for (joint, series) in self.series.iter_mut() {
            let [x, y, _z, visibility] = vector.joint(*joint);
            if visibility < MIN_JOINT_VISIBILITY {
                continue;
            }
            series.frames.push(frame);
            series.xs.push(x);
            series.ys.push(y);
        }
    }

    pub fn finish(self) -> PoseAnalysis {
        let fps = self.fps;
        let joints: BTreeMap<String, JointMotion> = self
            .series
            .iter()
            .map(|(joint, series)| (joint.name().to_string(), joint_motion(series, fps)))
            .collect();
        let most_active_joint = joints
            .iter()
            .filter(|(_, m)| m.samples >= 2)
            .max_by(|a, b| a.1.std_y.total_cmp(&b.1.std_y))
            .map(|(name, _)| name.clone());
        let detection_rate = if self.frames_total == 0 {
            0.0
        } else {
            self.frames_with_pose as f32 / self.frames_total as f32
        };
        PoseAnalysis {
            frames_total: self.frames_total,
            frames_with_pose: self.frames_with_pose,
            detection_rate,
            joints,
            most_active_joint,
        }
    }

    /// One-shot analysis of a complete stream.
    pub fn analyze(vectors: &[LandmarkVector], fps: f64) -> PoseAnalysis {
        let mut reporter = Self::new(fps);
        for vector in vectors {
            reporter.observe(vector);
        }
        reporter.finish()
    }
}

fn joint_motion(series: &JointSeries, fps: f64) -> JointMotion {
    let samples = series.xs.len();
    if samples < 2 {
        return JointMotion {
            samples,
            ..JointMotion::default()
        };
    }
    let (mean_x, std_x, range_x) = moments(&series.xs);
    let (mean_y, std_y, range_y) = moments(&series.ys);

    let mut distance = 0.0f32;
    let mut steps = 0usize;
    for i in 1..samples {
        if series.frames[i] == series.frames[i - 1] + 1 {
            let dx = series.xs[i] - series.xs[i - 1];
            let dy = series.ys[i] - series.ys[i - 1];
            distance += (dx * dx + dy * dy).sqrt();
            steps += 1;
        }
    }
    let mean_speed = if steps == 0 || fps <= 0.0 {
        0.0
    } else {
        distance / steps as f32 * fps as f32
    };

    JointMotion {
        samples,
        mean_x,
        mean_y,
        std_x,
        std_y,
        range_x,
        range_y,
        mean_speed,
        dominant_frequency: oscillation_frequency(series, mean_y, std_y, fps),
    }
}

/// Mean, population standard deviation and range.
fn moments(values: &[f32]) -> (f32, f32, f32) {
    let n = values.len() as f32;
    let mean = values.iter().sum::<f32>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n;
    let min = values.iter().cloned().fold(f32::INFINITY, f32::min);
    let max = values.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    (mean, var.sqrt(), max - min)
}

/// Mean crossings with a small hysteresis band, halved per cycle.
fn oscillation_frequency(series: &JointSeries, mean: f32, std: f32, fps: f64) -> f32 {
    if std < 1e-6 || fps <= 0.0 {
        return 0.0;
    }
    let (Some(first), Some(last)) = (series.frames.first(), series.frames.last()) else {
        return 0.0;
    };
    let span_secs = (last - first) as f64 / fps;
    if span_secs <= 0.0 {
        return 0.0;
    }
    let band = 0.1 * std;
    let mut side: Option<bool> = None;
    let mut crossings = 0u32;
    for y in &series.ys {
        let d = y - mean;
        let above = if d > band {
            true
        } else if d < -band {
            false
        } else {
            continue;
        };
        if side.is_some_and(|prev| prev != above) {
            crossings += 1;
        }
        side = Some(above);
    }
    (crossings as f64 / 2.0 / span_secs) as f32
}

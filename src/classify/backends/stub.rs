use anyhow::Result;

use crate::classify::classifier::BehaviorClassifier;
use crate::landmarks::KeyJoint;
use crate::pipeline::Sequence;

/// Wrist vertical standard deviation above which a window counts as flapping.
const FLAPPING_WRIST_STD: f32 = 0.03;

/// Head vertical standard deviation above which a window counts as nodding.
const NODDING_NOSE_STD: f32 = 0.02;

/// Minimum fraction of frames with a pose for a confident "normal".
const MIN_COVERAGE: f32 = 0.5;

const CLASSES: [&str; 6] = [
    "atypical_hand_movements",
    "hand_flapping",
    "head_banging",
    "head_nodding",
    "normal",
    "spinning",
];

/// Heuristic classifier for tests and demos.
///
/// Scores windows from joint motion alone: oscillating wrists read as
/// `hand_flapping`, an oscillating head as `head_nodding`, anything else as
/// `normal`. Windows with little pose coverage get a low-confidence `normal`.
pub struct StubClassifier {
    classes: Vec<String>,
}

impl StubClassifier {
    pub fn new() -> Self {
        Self {
            classes: CLASSES.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn distribution(&self, winner: &str, confidence: f32) -> Vec<f32> {
        let rest = (1.0 - confidence) / (self.classes.len() - 1) as f32;
        self.classes
            .iter()
            .map(|c| if c == winner { confidence } else { rest })
            .collect()
    }
}

impl Default for StubClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl BehaviorClassifier for StubClassifier {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn predict(&mut self, sequence: &Sequence) -> Result<Vec<f32>> {
        if sequence.pose_coverage() < MIN_COVERAGE {
            return Ok(self.distribution("normal", 0.5));
        }
        let wrist_std = vertical_std(sequence, &[KeyJoint::LeftWrist, KeyJoint::RightWrist]);
        let nose_std = vertical_std(sequence, &[KeyJoint::Nose]);
        let scores = if wrist_std >= FLAPPING_WRIST_STD {
            self.distribution("hand_flapping", 0.9)
        } else if nose_std >= NODDING_NOSE_STD {
            self.distribution("head_nodding", 0.85)
        } else {
            self.distribution("normal", 0.95)
        };
        Ok(scores)
    }
}

/// Standard deviation of the mean y of `joints` over frames with a pose.
fn vertical_std(sequence: &Sequence, joints: &[KeyJoint]) -> f32 {
    let ys: Vec<f32> = sequence
        .frames()
        .iter()
        .filter(|v| !v.is_zero())
        .map(|v| joints.iter().map(|j| v.joint(*j)[1]).sum::<f32>() / joints.len() as f32)
        .collect();
    if ys.len() < 2 {
        return 0.0;
    }
    let mean = ys.iter().sum::<f32>() / ys.len() as f32;
    let var = ys.iter().map(|y| (y - mean).powi(2)).sum::<f32>() / ys.len() as f32;
    var.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classifier::classify;
    use crate::landmarks::{LandmarkVector, LANDMARK_VECTOR_LEN};

    fn pose_with_wrist_y(y: f32) -> LandmarkVector {
        let mut values = vec![0.5f32; LANDMARK_VECTOR_LEN];
        for joint in [KeyJoint::LeftWrist, KeyJoint::RightWrist] {
            values[joint.index() * 4 + 1] = y;
        }
        LandmarkVector::from_slice(&values).unwrap()
    }

    #[test]
    fn oscillating_wrists_read_as_flapping() {
        let frames = (0..10)
            .map(|i| pose_with_wrist_y(if i % 2 == 0 { 0.4 } else { 0.7 }))
            .collect();
        let seq = Sequence::new(0, frames, 10).unwrap();
        let p = classify(&mut StubClassifier::new(), &seq).unwrap();
        assert_eq!(p.label(), "hand_flapping");
        assert!((p.confidence() - 0.9).abs() < 1e-6);
    }

    #[test]
    fn still_pose_reads_as_normal() {
        let frames = (0..10).map(|_| pose_with_wrist_y(0.6)).collect();
        let seq = Sequence::new(0, frames, 10).unwrap();
        let p = classify(&mut StubClassifier::new(), &seq).unwrap();
        assert_eq!(p.label(), "normal");
        assert!(p.confidence() > 0.9);
    }

    #[test]
    fn missing_pose_reads_as_uncertain_normal() {
        let frames = (0..10).map(|_| LandmarkVector::zeros()).collect();
        let seq = Sequence::new(0, frames, 10).unwrap();
        let p = classify(&mut StubClassifier::new(), &seq).unwrap();
        assert_eq!(p.label(), "normal");
        assert!((p.confidence() - 0.5).abs() < 1e-6);
    }
}

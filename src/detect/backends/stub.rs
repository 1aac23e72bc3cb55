use anyhow::Result;

use crate::detect::backend::PoseBackend;
use crate::frame::Frame;
use crate::landmarks::{NUM_LANDMARKS, VALUES_PER_LANDMARK};

/// Frames darker than this are treated as containing no body.
const MIN_INTENSITY: f32 = 1.0;

/// Vertical wrist excursion for a full-scale brightness swing.
const WRIST_SWING: f32 = 0.15;

/// Deterministic pose backend for tests and demos.
///
/// Produces a standing figure whose wrists move with frame brightness: the
/// synthetic `stub://` videos oscillate brightness, which turns into an
/// oscillating wrist trajectory. Black frames yield no detection.
#[derive(Default)]
pub struct StubPoseBackend;

impl StubPoseBackend {
    pub fn new() -> Self {
        Self
    }
}

impl PoseBackend for StubPoseBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Option<Vec<f32>>> {
        let intensity = frame.mean_intensity();
        if intensity < MIN_INTENSITY {
            return Ok(None);
        }
        let swing = ((intensity - 128.0) / 80.0).clamp(-1.0, 1.0) * WRIST_SWING;

        let mut values = Vec::with_capacity(NUM_LANDMARKS * VALUES_PER_LANDMARK);
        for index in 0..NUM_LANDMARKS {
            let (x, mut y) = base_position(index);
            match index {
                13 | 14 => y += swing * 0.5,
                15..=22 => y += swing,
                _ => {}
            }
            values.extend_from_slice(&[x, y, 0.0, 0.95]);
        }
        Ok(Some(values))
    }
}

/// Resting position of each keypoint, normalized to the frame.
fn base_position(index: usize) -> (f32, f32) {
    let left = index % 2 == 1;
    let side = |l: f32, r: f32| if left { l } else { r };
    match index {
        0 => (0.5, 0.2),
        1..=10 => (0.5 + (index as f32 - 5.5) * 0.01, 0.19),
        11 | 12 => (side(0.4, 0.6), 0.35),
        13 | 14 => (side(0.35, 0.65), 0.5),
        15 | 16 => (side(0.33, 0.67), 0.62),
        17..=22 => (side(0.32, 0.68), 0.65),
        23 | 24 => (side(0.45, 0.55), 0.65),
        25 | 26 => (side(0.45, 0.55), 0.8),
        27 | 28 => (side(0.45, 0.55), 0.95),
        _ => (side(0.45, 0.55), 0.97),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{KeyJoint, LandmarkVector};

    fn uniform_frame(value: u8) -> Frame {
        Frame::new(0, 2, 2, vec![value; 12]).unwrap()
    }

    #[test]
    fn black_frame_has_no_pose() {
        let mut backend = StubPoseBackend::new();
        assert!(backend.detect(&uniform_frame(0)).unwrap().is_none());
    }

    #[test]
    fn brightness_moves_the_wrists() {
        let mut backend = StubPoseBackend::new();
        let low = backend.detect(&uniform_frame(48)).unwrap().unwrap();
        let high = backend.detect(&uniform_frame(208)).unwrap().unwrap();
        let low = LandmarkVector::from_slice(&low).unwrap();
        let high = LandmarkVector::from_slice(&high).unwrap();

        let dy = high.joint(KeyJoint::LeftWrist)[1] - low.joint(KeyJoint::LeftWrist)[1];
        assert!((dy - 2.0 * WRIST_SWING).abs() < 1e-4);
        assert_eq!(
            high.joint(KeyJoint::LeftShoulder),
            low.joint(KeyJoint::LeftShoulder)
        );
    }
}

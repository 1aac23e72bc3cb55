//! Pose landmark vectors.
//!
//! Every frame of a video maps to exactly one `LandmarkVector` of
//! `LANDMARK_VECTOR_LEN` values: 33 body keypoints, each as
//! `[x, y, z, visibility]`. A frame without a detected pose maps to the
//! all-zero vector so sequence lengths never depend on detection success.

use anyhow::{anyhow, Result};

/// Number of body keypoints produced by the pose estimator.
pub const NUM_LANDMARKS: usize = 33;

/// Values stored per keypoint: x, y, z, visibility.
pub const VALUES_PER_LANDMARK: usize = 4;

/// Total length of a landmark vector.
pub const LANDMARK_VECTOR_LEN: usize = NUM_LANDMARKS * VALUES_PER_LANDMARK;

/// Fixed-length pose description for one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct LandmarkVector {
    values: Box<[f32; LANDMARK_VECTOR_LEN]>,
}

impl LandmarkVector {
    /// The vector used for frames where no pose was detected.
    pub fn zeros() -> Self {
        Self {
            values: Box::new([0.0; LANDMARK_VECTOR_LEN]),
        }
    }

    /// Build a vector from exactly `LANDMARK_VECTOR_LEN` finite values.
    pub fn from_slice(values: &[f32]) -> Result<Self> {
        if values.len() != LANDMARK_VECTOR_LEN {
            return Err(anyhow!(
                "landmark vector must have {} values, got {}",
                LANDMARK_VECTOR_LEN,
                values.len()
            ));
        }
        if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
            return Err(anyhow!("landmark value at {} is not finite", pos));
        }
        let mut out = [0.0f32; LANDMARK_VECTOR_LEN];
        out.copy_from_slice(values);
        Ok(Self {
            values: Box::new(out),
        })
    }

    pub fn as_slice(&self) -> &[f32] {
        self.values.as_slice()
    }

    pub fn len(&self) -> usize {
        LANDMARK_VECTOR_LEN
    }

    /// True for the zero-filled placeholder of a failed detection.
    pub fn is_zero(&self) -> bool {
        self.values.iter().all(|v| *v == 0.0)
    }

    /// `[x, y, z, visibility]` of one keypoint.
    pub fn landmark(&self, index: usize) -> Option<[f32; VALUES_PER_LANDMARK]> {
        if index >= NUM_LANDMARKS {
            return None;
        }
        let start = index * VALUES_PER_LANDMARK;
        let mut out = [0.0f32; VALUES_PER_LANDMARK];
        out.copy_from_slice(&self.values[start..start + VALUES_PER_LANDMARK]);
        Some(out)
    }

    pub fn joint(&self, joint: KeyJoint) -> [f32; VALUES_PER_LANDMARK] {
        let start = joint.index() * VALUES_PER_LANDMARK;
        let mut out = [0.0f32; VALUES_PER_LANDMARK];
        out.copy_from_slice(&self.values[start..start + VALUES_PER_LANDMARK]);
        out
    }
}

impl Default for LandmarkVector {
    fn default() -> Self {
        Self::zeros()
    }
}

/// Keypoints that carry most of the signal for repetitive movements.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyJoint {
    Nose,
    LeftEye,
    RightEye,
    LeftEar,
    RightEar,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

impl KeyJoint {
    pub const ALL: [KeyJoint; 17] = [
        KeyJoint::Nose,
        KeyJoint::LeftEye,
        KeyJoint::RightEye,
        KeyJoint::LeftEar,
        KeyJoint::RightEar,
        KeyJoint::LeftShoulder,
        KeyJoint::RightShoulder,
        KeyJoint::LeftElbow,
        KeyJoint::RightElbow,
        KeyJoint::LeftWrist,
        KeyJoint::RightWrist,
        KeyJoint::LeftHip,
        KeyJoint::RightHip,
        KeyJoint::LeftKnee,
        KeyJoint::RightKnee,
        KeyJoint::LeftAnkle,
        KeyJoint::RightAnkle,
    ];

    /// Keypoint index in the 33-point body topology.
    pub fn index(self) -> usize {
        match self {
            KeyJoint::Nose => 0,
            KeyJoint::LeftEye => 2,
            KeyJoint::RightEye => 5,
            KeyJoint::LeftEar => 7,
            KeyJoint::RightEar => 8,
            KeyJoint::LeftShoulder => 11,
            KeyJoint::RightShoulder => 12,
            KeyJoint::LeftElbow => 13,
            KeyJoint::RightElbow => 14,
            KeyJoint::LeftWrist => 15,
            KeyJoint::RightWrist => 16,
            KeyJoint::LeftHip => 23,
            KeyJoint::RightHip => 24,
            KeyJoint::LeftKnee => 25,
            KeyJoint::RightKnee => 26,
            KeyJoint::LeftAnkle => 27,
            KeyJoint::RightAnkle => 28,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            KeyJoint::Nose => "nose",
            KeyJoint::LeftEye => "left_eye",
            KeyJoint::RightEye => "right_eye",
            KeyJoint::LeftEar => "left_ear",
            KeyJoint::RightEar => "right_ear",
            KeyJoint::LeftShoulder => "left_shoulder",
            KeyJoint::RightShoulder => "right_shoulder",
            KeyJoint::LeftElbow => "left_elbow",
            KeyJoint::RightElbow => "right_elbow",
            KeyJoint::LeftWrist => "left_wrist",
            KeyJoint::RightWrist => "right_wrist",
            KeyJoint::LeftHip => "left_hip",
            KeyJoint::RightHip => "right_hip",
            KeyJoint::LeftKnee => "left_knee",
            KeyJoint::RightKnee => "right_knee",
            KeyJoint::LeftAnkle => "left_ankle",
            KeyJoint::RightAnkle => "right_ankle",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_vector_has_full_length() {
        let v = LandmarkVector::zeros();
        assert_eq!(v.as_slice().len(), LANDMARK_VECTOR_LEN);
        assert_eq!(LANDMARK_VECTOR_LEN, 132);
        assert!(v.is_zero());
    }

    #[test]
    fn rejects_wrong_length_and_non_finite() {
        assert!(LandmarkVector::from_slice(&[0.5; 99]).is_err());
        let mut values = vec![0.5f32; LANDMARK_VECTOR_LEN];
        values[7] = f32::NAN;
        assert!(LandmarkVector::from_slice(&values).is_err());
    }

    #[test]
    fn joint_lookup_uses_body_topology() {
        let mut values = vec![0.0f32; LANDMARK_VECTOR_LEN];
        let base = KeyJoint::RightWrist.index() * VALUES_PER_LANDMARK;
        values[base..base + 4].copy_from_slice(&[0.1, 0.2, 0.3, 0.9]);
        let v = LandmarkVector::from_slice(&values).unwrap();
        assert_eq!(v.joint(KeyJoint::RightWrist), [0.1, 0.2, 0.3, 0.9]);
        assert_eq!(v.landmark(16), Some([0.1, 0.2, 0.3, 0.9]));
        assert_eq!(v.landmark(NUM_LANDMARKS), None);
        assert!(!v.is_zero());
    }

    #[test]
    fn key_joints_cover_face_and_limbs() {
        let names: Vec<&str> = KeyJoint::ALL.iter().map(|j| j.name()).collect();
        assert_eq!(names.len(), 17);
        for name in ["nose", "left_eye", "right_eye", "left_ear", "right_ankle"] {
            assert!(names.contains(&name), "missing {name}");
        }
    }
}

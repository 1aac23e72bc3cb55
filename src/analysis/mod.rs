//! Enrichment analyses that run beside the classifier.

mod pose_report;

pub use pose_report::{JointMotion, PoseAnalysis, PoseAnalysisReporter, MIN_JOINT_VISIBILITY};

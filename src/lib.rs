//! RRB Detect
//!
//! Detection of restricted/repetitive behaviors (hand flapping, head banging,
//! head nodding, spinning, atypical hand movements) in uploaded videos.
//!
//! # Pipeline
//!
//! 1. **Ingest**: decode frames from a local file (`FrameSource`).
//! 2. **Landmarks**: one 132-value pose vector per frame, zero-filled when no
//!    person is found (`LandmarkExtractor`).
//! 3. **Windowing**: consecutive, non-overlapping fixed-length sequences
//!    (`SequenceWindower`).
//! 4. **Classification**: one behavior distribution per sequence
//!    (`BehaviorClassifier`).
//! 5. **Aggregation**: confident same-label runs are validated against a
//!    minimum duration and summarized per behavior (`TemporalAggregator`).
//!
//! # Module Structure
//!
//! - `frame`, `landmarks`: per-frame data
//! - `ingest`: video decoding
//! - `detect`: pose backends and landmark extraction
//! - `pipeline`: windowing and temporal aggregation
//! - `classify`: sequence classifiers and label encoders
//! - `analysis`: descriptive pose statistics
//! - `engine`: the shared inference engine
//! - `api`: the HTTP service

pub mod analysis;
pub mod api;
pub mod classify;
pub mod config;
pub mod detect;
pub mod engine;
pub mod frame;
pub mod ingest;
pub mod landmarks;
pub mod pipeline;
pub mod result;

pub use analysis::{JointMotion, PoseAnalysis, PoseAnalysisReporter};
pub use api::{ApiError, ApiHandle, ApiServer};
pub use classify::{BehaviorClassifier, LabelEncoder, SequencePrediction, StubClassifier};
pub use config::{DetectorConfig, ServiceConfig};
pub use detect::{LandmarkExtractor, PoseBackend, StubPoseBackend};
pub use engine::{InferenceEngine, ModelInfo, SharedEngine};
pub use frame::Frame;
pub use ingest::{FileOpener, FrameSource, VideoDecoder, VideoOpener};
pub use landmarks::{KeyJoint, LandmarkVector, LANDMARK_VECTOR_LEN, NUM_LANDMARKS};
pub use pipeline::{Sequence, SequenceWindower, TemporalAggregator, WindowOutcome};
pub use result::{BehaviorSummary, DetectionSegment, EnhancedVideoResult, VideoInfo, VideoResult};

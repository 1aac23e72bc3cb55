//! Per-frame landmark extraction with failure isolation.
//!
//! A frame either produces a full `LandmarkVector` or nothing. Empty frames,
//! backend errors, missing poses and malformed backend output are all folded
//! into `None`, so one bad frame can never abort a video.

use crate::frame::Frame;
use crate::landmarks::{LandmarkVector, LANDMARK_VECTOR_LEN};

use super::backend::PoseBackend;

/// Counters for one extraction pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtractionStats {
    pub frames: u64,
    pub detected: u64,
    pub not_detected: u64,
    pub errors: u64,
}

pub struct LandmarkExtractor {
    backend: Box<dyn PoseBackend>,
    stats: ExtractionStats,
}

impl LandmarkExtractor {
    pub fn new(backend: Box<dyn PoseBackend>) -> Self {
        Self {
            backend,
            stats: ExtractionStats::default(),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn warm_up(&mut self) -> anyhow::Result<()> {
        self.backend.warm_up()
    }

    /// Extract landmarks, or `None` when the frame yields no usable pose.
    pub fn extract(&mut self, frame: &Frame) -> Option<LandmarkVector> {
        self.stats.frames += 1;
        if frame.is_empty() {
            log::warn!("empty frame at index {}", frame.index);
            self.stats.errors += 1;
            return None;
        }
        let values = match self.backend.detect(frame) {
            Ok(Some(values)) => values,
            Ok(None) => {
                self.stats.not_detected += 1;
                return None;
            }
            Err(err) => {
                log::warn!(
                    "error extracting landmarks from frame {}: {:#}",
                    frame.index,
                    err
                );
                self.stats.errors += 1;
                return None;
            }
        };
        match LandmarkVector::from_slice(&values) {
            Ok(vector) => {
                self.stats.detected += 1;
                Some(vector)
            }
            Err(err) => {
                log::warn!(
                    "{} backend returned unusable landmarks for frame {} ({} values, want {}): {}",
                    self.backend.name(),
                    frame.index,
                    values.len(),
                    LANDMARK_VECTOR_LEN,
                    err
                );
                self.stats.errors += 1;
                None
            }
        }
    }

    /// Extract landmarks, substituting the zero vector on any failure.
    pub fn extract_or_zero(&mut self, frame: &Frame) -> LandmarkVector {
        self.extract(frame).unwrap_or_else(LandmarkVector::zeros)
    }

    pub fn stats(&self) -> &ExtractionStats {
        &self.stats
    }

    /// Reset counters before a new video.
    pub fn reset_stats(&mut self) {
        self.stats = ExtractionStats::default();
    }
}

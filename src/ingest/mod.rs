//! Video ingestion.
//!
//! This module turns a video path into an ordered stream of decoded frames:
//! - Local video files (feature: ingest-file-ffmpeg)
//! - Synthetic `stub://` videos (testing)
//!
//! The ingestion layer is responsible for:
//! - Substituting a default frame rate when metadata is missing
//! - Tolerating bounded runs of decode failures
//! - Releasing the decode handle on every exit path
//!
//! The ingestion layer MUST NOT:
//! - Store decoded frames to disk
//! - Fetch remote URLs
//! - Log frame content

pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;
pub mod source;

pub use file::{FileOpener, SyntheticConfig, SyntheticVideo};
pub use source::{FrameSource, FrameSourceStats, VideoDecoder, VideoOpener};

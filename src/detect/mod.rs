mod backend;
mod backends;
mod extractor;

pub use backend::PoseBackend;
pub use backends::StubPoseBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractPoseBackend;
pub use extractor::{ExtractionStats, LandmarkExtractor};

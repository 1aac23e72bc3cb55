pub mod stub;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use stub::StubPoseBackend;

#[cfg(feature = "backend-tract")]
pub use tract::TractPoseBackend;

use anyhow::Result;

use crate::frame::Frame;

/// Pose-estimation backend.
///
/// # Audit Boundary
///
/// Implementations MUST:
/// - Treat the frame as read-only and ephemeral
/// - Not write frames to disk or send them over the network
/// - Return `Ok(None)` when no body is visible, not an all-zero vector
///
/// Errors are per-frame: the caller records them and moves on.
pub trait PoseBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Estimate body keypoints for one frame.
    ///
    /// Returns `x, y, z, visibility` for each of the 33 keypoints, flattened.
    fn detect(&mut self, frame: &Frame) -> Result<Option<Vec<f32>>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

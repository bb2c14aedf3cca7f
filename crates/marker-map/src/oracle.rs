//! External collaborators, as traits.
//!
//! The localization backend and the marker detector are both opaque to
//! this crate: one hands over a camera pose per frame, the other hands
//! over decoded ids with pixel corners. Any concrete backend is a
//! drop-in implementer.

use marker_map_core::WorldToCamera;

use crate::detection::Detection;

/// Borrowed grayscale frame handed to the external collaborators.
#[derive(Clone, Copy, Debug)]
pub struct FrameView<'a> {
    pub width: u32,
    pub height: u32,
    /// Row-major, `width * height` bytes. Scripted backends may pass an
    /// empty slice; the pipeline itself never reads pixels.
    pub data: &'a [u8],
}

/// Camera localization backend treated as an opaque pose source.
pub trait PoseOracle {
    /// Feed one frame and return the camera pose for it, or `None` while
    /// the backend is still initializing or has lost tracking.
    fn feed_frame(&mut self, frame: &FrameView<'_>, timestamp_s: f64) -> Option<WorldToCamera>;

    /// Last known pose without feeding a new frame.
    fn current_pose(&self) -> Option<WorldToCamera>;

    /// Discard all internal state.
    fn reset(&mut self);
}

/// Marker detector treated as an opaque decoder.
///
/// May return ids that still need filtering; see
/// [`crate::filter_detections`].
pub trait MarkerDetector {
    fn scan(&mut self, frame: &FrameView<'_>) -> Vec<Detection>;
}

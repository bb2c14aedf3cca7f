use nalgebra::{Point2, Vector3};
use serde::{Deserialize, Serialize};

/// Calibrated pinhole intrinsics in pixels.
///
/// Fixed for the lifetime of a session: the camera is calibrated once and
/// the profile is loaded at startup.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    /// Focal length along x, pixels.
    pub fx: f64,
    /// Focal length along y, pixels.
    pub fy: f64,
    /// Principal point x, pixels.
    pub cx: f64,
    /// Principal point y, pixels.
    pub cy: f64,
}

impl CameraIntrinsics {
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self { fx, fy, cx, cy }
    }

    /// Project a point in the camera optical frame to pixel coordinates.
    ///
    /// Pure perspective division: `u = fx*x/z + cx`, `v = fy*y/z + cy`.
    /// The caller owns the positive-depth precondition; at `z <= 0` the
    /// division blows up and visibility tests upstream must have rejected
    /// the point already.
    #[inline]
    pub fn project(&self, p_c: &Vector3<f64>) -> Point2<f64> {
        Point2::new(
            self.fx * p_c.x / p_c.z + self.cx,
            self.fy * p_c.y / p_c.z + self.cy,
        )
    }

    /// Project and return the camera-frame depth (`z`) alongside the pixel.
    #[inline]
    pub fn project_with_depth(&self, p_c: &Vector3<f64>) -> (Point2<f64>, f64) {
        (self.project(p_c), p_c.z)
    }
}

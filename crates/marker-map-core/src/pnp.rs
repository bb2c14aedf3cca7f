//! Planar perspective-n-point for square markers.
//!
//! Recovers a marker's pose in the camera optical frame from the four
//! detected pixel corners of a square of known side length. The initial
//! pose comes from decomposing the plane-to-image homography against the
//! intrinsics; Gauss-Newton iterations on the reprojection error then
//! polish it. Failures (degenerate corner sets, singular solves,
//! divergence) are per-marker: the solver reports `None` and the caller
//! skips that detection.

use nalgebra::{
    IsometryMatrix3, Matrix2x3, Matrix3, Matrix3x6, Matrix6, Point2, Point3, Rotation3,
    Translation3, Vector2, Vector3, Vector6,
};

use crate::camera::CameraIntrinsics;
use crate::homography::{homography_from_corners, quad_area};

/// Planar PnP solver with iterative refinement.
///
/// The defaults converge in a handful of iterations on noiseless input;
/// the knobs exist for noisy detectors and unusual geometries.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlanarPnp {
    /// Maximum Gauss-Newton iterations on the reprojection error.
    pub refine_iterations: usize,
    /// Stop once the update step norm falls below this.
    pub step_epsilon: f64,
    /// Epsilon for converging the homography rotation block onto a proper
    /// rotation matrix.
    pub rotation_epsilon: f64,
    /// Iteration cap for the rotation convergence above.
    pub rotation_iterations: usize,
}

impl Default for PlanarPnp {
    fn default() -> Self {
        Self {
            refine_iterations: 10,
            step_epsilon: 1e-12,
            rotation_epsilon: 1e-12,
            rotation_iterations: 100,
        }
    }
}

impl PlanarPnp {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets [`PlanarPnp::refine_iterations`].
    #[must_use]
    pub fn refine_iterations(self, refine_iterations: usize) -> Self {
        Self {
            refine_iterations,
            ..self
        }
    }

    /// Sets [`PlanarPnp::step_epsilon`].
    #[must_use]
    pub fn step_epsilon(self, step_epsilon: f64) -> Self {
        Self {
            step_epsilon,
            ..self
        }
    }

    /// Canonical physical corners of a square marker centered at its own
    /// origin in its local z = 0 plane: top-left, top-right, bottom-right,
    /// bottom-left. Detectors must hand over pixel corners in this order;
    /// a mismatch silently yields a wrong-but-plausible pose.
    pub fn canonical_corners(size_m: f64) -> [Point3<f64>; 4] {
        let h = size_m / 2.0;
        [
            Point3::new(-h, -h, 0.0),
            Point3::new(h, -h, 0.0),
            Point3::new(h, h, 0.0),
            Point3::new(-h, h, 0.0),
        ]
    }

    /// Recover the marker-to-camera pose from the detected pixel corners.
    ///
    /// Returns `None` on degenerate geometry (collinear or zero-area
    /// corner sets, non-positive marker size), singular intermediate
    /// solves, or a result that fails the front-of-camera check.
    pub fn solve(
        &self,
        intrinsics: &CameraIntrinsics,
        corners_px: &[Point2<f64>; 4],
        size_m: f64,
    ) -> Option<IsometryMatrix3<f64>> {
        if !(size_m > 0.0) {
            return None;
        }
        // Degenerate detections never describe a visible square.
        if quad_area(corners_px).abs() < 1e-12 {
            return None;
        }

        let h = size_m / 2.0;
        let plane = [
            Point2::new(-h, -h),
            Point2::new(h, -h),
            Point2::new(h, h),
            Point2::new(-h, h),
        ];

        let h_mat = homography_from_corners(&plane, corners_px)?;
        let initial = decompose_homography(intrinsics, &h_mat, self)?;

        let object = Self::canonical_corners(size_m);
        let pose = self.refine(intrinsics, &object, corners_px, initial)?;

        let t = pose.translation.vector;
        if !t.iter().all(|v| v.is_finite()) || t.z <= 0.0 {
            return None;
        }
        Some(pose)
    }

    /// Gauss-Newton on the pixel reprojection error over all four corners.
    ///
    /// The pose is perturbed on the left (in the camera frame), so for a
    /// camera-frame point `p` the point Jacobian is `[I | -[p]x]`. Steps
    /// that increase the error are rejected, matching the guarded
    /// refinement the depth-based P3P solvers use.
    fn refine(
        &self,
        intrinsics: &CameraIntrinsics,
        object: &[Point3<f64>; 4],
        observed: &[Point2<f64>; 4],
        mut pose: IsometryMatrix3<f64>,
    ) -> Option<IsometryMatrix3<f64>> {
        let mut error = reprojection_error(intrinsics, object, observed, &pose)?;

        for _ in 0..self.refine_iterations {
            if error < 1e-20 {
                break;
            }

            let mut jtj = Matrix6::<f64>::zeros();
            let mut g = Vector6::<f64>::zeros();

            for (x, obs) in object.iter().zip(observed.iter()) {
                let p = pose * x;
                if p.z <= 1e-9 {
                    return None;
                }
                let inv_z = 1.0 / p.z;
                let proj = intrinsics.project(&p.coords);
                let r = Vector2::new(proj.x - obs.x, proj.y - obs.y);

                let j_proj = Matrix2x3::new(
                    intrinsics.fx * inv_z,
                    0.0,
                    -intrinsics.fx * p.x * inv_z * inv_z,
                    0.0,
                    intrinsics.fy * inv_z,
                    -intrinsics.fy * p.y * inv_z * inv_z,
                );

                let mut j_point = Matrix3x6::<f64>::zeros();
                j_point
                    .fixed_view_mut::<3, 3>(0, 0)
                    .copy_from(&Matrix3::identity());
                j_point
                    .fixed_view_mut::<3, 3>(0, 3)
                    .copy_from(&(-p.coords.cross_matrix()));

                let j = j_proj * j_point;
                jtj += j.transpose() * j;
                g += j.transpose() * r;
            }

            let step = jtj.cholesky()?.solve(&(-g));
            if !step.iter().all(|v| v.is_finite()) {
                return None;
            }

            let dt = Vector3::new(step[0], step[1], step[2]);
            let dw = Vector3::new(step[3], step[4], step[5]);
            let delta = IsometryMatrix3::from_parts(
                Translation3::from(dt),
                Rotation3::from_scaled_axis(dw),
            );
            let candidate = delta * pose;

            let Some(candidate_error) =
                reprojection_error(intrinsics, object, observed, &candidate)
            else {
                break;
            };
            if candidate_error > error {
                break;
            }

            pose = candidate;
            error = candidate_error;
            if step.norm() < self.step_epsilon {
                break;
            }
        }

        Some(pose)
    }
}

/// Initial pose from `K^-1 H = lambda * [r1 r2 t]` for a z = 0 plane.
fn decompose_homography(
    intrinsics: &CameraIntrinsics,
    h: &Matrix3<f64>,
    params: &PlanarPnp,
) -> Option<IsometryMatrix3<f64>> {
    let k_inv = Matrix3::new(
        1.0 / intrinsics.fx,
        0.0,
        -intrinsics.cx / intrinsics.fx,
        0.0,
        1.0 / intrinsics.fy,
        -intrinsics.cy / intrinsics.fy,
        0.0,
        0.0,
        1.0,
    );
    let a = k_inv * h;

    let a1: Vector3<f64> = a.column(0).into();
    let a2: Vector3<f64> = a.column(1).into();
    let a3: Vector3<f64> = a.column(2).into();

    let scale = 2.0 / (a1.norm() + a2.norm());
    if !scale.is_finite() || scale <= 0.0 {
        return None;
    }

    let mut r1 = a1 * scale;
    let mut r2 = a2 * scale;
    let mut t = a3 * scale;

    // The homography is defined up to sign; the marker must sit in front
    // of the camera.
    if t.z < 0.0 {
        r1 = -r1;
        r2 = -r2;
        t = -t;
    }

    let r3 = r1.cross(&r2);
    let m = Matrix3::from_columns(&[r1, r2, r3]);
    let rotation = Rotation3::from_matrix_eps(
        &m,
        params.rotation_epsilon,
        params.rotation_iterations,
        Rotation3::identity(),
    );

    Some(IsometryMatrix3::from_parts(Translation3::from(t), rotation))
}

/// Mean squared pixel reprojection error; `None` if any corner lands at or
/// behind the camera plane.
fn reprojection_error(
    intrinsics: &CameraIntrinsics,
    object: &[Point3<f64>; 4],
    observed: &[Point2<f64>; 4],
    pose: &IsometryMatrix3<f64>,
) -> Option<f64> {
    let mut acc = 0.0;
    for (x, obs) in object.iter().zip(observed.iter()) {
        let p = pose * x;
        if p.z <= 1e-9 {
            return None;
        }
        let proj = intrinsics.project(&p.coords);
        acc += (proj - *obs).norm_squared();
    }
    Some(acc / 4.0)
}

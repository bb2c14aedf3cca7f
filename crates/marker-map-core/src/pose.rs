//! Rigid transforms between the camera optical frame and the world frame.
//!
//! Two directions show up in this system and mixing them up produces
//! wrong-but-plausible geometry, so each direction is its own newtype:
//! [`WorldToCamera`] maps world points into the camera optical frame,
//! [`CameraToWorld`] maps camera-frame points back out to the world.
//! Both wrap a rotation-matrix isometry, which keeps the orthonormality
//! invariant by construction. Translations are in meters, the same unit
//! as marker sizes.

use nalgebra::{IsometryMatrix3, Point3, Rotation3, Translation3, Vector3};
use serde::{Deserialize, Serialize};

/// Camera pose as supplied by a localization backend: transforms world
/// points into the camera optical frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorldToCamera(pub IsometryMatrix3<f64>);

/// Inverse camera pose: transforms camera-frame points to world
/// coordinates, and tells you where the camera sits in the world.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraToWorld(pub IsometryMatrix3<f64>);

impl WorldToCamera {
    pub fn identity() -> Self {
        Self(IsometryMatrix3::identity())
    }

    pub fn from_parts(rotation: Rotation3<f64>, translation: Vector3<f64>) -> Self {
        Self(IsometryMatrix3::from_parts(
            Translation3::from(translation),
            rotation,
        ))
    }

    /// Invert: `R^T`, `-R^T t`.
    pub fn inverse(&self) -> CameraToWorld {
        CameraToWorld(self.0.inverse())
    }

    /// World point into the camera optical frame.
    #[inline]
    pub fn transform(&self, p_w: &Point3<f64>) -> Point3<f64> {
        self.0 * p_w
    }

    pub fn rotation(&self) -> Rotation3<f64> {
        self.0.rotation
    }

    pub fn translation(&self) -> Vector3<f64> {
        self.0.translation.vector
    }
}

impl CameraToWorld {
    pub fn inverse(&self) -> WorldToCamera {
        WorldToCamera(self.0.inverse())
    }

    /// Camera-frame point out to world coordinates.
    #[inline]
    pub fn transform(&self, p_c: &Point3<f64>) -> Point3<f64> {
        self.0 * p_c
    }

    /// Compose with a marker pose expressed in the camera optical frame to
    /// obtain the marker pose in the world frame:
    /// `R_wm = R_wc * R_cm`, `t_wm = R_wc * t_cm + t_wc`.
    #[inline]
    pub fn compose(&self, marker_in_camera: &IsometryMatrix3<f64>) -> IsometryMatrix3<f64> {
        self.0 * marker_in_camera
    }
}

impl From<IsometryMatrix3<f64>> for WorldToCamera {
    fn from(iso: IsometryMatrix3<f64>) -> Self {
        Self(iso)
    }
}

impl From<IsometryMatrix3<f64>> for CameraToWorld {
    fn from(iso: IsometryMatrix3<f64>) -> Self {
        Self(iso)
    }
}

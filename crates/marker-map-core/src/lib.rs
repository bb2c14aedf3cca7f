//! Geometry for world-anchored marker mapping.
//!
//! This crate is intentionally small and purely numeric. It knows nothing
//! about detectors, localization backends or frame loops; it provides the
//! pinhole camera model, the two rigid-pose directions the system works
//! with, and the planar PnP solver that recovers a square marker's pose
//! from its four detected corners.

mod camera;
mod homography;
mod logger;
mod pnp;
mod pose;

pub use camera::CameraIntrinsics;
pub use homography::{homography_from_corners, quad_area};
pub use pnp::PlanarPnp;
pub use pose::{CameraToWorld, WorldToCamera};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;

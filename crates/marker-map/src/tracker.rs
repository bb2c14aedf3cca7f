//! Facade tying the camera model, the PnP solver and the marker map
//! together. The application layer talks only to this type.

use marker_map_core::{CameraIntrinsics, PlanarPnp, WorldToCamera};
use nalgebra::Point3;

use crate::detection::Detection;
use crate::map::{MarkerMap, MarkerRecord, UpsertStats};
use crate::projector::{project_markers, ProjectedMarker};

/// Owns the marker map and the machinery to feed it.
pub struct MarkerTracker {
    intrinsics: CameraIntrinsics,
    pnp: PlanarPnp,
    map: MarkerMap,
}

impl MarkerTracker {
    pub fn new(intrinsics: CameraIntrinsics) -> Self {
        Self {
            intrinsics,
            pnp: PlanarPnp::default(),
            map: MarkerMap::new(),
        }
    }

    /// Replace the PnP solver settings.
    #[must_use]
    pub fn with_pnp(mut self, pnp: PlanarPnp) -> Self {
        self.pnp = pnp;
        self
    }

    pub fn intrinsics(&self) -> &CameraIntrinsics {
        &self.intrinsics
    }

    pub fn map(&self) -> &MarkerMap {
        &self.map
    }

    /// Localize each detection against the current camera pose and merge
    /// the world-frame results into the map.
    ///
    /// `t_cw` is the pose supplied by the localization backend (world
    /// points into the camera frame). Per detection: planar PnP recovers
    /// the marker pose in the camera frame, composition with the inverted
    /// camera pose lifts it into the world frame, and the map inserts or
    /// overwrites latest-wins. Detections with an empty id or a failed
    /// localization are skipped and counted toward neither total.
    pub fn upsert(
        &mut self,
        detections: &[Detection],
        t_cw: &WorldToCamera,
        marker_size_m: f64,
    ) -> UpsertStats {
        let mut stats = UpsertStats::default();
        if detections.is_empty() {
            return stats;
        }

        let t_wc = t_cw.inverse();

        for det in detections {
            if det.id.is_empty() {
                log::debug!("skipping detection with empty id");
                continue;
            }

            let Some(t_cm) = self.pnp.solve(&self.intrinsics, &det.corners_px, marker_size_m)
            else {
                log::warn!("planar PnP failed for marker '{}'", det.id);
                continue;
            };

            let t_wm = t_wc.compose(&t_cm);
            let record = MarkerRecord {
                id: det.id.clone(),
                position_w: Point3::from(t_wm.translation.vector),
                orientation_w: t_wm.rotation,
                size_m: marker_size_m,
            };

            if self.map.insert_or_update(record) {
                log::info!("new marker '{}'", det.id);
                stats.new += 1;
            } else {
                stats.updated += 1;
            }
        }

        stats
    }

    /// Project every mapped marker through the given camera pose; see
    /// [`project_markers`] for the visibility contract.
    pub fn project_all(
        &self,
        t_cw: &WorldToCamera,
        image_width: u32,
        image_height: u32,
    ) -> Vec<ProjectedMarker> {
        project_markers(&self.map, &self.intrinsics, t_cw, image_width, image_height)
    }

    pub fn get(&self, id: &str) -> Option<&MarkerRecord> {
        self.map.get(id)
    }

    /// Drop every mapped marker (full reset).
    pub fn clear(&mut self) {
        self.map.clear();
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marker_map_core::PlanarPnp;
    use nalgebra::{IsometryMatrix3, Point2, Rotation3, Translation3, Vector3};

    fn intrinsics() -> CameraIntrinsics {
        CameraIntrinsics::new(800.0, 800.0, 320.0, 240.0)
    }

    /// Pixel corners of a marker at the given camera-frame pose.
    fn corners_for(pose: &IsometryMatrix3<f64>, size_m: f64) -> [Point2<f64>; 4] {
        let k = intrinsics();
        PlanarPnp::canonical_corners(size_m).map(|x| {
            let p = pose * x;
            k.project(&p.coords)
        })
    }

    fn straight_ahead_detection(id: &str) -> Detection {
        Detection {
            id: id.to_owned(),
            corners_px: [
                Point2::new(304.0, 224.0),
                Point2::new(336.0, 224.0),
                Point2::new(336.0, 256.0),
                Point2::new(304.0, 256.0),
            ],
        }
    }

    #[test]
    fn marker_ahead_of_origin_camera_maps_to_expected_world_pose() {
        let mut tracker = MarkerTracker::new(intrinsics());
        let pose = WorldToCamera::identity();

        let stats = tracker.upsert(&[straight_ahead_detection("qr-1")], &pose, 0.04);
        assert_eq!(stats.new, 1);
        assert_eq!(stats.updated, 0);

        let record = tracker.get("qr-1").expect("mapped");
        assert!((record.position_w.coords - Vector3::new(0.0, 0.0, 1.0)).norm() < 1e-9);
        assert_eq!(record.size_m, 0.04);

        let projected = tracker.project_all(&pose, 640, 480);
        assert_eq!(projected.len(), 1);
        assert!(projected[0].in_view);
        let px = projected[0].pixel.expect("in front of the camera");
        assert!((px.x - 320.0).abs() < 1e-9);
        assert!((px.y - 240.0).abs() < 1e-9);
        assert!((projected[0].depth_m - 1.0).abs() < 1e-9);
    }

    #[test]
    fn upsert_then_read_back_round_trips_camera_relative_pose() {
        // A moving camera away from the world origin, and a tilted marker
        // at a known camera-relative pose.
        let t_cw = WorldToCamera::from_parts(
            Rotation3::from_euler_angles(0.1, -0.2, 0.05),
            Vector3::new(0.3, -0.1, 0.4),
        );
        let marker_in_camera = IsometryMatrix3::from_parts(
            Translation3::new(0.05, -0.02, 0.9),
            Rotation3::from_euler_angles(0.2, 0.1, -0.05),
        );

        let det = Detection {
            id: "qr-7".to_owned(),
            corners_px: corners_for(&marker_in_camera, 0.05),
        };

        let mut tracker = MarkerTracker::new(intrinsics());
        let stats = tracker.upsert(&[det], &t_cw, 0.05);
        assert_eq!(stats.new, 1);

        // Re-project the stored world pose through the same camera pose;
        // it must reproduce the camera-relative pose we started from.
        let record = tracker.get("qr-7").unwrap();
        let back = t_cw.0
            * IsometryMatrix3::from_parts(
                Translation3::from(record.position_w.coords),
                record.orientation_w,
            );

        assert!(
            (back.translation.vector - marker_in_camera.translation.vector).norm() < 1e-9,
            "translation did not round-trip"
        );
        assert!(
            (back.rotation.inverse() * marker_in_camera.rotation).angle() < 1e-9,
            "rotation did not round-trip"
        );
    }

    #[test]
    fn reobservation_is_idempotent_and_counted_as_update() {
        let mut tracker = MarkerTracker::new(intrinsics());
        let pose = WorldToCamera::identity();
        let det = straight_ahead_detection("qr-1");

        let first = tracker.upsert(std::slice::from_ref(&det), &pose, 0.04);
        let record_after_first = tracker.get("qr-1").unwrap().clone();

        let second = tracker.upsert(std::slice::from_ref(&det), &pose, 0.04);
        let record_after_second = tracker.get("qr-1").unwrap().clone();

        assert_eq!((first.new, first.updated), (1, 0));
        assert_eq!((second.new, second.updated), (0, 1));
        assert_eq!(tracker.len(), 1);
        assert_eq!(record_after_first, record_after_second);
    }

    #[test]
    fn degenerate_detection_is_skipped_without_aborting_the_batch() {
        let mut tracker = MarkerTracker::new(intrinsics());
        let pose = WorldToCamera::identity();

        let flat = Detection {
            id: "bad".to_owned(),
            corners_px: [
                Point2::new(100.0, 100.0),
                Point2::new(110.0, 100.0),
                Point2::new(120.0, 100.0),
                Point2::new(130.0, 100.0),
            ],
        };
        let good = straight_ahead_detection("good");

        let stats = tracker.upsert(&[flat, good], &pose, 0.04);
        assert_eq!((stats.new, stats.updated), (1, 0));
        assert!(tracker.get("bad").is_none());
        assert!(tracker.get("good").is_some());
    }

    #[test]
    fn clear_empties_the_tracker() {
        let mut tracker = MarkerTracker::new(intrinsics());
        let pose = WorldToCamera::identity();
        tracker.upsert(&[straight_ahead_detection("qr-1")], &pose, 0.04);
        assert_eq!(tracker.len(), 1);

        tracker.clear();
        assert!(tracker.is_empty());
        assert!(tracker.get("qr-1").is_none());
        assert!(tracker.project_all(&pose, 640, 480).is_empty());
    }
}

//! Projection of mapped markers into the current image.

use marker_map_core::{CameraIntrinsics, WorldToCamera};
use nalgebra::Point2;

use crate::map::MarkerMap;

/// Markers at or below this camera-frame depth are geometrically
/// meaningless to project (behind or on the camera plane). Meters.
pub const MIN_DEPTH_M: f64 = 0.05;

/// Per-frame projection of one mapped marker. Recomputed every frame from
/// the map and the current camera pose; never stored.
#[derive(Clone, Debug, PartialEq)]
pub struct ProjectedMarker {
    pub id: String,
    /// Pixel position of the marker center. `None` when the marker sits at
    /// or behind the minimum depth and no finite projection exists.
    pub pixel: Option<Point2<f64>>,
    /// Whether the pixel falls inside the image bounds.
    pub in_view: bool,
    /// Camera-frame z of the marker center, meters. Non-positive when the
    /// marker is behind the camera.
    pub depth_m: f64,
}

/// Project every mapped marker into the current image.
///
/// Every record yields exactly one entry, tagged with `in_view`; the
/// caller decides whether to draw markers that are not in view (this is
/// what makes off-screen indicators possible). Bounds are strict at the
/// lower edge and exclusive at the upper edge, matching pixel-grid
/// convention. Result order is unspecified.
pub fn project_markers(
    map: &MarkerMap,
    intrinsics: &CameraIntrinsics,
    t_cw: &WorldToCamera,
    image_width: u32,
    image_height: u32,
) -> Vec<ProjectedMarker> {
    map.records()
        .map(|mk| {
            let p_c = t_cw.transform(&mk.position_w);
            if p_c.z <= MIN_DEPTH_M {
                return ProjectedMarker {
                    id: mk.id.clone(),
                    pixel: None,
                    in_view: false,
                    depth_m: p_c.z,
                };
            }

            let (pixel, depth_m) = intrinsics.project_with_depth(&p_c.coords);
            let in_view = pixel.x >= 0.0
                && pixel.x < f64::from(image_width)
                && pixel.y >= 0.0
                && pixel.y < f64::from(image_height);

            ProjectedMarker {
                id: mk.id.clone(),
                pixel: Some(pixel),
                in_view,
                depth_m,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::MarkerRecord;
    use approx::assert_relative_eq;
    use nalgebra::{Point3, Rotation3};

    const K: CameraIntrinsics = CameraIntrinsics {
        fx: 800.0,
        fy: 800.0,
        cx: 320.0,
        cy: 240.0,
    };

    fn map_with(positions: &[(&str, Point3<f64>)]) -> MarkerMap {
        let mut map = MarkerMap::new();
        for (id, p) in positions {
            map.insert_or_update(MarkerRecord {
                id: (*id).to_owned(),
                position_w: *p,
                orientation_w: Rotation3::identity(),
                size_m: 0.04,
            });
        }
        map
    }

    /// World position that projects to pixel (u, v) at the given depth
    /// under an identity camera pose.
    fn world_point_at_pixel(u: f64, v: f64, z: f64) -> Point3<f64> {
        Point3::new((u - K.cx) / K.fx * z, (v - K.cy) / K.fy * z, z)
    }

    #[test]
    fn empty_map_projects_to_nothing() {
        let out = project_markers(
            &MarkerMap::new(),
            &K,
            &WorldToCamera::identity(),
            640,
            480,
        );
        assert!(out.is_empty());
    }

    #[test]
    fn centered_marker_is_in_view() {
        let map = map_with(&[("qr-1", Point3::new(0.0, 0.0, 1.0))]);
        let out = project_markers(&map, &K, &WorldToCamera::identity(), 640, 480);

        assert_eq!(out.len(), 1);
        let pm = &out[0];
        assert!(pm.in_view);
        let px = pm.pixel.expect("finite projection");
        assert_relative_eq!(px.x, 320.0, epsilon = 1e-9);
        assert_relative_eq!(px.y, 240.0, epsilon = 1e-9);
        assert_relative_eq!(pm.depth_m, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn behind_camera_marker_is_tagged_not_dropped() {
        let map = map_with(&[
            ("front", Point3::new(0.0, 0.0, 1.0)),
            ("behind", Point3::new(0.0, 0.0, -1.0)),
        ]);
        let out = project_markers(&map, &K, &WorldToCamera::identity(), 640, 480);

        assert_eq!(out.len(), 2);
        let behind = out.iter().find(|pm| pm.id == "behind").unwrap();
        assert!(!behind.in_view);
        assert!(behind.pixel.is_none());
        assert!(behind.depth_m < 0.0);
    }

    #[test]
    fn depth_floor_is_inclusive_reject() {
        let at_floor = map_with(&[("qr-1", Point3::new(0.0, 0.0, MIN_DEPTH_M))]);
        let out = project_markers(&at_floor, &K, &WorldToCamera::identity(), 640, 480);
        assert!(out[0].pixel.is_none());
        assert!(!out[0].in_view);

        let just_above = map_with(&[("qr-1", Point3::new(0.0, 0.0, MIN_DEPTH_M + 1e-6))]);
        let out = project_markers(&just_above, &K, &WorldToCamera::identity(), 640, 480);
        assert!(out[0].pixel.is_some());
        assert!(out[0].in_view);
    }

    #[test]
    fn image_bounds_are_inclusive_exclusive() {
        let map = map_with(&[
            ("origin", world_point_at_pixel(0.0, 0.0, 1.0)),
            ("right-edge", world_point_at_pixel(640.0, 240.0, 1.0)),
            ("bottom-edge", world_point_at_pixel(320.0, 480.0, 1.0)),
        ]);
        let out = project_markers(&map, &K, &WorldToCamera::identity(), 640, 480);

        let by_id = |id: &str| out.iter().find(|pm| pm.id == id).unwrap();
        assert!(by_id("origin").in_view);
        assert!(!by_id("right-edge").in_view);
        assert!(!by_id("bottom-edge").in_view);
        // Out-of-frame markers still carry their pixel for off-screen hints.
        assert!(by_id("right-edge").pixel.is_some());
    }
}

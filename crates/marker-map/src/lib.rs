//! World-anchored marker map for a moving monocular camera.
//!
//! Per frame, an external localization backend supplies the camera pose
//! and an external detector supplies marker ids with pixel corners. This
//! crate answers the two questions the application asks every frame:
//! where does a freshly detected marker live in the fixed world frame,
//! and where do previously mapped markers project onto the current image.
//!
//! ## Quickstart
//!
//! ```
//! use marker_map::{Detection, MarkerTracker};
//! use marker_map::core::{CameraIntrinsics, WorldToCamera};
//! use nalgebra::Point2;
//!
//! let mut tracker = MarkerTracker::new(CameraIntrinsics::new(800.0, 800.0, 320.0, 240.0));
//!
//! // A 4 cm marker one meter straight ahead of the camera.
//! let detection = Detection {
//!     id: "qr-1".into(),
//!     corners_px: [
//!         Point2::new(304.0, 224.0),
//!         Point2::new(336.0, 224.0),
//!         Point2::new(336.0, 256.0),
//!         Point2::new(304.0, 256.0),
//!     ],
//! };
//!
//! let pose = WorldToCamera::identity();
//! let stats = tracker.upsert(&[detection], &pose, 0.04);
//! assert_eq!(stats.new, 1);
//!
//! let projected = tracker.project_all(&pose, 640, 480);
//! assert!(projected[0].in_view);
//! ```

mod config;
mod detection;
mod map;
mod oracle;
mod projector;
mod session;
mod tracker;

pub use config::{AppConfig, CameraConfig, ConfigError, ScanConfig};
pub use detection::{filter_detections, Detection};
pub use map::{MarkerMap, MarkerRecord, UpsertStats};
pub use oracle::{FrameView, MarkerDetector, PoseOracle};
pub use projector::{project_markers, ProjectedMarker, MIN_DEPTH_M};
pub use session::{FrameSummary, MapSession};
pub use tracker::MarkerTracker;

pub use marker_map_core as core;

//! Frame-driven pipeline: oracle -> (gated) detector -> map upsert ->
//! projection, in that strict order.
//!
//! Single-threaded by design: every frame runs to completion before the
//! next begins, and the map is mutated and read from the same control
//! flow. The only mid-stream state invalidation is [`MapSession::reset`].

use marker_map_core::WorldToCamera;

use crate::config::ScanConfig;
use crate::detection::filter_detections;
use crate::map::UpsertStats;
use crate::oracle::{FrameView, MarkerDetector, PoseOracle};
use crate::projector::ProjectedMarker;
use crate::tracker::MarkerTracker;

/// Outcome of one frame through the pipeline.
#[derive(Clone, Debug, Default)]
pub struct FrameSummary {
    /// Whether the oracle produced a pose for this frame. When `false`
    /// the rest of the summary is empty and the map is untouched.
    pub pose_available: bool,
    pub stats: UpsertStats,
    pub projected: Vec<ProjectedMarker>,
}

/// Owns the oracle, the detector and the tracker for one camera session.
pub struct MapSession<O, D> {
    oracle: O,
    detector: D,
    tracker: MarkerTracker,
    scan: ScanConfig,
    frame_index: u64,
}

impl<O: PoseOracle, D: MarkerDetector> MapSession<O, D> {
    pub fn new(oracle: O, detector: D, tracker: MarkerTracker, scan: ScanConfig) -> Self {
        Self {
            oracle,
            detector,
            tracker,
            scan,
            frame_index: 0,
        }
    }

    pub fn tracker(&self) -> &MarkerTracker {
        &self.tracker
    }

    /// Process one frame to completion.
    ///
    /// The detector only runs on frames the scan gate selects (every
    /// `interval_frames`-th frame, counted from zero); projection runs on
    /// every frame with a pose so the overlay never goes stale. Without a
    /// pose the frame is a no-op apart from feeding the oracle.
    pub fn process_frame(&mut self, frame: &FrameView<'_>, timestamp_s: f64) -> FrameSummary {
        let index = self.frame_index;
        self.frame_index += 1;

        let Some(pose) = self.oracle.feed_frame(frame, timestamp_s) else {
            return FrameSummary::default();
        };

        let stats = if self.scan_due(index) {
            self.scan_with_pose(frame, &pose)
        } else {
            UpsertStats::default()
        };

        let projected = self.tracker.project_all(&pose, frame.width, frame.height);

        FrameSummary {
            pose_available: true,
            stats,
            projected,
        }
    }

    /// Caller-triggered scan outside the automatic interval (the manual
    /// re-scan path). Returns `None` while the oracle has no pose.
    pub fn scan_now(&mut self, frame: &FrameView<'_>) -> Option<UpsertStats> {
        let pose = self.oracle.current_pose()?;
        Some(self.scan_with_pose(frame, &pose))
    }

    /// Full reset: oracle state, marker map and the frame counter.
    pub fn reset(&mut self) {
        self.oracle.reset();
        self.tracker.clear();
        self.frame_index = 0;
        log::info!("session reset");
    }

    fn scan_due(&self, index: u64) -> bool {
        self.scan.enable && self.scan.interval_frames > 0 && index % self.scan.interval_frames == 0
    }

    fn scan_with_pose(&mut self, frame: &FrameView<'_>, pose: &WorldToCamera) -> UpsertStats {
        let detections = filter_detections(self.detector.scan(frame));
        if detections.is_empty() {
            return UpsertStats::default();
        }
        let stats = self
            .tracker
            .upsert(&detections, pose, self.scan.marker_size_m);
        if stats.total() > 0 {
            log::info!("scan merged {} new, {} updated", stats.new, stats.updated);
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScanConfig;
    use crate::detection::Detection;
    use marker_map_core::CameraIntrinsics;
    use nalgebra::Point2;

    struct FixedOracle {
        pose: Option<WorldToCamera>,
        was_reset: bool,
    }

    impl PoseOracle for FixedOracle {
        fn feed_frame(&mut self, _: &FrameView<'_>, _: f64) -> Option<WorldToCamera> {
            self.pose
        }

        fn current_pose(&self) -> Option<WorldToCamera> {
            self.pose
        }

        fn reset(&mut self) {
            self.pose = None;
            self.was_reset = true;
        }
    }

    struct CountingDetector {
        calls: usize,
    }

    impl MarkerDetector for CountingDetector {
        fn scan(&mut self, _: &FrameView<'_>) -> Vec<Detection> {
            self.calls += 1;
            vec![Detection {
                id: "qr-1".to_owned(),
                corners_px: [
                    Point2::new(304.0, 224.0),
                    Point2::new(336.0, 224.0),
                    Point2::new(336.0, 256.0),
                    Point2::new(304.0, 256.0),
                ],
            }]
        }
    }

    fn frame() -> FrameView<'static> {
        FrameView {
            width: 640,
            height: 480,
            data: &[],
        }
    }

    fn session(
        pose: Option<WorldToCamera>,
        interval: u64,
    ) -> MapSession<FixedOracle, CountingDetector> {
        let tracker =
            MarkerTracker::new(CameraIntrinsics::new(800.0, 800.0, 320.0, 240.0));
        MapSession::new(
            FixedOracle {
                pose,
                was_reset: false,
            },
            CountingDetector { calls: 0 },
            tracker,
            ScanConfig {
                enable: true,
                interval_frames: interval,
                marker_size_m: 0.04,
            },
        )
    }

    #[test]
    fn no_pose_means_untouched_map() {
        let mut s = session(None, 1);
        let summary = s.process_frame(&frame(), 0.0);
        assert!(!summary.pose_available);
        assert_eq!(summary.stats, UpsertStats::default());
        assert!(summary.projected.is_empty());
        assert!(s.tracker().is_empty());
        assert_eq!(s.detector.calls, 0);
    }

    #[test]
    fn scan_interval_gates_the_detector() {
        let mut s = session(Some(WorldToCamera::identity()), 2);
        for i in 0..4 {
            let summary = s.process_frame(&frame(), i as f64 / 30.0);
            assert!(summary.pose_available);
            // Projection runs every frame once the marker is mapped.
            if i > 0 {
                assert_eq!(summary.projected.len(), 1);
            }
        }
        // Frames 0 and 2 only.
        assert_eq!(s.detector.calls, 2);
    }

    #[test]
    fn manual_scan_requires_a_pose() {
        let mut without_pose = session(None, 0);
        assert!(without_pose.scan_now(&frame()).is_none());

        let mut with_pose = session(Some(WorldToCamera::identity()), 0);
        let stats = with_pose.scan_now(&frame()).expect("pose is known");
        assert_eq!(stats.new, 1);
        assert_eq!(with_pose.tracker().len(), 1);
    }

    #[test]
    fn reset_clears_oracle_and_map() {
        let mut s = session(Some(WorldToCamera::identity()), 1);
        s.process_frame(&frame(), 0.0);
        assert_eq!(s.tracker().len(), 1);

        s.reset();
        assert!(s.tracker().is_empty());
        assert!(s.oracle.was_reset);
        assert!(s.oracle.current_pose().is_none());
    }
}

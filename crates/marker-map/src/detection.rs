use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// One decoded marker observation in a single frame.
///
/// Corner order is the detector's: top-left, top-right, bottom-right,
/// bottom-left. Pose recovery matches these 1:1 against the canonical
/// physical layout; a detector with a different order silently yields a
/// wrong-but-plausible pose, so adapters must preserve it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Decoded payload string; doubles as the map key.
    pub id: String,
    pub corners_px: [Point2<f64>; 4],
}

/// Drop detections that can never reach the localizer: an empty id
/// carries no identity to map against.
pub fn filter_detections(detections: Vec<Detection>) -> Vec<Detection> {
    detections
        .into_iter()
        .filter(|d| {
            if d.id.is_empty() {
                log::debug!("dropping detection with empty id");
                false
            } else {
                true
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(id: &str) -> Detection {
        Detection {
            id: id.to_owned(),
            corners_px: [Point2::origin(); 4],
        }
    }

    #[test]
    fn empty_ids_are_dropped() {
        let kept = filter_detections(vec![detection("qr-1"), detection(""), detection("qr-2")]);
        let ids: Vec<_> = kept.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["qr-1", "qr-2"]);
    }
}

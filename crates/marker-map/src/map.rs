//! The identifier -> world-pose map and its merge policy.

use std::collections::HashMap;

use nalgebra::{Point3, Rotation3};
use serde::{Deserialize, Serialize};

/// World-frame entry for one physical marker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarkerRecord {
    pub id: String,
    /// Marker center in the world frame, meters.
    pub position_w: Point3<f64>,
    /// Marker orientation in the world frame.
    pub orientation_w: Rotation3<f64>,
    /// Physical side length, meters.
    pub size_m: f64,
}

/// Counts reported by an upsert batch: records created vs overwritten.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpsertStats {
    pub new: usize,
    pub updated: usize,
}

impl UpsertStats {
    pub fn total(&self) -> usize {
        self.new + self.updated
    }
}

/// Authoritative id -> [`MarkerRecord`] store.
///
/// Merge policy is latest-wins overwrite, never temporal averaging: the
/// most recent camera pose estimate is assumed to be the most reliable
/// one, consistent with drift-correcting localization backends. Records
/// are only ever removed by [`MarkerMap::clear`].
///
/// The map is owned exclusively by its tracker and accessed from a single
/// frame-driven thread; wrap the owning tracker in a mutex before adding
/// background detection or multi-camera input, since upsert is a
/// read-then-write sequence.
#[derive(Clone, Debug, Default)]
pub struct MarkerMap {
    records: HashMap<String, MarkerRecord>,
}

impl MarkerMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest-wins insert. Returns `true` when the id was not present
    /// before (a new marker), `false` when an existing record was
    /// overwritten.
    pub fn insert_or_update(&mut self, record: MarkerRecord) -> bool {
        self.records.insert(record.id.clone(), record).is_none()
    }

    pub fn get(&self, id: &str) -> Option<&MarkerRecord> {
        self.records.get(id)
    }

    /// Full reset: removes every record.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over records. Order is unspecified; callers must not
    /// depend on it.
    pub fn records(&self) -> impl Iterator<Item = &MarkerRecord> {
        self.records.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, z: f64) -> MarkerRecord {
        MarkerRecord {
            id: id.to_owned(),
            position_w: Point3::new(0.0, 0.0, z),
            orientation_w: Rotation3::identity(),
            size_m: 0.04,
        }
    }

    #[test]
    fn insert_then_overwrite() {
        let mut map = MarkerMap::new();
        assert!(map.insert_or_update(record("qr-1", 1.0)));
        assert!(!map.insert_or_update(record("qr-1", 2.0)));
        assert_eq!(map.len(), 1);
        // Latest observation wins.
        assert_eq!(map.get("qr-1").unwrap().position_w.z, 2.0);
    }

    #[test]
    fn clear_resets_everything() {
        let mut map = MarkerMap::new();
        map.insert_or_update(record("qr-1", 1.0));
        map.insert_or_update(record("qr-2", 1.5));
        assert_eq!(map.len(), 2);

        map.clear();
        assert_eq!(map.len(), 0);
        assert!(map.is_empty());
        assert!(map.get("qr-1").is_none());
        assert!(map.get("qr-2").is_none());
    }
}

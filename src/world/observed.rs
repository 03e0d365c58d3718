use crate::geo::PlanarGeometry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Registry of geographic regions currently being watched by some stream.
/// Entries are keyed by a registration id handed back to the stream that
/// added them, so identical geometries from different streams coexist.
pub struct ObservedRegions {
    regions: DashMap<u64, PlanarGeometry>,
    next_id: AtomicU64,
}

impl ObservedRegions {
    pub fn new() -> Self {
        Self {
            regions: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn add(&self, geometry: PlanarGeometry) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.regions.insert(id, geometry);
        id
    }

    pub fn remove(&self, id: u64) {
        self.regions.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Snapshot of every observed geometry, for the observe stream's
    /// collection payload.
    pub fn collection(&self) -> Vec<PlanarGeometry> {
        self.regions.iter().map(|r| r.value().clone()).collect()
    }
}

impl Default for ObservedRegions {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::LonLat;

    fn point(lon: f64, lat: f64) -> PlanarGeometry {
        PlanarGeometry::Point(LonLat {
            longitude: lon,
            latitude: lat,
        })
    }

    #[test]
    fn test_add_remove_collection() {
        let regions = ObservedRegions::new();
        assert!(regions.is_empty());

        let a = regions.add(point(1.0, 1.0));
        let b = regions.add(point(2.0, 2.0));
        assert_eq!(regions.len(), 2);

        regions.remove(a);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions.collection(), vec![point(2.0, 2.0)]);

        regions.remove(b);
        assert!(regions.is_empty());
    }

    #[test]
    fn test_identical_geometries_coexist() {
        let regions = ObservedRegions::new();
        let a = regions.add(point(1.0, 1.0));
        let _b = regions.add(point(1.0, 1.0));
        assert_eq!(regions.len(), 2);

        regions.remove(a);
        assert_eq!(regions.len(), 1);
    }
}

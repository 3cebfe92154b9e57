//! The external storage boundary and the serialized grid format.
//!
//! The engine never talks to a database directly: sessions drive one
//! abstract [`DataStore`] collaborator for posts, grids and events. Grids
//! travel as opaque blobs — a bincode encoding of a [`QuadTree`] keyed by
//! time-bucket id.

use std::collections::HashMap;

use crate::core::{Area, Event, Post, SpatioHourInterval};
use crate::error::{Error, Result};
use crate::index::QuadTree;

/// Read/write access to the per-city post, grid and event collections.
///
/// Implementations are shared across session worker threads, so they must
/// be `Send + Sync`; every call blocks the calling worker.
pub trait DataStore: Send + Sync {
    /// Posts of a city in `[start_time, finish_time]`, plus the city's
    /// spatial extent.
    fn select_posts(
        &self,
        city_id: &str,
        start_time: i64,
        finish_time: i64,
    ) -> Result<(Vec<Post>, Area)>;

    /// Stores all baseline grids of a city in one call.
    fn push_grid(&self, city_id: &str, grids: &HashMap<i64, Vec<u8>>) -> Result<()>;

    /// Loads the grids for the given bucket ids; absent buckets are simply
    /// missing from the returned map.
    fn pull_grid(&self, city_id: &str, bucket_ids: &[i64]) -> Result<HashMap<i64, Vec<u8>>>;

    fn push_events(&self, city_id: &str, events: &[Event]) -> Result<()>;

    /// Previously stored events for one hour window over an area.
    fn pull_events(&self, city_id: &str, interval: &SpatioHourInterval) -> Result<Vec<Event>>;
}

/// Serializes a baseline grid into its persisted blob form.
pub fn encode_grid(tree: &QuadTree) -> Result<Vec<u8>> {
    bincode::serialize(tree).map_err(|e| Error::Grid(format!("encode: {}", e)))
}

/// Restores a baseline grid from its persisted blob form.
pub fn decode_grid(blob: &[u8]) -> Result<QuadTree> {
    bincode::deserialize(blob).map_err(|e| Error::Grid(format!("decode: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::GeoPoint;
    use crate::index::WeightedPoint;

    #[test]
    fn test_grid_blob_round_trip() {
        let points =
            vec![WeightedPoint::cell(1.5, 2.5, 3), WeightedPoint::cell(7.25, 8.75, 11)];
        let mut tree = QuadTree::new(
            GeoPoint::new(10.0, 0.0),
            GeoPoint::new(0.0, 10.0),
            0.01,
            0.01,
            4,
            points,
        )
        .unwrap();
        tree.clear();
        let blob = encode_grid(&tree).unwrap();
        let restored = decode_grid(&blob).unwrap();
        assert_eq!(restored.weight(), tree.weight());
        assert_eq!(restored.is_leaf(), tree.is_leaf());
        assert_eq!(restored.region(), tree.region());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode_grid(&[0x07, 0x01, 0xff]), Err(Error::Grid(_))));
    }
}

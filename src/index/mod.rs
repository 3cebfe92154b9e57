//! Spatial indexing.

pub mod quadtree;

pub use quadtree::{QuadTree, Region, WeightedPoint};

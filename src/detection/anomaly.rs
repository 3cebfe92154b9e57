//! Live-window probing: overlays a window of posts onto the historic
//! baseline and reports whether any cell broke its expected density.

use std::sync::Arc;

use crate::core::Post;
use crate::index::{QuadTree, WeightedPoint};

/// Probes live post windows against baseline grids.
#[derive(Debug, Clone, Copy)]
pub struct AnomalyDetector {
    max_points: u32,
}

impl AnomalyDetector {
    pub fn new(max_points: u32) -> Self {
        Self { max_points }
    }

    /// Overlays `posts` on a copy of the bucket's baseline grid and flags
    /// whether any leaf reached the density threshold. Insertion skips
    /// rebalancing so the baseline's cell structure stays intact for the
    /// clusterer's refinement pass.
    ///
    /// Baseline weight sits in the same leaves the live points land in, so
    /// a leaf only trips when live activity is high relative to what the
    /// baseline already contributed there.
    pub fn probe(&self, baseline: &QuadTree, posts: &[Post]) -> (QuadTree, bool) {
        let mut tree = baseline.deep_copy();
        for post in posts {
            tree.insert(WeightedPoint::live(Arc::new(post.clone())), false);
        }
        let found = self.has_candidate(&tree);
        (tree, found)
    }

    fn has_candidate(&self, node: &QuadTree) -> bool {
        match node.quadrants() {
            Some(children) => children.iter().any(|child| self.has_candidate(child)),
            None => node.weight() >= self.max_points,
        }
    }
}

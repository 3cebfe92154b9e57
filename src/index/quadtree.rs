//! Weighted region quadtree used both for the historic activity baseline
//! and for probing live post windows against it.
//!
//! A node owns a rectangular region `[top_left, bottom_right)`; it is
//! either a leaf holding weighted points or an internal node with four
//! children exactly tiling its region. Every threshold in the engine is
//! measured against a leaf's *weighted* point count (the sum of point
//! weights), so one unit of expected baseline density and one live post
//! load the scale equally.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::{GeoPoint, Post};
use crate::error::{Error, Result};

/// A spatial sample: a coordinate with an integer weight and an optional
/// post payload. Baseline cells carry `weight = expected count` and no
/// payload; live insertions carry `weight = 1` and the post itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightedPoint {
    /// Longitude.
    pub x: f64,
    /// Latitude.
    pub y: f64,
    pub weight: u32,
    pub payload: Option<Arc<Post>>,
}

impl WeightedPoint {
    /// A baseline cell summary: expected density, no payload.
    pub fn cell(x: f64, y: f64, weight: u32) -> Self {
        Self { x, y, weight, payload: None }
    }

    /// A live observation: weight 1, carrying the post.
    pub fn live(post: Arc<Post>) -> Self {
        Self { x: post.lon, y: post.lat, weight: 1, payload: Some(post) }
    }
}

/// Axis-aligned region. `min_x`/`max_y` is the top-left corner; the
/// top-left edge is inclusive, the bottom-right edge exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Region {
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x < self.max_x && y > self.min_y && y <= self.max_y
    }
}

/// The four children of an internal node.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Quadrants {
    bottom_left: QuadTree,
    bottom_right: QuadTree,
    top_left: QuadTree,
    top_right: QuadTree,
}

impl Quadrants {
    /// Routes a coordinate to the owning child. Boundary points go right
    /// of the vertical midline and below the horizontal one, so no point
    /// inside the parent region is ever lost.
    fn child_for_mut(&mut self, region: Region, x: f64, y: f64) -> &mut QuadTree {
        let mid_x = (region.min_x + region.max_x) / 2.0;
        let mid_y = (region.min_y + region.max_y) / 2.0;
        match (x >= mid_x, y > mid_y) {
            (false, false) => &mut self.bottom_left,
            (true, false) => &mut self.bottom_right,
            (false, true) => &mut self.top_left,
            (true, true) => &mut self.top_right,
        }
    }
}

/// Weighted region quadtree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuadTree {
    region: Region,
    min_cell_x: f64,
    min_cell_y: f64,
    max_points: u32,
    points: Vec<WeightedPoint>,
    children: Option<Box<Quadrants>>,
}

impl QuadTree {
    /// Builds a tree over `initial` points, recursively splitting every
    /// node whose weighted count exceeds `max_points`. Splitting stops at
    /// the minimum cell size; an overflowing leaf at the floor keeps its
    /// points, trading precision for bounded memory.
    pub fn new(
        top_left: GeoPoint,
        bottom_right: GeoPoint,
        min_cell_x: f64,
        min_cell_y: f64,
        max_points: u32,
        initial: Vec<WeightedPoint>,
    ) -> Result<Self> {
        if max_points < 1 {
            return Err(Error::Config("max_points must be at least 1".to_string()));
        }
        if !(min_cell_x > 0.0) || !(min_cell_y > 0.0) {
            return Err(Error::Config("minimum cell size must be positive".to_string()));
        }
        if !(top_left.lon < bottom_right.lon) || !(top_left.lat > bottom_right.lat) {
            return Err(Error::Config(format!(
                "degenerate region: top left {}, bottom right {}",
                top_left, bottom_right
            )));
        }
        let mut root = QuadTree {
            region: Region {
                min_x: top_left.lon,
                max_x: bottom_right.lon,
                min_y: bottom_right.lat,
                max_y: top_left.lat,
            },
            min_cell_x,
            min_cell_y,
            max_points,
            points: initial,
            children: None,
        };
        root.check();
        Ok(root)
    }

    /// Descends by containment to the owning leaf and appends the point.
    /// With `rebalance` the leaf is split immediately on overflow; without
    /// it the overflow is left for a later `check` pass, which lets a
    /// batch of insertions pay for a single rebalance.
    pub fn insert(&mut self, point: WeightedPoint, rebalance: bool) {
        match &mut self.children {
            Some(quadrants) => {
                quadrants.child_for_mut(self.region, point.x, point.y).insert(point, rebalance);
            }
            None => {
                self.points.push(point);
                if rebalance {
                    self.check();
                }
            }
        }
    }

    /// Splits an overflowing leaf into four equal sub-regions, reassigns
    /// each point to the sub-region containing it and repeats on the new
    /// leaves. No-op on internal nodes and on leaves at the minimum cell
    /// size; callers walking a whole tree apply it per leaf.
    pub fn check(&mut self) {
        if self.children.is_some() {
            return;
        }
        if self.leaf_weight() <= self.max_points || !self.can_split() {
            return;
        }
        self.split();
        if let Some(quadrants) = &mut self.children {
            quadrants.bottom_left.check();
            quadrants.bottom_right.check();
            quadrants.top_left.check();
            quadrants.top_right.check();
        }
    }

    /// Drops the point lists retained on internal nodes after splits, so a
    /// serialized tree carries each point once. Leaves keep their points.
    /// Idempotent.
    pub fn clear(&mut self) {
        if let Some(quadrants) = &mut self.children {
            self.points.clear();
            quadrants.bottom_left.clear();
            quadrants.bottom_right.clear();
            quadrants.top_left.clear();
            quadrants.top_right.clear();
        }
    }

    /// Structural copy. Post payloads are shared by reference (posts are
    /// immutable), so probing the copy never disturbs the original.
    pub fn deep_copy(&self) -> Self {
        self.clone()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    pub fn points(&self) -> &[WeightedPoint] {
        &self.points
    }

    pub fn region(&self) -> Region {
        self.region
    }

    pub fn max_points(&self) -> u32 {
        self.max_points
    }

    /// Weighted point count of this node's subtree.
    pub fn weight(&self) -> u32 {
        match &self.children {
            Some(quadrants) => {
                quadrants.bottom_left.weight()
                    + quadrants.bottom_right.weight()
                    + quadrants.top_left.weight()
                    + quadrants.top_right.weight()
            }
            None => self.leaf_weight(),
        }
    }

    pub fn bottom_left(&self) -> Option<&QuadTree> {
        self.children.as_ref().map(|q| &q.bottom_left)
    }

    pub fn bottom_right(&self) -> Option<&QuadTree> {
        self.children.as_ref().map(|q| &q.bottom_right)
    }

    pub fn top_left(&self) -> Option<&QuadTree> {
        self.children.as_ref().map(|q| &q.top_left)
    }

    pub fn top_right(&self) -> Option<&QuadTree> {
        self.children.as_ref().map(|q| &q.top_right)
    }

    /// All four children of an internal node, in bottom-left, bottom-right,
    /// top-left, top-right order.
    pub fn quadrants(&self) -> Option<[&QuadTree; 4]> {
        self.children
            .as_deref()
            .map(|q| [&q.bottom_left, &q.bottom_right, &q.top_left, &q.top_right])
    }

    /// Mutable variant of [`QuadTree::quadrants`].
    pub fn quadrants_mut(&mut self) -> Option<[&mut QuadTree; 4]> {
        self.children
            .as_deref_mut()
            .map(|q| [&mut q.bottom_left, &mut q.bottom_right, &mut q.top_left, &mut q.top_right])
    }

    fn leaf_weight(&self) -> u32 {
        self.points.iter().map(|p| p.weight).sum()
    }

    fn can_split(&self) -> bool {
        self.region.width() > self.min_cell_x && self.region.height() > self.min_cell_y
    }

    fn split(&mut self) {
        let mid_x = (self.region.min_x + self.region.max_x) / 2.0;
        let mid_y = (self.region.min_y + self.region.max_y) / 2.0;
        let child = |min_x: f64, max_x: f64, min_y: f64, max_y: f64| QuadTree {
            region: Region { min_x, max_x, min_y, max_y },
            min_cell_x: self.min_cell_x,
            min_cell_y: self.min_cell_y,
            max_points: self.max_points,
            points: Vec::new(),
            children: None,
        };
        let mut quadrants = Quadrants {
            bottom_left: child(self.region.min_x, mid_x, self.region.min_y, mid_y),
            bottom_right: child(mid_x, self.region.max_x, self.region.min_y, mid_y),
            top_left: child(self.region.min_x, mid_x, mid_y, self.region.max_y),
            top_right: child(mid_x, self.region.max_x, mid_y, self.region.max_y),
        };
        for point in &self.points {
            quadrants.child_for_mut(self.region, point.x, point.y).points.push(point.clone());
        }
        self.children = Some(Box::new(quadrants));
    }
}

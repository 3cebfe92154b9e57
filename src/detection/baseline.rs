//! Historic baseline construction: compresses days of raw posts into one
//! expected-density grid per recurring time bucket.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use chrono_tz::Tz;

use crate::config::EngineConfig;
use crate::core::time_bucket::{bucket_id, local_time, parse_timezone};
use crate::core::{Area, HistoricRequest, Post};
use crate::error::Result;
use crate::index::{QuadTree, WeightedPoint};

/// Builds per-bucket baseline grids for one city.
///
/// Each grid cell's weight is a robust daily average: per-date counts are
/// zero-padded to the bucket's distinct-date total (a day with no posts
/// counts as zero, not "absent") and dates beyond two standard deviations
/// above the mean are discarded, so a past event does not inflate what
/// counts as normal for that place and hour.
#[derive(Debug, Clone)]
pub struct BaselineBuilder {
    area: Area,
    grid_size: f64,
    max_points: u32,
    min_cell_x: f64,
    min_cell_y: f64,
    tz: Tz,
}

impl BaselineBuilder {
    /// Fails fast if the request's timezone name does not resolve.
    pub fn new(req: &HistoricRequest, cfg: &EngineConfig) -> Result<Self> {
        let tz = parse_timezone(&req.timezone)?;
        Ok(Self {
            area: req.area,
            grid_size: req.grid_size,
            max_points: cfg.max_points,
            min_cell_x: cfg.min_cell_x,
            min_cell_y: cfg.min_cell_y,
            tz,
        })
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Groups posts by their recurring time bucket in city-local time.
    pub fn bucket_posts(&self, posts: &[Post]) -> Result<HashMap<i64, Vec<Post>>> {
        let mut sorted: HashMap<i64, Vec<Post>> = HashMap::new();
        for post in posts {
            let id = bucket_id(post.timestamp, self.tz)?;
            sorted.entry(id).or_default().push(post.clone());
        }
        Ok(sorted)
    }

    /// Builds the baseline grid for one bucket's posts. The returned tree
    /// is already cleared for serialization.
    pub fn build_bucket(&self, posts: &[Post]) -> Result<QuadTree> {
        let (cells, num_days) = self.split_posts(posts)?;
        let mut points = Vec::new();
        for (cell, by_date) in &cells {
            let expected = expected_count(by_date, num_days);
            let weight = expected as u32;
            if weight < 1 {
                continue;
            }
            let (lat, lon) = self.cell_coords(*cell);
            points.push(WeightedPoint::cell(lon, lat, weight));
        }
        let mut tree = QuadTree::new(
            self.area.top_left,
            self.area.bottom_right,
            self.min_cell_x,
            self.min_cell_y,
            self.max_points,
            points,
        )?;
        tree.clear();
        Ok(tree)
    }

    /// Convenience composition of [`BaselineBuilder::bucket_posts`] and
    /// [`BaselineBuilder::build_bucket`] for single-threaded callers.
    pub fn build_grids(&self, posts: &[Post]) -> Result<HashMap<i64, QuadTree>> {
        let mut grids = HashMap::new();
        for (id, bucket) in self.bucket_posts(posts)? {
            grids.insert(id, self.build_bucket(&bucket)?);
        }
        Ok(grids)
    }

    /// Buckets one time bucket's posts by snapped grid cell and calendar
    /// date; returns per-cell date counts and the number of distinct dates
    /// observed anywhere in the bucket.
    fn split_posts(&self, posts: &[Post]) -> Result<(HashMap<(i64, i64), HashMap<NaiveDate, u32>>, usize)> {
        let mut cells: HashMap<(i64, i64), HashMap<NaiveDate, u32>> = HashMap::new();
        let mut dates: HashSet<NaiveDate> = HashSet::new();
        for post in posts {
            let cell = self.snap(post.lat, post.lon);
            let date = local_time(post.timestamp, self.tz)?.date_naive();
            *cells.entry(cell).or_default().entry(date).or_insert(0) += 1;
            dates.insert(date);
        }
        Ok((cells, dates.len()))
    }

    /// Snaps a coordinate to its grid cell index relative to the area's
    /// top-left corner.
    fn snap(&self, lat: f64, lon: f64) -> (i64, i64) {
        let row = ((lat - self.area.top_left.lat) / self.grid_size).floor() as i64;
        let col = ((lon - self.area.top_left.lon) / self.grid_size).floor() as i64;
        (row, col)
    }

    fn cell_coords(&self, cell: (i64, i64)) -> (f64, f64) {
        let lat = self.area.top_left.lat + cell.0 as f64 * self.grid_size;
        let lon = self.area.top_left.lon + cell.1 as f64 * self.grid_size;
        (lat, lon)
    }
}

/// Robust expected count for one cell: mean of the zero-padded per-date
/// series after discarding dates above mean + 2 sigma. A series with a
/// single data point is taken as-is; if every date is discarded the
/// expected count is zero.
fn expected_count(by_date: &HashMap<NaiveDate, u32>, num_days: usize) -> f64 {
    let mut series: Vec<f64> = by_date.values().map(|&v| f64::from(v)).collect();
    series.resize(num_days.max(series.len()), 0.0);
    if series.len() < 2 {
        return series.first().copied().unwrap_or(0.0);
    }
    let n = series.len() as f64;
    let mean = series.iter().sum::<f64>() / n;
    let variance = series.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let cutoff = mean + 2.0 * variance.sqrt();
    let survivors: Vec<f64> = series.iter().copied().filter(|&v| v <= cutoff).collect();
    if survivors.is_empty() {
        return 0.0;
    }
    survivors.iter().sum::<f64>() / survivors.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, d).unwrap()
    }

    #[test]
    fn test_trimming_is_noop_without_extremes() {
        let mut by_date = HashMap::new();
        by_date.insert(date(1), 4);
        by_date.insert(date(2), 5);
        by_date.insert(date(3), 6);
        let expected = expected_count(&by_date, 3);
        assert!((expected - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_day_padding_dilutes_single_spike() {
        let mut by_date = HashMap::new();
        by_date.insert(date(1), 10);
        // Active on 1 of 5 observed dates: series is [10, 0, 0, 0, 0].
        let expected = expected_count(&by_date, 5);
        assert!(expected < 10.0);
        // 10 exceeds mean (2.0) + 2 sigma (4.0) = 10.0? sigma = 4.0, so
        // cutoff is exactly 10.0 and the spike survives: mean stays 2.0.
        assert!((expected - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_outlier_date_is_discarded() {
        let mut by_date = HashMap::new();
        for d in 1..=29 {
            by_date.insert(date(d), 5);
        }
        by_date.insert(date(30), 500);
        let expected = expected_count(&by_date, 30);
        assert!((expected - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_single_data_point_taken_as_is() {
        let mut by_date = HashMap::new();
        by_date.insert(date(1), 7);
        assert!((expected_count(&by_date, 1) - 7.0).abs() < 1e-9);
    }
}

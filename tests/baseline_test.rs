use chrono::TimeZone;
use chrono_tz::Tz;

use urbanpulse::core::time_bucket::bucket_id;
use urbanpulse::core::{Area, GeoPoint, HistoricRequest, Post};
use urbanpulse::detection::BaselineBuilder;
use urbanpulse::EngineConfig;

fn city_area() -> Area {
    Area::new(GeoPoint::new(60.0, 30.0), GeoPoint::new(59.8, 30.6))
}

fn request(timezone: &str) -> HistoricRequest {
    HistoricRequest {
        city_id: "spb".to_string(),
        start_time: 0,
        finish_time: 0,
        timezone: timezone.to_string(),
        grid_size: 0.01,
        area: city_area(),
    }
}

fn config() -> EngineConfig {
    EngineConfig { workers: 2, max_points: 20, ..EngineConfig::default() }
}

fn post(lat: f64, lon: f64, timestamp: i64, code: &str) -> Post {
    Post {
        shortcode: code.to_string(),
        lat,
        lon,
        timestamp,
        caption: "a quiet day".to_string(),
        ..Post::default()
    }
}

/// Timestamps of every July 2024 weekday at the given Moscow hour.
fn july_weekday_hours(hour: u32) -> Vec<i64> {
    let tz: Tz = "Europe/Moscow".parse().unwrap();
    (1..=31)
        .filter_map(|day| tz.with_ymd_and_hms(2024, 7, day, hour, 30, 0).single())
        .filter(|dt| {
            use chrono::Datelike;
            !matches!(dt.weekday(), chrono::Weekday::Sat | chrono::Weekday::Sun)
        })
        .map(|dt| dt.timestamp())
        .collect()
}

#[test]
fn test_invalid_timezone_fails_fast() {
    let err = BaselineBuilder::new(&request("Mars/Olympus"), &config());
    assert!(err.is_err());
}

#[test]
fn test_outlier_day_does_not_inflate_baseline() {
    let builder = BaselineBuilder::new(&request("Europe/Moscow"), &config()).unwrap();
    let days = july_weekday_hours(10);
    assert_eq!(days.len(), 23);

    let mut posts = Vec::new();
    // A steady five posts per weekday in one cell, and one day with five
    // hundred.
    for (di, ts) in days.iter().enumerate() {
        let count = if di == 3 { 500 } else { 5 };
        for i in 0..count {
            posts.push(post(59.925, 30.315, *ts, &format!("d{}p{}", di, i)));
        }
    }

    let sorted = builder.bucket_posts(&posts).unwrap();
    assert_eq!(sorted.len(), 1);
    let bucket = sorted.values().next().unwrap();
    let tree = builder.build_bucket(bucket).unwrap();
    assert_eq!(tree.weight(), 5);
}

#[test]
fn test_sparse_cell_is_diluted_by_quiet_days() {
    let builder = BaselineBuilder::new(&request("Europe/Moscow"), &config()).unwrap();
    let days = july_weekday_hours(10);

    let mut posts = Vec::new();
    // A busy cell active every day keeps the bucket's date range wide.
    for (di, ts) in days.iter().enumerate() {
        for i in 0..6 {
            posts.push(post(59.925, 30.315, *ts, &format!("busy{}p{}", di, i)));
        }
    }
    // A cell active on a single day out of 23.
    for i in 0..4 {
        posts.push(post(59.875, 30.455, days[7], &format!("quiet{}", i)));
    }

    let tree = builder.build_grids(&posts).unwrap().into_values().next().unwrap();
    // The sparse cell's series pads to [4, 0, 0, ...]: its average rounds
    // below one post per day and the cell drops out entirely.
    assert_eq!(tree.weight(), 6);
}

#[test]
fn test_posts_split_across_buckets() {
    let builder = BaselineBuilder::new(&request("Europe/Moscow"), &config()).unwrap();
    let tz: Tz = "Europe/Moscow".parse().unwrap();
    let morning = july_weekday_hours(9);
    let evening = july_weekday_hours(19);
    let weekend = tz.with_ymd_and_hms(2024, 7, 6, 9, 30, 0).unwrap().timestamp();

    let mut posts = Vec::new();
    for (i, ts) in morning.iter().chain(evening.iter()).enumerate() {
        posts.push(post(59.9, 30.2, *ts, &format!("p{}", i)));
    }
    posts.push(post(59.9, 30.2, weekend, "w0"));

    let sorted = builder.bucket_posts(&posts).unwrap();
    assert_eq!(sorted.len(), 3);
    assert!(sorted.contains_key(&bucket_id(morning[0], tz).unwrap()));
    assert!(sorted.contains_key(&bucket_id(evening[0], tz).unwrap()));
    assert!(sorted.contains_key(&bucket_id(weekend, tz).unwrap()));
}

#[test]
fn test_grids_come_back_cleared() {
    let builder = BaselineBuilder::new(&request("Europe/Moscow"), &config()).unwrap();
    let days = july_weekday_hours(12);

    let mut posts = Vec::new();
    // Spread activity over enough cells to force the tree to split.
    for (ci, cell) in (0..30).map(|c| (c, 0.015 * f64::from(c))).collect::<Vec<_>>() {
        for (di, ts) in days.iter().enumerate() {
            for i in 0..2 {
                posts.push(post(
                    59.81 + cell / 4.0,
                    30.05 + cell,
                    *ts,
                    &format!("c{}d{}p{}", ci, di, i),
                ));
            }
        }
    }

    let tree = builder.build_grids(&posts).unwrap().into_values().next().unwrap();
    assert!(!tree.is_leaf());
    // Internal nodes hold no points after the pre-serialization clear.
    assert!(tree.points().is_empty());
    assert!(tree.weight() > 0);
}

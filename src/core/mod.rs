//! Core domain records shared by every stage of the detection pipeline.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub mod time_bucket;

/// A geographic coordinate, WGS84.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4},{:.4}", self.lat, self.lon)
    }
}

/// Rectangular spatial extent of a city: `top_left` is the north-west
/// corner, `bottom_right` the south-east one.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Area {
    pub top_left: GeoPoint,
    pub bottom_right: GeoPoint,
}

impl Area {
    pub fn new(top_left: GeoPoint, bottom_right: GeoPoint) -> Self {
        Self { top_left, bottom_right }
    }
}

/// A single geotagged social post. Immutable once ingested.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    /// Unique short identifier, the join key across the whole pipeline.
    pub shortcode: String,
    pub caption: String,
    pub image_url: String,
    /// Unix seconds.
    pub timestamp: i64,
    pub lat: f64,
    pub lon: f64,
    pub author_id: String,
    pub location_id: String,
    pub comments_count: i64,
    pub likes_count: i64,
    pub is_video: bool,
    pub is_ad: bool,
}

/// A detected spatio-temporal event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub center: GeoPoint,
    /// Shortcodes of the posts backing this event.
    pub post_codes: Vec<String>,
    /// Tags sorted by descending occurrence count.
    pub tags: Vec<String>,
    /// The most frequent tag.
    pub title: String,
    /// Unix seconds, window start.
    pub start: i64,
    /// Unix seconds, window finish.
    pub finish: i64,
}

impl Event {
    /// Renders the event as a JSON document for outward dumps and logs.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Session(e.to_string()))
    }
}

/// Key for pulling previously stored events: one hour window over an area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpatioHourInterval {
    /// Unix seconds of the hour window start.
    pub hour: i64,
    pub area: Area,
}

/// Parameters of one historic-grid generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricRequest {
    pub city_id: String,
    pub start_time: i64,
    pub finish_time: i64,
    /// IANA timezone name of the city, e.g. "Europe/Moscow".
    pub timezone: String,
    /// Side length of a baseline grid cell, in degrees.
    pub grid_size: f64,
    pub area: Area,
}

/// Parameters of one event-detection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRequest {
    pub city_id: String,
    pub start_time: i64,
    pub finish_time: i64,
    /// IANA timezone name of the city.
    pub timezone: String,
    /// Tags that never form events (city name, generic spam tags).
    pub filter_tags: HashSet<String>,
}

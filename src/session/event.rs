//! Live event-detection session: probes sliding windows against the
//! historic baseline and persists the events it finds.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, error, info};

use crate::config::EngineConfig;
use crate::core::time_bucket::{bucket_id, parse_timezone};
use crate::core::{Event, EventRequest, SpatioHourInterval};
use crate::detection::{AnomalyDetector, EventClusterer};
use crate::error::Result;
use crate::index::QuadTree;
use crate::session::SessionStatus;
use crate::storage::{decode_grid, DataStore};

/// Window length in seconds.
const WINDOW_SECONDS: i64 = 3600;
/// Step between consecutive window starts, in seconds.
const STEP_SECONDS: i64 = 600;

/// Background pipeline of one event-detection run.
///
/// Windows are processed strictly in chronological order: a later window
/// may read events an earlier one pushed. The first store failure fails
/// the whole remaining sequence.
pub struct EventSession {
    cfg: EngineConfig,
    req: EventRequest,
    store: Arc<dyn DataStore>,
    status: Arc<RwLock<SessionStatus>>,
}

impl EventSession {
    pub(crate) fn new(
        cfg: EngineConfig,
        req: EventRequest,
        store: Arc<dyn DataStore>,
        status: Arc<RwLock<SessionStatus>>,
    ) -> Self {
        Self { cfg, req, store, status }
    }

    /// Runs the pipeline to completion and records the terminal status.
    pub(crate) fn run(self) {
        info!(city = %self.req.city_id, "event session started");
        match self.detect_events() {
            Ok(count) => {
                *self.status.write().unwrap() = SessionStatus::Finished;
                info!(city = %self.req.city_id, events = count, "event session finished");
            }
            Err(err) => {
                error!(city = %self.req.city_id, error = %err, "event session failed");
                *self.status.write().unwrap() = SessionStatus::Failed;
            }
        }
    }

    fn detect_events(&self) -> Result<usize> {
        let tz = parse_timezone(&self.req.timezone)?;
        let windows = windows(self.req.start_time, self.req.finish_time);

        let mut bucket_ids = Vec::new();
        for &(start, _) in &windows {
            let id = bucket_id(start, tz)?;
            if !bucket_ids.contains(&id) {
                bucket_ids.push(id);
            }
        }
        let blobs = self.store.pull_grid(&self.req.city_id, &bucket_ids)?;
        let mut grids: HashMap<i64, QuadTree> = HashMap::new();
        for (id, blob) in &blobs {
            grids.insert(*id, decode_grid(blob)?);
        }

        let detector = AnomalyDetector::new(self.cfg.max_points);
        let clusterer =
            EventClusterer::new(self.cfg.max_points, self.req.filter_tags.clone())?;

        let mut total = 0;
        for (start, finish) in windows {
            let id = bucket_id(start, tz)?;
            let Some(grid) = grids.get(&id) else {
                // A bucket with no historic activity has no baseline to
                // probe against.
                debug!(bucket = id, window = start, "no baseline grid, skipping window");
                continue;
            };
            let (posts, area) = self.store.select_posts(&self.req.city_id, start, finish)?;
            if posts.is_empty() {
                continue;
            }
            let interval = SpatioHourInterval { hour: start, area };
            let stored = self.store.pull_events(&self.req.city_id, &interval)?;

            let (mut tree, found) = detector.probe(grid, &posts);
            if !found {
                continue;
            }
            let events = clusterer.find_events(&mut tree, start, finish);
            if events.is_empty() {
                continue;
            }
            let merged = merge_events(events, &stored);
            for event in &merged {
                debug!(event = %event.to_json().unwrap_or_default(), "event detected");
            }
            self.store.push_events(&self.req.city_id, &merged)?;
            total += merged.len();
        }
        Ok(total)
    }
}

/// Fixed-length look-back windows advancing in [`STEP_SECONDS`] steps
/// across `[start, finish]`; only complete windows are produced.
fn windows(start: i64, finish: i64) -> Vec<(i64, i64)> {
    let mut res = Vec::new();
    let mut t = start;
    while t + WINDOW_SECONDS <= finish {
        res.push((t, t + WINDOW_SECONDS));
        t += STEP_SECONDS;
    }
    res
}

/// Joins freshly clustered events against previously stored ones: an
/// event sharing at least one post with a stored event is an update of
/// it — posts and tags unioned, start inherited — while the rest pass
/// through as new.
fn merge_events(events: Vec<Event>, stored: &[Event]) -> Vec<Event> {
    events
        .into_iter()
        .map(|mut event| {
            let overlap = stored
                .iter()
                .find(|old| old.post_codes.iter().any(|code| event.post_codes.contains(code)));
            if let Some(old) = overlap {
                for code in &old.post_codes {
                    if !event.post_codes.contains(code) {
                        event.post_codes.push(code.clone());
                    }
                }
                event.post_codes.sort();
                for tag in &old.tags {
                    if !event.tags.contains(tag) {
                        event.tags.push(tag.clone());
                    }
                }
                event.start = old.start;
            }
            event
        })
        .collect()
}

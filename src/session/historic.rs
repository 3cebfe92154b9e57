//! Historic-grid generation session: compresses a city's post history
//! into per-bucket baseline grids and pushes them in one bulk call.

use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::{Arc, Mutex, RwLock};
use std::thread;

use tracing::{error, info};

use crate::config::EngineConfig;
use crate::core::time_bucket::bucket_id;
use crate::core::{HistoricRequest, Post};
use crate::detection::BaselineBuilder;
use crate::error::{Error, Result};
use crate::session::{join_workers, SessionStatus};
use crate::storage::{encode_grid, DataStore};

/// Background pipeline of one historic-grid run.
///
/// Stages: select all posts, bucket them by time bucket (worker pool),
/// build and encode one grid per populated bucket (worker pool), bulk
/// push. Any stage error discards all work and fails the session.
pub struct HistoricSession {
    cfg: EngineConfig,
    req: HistoricRequest,
    store: Arc<dyn DataStore>,
    status: Arc<RwLock<SessionStatus>>,
}

impl HistoricSession {
    pub(crate) fn new(
        cfg: EngineConfig,
        req: HistoricRequest,
        store: Arc<dyn DataStore>,
        status: Arc<RwLock<SessionStatus>>,
    ) -> Self {
        Self { cfg, req, store, status }
    }

    /// Runs the pipeline to completion and records the terminal status.
    pub(crate) fn run(self) {
        info!(city = %self.req.city_id, "historic session started");
        match self.generate_grids() {
            Ok(count) => {
                *self.status.write().unwrap() = SessionStatus::Finished;
                info!(city = %self.req.city_id, grids = count, "historic session finished");
            }
            Err(err) => {
                error!(city = %self.req.city_id, error = %err, "historic session failed");
                *self.status.write().unwrap() = SessionStatus::Failed;
            }
        }
    }

    fn generate_grids(&self) -> Result<usize> {
        let builder = BaselineBuilder::new(&self.req, &self.cfg)?;
        let (posts, _) =
            self.store.select_posts(&self.req.city_id, self.req.start_time, self.req.finish_time)?;
        let sorted = self.sort_posts(&builder, posts)?;
        let grids = self.build_grids(&builder, sorted)?;
        let count = grids.len();
        self.store.push_grid(&self.req.city_id, &grids)?;
        Ok(count)
    }

    /// First pool: workers drain a rendezvous channel of posts and group
    /// them by time bucket into one shared map.
    fn sort_posts(
        &self,
        builder: &BaselineBuilder,
        posts: Vec<Post>,
    ) -> Result<HashMap<i64, Vec<Post>>> {
        let sorted = Arc::new(Mutex::new(HashMap::<i64, Vec<Post>>::new()));
        let (tx, rx) = mpsc::sync_channel::<Post>(0);
        let rx = Arc::new(Mutex::new(rx));
        let mut workers = Vec::new();
        for _ in 0..self.cfg.workers {
            let rx = Arc::clone(&rx);
            let sorted = Arc::clone(&sorted);
            let tz = builder.timezone();
            workers.push(thread::spawn(move || -> Result<()> {
                loop {
                    let received = { rx.lock().unwrap().recv() };
                    let Ok(post) = received else {
                        return Ok(());
                    };
                    let id = bucket_id(post.timestamp, tz)?;
                    sorted.lock().unwrap().entry(id).or_default().push(post);
                }
            }));
        }
        // Only workers may hold the receiver: once they are all gone the
        // channel disconnects and the send loop below stops blocking.
        drop(rx);
        for post in posts {
            // Send only fails once every worker is gone; the join below
            // reports why.
            if tx.send(post).is_err() {
                break;
            }
        }
        drop(tx);
        join_workers(workers)?;
        unwrap_shared(sorted)
    }

    /// Second pool: workers build and encode one baseline grid per
    /// populated bucket into the shared blob map.
    fn build_grids(
        &self,
        builder: &BaselineBuilder,
        sorted: HashMap<i64, Vec<Post>>,
    ) -> Result<HashMap<i64, Vec<u8>>> {
        let grids = Arc::new(Mutex::new(HashMap::<i64, Vec<u8>>::new()));
        let (tx, rx) = mpsc::sync_channel::<(i64, Vec<Post>)>(0);
        let rx = Arc::new(Mutex::new(rx));
        let mut workers = Vec::new();
        for _ in 0..self.cfg.workers {
            let rx = Arc::clone(&rx);
            let grids = Arc::clone(&grids);
            let builder = builder.clone();
            workers.push(thread::spawn(move || -> Result<()> {
                loop {
                    let received = { rx.lock().unwrap().recv() };
                    let Ok((id, posts)) = received else {
                        return Ok(());
                    };
                    let tree = builder.build_bucket(&posts)?;
                    let blob = encode_grid(&tree)?;
                    grids.lock().unwrap().insert(id, blob);
                }
            }));
        }
        drop(rx);
        for bucket in sorted {
            if tx.send(bucket).is_err() {
                break;
            }
        }
        drop(tx);
        join_workers(workers)?;
        unwrap_shared(grids)
    }
}

/// Reclaims a stage's shared map once all workers have joined.
fn unwrap_shared<T>(shared: Arc<Mutex<T>>) -> Result<T> {
    Arc::try_unwrap(shared)
        .map_err(|_| Error::Session("stage map still shared after join".to_string()))
        .map(|mutex| mutex.into_inner().unwrap())
}

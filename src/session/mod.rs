//! Session orchestration: background pipelines for historic-grid
//! generation and live event detection, tracked by an in-memory registry
//! and observed by polling.

use std::thread::JoinHandle;

use crate::error::{Error, Result};

pub mod event;
pub mod historic;
pub mod registry;

pub use event::EventSession;
pub use historic::HistoricSession;
pub use registry::SessionRegistry;

/// Lifecycle of one session. `Running` moves to exactly one of the
/// terminal states and never leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Running,
    Finished,
    Failed,
}

impl SessionStatus {
    pub fn label(self) -> &'static str {
        match self {
            SessionStatus::Running => "running",
            SessionStatus::Finished => "finished",
            SessionStatus::Failed => "failed",
        }
    }

    /// True once the session can no longer change state.
    pub fn is_terminal(self) -> bool {
        self != SessionStatus::Running
    }
}

/// Fan-in barrier for one worker-pool stage: waits for every worker and
/// surfaces the first failure.
pub(crate) fn join_workers(workers: Vec<JoinHandle<Result<()>>>) -> Result<()> {
    let mut first_err = None;
    for handle in workers {
        match handle.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => first_err = first_err.or(Some(e)),
            Err(_) => {
                first_err =
                    first_err.or_else(|| Some(Error::Session("worker thread panicked".to_string())));
            }
        }
    }
    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

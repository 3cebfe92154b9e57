//! # urbanpulse
//!
//! urbanpulse is an engine for detecting spatio-temporal events in a
//! city's geotagged social activity. It looks at the same streets twice:
//! first at months of history, compressed into per-hour expected-density
//! grids, and then at the live window of the last hour, probed against
//! the matching grid. Cells where live activity breaks the historic
//! expectation are clustered by shared hashtags and mentions into event
//! records.
//!
//! ## Features
//!
//! - Weighted region quadtree as both baseline store and live probe
//! - Outlier-trimmed daily averages, robust to one-off spikes
//! - Tag-co-occurrence clustering with majority-vote tag pruning
//! - Background historic/event sessions over an abstract data store
//!
//! ## Example
//!
//! ```rust
//! use urbanpulse::Result;
//!
//! fn example() -> Result<()> {
//!     println!("urbanpulse event-detection engine");
//!     Ok(())
//! }
//! ```

#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::float_cmp)]

/// Engine configuration
pub mod config;

/// Core domain records and time-bucket arithmetic
pub mod core;

/// Baseline construction, anomaly probing and event clustering
pub mod detection;

/// Weighted spatial quadtree
pub mod index;

/// Session orchestration and the session registry
pub mod session;

/// The external DataStore boundary and the grid blob codec
pub mod storage;

pub mod error;

// Re-export commonly used types
pub use config::EngineConfig;
pub use error::{Error, Result};

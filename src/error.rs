//! Error types for the event-detection engine

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the engine
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error (invalid timezone, degenerate area, bad thresholds)
    #[error("Configuration error: {0}")]
    Config(String),

    /// External data store error
    #[error("Store error: {0}")]
    Store(String),

    /// Serialized grid could not be encoded or decoded
    #[error("Grid error: {0}")]
    Grid(String),

    /// Session pipeline error
    #[error("Session error: {0}")]
    Session(String),

    /// Unknown session id
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

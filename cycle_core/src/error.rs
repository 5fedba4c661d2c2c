//! Errors raised at the edges of the tracker.
//!
//! Prediction and classification never fail; everything here comes from the
//! history store, the reminder file, config loading or user input.

use std::io;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// History or reminder file couldn't be (de)serialized
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Config parsed but holds a value we can't use
    #[error("Configuration error: {0}")]
    Config(String),

    /// The history would end up inconsistent (duplicate id)
    #[error("History error: {0}")]
    Store(String),

    /// No record answers to the given id or prefix
    #[error("Record not found: {0}")]
    RecordNotFound(String),

    /// Rejected user input: bad flow, end before start, ambiguous prefix
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

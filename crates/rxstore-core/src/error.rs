//! Error types for rxstore-core

use thiserror::Error;

/// Core error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Action type already registered: {0}")]
    DuplicateActionType(String),

    #[error("Malformed async action type {0}: START, END and ERR must be distinct")]
    MalformedAsyncType(String),

    #[error("Stream closed")]
    StreamClosed,
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

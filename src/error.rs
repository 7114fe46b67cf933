use std::io;

use thiserror::Error;

/// Unified error type for the storage core.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error from disk operations (open, write, read, fsync).
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// Data corruption detected (checksum mismatch, bad magic, bad varint, etc).
    #[error("Corruption: {0}")]
    Corruption(String),
    /// Operation attempted on an object that can no longer serve it.
    #[error("Invalid state: {0}")]
    InvalidState(String),
    /// Caller handed in something the API cannot accept.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    pub fn corruption(msg: impl Into<String>) -> Self {
        Error::Corruption(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Error::InvalidState(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    pub fn is_corruption(&self) -> bool {
        matches!(self, Error::Corruption(_))
    }
}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

//! Error types for reel-slideshow
//!
//! Defines crate-specific error types using thiserror for clear error propagation.
//! Fetch failures inside a load cycle never surface here: they are recorded in the
//! asset's load status and reported through the cycle's completion result.

use crate::stores::StoreError;
use thiserror::Error;

/// Main error type for reel-slideshow
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Collaborator store errors outside a load cycle (audio store maintenance)
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Audio backend errors (open, probe, decode)
    #[error("Audio error: {0}")]
    Audio(String),

    /// Output device errors (enumerate, open, stream)
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Index outside the session's asset list
    #[error("Invalid index {index} (session has {len} assets)")]
    InvalidIndex { index: usize, len: usize },

    /// Session actor has shut down
    #[error("Slideshow session closed")]
    SessionClosed,

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors from the shared library
    #[error(transparent)]
    Common(#[from] reel_common::Error),
}

/// Convenience Result type using reel-slideshow Error
pub type Result<T> = std::result::Result<T, Error>;

//! Error types for Mizban.
//!
//! This module provides a unified error type for all Mizban operations,
//! with specific variants for the failure modes the HTTP layer needs to
//! distinguish.

use std::io;

use thiserror::Error;

/// A specialized `Result` type for Mizban operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for Mizban.
#[derive(Error, Debug)]
pub enum Error {
    /// Unknown upload session id
    #[error("upload session not found")]
    SessionNotFound,

    /// A chunked upload request failed validation
    #[error("invalid upload request: {0}")]
    InvalidUpload(String),

    /// Finalize was requested before every chunk arrived
    #[error("upload incomplete: {missing_chunks} chunks missing")]
    IncompleteUpload {
        /// Number of chunks still outstanding
        missing_chunks: usize,
    },

    /// A relative path or filename would escape the shared root
    #[error("unsafe path")]
    UnsafePath,

    /// Configuration could not be loaded or persisted
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Internal error (should not happen)
    #[error("internal error: {0}")]
    Internal(String),
}

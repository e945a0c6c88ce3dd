// src/error.rs
//! Error types for the backup engine

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("destination root does not exist or is not a directory: {0}")]
    DestinationMissing(PathBuf),

    #[error("source root is not a usable directory: {0}")]
    InvalidSourceRoot(PathBuf),

    #[error("catalog database error: {0}")]
    Catalog(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid exclude pattern: {0}")]
    Exclude(#[from] regex::Error),

    #[error("short write for block {hash}: wrote {written} of {expected} bytes")]
    ShortBlockWrite {
        hash: String,
        written: usize,
        expected: usize,
    },

    #[error("operation interrupted by user")]
    Interrupted,
}

pub type Result<T> = std::result::Result<T, Error>;

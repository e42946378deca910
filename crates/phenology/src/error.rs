//! Error types for the phenology crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading phenology data.
#[derive(Error, Debug)]
pub enum PhenologyError {
    #[error("Failed to read {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed record on line {line}: {message}")]
    MalformedRecord { line: usize, message: String },

    #[error("Projection error: {0}")]
    Projection(#[from] projection::ProjectionError),

    #[error(transparent)]
    Sim(#[from] sim_common::SimError),
}

/// Result type for phenology operations.
pub type Result<T> = std::result::Result<T, PhenologyError>;

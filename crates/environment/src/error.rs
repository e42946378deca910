//! Error types for the environment crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading templates or climate indices.
#[derive(Error, Debug)]
pub enum EnvironmentError {
    #[error("Failed to read {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Crop template has no rotation for crop '{0}'")]
    MissingCropRotation(String),

    #[error("Projection error: {0}")]
    Projection(#[from] projection::ProjectionError),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for environment operations.
pub type Result<T> = std::result::Result<T, EnvironmentError>;

//! Error types for the crop ensemble pipeline.

use thiserror::Error;

/// Result type alias using SimError.
pub type SimResult<T> = Result<T, SimError>;

/// Primary error type shared by the producer and consumer side.
#[derive(Debug, Error)]
pub enum SimError {
    // === Data Errors ===
    #[error("Data not available: {0}")]
    DataUnavailable(String),

    #[error("Invalid grid: {0}")]
    InvalidGrid(String),

    #[error("Invalid date '{0}'")]
    InvalidDate(String),

    // === Configuration Errors ===
    #[error("Configuration mismatch: {0}")]
    ConfigMismatch(String),

    #[error("Invalid setup {id}: {message}")]
    InvalidSetup { id: u32, message: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // === Infrastructure Errors ===
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Transport failure: {0}")]
    Transport(String),
}

impl SimError {
    /// Whether the error ends the whole run rather than a single setup or message.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SimError::Transport(_))
    }

    /// Whether the error is recovered locally by falling back to a default.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SimError::DataUnavailable(_) | SimError::ConfigMismatch(_) | SimError::Upstream(_)
        )
    }
}

impl From<serde_json::Error> for SimError {
    fn from(err: serde_json::Error) -> Self {
        SimError::Serialization(format!("JSON error: {}", err))
    }
}

impl From<serde_yaml::Error> for SimError {
    fn from(err: serde_yaml::Error) -> Self {
        SimError::Serialization(format!("YAML error: {}", err))
    }
}

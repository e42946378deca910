//! Error types for channels and the soil database.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Channel closed")]
    ChannelClosed,

    #[error("Consumer group {group} not found on stream {stream}")]
    MissingGroup { stream: String, group: String },

    #[error("Malformed stream entry {id}: {message}")]
    MalformedEntry { id: String, message: String },

    #[error("Invalid soil profile {soil_id}: {message}")]
    InvalidProfile { soil_id: i64, message: String },
}

impl StorageError {
    /// Whether the error means the transport is gone.
    pub fn is_transport(&self) -> bool {
        matches!(self, StorageError::Redis(_) | StorageError::ChannelClosed)
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;

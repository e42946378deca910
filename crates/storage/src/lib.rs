//! Storage and transport abstractions for the producer and consumer.
//!
//! Provides unified interfaces for:
//! - Outbound job and inbound result channels (in-process or Redis Streams)
//! - The soil profile database (SQLite)
//! - A caller-owned soil profile cache

pub mod channel;
pub mod error;
pub mod queue;
pub mod soil_cache;
pub mod soil_store;

pub use channel::{job_channel, result_channel, ChannelJobSink, ChannelResultSource, JobSink, OutboundJob, ResultSource};
pub use error::{Result, StorageError};
pub use queue::{connect_with_retry, wait_for_room, QueueDepth, RedisJobSink, RedisResultSource, StreamConfig};
pub use soil_cache::{CacheStats, SoilProfileCache};
pub use soil_store::{SoilProfileStore, SqliteSoilStore};

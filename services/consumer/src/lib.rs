//! Crop ensemble result consumer.
//!
//! Reads worker results until the end-of-stream sentinel and writes one CSV
//! file per setup and location.

pub mod collector;
pub mod config;
pub mod output;

pub use collector::{CollectorError, CollectorState, CollectorStats, ResultCollector};
pub use config::{load_consumer_config, validate_consumer_config, ConsumerConfig};

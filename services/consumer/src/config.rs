//! Consumer configuration.
//!
//! Every section has a default, so the consumer also runs without a file.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use storage::StreamConfig;

// ============================================================================
// Consumer Configuration (consumer.yaml)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerConfig {
    /// Root of the per-setup output directories
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,
    #[serde(default)]
    pub channel: ChannelConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

fn default_out_dir() -> PathBuf {
    PathBuf::from("out")
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            out_dir: default_out_dir(),
            channel: ChannelConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    #[serde(default)]
    pub streams: StreamConfig,
    /// Seconds between connection attempts
    #[serde(default = "default_retry_interval")]
    pub retry_interval_secs: u64,
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_retry_interval() -> u64 {
    5
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            redis_url: default_redis_url(),
            streams: StreamConfig::default(),
            retry_interval_secs: default_retry_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_listen")]
    pub listen: String,
}

fn default_metrics_listen() -> String {
    "0.0.0.0:9101".to_string()
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: default_metrics_listen(),
        }
    }
}

// ============================================================================
// Loading Functions
// ============================================================================

pub fn load_consumer_config<P: AsRef<Path>>(path: P) -> Result<ConsumerConfig> {
    let config: ConsumerConfig = sim_common::config::load_yaml(path.as_ref())
        .with_context(|| format!("Failed to load consumer config from {:?}", path.as_ref()))?;
    Ok(config)
}

// ============================================================================
// Validation
// ============================================================================

pub fn validate_consumer_config(config: &ConsumerConfig) -> Result<()> {
    anyhow::ensure!(
        !config.out_dir.as_os_str().is_empty(),
        "out_dir must not be empty"
    );
    anyhow::ensure!(
        config.channel.retry_interval_secs > 0,
        "channel.retry_interval_secs must be greater than 0"
    );
    anyhow::ensure!(
        !config.channel.streams.results_stream.is_empty(),
        "channel.streams.results_stream must not be empty"
    );
    anyhow::ensure!(
        !config.channel.streams.results_group.is_empty()
            && !config.channel.streams.consumer_name.is_empty(),
        "channel.streams.results_group and consumer_name must not be empty"
    );

    if config.metrics.enabled {
        config
            .metrics
            .listen
            .parse::<SocketAddr>()
            .with_context(|| format!("Invalid metrics listen address '{}'", config.metrics.listen))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config: ConsumerConfig = sim_common::config::parse_yaml("{}").unwrap();
        assert_eq!(config.out_dir, PathBuf::from("out"));
        assert_eq!(config.channel.retry_interval_secs, 5);
        assert!(!config.metrics.enabled);
        assert!(validate_consumer_config(&config).is_ok());
    }

    #[test]
    fn test_env_substitution_in_out_dir() {
        std::env::set_var("CONSUMER_TEST_OUT", "/data/results");
        let config: ConsumerConfig =
            sim_common::config::parse_yaml("out_dir: ${CONSUMER_TEST_OUT}/run1").unwrap();
        assert_eq!(config.out_dir, PathBuf::from("/data/results/run1"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("consumer.yaml");
        std::fs::write(
            &path,
            "out_dir: ./results\nchannel:\n  redis_url: redis://queue:6379\n",
        )
        .unwrap();

        let config = load_consumer_config(&path).unwrap();
        assert_eq!(config.out_dir, PathBuf::from("./results"));
        assert_eq!(config.channel.redis_url, "redis://queue:6379");
    }

    #[test]
    fn test_validation_rejects_zero_retry_interval() {
        let mut config = ConsumerConfig::default();
        config.channel.retry_interval_secs = 0;
        assert!(validate_consumer_config(&config).is_err());
    }
}

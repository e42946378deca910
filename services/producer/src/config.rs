//! Producer configuration.
//!
//! Loaded from a YAML file with `${VAR}` / `${VAR:-default}` substitution,
//! then overridden by command line flags and validated.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use storage::StreamConfig;

// ============================================================================
// Producer Configuration (producer.yaml)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerConfig {
    /// Setup ids to run, in order
    #[serde(default)]
    pub run_setups: Vec<u32>,
    pub setups_file: PathBuf,
    pub paths: PathsConfig,
    pub templates: TemplatesConfig,
    pub grids: GridsConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub replay: Option<ReplayConfig>,
    #[serde(default)]
    pub channel: ChannelConfig,
    #[serde(default)]
    pub debug: DebugConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Climate data root as seen by this process. Holds the
    /// `latlon-to-rowcol.json` index of every climate data set.
    pub climate_dir: PathBuf,
    /// Climate data root as seen by the workers. Prefixed verbatim to the
    /// climate file paths written into jobs.
    pub worker_climate_dir: String,
    /// Directory of the per-crop seed/harvest tables
    pub phenology_dir: PathBuf,
    pub soil_db: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplatesConfig {
    pub sim_json: PathBuf,
    pub site_json: PathBuf,
    pub crop_json: PathBuf,
}

/// Raster layers. All layers share the CRS of the soil grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridsConfig {
    pub soil: PathBuf,
    pub crop_mask: PathBuf,
    #[serde(default)]
    pub elevation: Option<PathBuf>,
    #[serde(default)]
    pub slope: Option<PathBuf>,
    #[serde(default)]
    pub land_use: Option<PathBuf>,
}

/// Row range of a grid scan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanConfig {
    #[serde(default)]
    pub start_row: usize,
    /// Last row to scan; scans to the end when unset
    #[serde(default)]
    pub end_row: Option<usize>,
    /// Treat `end_row` as the first row not scanned
    #[serde(default)]
    pub end_row_exclusive: bool,
}

/// Replay of an external set of climate files instead of a grid scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Directory searched recursively for `*_<row>_<col>.csv` files
    pub climate_files_dir: PathBuf,
    /// `[[row, col], [lat, lon]]` index of the replayed climate cells
    pub rowcol_to_latlon: PathBuf,
    /// Directory the files are found under on the workers. Defaults to
    /// `climate_files_dir`.
    #[serde(default)]
    pub worker_climate_files_dir: Option<String>,
    /// Use only the first N files
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Wait until the channel has room for each job
    #[default]
    Awaited,
    /// Push without waiting
    FireAndForget,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub redis_url: String,
    #[serde(default)]
    pub dispatch: DispatchMode,
    #[serde(default)]
    pub streams: StreamConfig,
    /// Seconds between connection attempts
    #[serde(default = "default_retry_interval")]
    pub retry_interval_secs: u64,
}

fn default_retry_interval() -> u64 {
    5
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            dispatch: DispatchMode::default(),
            streams: StreamConfig::default(),
            retry_interval_secs: default_retry_interval(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DebugConfig {
    /// Build jobs without sending them
    #[serde(default)]
    pub dry_run: bool,
    /// Directory the first jobs of every setup are written to
    #[serde(default)]
    pub write_dir: Option<PathBuf>,
    #[serde(default = "default_write_count")]
    pub write_count: usize,
}

fn default_write_count() -> usize {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_listen")]
    pub listen: String,
}

fn default_metrics_listen() -> String {
    "0.0.0.0:9100".to_string()
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
// Command Line Overrides
// ============================================================================

/// Values given on the command line. Each set field replaces the file value.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub run_setups: Option<Vec<u32>>,
    pub start_row: Option<usize>,
    pub end_row: Option<usize>,
    pub sim_json: Option<PathBuf>,
    pub site_json: Option<PathBuf>,
    pub crop_json: Option<PathBuf>,
    pub setups_file: Option<PathBuf>,
    pub dry_run: bool,
}

impl ProducerConfig {
    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(ids) = overrides.run_setups {
            self.run_setups = ids;
        }
        if let Some(row) = overrides.start_row {
            self.scan.start_row = row;
        }
        if let Some(row) = overrides.end_row {
            self.scan.end_row = Some(row);
        }
        if let Some(path) = overrides.sim_json {
            self.templates.sim_json = path;
        }
        if let Some(path) = overrides.site_json {
            self.templates.site_json = path;
        }
        if let Some(path) = overrides.crop_json {
            self.templates.crop_json = path;
        }
        if let Some(path) = overrides.setups_file {
            self.setups_file = path;
        }
        if overrides.dry_run {
            self.debug.dry_run = true;
        }
    }
}

/// Parse a run-setups list such as `[1,2,7]` or `1,2,7`.
pub fn parse_run_setups(value: &str) -> Result<Vec<u32>> {
    let trimmed = value.trim().trim_start_matches('[').trim_end_matches(']');
    trimmed
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<u32>()
                .with_context(|| format!("Invalid setup id '{}'", part))
        })
        .collect()
}

// ============================================================================
// Loading Functions
// ============================================================================

/// Load and parse the producer config. Validation runs after overrides are
/// applied, see [`validate_producer_config`].
pub fn load_producer_config<P: AsRef<Path>>(path: P) -> Result<ProducerConfig> {
    let config: ProducerConfig = sim_common::config::load_yaml(path.as_ref())
        .with_context(|| format!("Failed to load producer config from {:?}", path.as_ref()))?;
    Ok(config)
}

// ============================================================================
// Validation
// ============================================================================

pub fn validate_producer_config(config: &ProducerConfig) -> Result<()> {
    anyhow::ensure!(
        !config.run_setups.is_empty(),
        "No setups to run, set run_setups or pass --run-setups"
    );

    if let Some(end_row) = config.scan.end_row {
        anyhow::ensure!(
            end_row >= config.scan.start_row,
            "end_row {} is before start_row {}",
            end_row,
            config.scan.start_row
        );
    }

    anyhow::ensure!(
        config.channel.streams.max_pending > 0,
        "channel.streams.max_pending must be greater than 0"
    );
    anyhow::ensure!(
        config.channel.retry_interval_secs > 0,
        "channel.retry_interval_secs must be greater than 0"
    );

    if let Some(replay) = &config.replay {
        anyhow::ensure!(
            replay.limit != Some(0),
            "replay.limit must be greater than 0"
        );
    }

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

    const MINIMAL: &str = r#"
run_setups: [1, 2]
setups_file: setups.yaml
paths:
  climate_dir: ./data/climate
  worker_climate_dir: /monica_data/climate-data/
  phenology_dir: ./data/phenology
  soil_db: ./data/soil.sqlite
templates:
  sim_json: sim.json
  site_json: site.json
  crop_json: crop.json
grids:
  soil: ./data/soil.asc
  crop_mask: ./data/crops.asc
"#;

    fn minimal() -> ProducerConfig {
        sim_common::config::parse_yaml(MINIMAL).unwrap()
    }

    #[test]
    fn test_defaults_fill_optional_sections() {
        let config = minimal();
        assert_eq!(config.run_setups, vec![1, 2]);
        assert_eq!(config.scan.start_row, 0);
        assert_eq!(config.scan.end_row, None);
        assert!(config.replay.is_none());
        assert_eq!(config.channel.dispatch, DispatchMode::Awaited);
        assert_eq!(config.channel.streams.jobs_stream, "crop:jobs");
        assert_eq!(config.debug.write_count, 10);
        assert!(!config.metrics.enabled);
        assert!(validate_producer_config(&config).is_ok());
    }

    #[test]
    fn test_overrides_replace_file_values() {
        let mut config = minimal();
        config.apply(Overrides {
            run_setups: Some(vec![7]),
            start_row: Some(3),
            end_row: Some(9),
            crop_json: Some(PathBuf::from("other-crop.json")),
            dry_run: true,
            ..Default::default()
        });
        assert_eq!(config.run_setups, vec![7]);
        assert_eq!(config.scan.start_row, 3);
        assert_eq!(config.scan.end_row, Some(9));
        assert_eq!(config.templates.crop_json, PathBuf::from("other-crop.json"));
        assert_eq!(config.templates.sim_json, PathBuf::from("sim.json"));
        assert!(config.debug.dry_run);
    }

    #[test]
    fn test_validation_rejects_bad_row_range() {
        let mut config = minimal();
        config.scan.start_row = 5;
        config.scan.end_row = Some(2);
        assert!(validate_producer_config(&config).is_err());
    }

    #[test]
    fn test_validation_requires_setups() {
        let mut config = minimal();
        config.run_setups.clear();
        assert!(validate_producer_config(&config).is_err());
    }

    #[test]
    fn test_validation_checks_metrics_address() {
        let mut config = minimal();
        config.metrics.enabled = true;
        config.metrics.listen = "not-an-address".to_string();
        assert!(validate_producer_config(&config).is_err());
    }

    #[test]
    fn test_parse_run_setups() {
        assert_eq!(parse_run_setups("[1,2,7]").unwrap(), vec![1, 2, 7]);
        assert_eq!(parse_run_setups(" 3, 4 ").unwrap(), vec![3, 4]);
        assert!(parse_run_setups("[]").unwrap().is_empty());
        assert!(parse_run_setups("[1,x]").is_err());
    }
}

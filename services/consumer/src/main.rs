//! Crop ensemble result consumer.
//!
//! Reads simulation results from the results stream and writes one CSV
//! file per setup and location:
//! - Output under `<out_dir>/<setup_id>/`
//! - Failed and nodata results are counted and skipped
//! - Stops on the producer's end-of-stream marker

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use storage::{connect_with_retry, RedisResultSource};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use ensemble_consumer::{load_consumer_config, validate_consumer_config, ConsumerConfig, ResultCollector};

#[derive(Parser, Debug)]
#[command(name = "ensemble-consumer")]
#[command(about = "Collects crop simulation results into per-location CSV files")]
struct Args {
    /// Consumer configuration file
    #[arg(short, long, env = "CONSUMER_CONFIG")]
    config: Option<PathBuf>,

    /// Output directory
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting crop ensemble consumer");

    let mut config = match &args.config {
        Some(path) => load_consumer_config(path)?,
        None => ConsumerConfig::default(),
    };
    if let Some(out_dir) = args.out_dir {
        config.out_dir = out_dir;
    }
    validate_consumer_config(&config)?;

    if config.metrics.enabled {
        let addr: SocketAddr = config.metrics.listen.parse()?;
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!(listen = %addr, "Prometheus metrics exporter initialized");
    }

    let conn = connect_with_retry(
        &config.channel.redis_url,
        Duration::from_secs(config.channel.retry_interval_secs),
        None,
    )
    .await
    .context("Failed to connect to Redis")?;
    let mut source = RedisResultSource::open(conn, config.channel.streams.clone())
        .await
        .context("Failed to open results stream")?;

    let mut collector = ResultCollector::new(&config.out_dir);
    let stats = collector
        .run(&mut source)
        .await
        .context("Result collection failed")?;

    info!(
        received = stats.received,
        written = stats.written,
        failed = stats.failed,
        "Consumer finished"
    );
    Ok(())
}

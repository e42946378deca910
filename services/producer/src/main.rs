//! Crop ensemble job producer.
//!
//! Builds one environment job per usable grid cell for every requested
//! setup and sends the jobs to the simulation workers:
//! - Soil, crop mask, elevation, slope and land-use rasters
//! - Sowing and harvest dates from regional phenology records
//! - Redis Streams job queue with backpressure
//! - Dry-run and debug dump modes for checking jobs locally

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use projection::TransverseMercator;
use sim_common::SetupTable;
use storage::{connect_with_retry, RedisJobSink, SoilProfileCache, SqliteSoilStore};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use ensemble_producer::config::{parse_run_setups, Overrides};
use ensemble_producer::{
    load_producer_config, validate_producer_config, JobDispatcher, RasterGridSource,
    SpatialEnumerator,
};

#[derive(Parser, Debug)]
#[command(name = "ensemble-producer")]
#[command(about = "Builds crop simulation jobs from gridded inputs and sends them to workers")]
struct Args {
    /// Producer configuration file
    #[arg(short, long, env = "PRODUCER_CONFIG", default_value = "config/producer.yaml")]
    config: PathBuf,

    /// Setup ids to run, e.g. "[1,2,7]"
    #[arg(long)]
    run_setups: Option<String>,

    /// First grid row to scan
    #[arg(long)]
    start_row: Option<usize>,

    /// Last grid row to scan
    #[arg(long)]
    end_row: Option<usize>,

    /// Simulation template
    #[arg(long)]
    sim_json: Option<PathBuf>,

    /// Site template
    #[arg(long)]
    site_json: Option<PathBuf>,

    /// Crop template
    #[arg(long)]
    crop_json: Option<PathBuf>,

    /// Setup table
    #[arg(long)]
    setups_file: Option<PathBuf>,

    /// Build jobs without sending them
    #[arg(long)]
    dry_run: bool,

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

    info!(config = %args.config.display(), "Starting crop ensemble producer");

    let mut config = load_producer_config(&args.config)?;
    config.apply(Overrides {
        run_setups: args.run_setups.as_deref().map(parse_run_setups).transpose()?,
        start_row: args.start_row,
        end_row: args.end_row,
        sim_json: args.sim_json,
        site_json: args.site_json,
        crop_json: args.crop_json,
        setups_file: args.setups_file,
        dry_run: args.dry_run,
    });
    validate_producer_config(&config)?;

    if config.metrics.enabled {
        let addr: SocketAddr = config.metrics.listen.parse()?;
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!(listen = %addr, "Prometheus metrics exporter initialized");
    }

    let setups = SetupTable::load(&config.setups_file)
        .with_context(|| format!("Failed to load setups from {:?}", config.setups_file))?;
    info!(setups = setups.len(), run_setups = ?config.run_setups, "Loaded setup table");

    let grids = RasterGridSource::load(&config.grids).context("Failed to load grids")?;
    let soil_store = SqliteSoilStore::open(&config.paths.soil_db)
        .await
        .with_context(|| format!("Failed to open soil database {:?}", config.paths.soil_db))?;
    let soils = SoilProfileCache::new(soil_store);
    let projection = TransverseMercator::etrs89_utm32n();

    let summary = if config.debug.dry_run {
        info!("Dry run, jobs are built but not sent");
        let mut enumerator: SpatialEnumerator<_, _, RedisJobSink> =
            SpatialEnumerator::new(config, grids, soils, projection, None);
        enumerator.run(&setups).await?
    } else {
        let channel = config.channel.clone();
        let conn = connect_with_retry(
            &channel.redis_url,
            Duration::from_secs(channel.retry_interval_secs),
            None,
        )
        .await?;
        let sink = RedisJobSink::open(conn, channel.streams)
            .await
            .context("Failed to open jobs stream")?;
        let dispatcher = JobDispatcher::new(sink, channel.dispatch);
        let mut enumerator = SpatialEnumerator::new(config, grids, soils, projection, Some(dispatcher));
        enumerator.run(&setups).await?
    };

    info!(
        jobs = summary.total_jobs(),
        setups = summary.setups.len(),
        skipped_setups = ?summary.skipped_setups,
        "Producer finished"
    );
    Ok(())
}

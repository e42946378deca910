//! Spatial enumeration of simulation jobs.
//!
//! For every requested setup the enumerator walks the cells of the soil grid
//! (or a replayed list of climate files), looks up what the cell needs and
//! sends one job per usable cell:
//!
//! - soil no-data cells are skipped without a job
//! - cells outside the crop mask and cells without a soil profile get a
//!   nodata job, so workers and consumer see every enumerated cell
//! - with the land cover filter, cells that are not farmland are skipped
//! - everything else gets a full environment job
//!
//! Every sent job takes the next value of a per-setup counter as its
//! `env_id`.

use std::ops::Range;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use environment::climate::{climate_paths, LATLON_TO_ROWCOL_FILE};
use environment::template::load_template;
use environment::{
    ClimateGridIndex, ClimateRef, CropTemplate, EnvironmentBuilder, EnvironmentJob, JobBody,
    RowColIndex, SimTemplate, SiteTemplate,
};
use metrics::counter;
use phenology::{resolve, PhenologyStore, Resolution};
use projection::{Projection, TransverseMercator};
use sim_common::{
    Coordinate, CorrelationKey, GridHeader, LatLon, Setup, SetupTable, SoilProfile, SpatialId,
};
use storage::{JobSink, SoilProfileCache, SoilProfileStore};
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use crate::config::{ProducerConfig, ReplayConfig, ScanConfig};
use crate::dispatch::{DispatchError, JobDispatcher};
use crate::grid_source::{GridSource, Layer};

/// Land-use codes of farmland.
const FARMLAND_CODES: [i64; 3] = [2, 3, 4];

/// Crop mask code of cells where the crop is grown.
const CROP_MASK_CODE: i64 = 1;

/// A cell to build a job for.
#[derive(Debug, Clone, PartialEq)]
pub struct GridCell {
    /// Cell center in the grid CRS
    pub coord: Coordinate,
    /// (row, col) in the soil grid, for scanned cells
    pub raster: Option<(usize, usize)>,
    /// Climate file of a replayed cell
    pub replay: Option<ReplayCell>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReplayCell {
    pub position: LatLon,
    pub file_name: String,
}

impl GridCell {
    fn scanned(header: &GridHeader, row: usize, col: usize) -> Self {
        Self {
            coord: header.cell_center(row, col),
            raster: Some((row, col)),
            replay: None,
        }
    }
}

/// Rows of a scan, clamped to the grid.
pub fn scan_rows(nrows: usize, scan: &ScanConfig) -> Range<usize> {
    let end = match scan.end_row {
        Some(end) if scan.end_row_exclusive => end,
        Some(end) => end.saturating_add(1),
        None => nrows,
    }
    .min(nrows);
    scan.start_row.min(end)..end
}

/// Cells of a grid scan in row-major order.
pub fn scan_cells(header: GridHeader, scan: &ScanConfig) -> impl Iterator<Item = GridCell> {
    scan_rows(header.nrows, scan)
        .flat_map(move |row| (0..header.ncols).map(move |col| GridCell::scanned(&header, row, col)))
}

/// Parse `<anything>_<row>_<col>.csv`.
fn replay_row_col(file_name: &str) -> Option<(i64, i64)> {
    let stem = file_name.strip_suffix(".csv")?;
    let mut parts = stem.rsplit('_');
    let col = parts.next()?.parse().ok()?;
    let row = parts.next()?.parse().ok()?;
    Some((row, col))
}

/// Cells of the climate files found below the replay directory.
///
/// Files whose (row, col) is not in the row/col index are ignored. Files
/// are taken in path order.
pub fn replay_cells<P: Projection + ?Sized>(
    replay: &ReplayConfig,
    projection: &P,
) -> Result<Vec<GridCell>> {
    let index = RowColIndex::load(&replay.rowcol_to_latlon).with_context(|| {
        format!("Failed to load row/col index {:?}", replay.rowcol_to_latlon)
    })?;

    let mut cells = Vec::new();
    for entry in WalkDir::new(&replay.climate_files_dir).sort_by_file_name() {
        let entry = entry.with_context(|| {
            format!("Failed to list climate files in {:?}", replay.climate_files_dir)
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().into_owned();
        let Some((row, col)) = replay_row_col(&file_name) else {
            continue;
        };
        let Some(position) = index.get(row, col) else {
            debug!(file = %file_name, row, col, "Climate file not in row/col index");
            continue;
        };

        cells.push(GridCell {
            coord: projection.forward(position)?,
            raster: None,
            replay: Some(ReplayCell {
                position,
                file_name,
            }),
        });
        if replay.limit.map_or(false, |limit| cells.len() >= limit) {
            break;
        }
    }

    info!(
        dir = %replay.climate_files_dir.display(),
        cells = cells.len(),
        "Collected replayed climate files"
    );
    Ok(cells)
}

/// Counts of one setup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetupStats {
    /// Full jobs built
    pub jobs: u64,
    /// Nodata jobs built
    pub nodata_jobs: u64,
    /// Cells left without a job
    pub skipped_cells: u64,
    /// Jobs written to the debug directory
    pub debug_written: usize,
}

impl SetupStats {
    /// Jobs built, full and nodata.
    pub fn total_jobs(&self) -> u64 {
        self.jobs + self.nodata_jobs
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    /// Stats of every setup that ran, in run order
    pub setups: Vec<(u32, SetupStats)>,
    /// Setups abandoned because their inputs could not be read
    pub skipped_setups: Vec<u32>,
}

impl RunSummary {
    pub fn total_jobs(&self) -> u64 {
        self.setups.iter().map(|(_, stats)| stats.total_jobs()).sum()
    }

    pub fn stats(&self, setup_id: u32) -> Option<&SetupStats> {
        self.setups
            .iter()
            .find(|(id, _)| *id == setup_id)
            .map(|(_, stats)| stats)
    }
}

/// Per-setup inputs shared by every cell.
struct SetupContext<'a> {
    setup: &'a Setup,
    template: JobBody,
    template_dates: Resolution,
    phenology: PhenologyStore,
    climate: ClimateGridIndex,
    next_env_id: u64,
    stats: SetupStats,
}

impl SetupContext<'_> {
    fn key(&self, spatial: SpatialId, soil_id: i64) -> CorrelationKey {
        CorrelationKey::new(self.setup.id, spatial, Some(soil_id), self.next_env_id)
    }
}

/// Walks cells and turns them into dispatched jobs.
pub struct SpatialEnumerator<G, S, J> {
    config: ProducerConfig,
    grids: G,
    soils: SoilProfileCache<S>,
    projection: TransverseMercator,
    /// `None` in dry-run mode
    dispatcher: Option<JobDispatcher<J>>,
}

impl<G, S, J> SpatialEnumerator<G, S, J>
where
    G: GridSource,
    S: SoilProfileStore,
    J: JobSink,
{
    pub fn new(
        config: ProducerConfig,
        grids: G,
        soils: SoilProfileCache<S>,
        projection: TransverseMercator,
        dispatcher: Option<JobDispatcher<J>>,
    ) -> Self {
        Self {
            config,
            grids,
            soils,
            projection,
            dispatcher,
        }
    }

    /// Run every configured setup in order.
    ///
    /// Setups whose inputs cannot be read are skipped. A transport failure
    /// ends the run.
    pub async fn run(&mut self, setups: &SetupTable) -> Result<RunSummary> {
        let started = Instant::now();
        let replayed = match &self.config.replay {
            Some(replay) => Some(replay_cells(replay, &self.projection)?),
            None => None,
        };

        let run_setups = self.config.run_setups.clone();
        let mut summary = RunSummary::default();
        for setup in setups.select(&run_setups) {
            match self.run_setup(setup, replayed.as_deref()).await? {
                Some(stats) => summary.setups.push((setup.id, stats)),
                None => summary.skipped_setups.push(setup.id),
            }
        }

        if let Some(dispatcher) = self.dispatcher.as_mut() {
            dispatcher.finish().await?;
        }

        let cache = self.soils.stats();
        info!(
            setups = summary.setups.len(),
            skipped_setups = summary.skipped_setups.len(),
            jobs = summary.total_jobs(),
            soil_cache_entries = cache.entries,
            soil_cache_hit_rate = cache.hit_rate(),
            elapsed_secs = started.elapsed().as_secs_f64(),
            "Run finished"
        );
        Ok(summary)
    }

    /// Load the per-setup inputs. Any failure abandons the setup.
    fn prepare<'a>(&self, setup: &'a Setup) -> Result<SetupContext<'a>> {
        let crop_id = setup.crop_id_short();
        let phenology_path = PhenologyStore::path_for(&self.config.paths.phenology_dir, crop_id);
        let phenology = PhenologyStore::load(&phenology_path, crop_id, &self.projection)
            .with_context(|| format!("Failed to load phenology for crop {}", crop_id))?;

        let latlon_path = self
            .config
            .paths
            .climate_dir
            .join(&setup.climate_path_to_latlon_file)
            .join(LATLON_TO_ROWCOL_FILE);
        let climate = ClimateGridIndex::load(&latlon_path, &self.projection)
            .with_context(|| format!("Failed to load climate index {:?}", latlon_path))?;

        let templates = &self.config.templates;
        let sim: SimTemplate = load_template(setup.sim_json.as_ref().unwrap_or(&templates.sim_json))?;
        let site: SiteTemplate =
            load_template(setup.site_json.as_ref().unwrap_or(&templates.site_json))?;
        let crop: CropTemplate =
            load_template(setup.crop_json.as_ref().unwrap_or(&templates.crop_json))?;
        let template = JobBody::compose(setup, &sim, &site, &crop)?;

        Ok(SetupContext {
            setup,
            template_dates: template.phenology_dates(),
            template,
            phenology,
            climate,
            next_env_id: 0,
            stats: SetupStats::default(),
        })
    }

    #[instrument(skip_all, fields(setup_id = setup.id, crop_id = %setup.crop_id))]
    async fn run_setup(
        &mut self,
        setup: &Setup,
        replayed: Option<&[GridCell]>,
    ) -> Result<Option<SetupStats>, DispatchError> {
        let started = Instant::now();
        let mut ctx = match self.prepare(setup) {
            Ok(ctx) => ctx,
            Err(e) => {
                warn!(error = %format!("{:#}", e), "Skipping setup");
                return Ok(None);
            }
        };
        info!(
            sowing_policy = %setup.sowing_policy,
            harvest_policy = %setup.harvest_policy,
            clusters = ctx.phenology.len(),
            climate_cells = ctx.climate.len(),
            "Starting setup"
        );

        let header = *self.grids.scan_header();
        let scan = self.config.scan.clone();
        let cells: Box<dyn Iterator<Item = GridCell> + '_> = match replayed {
            Some(cells) => Box::new(cells.iter().cloned()),
            None => Box::new(scan_cells(header, &scan)),
        };

        for cell in cells {
            self.process_cell(&mut ctx, &cell).await?;
        }

        info!(
            jobs = ctx.stats.jobs,
            nodata_jobs = ctx.stats.nodata_jobs,
            skipped_cells = ctx.stats.skipped_cells,
            elapsed_secs = started.elapsed().as_secs_f64(),
            "Setup finished"
        );
        Ok(Some(ctx.stats))
    }

    async fn process_cell(
        &mut self,
        ctx: &mut SetupContext<'_>,
        cell: &GridCell,
    ) -> Result<(), DispatchError> {
        let setup = ctx.setup;

        // No-data soil cells are not part of the run at all
        let Some(soil_id) = self.grids.nearest_value(&cell.coord, Layer::Soil).await else {
            return Ok(());
        };
        let soil_id = soil_id as i64;

        let (spatial, latitude, climate) = match &cell.replay {
            Some(replay) => {
                let dir = self
                    .config
                    .replay
                    .as_ref()
                    .map(|r| {
                        r.worker_climate_files_dir
                            .clone()
                            .unwrap_or_else(|| r.climate_files_dir.display().to_string())
                    })
                    .unwrap_or_default();
                (
                    SpatialId::lat_lon(replay.position),
                    Some(replay.position.lat),
                    ClimateRef::File(format!("{}/{}", dir, replay.file_name)),
                )
            }
            None => {
                let Some((crow, ccol)) = ctx.climate.nearest_cell(&cell.coord) else {
                    self.skip(ctx, cell, "no climate cell");
                    return Ok(());
                };
                (
                    SpatialId::Grid {
                        row: crow,
                        col: ccol,
                    },
                    ctx.climate.position(crow, ccol).map(|p| p.lat),
                    ClimateRef::Files(climate_paths(
                        &self.config.paths.worker_climate_dir,
                        setup,
                        crow,
                        ccol,
                    )),
                )
            }
        };
        let key = ctx.key(spatial, soil_id);

        let crop_code = self.grids.nearest_value(&cell.coord, Layer::CropMask).await;
        if crop_code.map(|v| v as i64) != Some(CROP_MASK_CODE) {
            return self.send_nodata(ctx, key).await;
        }

        let grids = &self.grids;
        let soils = &mut self.soils;
        let (profile, elevation, slope) = tokio::join!(
            soils.get(soil_id),
            grids.nearest_value(&cell.coord, Layer::Elevation),
            grids.nearest_value(&cell.coord, Layer::Slope),
        );

        let profile: SoilProfile = match profile {
            Ok(profile) if !profile.is_empty() => profile,
            Ok(_) => return self.send_nodata(ctx, key).await,
            Err(e) => {
                warn!(soil_id, error = %e, "Soil profile unavailable");
                return self.send_nodata(ctx, key).await;
            }
        };

        if setup.landcover {
            let land_use = self.grids.nearest_value(&cell.coord, Layer::LandUse).await;
            if !land_use.map_or(false, |code| FARMLAND_CODES.contains(&(code as i64))) {
                self.skip(ctx, cell, "not farmland");
                return Ok(());
            }
        }

        let dates = resolve(
            setup.sowing_policy,
            setup.harvest_policy,
            ctx.phenology.record_at(&cell.coord),
            &ctx.template_dates,
        );

        let job = EnvironmentBuilder::new(setup, &ctx.template)
            .soil_profile(profile)
            .elevation(elevation)
            .slope(slope)
            .latitude(latitude)
            .phenology(dates)
            .climate(climate)
            .build(key);

        self.send(ctx, &job).await?;
        ctx.stats.jobs += 1;

        if ctx.stats.debug_written < self.config.debug.write_count {
            if let Some(dir) = self.config.debug.write_dir.clone() {
                if write_debug_job(&dir, &job).await {
                    ctx.stats.debug_written += 1;
                }
            }
        }
        Ok(())
    }

    async fn send_nodata(
        &mut self,
        ctx: &mut SetupContext<'_>,
        key: CorrelationKey,
    ) -> Result<(), DispatchError> {
        let job = EnvironmentJob::nodata(key);
        self.send(ctx, &job).await?;
        ctx.stats.nodata_jobs += 1;
        counter!("producer_nodata_jobs_total").increment(1);
        Ok(())
    }

    async fn send(
        &mut self,
        ctx: &mut SetupContext<'_>,
        job: &EnvironmentJob,
    ) -> Result<(), DispatchError> {
        if let Some(dispatcher) = self.dispatcher.as_mut() {
            dispatcher.dispatch(job).await?;
        }
        ctx.next_env_id += 1;
        Ok(())
    }

    fn skip(&self, ctx: &mut SetupContext<'_>, cell: &GridCell, reason: &str) {
        debug!(raster = ?cell.raster, reason, "Skipping cell");
        ctx.stats.skipped_cells += 1;
        counter!("producer_cells_skipped_total").increment(1);
    }

    pub fn soil_cache(&self) -> &SoilProfileCache<S> {
        &self.soils
    }

    pub fn dispatcher(&self) -> Option<&JobDispatcher<J>> {
        self.dispatcher.as_ref()
    }
}

/// Debug file name of a job, `sid-<setup>_<cell>.json`.
pub fn debug_file_name(key: &CorrelationKey) -> String {
    let cell = key
        .spatial_id()
        .map(|s| s.file_stem())
        .unwrap_or_else(|| format!("env-{}", key.env_id));
    format!("sid-{}_{}.json", key.setup_id, cell)
}

/// Write a job as pretty JSON unless the file already exists.
///
/// Returns whether the file was written. Failures are logged only.
async fn write_debug_job(dir: &Path, job: &EnvironmentJob) -> bool {
    let path: PathBuf = dir.join(debug_file_name(&job.custom_id));
    if let Err(e) = tokio::fs::create_dir_all(dir).await {
        warn!(dir = %dir.display(), error = %e, "Cannot create debug directory");
        return false;
    }
    if tokio::fs::try_exists(&path).await.unwrap_or(false) {
        warn!(path = %path.display(), "Debug file exists, not overwriting");
        return false;
    }

    let content = match serde_json::to_string_pretty(job) {
        Ok(content) => content,
        Err(e) => {
            warn!(error = %e, "Cannot serialize debug job");
            return false;
        }
    };
    match tokio::fs::write(&path, content).await {
        Ok(()) => true,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Cannot write debug job");
            false
        }
    }
}
